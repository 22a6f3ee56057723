//! 통합 API 에러 응답 타입.
//!
//! 모든 API 엔드포인트에서 일관된 에러 형식을 제공합니다.
//! 계층별 에러(`StoreError`, `IssueError`, `AuthError`)는 이 모듈에서
//! HTTP 상태 코드와 에러 코드로 변환됩니다.

use axum::http::{Method, StatusCode, Uri};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::error;
use utoipa::ToSchema;

use crate::auth::{AuthError, IssueError, PasswordError};
use crate::repository::StoreError;

/// 통합 API 에러 응답.
///
/// # 예시
///
/// ```json
/// {
///   "code": "NOT_FOUND",
///   "message": "찾을 수 없습니다: user 3f2a...",
///   "timestamp": 1738300800
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiErrorResponse {
    /// 에러 코드 (예: "DB_ERROR", "VALIDATION_ERROR", "NOT_FOUND")
    pub code: String,
    /// 사람이 읽을 수 있는 에러 메시지
    pub message: String,
    /// 추가 에러 상세 정보 (선택적)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    /// 에러 발생 타임스탬프 (Unix timestamp, 선택적)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    /// HTTP 메서드
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    /// 요청 경로
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl ApiErrorResponse {
    /// 기본 에러 생성 (타임스탬프 포함).
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
            timestamp: Some(chrono::Utc::now().timestamp()),
            method: None,
            path: None,
        }
    }

    /// 상세 정보 포함 에러 생성.
    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: Value,
    ) -> Self {
        Self {
            details: Some(details),
            ..Self::new(code, message)
        }
    }

    /// 타임스탬프 없는 간단한 에러.
    pub fn simple(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            timestamp: None,
            ..Self::new(code, message)
        }
    }

    /// 요청 정보(메서드, 경로)를 추가합니다.
    #[must_use]
    pub fn with_request_info(mut self, method: &Method, uri: &Uri) -> Self {
        self.method = Some(method.to_string());
        self.path = Some(uri.path().to_string());
        self
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for ApiErrorResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiErrorResponse {}

/// 핸들러 에러 타입 (상태 코드 + 본문).
pub type ApiError = (StatusCode, Json<ApiErrorResponse>);

/// API 핸들러 Result 타입 별칭.
pub type ApiResult<T> = Result<T, ApiError>;

/// 상태 코드와 에러 코드로 에러 응답을 만듭니다.
pub fn api_error(status: StatusCode, code: &str, message: impl Into<String>) -> ApiError {
    (status, Json(ApiErrorResponse::new(code, message)))
}

pub fn not_found(what: impl std::fmt::Display) -> ApiError {
    api_error(
        StatusCode::NOT_FOUND,
        "NOT_FOUND",
        format!("찾을 수 없습니다: {}", what),
    )
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => not_found(what),
            StoreError::Conflict(what) => api_error(
                StatusCode::CONFLICT,
                "CONFLICT",
                format!("이미 존재하거나 사용 중입니다: {}", what),
            ),
            StoreError::Unexpected(e) => {
                error!(error = %e, "저장소 에러");
                api_error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DB_ERROR",
                    "데이터베이스 처리 중 오류가 발생했습니다",
                )
            }
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        api_error(err.status(), err.code(), err.to_string())
    }
}

impl From<IssueError> for ApiError {
    fn from(err: IssueError) -> Self {
        match err {
            IssueError::InvalidCredentials => api_error(
                StatusCode::UNAUTHORIZED,
                "INVALID_CREDENTIALS",
                err.to_string(),
            ),
            IssueError::TokenExpired => AuthError::TokenExpired.into(),
            IssueError::InvalidToken => AuthError::InvalidToken.into(),
            IssueError::TokenRevoked => AuthError::TokenRevoked.into(),
            IssueError::Store(e) => e.into(),
            IssueError::Password(PasswordError::TooWeak(reason)) => {
                api_error(StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR", reason)
            }
            other => {
                error!(error = %other, "토큰 발급 실패");
                api_error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "요청을 처리할 수 없습니다",
                )
            }
        }
    }
}
