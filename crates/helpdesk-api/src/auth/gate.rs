//! 권한 게이트.
//!
//! 요청마다 다음 순서로 검사합니다.
//!
//! 1. `Authorization: Bearer <token>` 추출, 서명/만료 검증, 토큰 종류 확인
//! 2. jti 폐기 여부 확인 (조회 실패 시 거부)
//! 3. `"<소문자 메서드>@<매칭된 라우트 템플릿>"` 키가 클레임 권한에 포함되는지 확인
//!
//! 통과하면 검증된 [`Claims`]를 request extension에 넣고 핸들러를 실행합니다.

use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, MatchedPath, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use tracing::debug;

use helpdesk_core::{permission_key, TokenType};

use super::jwt::{Claims, JwtError};
use crate::error::ApiErrorResponse;
use crate::metrics::record_gate_denial;
use crate::state::AppState;

/// 게이트 거부 사유.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("인증 토큰이 필요합니다")]
    MissingToken,
    #[error("잘못된 Authorization 헤더 형식")]
    InvalidAuthHeader,
    #[error("토큰이 만료되었습니다")]
    TokenExpired,
    #[error("유효하지 않은 토큰")]
    InvalidToken,
    #[error("폐기된 토큰입니다")]
    TokenRevoked,
    #[error("권한이 부족합니다")]
    InsufficientPermission,
}

impl AuthError {
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::MissingToken => "MISSING_TOKEN",
            AuthError::InvalidAuthHeader => "INVALID_AUTH_HEADER",
            AuthError::TokenExpired => "TOKEN_EXPIRED",
            AuthError::InvalidToken => "INVALID_TOKEN",
            AuthError::TokenRevoked => "TOKEN_REVOKED",
            AuthError::InsufficientPermission => "INSUFFICIENT_PERMISSION",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::InsufficientPermission => StatusCode::FORBIDDEN,
            _ => StatusCode::UNAUTHORIZED,
        }
    }
}

impl From<JwtError> for AuthError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::TokenExpired => AuthError::TokenExpired,
            _ => AuthError::InvalidToken,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let body = ApiErrorResponse::new(self.code(), self.to_string());
        (self.status(), Json(body)).into_response()
    }
}

/// `Authorization` 헤더에서 Bearer 토큰을 꺼냅니다.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let header = headers.get(AUTHORIZATION).ok_or(AuthError::MissingToken)?;
    let value = header.to_str().map_err(|_| AuthError::InvalidAuthHeader)?;
    let token = value
        .strip_prefix("Bearer ")
        .ok_or(AuthError::InvalidAuthHeader)?
        .trim();
    if token.is_empty() {
        return Err(AuthError::InvalidAuthHeader);
    }
    Ok(token)
}

/// 1-2단계: 토큰 검증과 폐기 여부 확인.
pub async fn authenticate(
    state: &AppState,
    headers: &HeaderMap,
    expected: TokenType,
) -> Result<Claims, AuthError> {
    let token = bearer_token(headers)?;
    let claims = state.issuer.keys().decode(token)?;

    if claims.token_type != expected {
        return Err(AuthError::InvalidToken);
    }
    if state.revocation.is_revoked(&claims.jti).await {
        return Err(AuthError::TokenRevoked);
    }
    Ok(claims)
}

/// 3단계: 클레임 권한과 요청 키 비교.
pub fn check_permission(claims: &Claims, method: &str, template: &str) -> Result<(), AuthError> {
    let key = permission_key(method, template);
    if claims.permissions().allows(&key) {
        Ok(())
    } else {
        debug!(sub = %claims.sub, key = %key, "권한 없음");
        Err(AuthError::InsufficientPermission)
    }
}

/// 권한 게이트 미들웨어.
///
/// `route_layer`로 붙여야 `MatchedPath`가 채워집니다. 템플릿을 알 수 없으면 거부합니다.
pub async fn authorize(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let claims = match authenticate(&state, request.headers(), TokenType::Access).await {
        Ok(claims) => claims,
        Err(e) => return deny(e),
    };

    let Some(template) = request
        .extensions()
        .get::<MatchedPath>()
        .map(|m| m.as_str().to_owned())
    else {
        return deny(AuthError::InsufficientPermission);
    };

    if let Err(e) = check_permission(&claims, request.method().as_str(), &template) {
        return deny(e);
    }

    request.extensions_mut().insert(claims);
    next.run(request).await
}

fn deny(err: AuthError) -> Response {
    record_gate_denial(err.code());
    err.into_response()
}

/// 인증된 Access 토큰의 클레임 추출기.
///
/// 게이트를 통과한 요청이면 extension에 있는 클레임을 그대로 쓰고,
/// 게이트 밖의 라우트에서는 1-2단계를 직접 수행합니다.
#[derive(Debug, Clone)]
pub struct JwtAuth(pub Claims);

impl FromRequestParts<Arc<AppState>> for JwtAuth {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        if let Some(claims) = parts.extensions.get::<Claims>() {
            return Ok(JwtAuth(claims.clone()));
        }
        authenticate(state, &parts.headers, TokenType::Access)
            .await
            .map(JwtAuth)
    }
}
