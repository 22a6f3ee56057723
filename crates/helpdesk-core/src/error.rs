//! 헬프데스크 시스템의 에러 타입.
//!
//! 도메인 계층 전반에서 사용되는 에러 타입을 정의합니다.

use thiserror::Error;

/// 핵심 도메인 에러.
#[derive(Debug, Error)]
pub enum HelpdeskError {
    /// 설정 에러
    #[error("설정 에러: {0}")]
    Config(String),

    /// 인증 에러
    #[error("인증 에러: {0}")]
    Auth(String),

    /// 권한 부족
    #[error("권한 부족: {0}")]
    Forbidden(String),

    /// 데이터베이스 에러
    #[error("데이터베이스 에러: {0}")]
    Database(String),

    /// 직렬화 에러
    #[error("직렬화 에러: {0}")]
    Serialization(String),

    /// 잘못된 입력
    #[error("잘못된 입력: {0}")]
    InvalidInput(String),

    /// 찾을 수 없음
    #[error("찾을 수 없음: {0}")]
    NotFound(String),

    /// 중복 (unique 제약 위반)
    #[error("이미 존재합니다: {0}")]
    Conflict(String),

    /// 내부 에러
    #[error("내부 에러: {0}")]
    Internal(String),
}

/// 도메인 작업을 위한 Result 타입.
pub type HelpdeskResult<T> = Result<T, HelpdeskError>;

impl HelpdeskError {
    /// 클라이언트 입력으로 인해 발생한 에러인지 확인합니다.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            HelpdeskError::InvalidInput(_)
                | HelpdeskError::NotFound(_)
                | HelpdeskError::Conflict(_)
                | HelpdeskError::Auth(_)
                | HelpdeskError::Forbidden(_)
        )
    }
}

impl From<serde_json::Error> for HelpdeskError {
    fn from(err: serde_json::Error) -> Self {
        HelpdeskError::Serialization(err.to_string())
    }
}

impl From<config::ConfigError> for HelpdeskError {
    fn from(err: config::ConfigError) -> Self {
        HelpdeskError::Config(err.to_string())
    }
}
