//! 사용자 계정.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 사용자 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa-support", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    /// 로그인 가능
    Active,
    /// 비활성 (로그인 불가)
    Inactive,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Active => "active",
            UserStatus::Inactive => "inactive",
        }
    }

    /// 문자열에서 상태 파싱.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "active" => Some(UserStatus::Active),
            "inactive" => Some(UserStatus::Inactive),
            _ => None,
        }
    }
}

impl std::fmt::Display for UserStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 사용자 계정.
///
/// `username`과 `email`은 소문자로 저장되며 각각 유일합니다.
/// `group_id`는 초기 설정(bootstrap) 단계에서만 비어 있을 수 있습니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx-support", derive(sqlx::FromRow))]
#[cfg_attr(feature = "utoipa-support", derive(utoipa::ToSchema))]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    /// PHC 형식 비밀번호 해시. 응답에는 절대 포함되지 않습니다.
    #[serde(skip)]
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub group_id: Option<Uuid>,
    /// `active` | `inactive`
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// 로그인 가능한 상태인지 확인.
    ///
    /// 알 수 없는 상태 값은 비활성으로 취급합니다.
    pub fn is_active(&self) -> bool {
        UserStatus::parse(&self.status) == Some(UserStatus::Active)
    }

    /// 로그인 식별자(username 또는 email)와 일치하는지 확인.
    ///
    /// `login`은 이미 정규화(trim + 소문자)된 값이어야 합니다.
    pub fn matches_login(&self, login: &str) -> bool {
        self.username == login || self.email == login
    }
}

/// 로그인 식별자 정규화 (앞뒤 공백 제거 + 소문자).
pub fn normalize_login(raw: &str) -> String {
    raw.trim().to_lowercase()
}
