//! 발급된 토큰 메타데이터.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 토큰 종류.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa-support", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    /// API 호출용 단기 토큰
    Access,
    /// 새 토큰 쌍 발급용 장기 토큰
    Refresh,
}

impl TokenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Access => "access",
            TokenType::Refresh => "refresh",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "access" => Some(TokenType::Access),
            "refresh" => Some(TokenType::Refresh),
            _ => None,
        }
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 저장소에 기록된 토큰 행.
///
/// `revoked`는 false → true 방향으로만 바뀝니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx-support", derive(sqlx::FromRow))]
pub struct TokenRecord {
    pub id: Uuid,
    pub jti: String,
    /// `access` | `refresh`
    pub token_type: String,
    /// 토큰 소유자 식별자 (사용자 id 문자열)
    pub user_identity: String,
    pub revoked: bool,
    /// 만료 시각 (Unix epoch 초)
    pub expires: i64,
}

impl TokenRecord {
    /// 주어진 시각 기준으로 만료되었는지 확인.
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.expires < now
    }
}

/// 발급 직후 저장할 토큰 정보.
#[derive(Debug, Clone)]
pub struct NewTokenRecord {
    pub jti: String,
    pub token_type: TokenType,
    pub user_identity: String,
    pub expires: i64,
}

impl NewTokenRecord {
    /// 아직 폐기되지 않은 저장 행으로 변환.
    pub fn into_record(self) -> TokenRecord {
        TokenRecord {
            id: Uuid::new_v4(),
            jti: self.jti,
            token_type: self.token_type.as_str().to_string(),
            user_identity: self.user_identity,
            revoked: false,
            expires: self.expires,
        }
    }
}
