//! JWT 토큰 처리.
//!
//! Access/Refresh 토큰은 같은 클레임 구조를 쓰고 `type` 필드로 구분합니다.
//! 두 토큰 모두 발급 시점의 권한 목록(`list_permission`)을 담습니다.
//! 같은 로그인에서 발급된 두 토큰은 `pair_jti`로 서로의 jti를 가리킵니다.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use helpdesk_core::{PermissionSet, TokenType};

/// JWT 페이로드.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject - 사용자 ID
    pub sub: String,
    /// Issued At (Unix timestamp)
    pub iat: i64,
    /// Expiration (Unix timestamp)
    pub exp: i64,
    /// JWT ID - 토큰마다 새로 만드는 UUID v4
    pub jti: String,
    /// `access` | `refresh`
    #[serde(rename = "type")]
    pub token_type: TokenType,
    /// 발급 시점의 권한 목록
    #[serde(default)]
    pub list_permission: Vec<String>,
    /// 함께 발급된 상대 토큰의 jti
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pair_jti: Option<String>,
}

impl Claims {
    /// 새 클레임 생성. `jti`는 매번 새로 만들어집니다.
    pub fn new(
        user_id: impl Into<String>,
        token_type: TokenType,
        permissions: &PermissionSet,
        lifetime: Duration,
    ) -> Self {
        let now = Utc::now();
        Self {
            sub: user_id.into(),
            iat: now.timestamp(),
            exp: (now + lifetime).timestamp(),
            jti: Uuid::new_v4().to_string(),
            token_type,
            list_permission: permissions.to_vec(),
            pair_jti: None,
        }
    }

    /// 두 클레임을 한 세션으로 묶습니다.
    pub fn link_pair(access: &mut Claims, refresh: &mut Claims) {
        access.pair_jti = Some(refresh.jti.clone());
        refresh.pair_jti = Some(access.jti.clone());
    }

    /// 이 토큰이 속한 세션의 jti 목록 (자신 + 상대 토큰).
    pub fn session_jtis(&self) -> Vec<String> {
        std::iter::once(self.jti.clone())
            .chain(self.pair_jti.clone())
            .collect()
    }

    /// 클레임의 권한 목록.
    pub fn permissions(&self) -> PermissionSet {
        self.list_permission.iter().map(String::as_str).collect()
    }

    /// `sub`를 사용자 UUID로 해석.
    pub fn user_id(&self) -> Option<Uuid> {
        Uuid::parse_str(&self.sub).ok()
    }

    pub fn is_access(&self) -> bool {
        self.token_type == TokenType::Access
    }
}

/// JWT 처리 에러.
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("토큰 인코딩 실패: {0}")]
    EncodingError(#[from] jsonwebtoken::errors::Error),
    #[error("토큰이 만료되었습니다")]
    TokenExpired,
    #[error("유효하지 않은 토큰")]
    InvalidToken,
}

/// 서명/검증 키 쌍 (HS256).
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl std::fmt::Debug for JwtKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("JwtKeys([REDACTED])")
    }
}

impl JwtKeys {
    pub fn from_secret(secret: &SecretString) -> Self {
        let bytes = secret.expose_secret().as_bytes();
        Self {
            encoding: EncodingKey::from_secret(bytes),
            decoding: DecodingKey::from_secret(bytes),
        }
    }

    /// 클레임에 서명하여 토큰 문자열을 만듭니다.
    pub fn encode(&self, claims: &Claims) -> Result<String, JwtError> {
        encode(&Header::default(), claims, &self.encoding).map_err(JwtError::from)
    }

    /// 서명과 만료를 검증하고 클레임을 반환합니다.
    ///
    /// 토큰 종류는 검사하지 않습니다. 호출자가 [`Claims::token_type`]을 확인해야 합니다.
    pub fn decode(&self, token: &str) -> Result<Claims, JwtError> {
        let mut validation = Validation::default();
        validation.validate_exp = true;
        validation.leeway = 0;

        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::TokenExpired,
                _ => JwtError::InvalidToken,
            })
    }
}
