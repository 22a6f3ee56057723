//! 토큰 발급기.
//!
//! 로그인/토큰 갱신/비밀번호 변경을 담당합니다. 발급되는 모든 토큰은
//! 서명 직후 [`RevocationStore`]에 기록되며, 기록에 실패하면 토큰을 반환하지 않습니다.

use std::sync::Arc;

use chrono::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use helpdesk_core::{normalize_login, AuthConfig, NewTokenRecord, TokenType, User};

use super::jwt::{Claims, JwtError, JwtKeys};
use super::password::{
    dummy_hash, hash_password, validate_password_strength, verify_password, PasswordError,
};
use super::resolver::PermissionResolver;
use super::revocation::RevocationStore;
use crate::metrics::record_login;
use crate::repository::{DirectoryStore, StoreError};

/// 토큰 발급 에러.
#[derive(Debug, thiserror::Error)]
pub enum IssueError {
    /// 사용자 없음, 비밀번호 불일치, 비활성 계정을 구분하지 않습니다.
    #[error("아이디 또는 비밀번호가 올바르지 않습니다")]
    InvalidCredentials,
    #[error("토큰이 만료되었습니다")]
    TokenExpired,
    #[error("유효하지 않은 토큰")]
    InvalidToken,
    #[error("폐기된 토큰입니다")]
    TokenRevoked,
    #[error("저장소 에러: {0}")]
    Store(#[from] StoreError),
    #[error(transparent)]
    Jwt(JwtError),
    #[error(transparent)]
    Password(#[from] PasswordError),
}

impl From<JwtError> for IssueError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::TokenExpired => IssueError::TokenExpired,
            JwtError::InvalidToken => IssueError::InvalidToken,
            other => IssueError::Jwt(other),
        }
    }
}

/// 발급된 Access/Refresh 토큰 쌍.
#[derive(Debug, Clone)]
pub struct IssuedTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub access_jti: String,
    pub refresh_jti: String,
    pub user: User,
}

/// 토큰 발급기.
#[derive(Clone)]
pub struct TokenIssuer {
    directory: Arc<dyn DirectoryStore>,
    resolver: PermissionResolver,
    revocation: RevocationStore,
    keys: JwtKeys,
    access_lifetime: Duration,
    refresh_lifetime: Duration,
}

impl TokenIssuer {
    pub fn new(
        directory: Arc<dyn DirectoryStore>,
        resolver: PermissionResolver,
        revocation: RevocationStore,
        keys: JwtKeys,
        config: &AuthConfig,
    ) -> Self {
        Self {
            directory,
            resolver,
            revocation,
            keys,
            access_lifetime: Duration::days(config.access_token_days),
            refresh_lifetime: Duration::days(config.refresh_token_days),
        }
    }

    pub fn keys(&self) -> &JwtKeys {
        &self.keys
    }

    /// 사용자명 또는 이메일과 비밀번호로 로그인합니다.
    pub async fn login(&self, login: &str, password: &str) -> Result<IssuedTokens, IssueError> {
        let login = normalize_login(login);
        let user = self.directory.find_user_by_login(&login).await?;

        let Some(user) = user else {
            // 존재하지 않는 계정도 같은 비용의 해시 검증을 거칩니다.
            let _ = verify_password(password, dummy_hash());
            record_login("failure");
            info!(login = %login, "로그인 실패: 사용자 없음");
            return Err(IssueError::InvalidCredentials);
        };

        let verified = match verify_password(password, &user.password_hash) {
            Ok(verified) => verified,
            Err(e) => {
                warn!(user_id = %user.id, error = %e, "저장된 비밀번호 해시를 읽을 수 없음");
                false
            }
        };

        if !verified || !user.is_active() {
            record_login("failure");
            info!(user_id = %user.id, active = user.is_active(), "로그인 실패");
            return Err(IssueError::InvalidCredentials);
        }

        let tokens = self.issue_pair(user).await?;
        record_login("success");
        info!(user_id = %tokens.user.id, "로그인 성공");
        Ok(tokens)
    }

    /// Refresh 토큰으로 새 토큰 쌍을 발급합니다. 권한은 다시 해석합니다.
    pub async fn refresh(&self, refresh_token: &str) -> Result<IssuedTokens, IssueError> {
        let claims = self.keys.decode(refresh_token)?;
        if claims.token_type != TokenType::Refresh {
            return Err(IssueError::InvalidToken);
        }
        if self.revocation.is_revoked(&claims.jti).await {
            return Err(IssueError::TokenRevoked);
        }

        let user_id = claims.user_id().ok_or(IssueError::InvalidToken)?;
        let user = self
            .directory
            .find_user(user_id)
            .await?
            .filter(User::is_active)
            .ok_or(IssueError::InvalidToken)?;

        let tokens = self.issue_pair(user).await?;
        info!(user_id = %user_id, "토큰 갱신");
        Ok(tokens)
    }

    /// 현재 비밀번호를 확인하고 새 비밀번호로 바꾼 뒤 사용자의 모든 토큰을 폐기합니다.
    ///
    /// 폐기된 토큰 수를 반환합니다.
    pub async fn change_password(
        &self,
        user_id: Uuid,
        old_password: &str,
        new_password: &str,
    ) -> Result<u64, IssueError> {
        let user = self
            .directory
            .find_user(user_id)
            .await?
            .ok_or(IssueError::InvalidCredentials)?;

        if !verify_password(old_password, &user.password_hash).unwrap_or(false) {
            return Err(IssueError::InvalidCredentials);
        }
        validate_password_strength(new_password)?;

        let hash = hash_password(new_password)?;
        self.directory.update_password(user.id, &hash).await?;

        let revoked = self.revocation.revoke_all(&[user.id.to_string()]).await?;
        info!(user_id = %user.id, revoked, "비밀번호 변경");
        Ok(revoked)
    }

    /// 사용자의 권한을 해석하여 토큰 쌍을 서명하고 기록합니다.
    ///
    /// 두 토큰은 `pair_jti`로 연결되어 하나의 세션으로 취급됩니다.
    pub async fn issue_pair(&self, user: User) -> Result<IssuedTokens, IssueError> {
        let permissions = self.resolver.resolve_user(&user).await?;
        let subject = user.id.to_string();

        let mut access = Claims::new(&subject, TokenType::Access, &permissions, self.access_lifetime);
        let mut refresh =
            Claims::new(&subject, TokenType::Refresh, &permissions, self.refresh_lifetime);
        Claims::link_pair(&mut access, &mut refresh);

        let access_token = self.sign(&access).await?;
        let refresh_token = self.sign(&refresh).await?;

        Ok(IssuedTokens {
            access_token,
            refresh_token,
            access_jti: access.jti,
            refresh_jti: refresh.jti,
            user,
        })
    }

    async fn sign(&self, claims: &Claims) -> Result<String, IssueError> {
        let token = self.keys.encode(claims)?;

        self.revocation
            .record_issued(NewTokenRecord {
                jti: claims.jti.clone(),
                token_type: claims.token_type,
                user_identity: claims.sub.clone(),
                expires: claims.exp,
            })
            .await?;

        Ok(token)
    }
}
