//! 토큰 폐기 저장소.
//!
//! [`TokenStore`] 위에 폐기 판정 규칙을 얹은 얇은 래퍼입니다.
//! 기록이 없는 jti와 저장소 조회 실패는 모두 "폐기됨"으로 판정합니다.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use helpdesk_core::{NewTokenRecord, TokenRecord};

use crate::metrics::{record_tokens_pruned, record_tokens_revoked};
use crate::repository::{StoreResult, TokenStore};

/// 토큰 폐기 저장소.
#[derive(Clone)]
pub struct RevocationStore {
    tokens: Arc<dyn TokenStore>,
}

impl RevocationStore {
    pub fn new(tokens: Arc<dyn TokenStore>) -> Self {
        Self { tokens }
    }

    /// 발급된 토큰을 기록합니다.
    pub async fn record_issued(&self, token: NewTokenRecord) -> StoreResult<TokenRecord> {
        self.tokens.record_issued(token).await
    }

    /// jti가 폐기되었는지 확인합니다.
    pub async fn is_revoked(&self, jti: &str) -> bool {
        match self.tokens.find_by_jti(jti).await {
            Ok(Some(record)) => record.revoked,
            Ok(None) => true,
            Err(e) => {
                warn!(jti = %jti, error = %e, "폐기 여부 조회 실패: 폐기된 것으로 처리");
                true
            }
        }
    }

    /// 토큰 하나를 폐기합니다. 여러 번 호출해도 결과는 같습니다.
    pub async fn revoke(&self, jti: &str) -> StoreResult<()> {
        self.tokens.revoke(jti).await?;
        record_tokens_revoked(1);
        Ok(())
    }

    /// 주어진 사용자들의 모든 토큰을 폐기합니다.
    pub async fn revoke_all(&self, identities: &[String]) -> StoreResult<u64> {
        let count = self.tokens.revoke_all(identities).await?;
        record_tokens_revoked(count);
        info!(users = identities.len(), count, "사용자 토큰 일괄 폐기");
        Ok(count)
    }

    /// 사용자 ID 목록의 토큰을 모두 폐기합니다. 빈 목록이면 저장소를 건드리지 않습니다.
    pub async fn revoke_users(&self, user_ids: &[Uuid]) -> StoreResult<u64> {
        if user_ids.is_empty() {
            return Ok(0);
        }
        let identities: Vec<String> = user_ids.iter().map(Uuid::to_string).collect();
        self.revoke_all(&identities).await
    }

    /// 현재 세션의 토큰(`keep`)을 제외한 사용자의 모든 토큰을 폐기합니다.
    pub async fn revoke_all_except_current(
        &self,
        identity: &str,
        keep: &[String],
    ) -> StoreResult<u64> {
        let count = self.tokens.revoke_all_except(identity, keep).await?;
        record_tokens_revoked(count);
        info!(user = %identity, count, "다른 세션 토큰 폐기");
        Ok(count)
    }

    /// `expires < now`인 행을 삭제합니다.
    pub async fn prune_expired(&self, now: i64) -> StoreResult<u64> {
        let count = self.tokens.prune_expired(now).await?;
        record_tokens_pruned(count);
        Ok(count)
    }

    /// 현재 시각 기준으로 만료 행을 삭제합니다.
    pub async fn prune_expired_now(&self) -> StoreResult<u64> {
        self.prune_expired(Utc::now().timestamp()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{MemoryStore, StoreError};
    use async_trait::async_trait;
    use helpdesk_core::TokenType;
    use proptest::prelude::*;

    /// 모든 호출이 실패하는 저장소.
    struct BrokenStore;

    #[async_trait]
    impl TokenStore for BrokenStore {
        async fn record_issued(&self, _token: NewTokenRecord) -> StoreResult<TokenRecord> {
            Err(StoreError::Unexpected(anyhow::anyhow!("connection refused")))
        }
        async fn find_by_jti(&self, _jti: &str) -> StoreResult<Option<TokenRecord>> {
            Err(StoreError::Unexpected(anyhow::anyhow!("connection refused")))
        }
        async fn revoke(&self, _jti: &str) -> StoreResult<()> {
            Err(StoreError::Unexpected(anyhow::anyhow!("connection refused")))
        }
        async fn revoke_all(&self, _identities: &[String]) -> StoreResult<u64> {
            Err(StoreError::Unexpected(anyhow::anyhow!("connection refused")))
        }
        async fn revoke_all_except(&self, _identity: &str, _keep: &[String]) -> StoreResult<u64> {
            Err(StoreError::Unexpected(anyhow::anyhow!("connection refused")))
        }
        async fn prune_expired(&self, _now: i64) -> StoreResult<u64> {
            Err(StoreError::Unexpected(anyhow::anyhow!("connection refused")))
        }
    }

    fn record(jti: &str, identity: &str, expires: i64) -> NewTokenRecord {
        NewTokenRecord {
            jti: jti.to_string(),
            token_type: TokenType::Access,
            user_identity: identity.to_string(),
            expires,
        }
    }

    fn store() -> RevocationStore {
        RevocationStore::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn test_unknown_jti_is_revoked() {
        assert!(store().is_revoked("never-issued").await);
    }

    #[tokio::test]
    async fn test_store_failure_is_revoked() {
        let broken = RevocationStore::new(Arc::new(BrokenStore));
        assert!(broken.is_revoked("anything").await);
    }

    #[tokio::test]
    async fn test_revoke_users_by_id() {
        let store = store();
        let user = Uuid::new_v4();
        store.record_issued(record("a", &user.to_string(), i64::MAX)).await.unwrap();
        store.record_issued(record("b", "someone-else", i64::MAX)).await.unwrap();

        assert_eq!(store.revoke_users(&[]).await.unwrap(), 0);
        assert_eq!(store.revoke_users(&[user]).await.unwrap(), 1);
        assert!(store.is_revoked("a").await);
        assert!(!store.is_revoked("b").await);

        // 빈 목록은 저장소 장애와 무관하게 성공합니다.
        let broken = RevocationStore::new(Arc::new(BrokenStore));
        assert_eq!(broken.revoke_users(&[]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_revoke_is_idempotent() {
        let store = store();
        store.record_issued(record("a", "u1", i64::MAX)).await.unwrap();
        assert!(!store.is_revoked("a").await);

        store.revoke("a").await.unwrap();
        store.revoke("a").await.unwrap();
        assert!(store.is_revoked("a").await);
    }

    #[tokio::test]
    async fn test_revoked_stays_revoked_after_prune() {
        let store = store();
        store.record_issued(record("a", "u1", 1_000)).await.unwrap();
        store.revoke("a").await.unwrap();

        store.prune_expired(500).await.unwrap();
        assert!(store.is_revoked("a").await);
    }

    proptest! {
        /// 정리 작업은 `expires < now`인 행만 지우고 남은 행의 폐기 상태를 바꾸지 않습니다.
        #[test]
        fn prune_removes_only_expired_rows(
            rows in prop::collection::vec((0i64..200, any::<bool>()), 0..30),
            now in 0i64..200,
        ) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            rt.block_on(async {
                let memory = MemoryStore::new();
                let store = RevocationStore::new(Arc::new(memory.clone()));
                for (i, (expires, revoked)) in rows.iter().enumerate() {
                    let jti = format!("jti-{}", i);
                    store.record_issued(record(&jti, "u1", *expires)).await.unwrap();
                    if *revoked {
                        store.revoke(&jti).await.unwrap();
                    }
                }

                let expected_removed = rows.iter().filter(|(e, _)| *e < now).count() as u64;
                let removed = store.prune_expired(now).await.unwrap();
                assert_eq!(removed, expected_removed);

                for (i, (expires, revoked)) in rows.iter().enumerate() {
                    let jti = format!("jti-{}", i);
                    let row = memory.find_by_jti(&jti).await.unwrap();
                    if *expires < now {
                        assert!(row.is_none());
                    } else {
                        assert_eq!(row.unwrap().revoked, *revoked);
                    }
                }
            });
        }
    }
}
