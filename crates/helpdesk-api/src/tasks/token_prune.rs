//! 만료 토큰 정리기.
//!
//! 폐기 여부와 관계없이 `expires < now`인 토큰 행만 삭제합니다.
//! 아직 만료되지 않은 폐기 토큰은 남겨 두어야 재사용을 막을 수 있습니다.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use helpdesk_core::AuthConfig;

use crate::auth::RevocationStore;
use crate::repository::StoreResult;

/// 토큰 정리기 설정.
#[derive(Debug, Clone)]
pub struct TokenPruneConfig {
    /// 정리 주기 (기본: 1시간)
    pub prune_interval: Duration,
}

impl Default for TokenPruneConfig {
    fn default() -> Self {
        Self {
            prune_interval: Duration::from_secs(60 * 60),
        }
    }
}

impl TokenPruneConfig {
    /// 인증 설정에서 정리 주기를 가져옵니다. 0초는 1초로 올립니다.
    pub fn from_auth(auth: &AuthConfig) -> Self {
        Self {
            prune_interval: Duration::from_secs(auth.prune_interval_secs.max(1)),
        }
    }
}

/// 정리 배치 한 번 실행.
pub async fn run_prune_batch(revocation: &RevocationStore) -> StoreResult<u64> {
    let pruned = revocation.prune_expired_now().await?;
    if pruned > 0 {
        info!(count = pruned, "만료 토큰 정리 완료");
    } else {
        debug!("정리할 만료 토큰 없음");
    }
    Ok(pruned)
}

/// 토큰 정리기 시작.
///
/// 시작 즉시 한 번 실행한 뒤 `prune_interval`마다 반복합니다.
/// `shutdown_token`이 취소되면 루프를 빠져나옵니다.
pub fn start_token_pruner(
    revocation: RevocationStore,
    config: TokenPruneConfig,
    shutdown_token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(
            interval_secs = config.prune_interval.as_secs(),
            "토큰 정리기 시작"
        );

        // 첫 tick은 즉시 발생
        let mut prune_interval = interval(config.prune_interval);

        loop {
            tokio::select! {
                _ = prune_interval.tick() => {
                    if let Err(e) = run_prune_batch(&revocation).await {
                        error!(error = %e, "만료 토큰 정리 실패");
                    }
                }
                _ = shutdown_token.cancelled() => {
                    info!("토큰 정리기: 종료 시그널 수신");
                    break;
                }
            }
        }

        info!("토큰 정리기 종료됨");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::Utc;
    use helpdesk_core::{NewTokenRecord, TokenType};

    use crate::repository::MemoryStore;

    fn record(jti: &str, expires: i64) -> NewTokenRecord {
        NewTokenRecord {
            jti: jti.to_string(),
            token_type: TokenType::Access,
            user_identity: "u-1".to_string(),
            expires,
        }
    }

    #[test]
    fn test_interval_from_auth_config() {
        let mut auth = AuthConfig::default();
        assert_eq!(
            TokenPruneConfig::from_auth(&auth).prune_interval,
            Duration::from_secs(3600)
        );

        auth.prune_interval_secs = 0;
        assert_eq!(
            TokenPruneConfig::from_auth(&auth).prune_interval,
            Duration::from_secs(1)
        );
    }

    #[tokio::test]
    async fn test_batch_keeps_live_revoked_tokens() {
        let store = MemoryStore::new();
        let revocation = RevocationStore::new(Arc::new(store.clone()));
        let now = Utc::now().timestamp();

        revocation.record_issued(record("old", now - 10)).await.unwrap();
        revocation.record_issued(record("live", now + 3600)).await.unwrap();
        revocation.revoke("live").await.unwrap();

        assert_eq!(run_prune_batch(&revocation).await.unwrap(), 1);
        assert_eq!(store.token_count().await, 1);
        assert!(revocation.is_revoked("live").await);
    }

    #[tokio::test]
    async fn test_pruner_runs_and_stops_on_shutdown() {
        let store = MemoryStore::new();
        let revocation = RevocationStore::new(Arc::new(store.clone()));
        revocation
            .record_issued(record("expired", Utc::now().timestamp() - 1))
            .await
            .unwrap();

        let shutdown = CancellationToken::new();
        let handle = start_token_pruner(
            revocation,
            TokenPruneConfig {
                prune_interval: Duration::from_millis(10),
            },
            shutdown.clone(),
        );

        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("pruner did not stop")
            .unwrap();

        assert_eq!(store.token_count().await, 0);
    }
}
