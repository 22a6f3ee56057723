//! 모든 핸들러에서 공유되는 애플리케이션 상태.
//!
//! AppState는 시작 시 한 번 만들어져 `Arc`로 감싸 라우터에 전달됩니다.

use std::sync::Arc;

use helpdesk_core::AuthConfig;

use crate::auth::{JwtKeys, PermissionResolver, RevocationStore, TokenIssuer};
use crate::repository::{DirectoryStore, TicketStore, TokenStore};
use crate::routes::RouteCatalog;

/// 애플리케이션 공유 상태.
#[derive(Clone)]
pub struct AppState {
    /// 사용자/그룹/역할/권한 저장소
    pub directory: Arc<dyn DirectoryStore>,

    /// 질문/댓글/이력 저장소
    pub tickets: Arc<dyn TicketStore>,

    /// 권한 해석기
    pub resolver: PermissionResolver,

    /// 토큰 폐기 저장소
    pub revocation: RevocationStore,

    /// 토큰 발급기 (서명 키 포함)
    pub issuer: TokenIssuer,

    /// 등록된 모든 라우트의 `(메서드, 경로 템플릿)` 목록
    pub catalog: RouteCatalog,

    /// 데이터베이스 연결 풀. 인메모리 저장소로 실행하면 `None`입니다.
    pub db_pool: Option<sqlx::PgPool>,

    /// 서버 시작 시간 (업타임 계산용)
    pub started_at: chrono::DateTime<chrono::Utc>,

    /// API 버전
    pub version: String,
}

impl AppState {
    /// 새로운 AppState 생성.
    ///
    /// # 인자
    /// * `directory` - 디렉터리 저장소
    /// * `tokens` - 토큰 저장소
    /// * `tickets` - 질문 저장소
    /// * `auth` - 인증 설정 (서명 키, 토큰 수명, 슈퍼 관리자 그룹)
    /// * `catalog` - 라우트 카탈로그
    pub fn new(
        directory: Arc<dyn DirectoryStore>,
        tokens: Arc<dyn TokenStore>,
        tickets: Arc<dyn TicketStore>,
        auth: &AuthConfig,
        catalog: RouteCatalog,
    ) -> Self {
        let resolver = PermissionResolver::new(directory.clone(), auth.super_admin_group.clone());
        let revocation = RevocationStore::new(tokens);
        let keys = JwtKeys::from_secret(&auth.jwt_secret);
        let issuer = TokenIssuer::new(
            directory.clone(),
            resolver.clone(),
            revocation.clone(),
            keys,
            auth,
        );

        Self {
            directory,
            tickets,
            resolver,
            revocation,
            issuer,
            catalog,
            db_pool: None,
            started_at: chrono::Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// 데이터베이스 연결 풀 설정.
    pub fn with_db_pool(mut self, pool: sqlx::PgPool) -> Self {
        self.db_pool = Some(pool);
        self
    }

    pub fn has_db_pool(&self) -> bool {
        self.db_pool.is_some()
    }

    /// 서버 업타임(초) 반환.
    pub fn uptime_secs(&self) -> i64 {
        chrono::Utc::now()
            .signed_duration_since(self.started_at)
            .num_seconds()
    }

    /// 데이터베이스 연결 상태 확인.
    pub async fn is_db_healthy(&self) -> bool {
        if let Some(pool) = &self.db_pool {
            sqlx::query("SELECT 1").fetch_one(pool).await.is_ok()
        } else {
            false
        }
    }
}

/// 테스트용 JWT 시크릿.
#[cfg(any(test, feature = "test-utils"))]
pub const TEST_JWT_SECRET: &str = "helpdesk-test-secret-key-minimum-32-chars";

/// 테스트용 AppState 생성 헬퍼.
///
/// 인메모리 저장소를 쓰므로 실제 DB 연결 없이 테스트할 수 있습니다.
#[cfg(any(test, feature = "test-utils"))]
pub fn create_test_state() -> AppState {
    create_test_state_with_store(crate::repository::MemoryStore::new())
}

/// 주어진 인메모리 저장소로 테스트용 AppState를 만듭니다.
#[cfg(any(test, feature = "test-utils"))]
pub fn create_test_state_with_store(store: crate::repository::MemoryStore) -> AppState {
    let catalog = crate::routes::api_routes().catalog().clone();
    AppState::new(
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        Arc::new(store),
        &AuthConfig::with_secret(TEST_JWT_SECRET),
        catalog,
    )
}
