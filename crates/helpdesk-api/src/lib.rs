//! 헬프데스크 REST API 서버.
//!
//! 이 크레이트는 다음을 제공합니다:
//! - Axum 기반 REST API
//! - JWT 발급/갱신/폐기
//! - 라우트 단위 권한 게이트 (사용자 → 그룹 → 역할 → 권한)
//! - 헬프데스크 질문(티켓), 댓글, 처리 이력
//! - 헬스 체크 엔드포인트
//! - Prometheus 메트릭
//!
//! # 모듈 구성
//!
//! - [`state`]: 애플리케이션 공유 상태 (AppState)
//! - [`routes`]: REST API 엔드포인트
//! - [`auth`]: 토큰 발급, 폐기, 권한 해석 및 게이트
//! - [`repository`]: 저장소 트레이트와 PostgreSQL/인메모리 구현
//! - [`metrics`]: Prometheus 메트릭 수집
//! - [`middleware`]: HTTP 미들웨어
//! - [`openapi`]: OpenAPI 문서 및 Swagger UI
//! - [`tasks`]: 백그라운드 작업 (만료 토큰 정리)
//! - [`services`]: 시작 시 초기화 작업

pub mod auth;
pub mod error;
pub mod metrics;
pub mod middleware;
pub mod openapi;
pub mod repository;
pub mod routes;
pub mod services;
pub mod state;
pub mod tasks;

pub use auth::{
    hash_password, verify_password, AuthError, Claims, JwtAuth, PermissionResolver,
    RevocationStore, TokenIssuer,
};
pub use error::{ApiErrorResponse, ApiResult};
pub use metrics::setup_metrics_recorder;
pub use middleware::metrics_layer;
pub use routes::{api_routes, create_api_router};
pub use state::AppState;

#[cfg(any(test, feature = "test-utils"))]
pub use state::{create_test_state, create_test_state_with_store, TEST_JWT_SECRET};
