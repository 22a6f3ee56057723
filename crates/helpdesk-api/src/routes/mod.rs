//! API 라우트.
//!
//! 모든 REST API 엔드포인트를 정의하고 라우터를 구성합니다.
//!
//! # 라우트 구조
//!
//! - `/health`, `/health/ready` - 헬스 체크
//! - `/api/v1/auth/*` - 로그인, 토큰 갱신, 로그아웃, 비밀번호 변경
//! - `/api/v1/admin/users` - 사용자 관리
//! - `/api/v1/admin/groups` - 그룹 및 그룹-역할 관리
//! - `/api/v1/admin/roles` - 역할 및 역할-권한 관리
//! - `/api/v1/admin/permissions` - 권한 관리
//! - `/api/v1/admin/questions` - 질문, 댓글, 처리 이력
//! - `/api/v1/admin/site-map` - 등록된 라우트 목록
//!
//! `/api/v1/admin` 아래의 모든 라우트는 권한 게이트([`crate::auth::authorize`])를 거칩니다.

pub mod auth;
pub mod catalog;
pub mod extract;
pub mod groups;
pub mod health;
pub mod permissions;
pub mod questions;
pub mod roles;
pub mod site_map;
pub mod users;

pub use auth::{auth_routes, LoginRequest, LoginResponse, MeResponse, RefreshResponse, RevokedResponse};
pub use catalog::{CatalogRouter, RouteCatalog};
pub use extract::ValidatedJson;
pub use groups::group_routes;
pub use health::{health_routes, ComponentHealth, ComponentStatus, HealthResponse};
pub use permissions::permission_routes;
pub use questions::question_routes;
pub use roles::role_routes;
pub use site_map::{site_map_routes, SiteMapResponse};
pub use users::user_routes;

use std::sync::Arc;

use axum::{middleware, Router};

use crate::auth::authorize;
use crate::state::AppState;

/// 공개 라우트와 게이트 보호 라우트 묶음.
pub struct ApiRoutes {
    public: CatalogRouter<Arc<AppState>>,
    admin: CatalogRouter<Arc<AppState>>,
    catalog: RouteCatalog,
}

/// 전체 API 라우트 정의.
pub fn api_routes() -> ApiRoutes {
    let public = health_routes().merge(auth_routes());
    let admin = user_routes()
        .merge(group_routes())
        .merge(role_routes())
        .merge(permission_routes())
        .merge(question_routes())
        .merge(site_map_routes());

    let mut catalog = public.catalog().clone();
    catalog.extend(admin.catalog());

    ApiRoutes {
        public,
        admin,
        catalog,
    }
}

impl ApiRoutes {
    /// 등록된 모든 라우트.
    pub fn catalog(&self) -> &RouteCatalog {
        &self.catalog
    }

    /// 관리 라우트에 권한 게이트를 붙이고 상태를 주입한 라우터를 만듭니다.
    pub fn into_router(self, state: Arc<AppState>) -> Router {
        let (public, _) = self.public.into_parts();
        let (admin, _) = self.admin.into_parts();

        // route_layer: 매칭된 라우트에만 적용되어 MatchedPath를 읽을 수 있습니다.
        let admin = admin.route_layer(middleware::from_fn_with_state(state.clone(), authorize));

        public.merge(admin).with_state(state)
    }
}

/// 전체 API 라우터 생성.
pub fn create_api_router(state: Arc<AppState>) -> Router {
    api_routes().into_router(state)
}
