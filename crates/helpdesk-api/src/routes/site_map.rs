//! 사이트맵 endpoint.
//!
//! 서버에 등록된 모든 라우트를 권한 리소스 형식으로 반환합니다.
//! 관리 화면에서 권한을 만들 때 후보 목록으로 씁니다.

use std::sync::Arc;

use axum::{extract::State, Json};
use serde::Serialize;
use utoipa::ToSchema;

use super::catalog::CatalogRouter;
use crate::state::AppState;

pub const SITE_MAP_PATH: &str = "/api/v1/admin/site-map";

#[derive(Debug, Serialize, ToSchema)]
pub struct SiteMapResponse {
    /// `"<method>@<path>"` 목록 (경로, 메서드 순 정렬)
    pub routes: Vec<String>,
    pub total: usize,
}

/// GET /api/v1/admin/site-map
pub async fn site_map(State(state): State<Arc<AppState>>) -> Json<SiteMapResponse> {
    let routes = state.catalog.site_map();
    Json(SiteMapResponse {
        total: routes.len(),
        routes,
    })
}

pub fn site_map_routes() -> CatalogRouter<Arc<AppState>> {
    CatalogRouter::new().get(SITE_MAP_PATH, site_map)
}
