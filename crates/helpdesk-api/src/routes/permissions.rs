//! 권한 관리 endpoint.
//!
//! 권한 리소스는 `<method>@<path-template>` 형식이어야 하며, 정규화된 문자열로 저장됩니다.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{Method, StatusCode},
    Json,
};
use serde::Deserialize;
use tracing::{info, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use helpdesk_core::{Permission, PermissionResource};

use super::catalog::CatalogRouter;
use super::extract::{not_blank, ValidatedJson};
use crate::error::{api_error, ApiResult};
use crate::repository::{NewPermission, Page, PageRequest};
use crate::state::AppState;

pub const PERMISSIONS_PATH: &str = "/api/v1/admin/permissions";
pub const PERMISSION_PATH: &str = "/api/v1/admin/permissions/{permission_id}";

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreatePermissionRequest {
    #[validate(
        length(min = 1, max = 100, message = "권한 이름은 1-100자여야 합니다"),
        custom(function = "not_blank")
    )]
    pub name: String,
    /// `<method>@<path-template>` (예: `get@/api/v1/admin/users`)
    #[validate(length(min = 3, max = 255))]
    pub resource: String,
}

/// GET /api/v1/admin/permissions
pub async fn list_permissions(
    State(state): State<Arc<AppState>>,
    Query(page): Query<PageRequest>,
) -> ApiResult<Json<Page<Permission>>> {
    Ok(Json(state.directory.list_permissions(&page).await?))
}

/// POST /api/v1/admin/permissions
pub async fn create_permission(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<CreatePermissionRequest>,
) -> ApiResult<(StatusCode, Json<Permission>)> {
    let resource = PermissionResource::parse(&request.resource).map_err(|e| {
        api_error(StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR", e.to_string())
    })?;

    // 카탈로그에 없는 라우트도 저장은 합니다.
    let known_route = resource
        .method()
        .to_uppercase()
        .parse::<Method>()
        .map(|m| state.catalog.contains(&m, resource.path()))
        .unwrap_or(false);
    if !known_route {
        warn!(resource = %resource, "등록되지 않은 라우트에 대한 권한");
    }

    let permission = state
        .directory
        .create_permission(NewPermission {
            name: request.name.trim().to_string(),
            resource: resource.to_string(),
        })
        .await?;
    info!(permission_id = %permission.id, resource = %permission.resource, "권한 생성");
    Ok((StatusCode::CREATED, Json(permission)))
}

/// DELETE /api/v1/admin/permissions/{permission_id}
///
/// 권한을 가졌던 사용자의 토큰을 폐기합니다.
pub async fn delete_permission(
    State(state): State<Arc<AppState>>,
    Path(permission_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let members = state.directory.members_with_permission(permission_id).await?;
    state.directory.delete_permission(permission_id).await?;
    let revoked = state.revocation.revoke_users(&members).await?;
    info!(%permission_id, revoked, "권한 삭제");
    Ok(StatusCode::NO_CONTENT)
}

/// 권한 관리 라우트.
pub fn permission_routes() -> CatalogRouter<Arc<AppState>> {
    CatalogRouter::new()
        .get(PERMISSIONS_PATH, list_permissions)
        .post(PERMISSIONS_PATH, create_permission)
        .delete(PERMISSION_PATH, delete_permission)
}

#[cfg(test)]
mod tests {
    use super::super::testing::{admin_app, member_with, send};
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_deleting_permission_ends_holder_sessions() {
        let t = admin_app().await;
        let holder = member_with(&t, "holder", &["get@/questions"]).await;
        let bystander = member_with(&t, "bystander", &["get@/topics"]).await;

        let uri = format!("{}/{}", PERMISSIONS_PATH, holder.permission_ids[0]);
        let (status, _) = send(&t.app, "DELETE", &uri, Some(&t.token), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        assert!(t.state.revocation.is_revoked(&holder.tokens.access_jti).await);
        assert!(!t.state.revocation.is_revoked(&bystander.tokens.access_jti).await);
    }

    #[tokio::test]
    async fn test_create_permission_normalizes_method() {
        let t = admin_app().await;
        let (status, body) = send(
            &t.app,
            "POST",
            PERMISSIONS_PATH,
            Some(&t.token),
            Some(json!({"name": "사용자 목록", "resource": "GET@/api/v1/admin/users"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["resource"], "get@/api/v1/admin/users");
    }

    #[tokio::test]
    async fn test_create_permission_rejects_bad_format() {
        let t = admin_app().await;
        for resource in ["/questions", "fetch@/questions", "get@questions", "get@/a b"] {
            let (status, body) = send(
                &t.app,
                "POST",
                PERMISSIONS_PATH,
                Some(&t.token),
                Some(json!({"name": "bad", "resource": resource})),
            )
            .await;
            assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{}", resource);
            assert_eq!(body["code"], "VALIDATION_ERROR");
        }
    }

    #[tokio::test]
    async fn test_duplicate_resource_conflicts() {
        let t = admin_app().await;
        let body = json!({"name": "질문 목록", "resource": "get@/questions"});
        send(&t.app, "POST", PERMISSIONS_PATH, Some(&t.token), Some(body.clone())).await;
        let (status, _) = send(&t.app, "POST", PERMISSIONS_PATH, Some(&t.token), Some(body)).await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_delete_permission() {
        let t = admin_app().await;
        let (_, created) = send(
            &t.app,
            "POST",
            PERMISSIONS_PATH,
            Some(&t.token),
            Some(json!({"name": "질문 삭제", "resource": "delete@/questions/{id}"})),
        )
        .await;
        let uri = format!("{}/{}", PERMISSIONS_PATH, created["id"].as_str().unwrap());
        let (status, _) = send(&t.app, "DELETE", &uri, Some(&t.token), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = send(&t.app, "DELETE", &uri, Some(&t.token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
