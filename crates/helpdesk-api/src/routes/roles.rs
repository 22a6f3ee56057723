//! 역할 관리 endpoint.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use helpdesk_core::{Permission, Role, RolePermission};

use super::catalog::CatalogRouter;
use super::extract::{not_blank, ValidatedJson};
use super::groups::creator_of;
use crate::auth::JwtAuth;
use crate::error::ApiResult;
use crate::repository::{NewRole, Page, PageRequest, UpdateRole};
use crate::state::AppState;

pub const ROLES_PATH: &str = "/api/v1/admin/roles";
pub const ROLE_PATH: &str = "/api/v1/admin/roles/{role_id}";
pub const ROLE_PERMISSIONS_PATH: &str = "/api/v1/admin/roles/{role_id}/permissions";
pub const ROLE_PERMISSION_PATH: &str = "/api/v1/admin/roles/{role_id}/permissions/{permission_id}";

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateRoleRequest {
    /// 역할 키 (예: `agent`)
    #[validate(
        length(min = 1, max = 50, message = "역할 키는 1-50자여야 합니다"),
        custom(function = "not_blank")
    )]
    pub key: String,
    #[validate(
        length(min = 1, max = 100, message = "역할 이름은 1-100자여야 합니다"),
        custom(function = "not_blank")
    )]
    pub name: String,
    #[validate(length(max = 500))]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateRoleRequest {
    #[validate(length(min = 1, max = 50), custom(function = "not_blank"))]
    pub key: Option<String>,
    #[validate(length(min = 1, max = 100), custom(function = "not_blank"))]
    pub name: Option<String>,
    #[validate(length(max = 500))]
    pub description: Option<String>,
}

/// GET /api/v1/admin/roles
pub async fn list_roles(
    State(state): State<Arc<AppState>>,
    Query(page): Query<PageRequest>,
) -> ApiResult<Json<Page<Role>>> {
    Ok(Json(state.directory.list_roles(&page).await?))
}

/// POST /api/v1/admin/roles
pub async fn create_role(
    State(state): State<Arc<AppState>>,
    JwtAuth(claims): JwtAuth,
    ValidatedJson(request): ValidatedJson<CreateRoleRequest>,
) -> ApiResult<(StatusCode, Json<Role>)> {
    let role = state
        .directory
        .create_role(NewRole {
            key: request.key.trim().to_lowercase(),
            name: request.name.trim().to_string(),
            description: request.description,
            creator_id: creator_of(&claims),
        })
        .await?;
    info!(role_id = %role.id, key = %role.key, "역할 생성");
    Ok((StatusCode::CREATED, Json(role)))
}

/// PUT /api/v1/admin/roles/{role_id}
pub async fn update_role(
    State(state): State<Arc<AppState>>,
    Path(role_id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<UpdateRoleRequest>,
) -> ApiResult<Json<Role>> {
    let role = state
        .directory
        .update_role(
            role_id,
            UpdateRole {
                key: request.key.map(|k| k.trim().to_lowercase()),
                name: request.name.map(|n| n.trim().to_string()),
                description: request.description,
            },
        )
        .await?;
    Ok(Json(role))
}

/// DELETE /api/v1/admin/roles/{role_id}
///
/// 역할을 통해 권한을 받던 사용자의 토큰을 폐기합니다.
pub async fn delete_role(
    State(state): State<Arc<AppState>>,
    Path(role_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let members = state.directory.members_with_role(role_id).await?;
    state.directory.delete_role(role_id).await?;
    let revoked = state.revocation.revoke_users(&members).await?;
    info!(%role_id, revoked, "역할 삭제");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/admin/roles/{role_id}/permissions
pub async fn list_role_permissions(
    State(state): State<Arc<AppState>>,
    Path(role_id): Path<Uuid>,
) -> ApiResult<Json<Vec<Permission>>> {
    Ok(Json(state.directory.permissions_of_role(role_id).await?))
}

/// PUT /api/v1/admin/roles/{role_id}/permissions/{permission_id}
pub async fn grant_permission(
    State(state): State<Arc<AppState>>,
    JwtAuth(claims): JwtAuth,
    Path((role_id, permission_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<(StatusCode, Json<RolePermission>)> {
    let link = state
        .directory
        .grant_permission(role_id, permission_id, creator_of(&claims))
        .await?;
    info!(%role_id, %permission_id, "역할에 권한 부여");
    Ok((StatusCode::CREATED, Json(link)))
}

/// DELETE /api/v1/admin/roles/{role_id}/permissions/{permission_id}
///
/// 역할을 가진 사용자의 토큰을 폐기합니다.
pub async fn revoke_permission(
    State(state): State<Arc<AppState>>,
    Path((role_id, permission_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    let members = state.directory.members_with_role(role_id).await?;
    state
        .directory
        .revoke_permission(role_id, permission_id)
        .await?;
    let revoked = state.revocation.revoke_users(&members).await?;
    info!(%role_id, %permission_id, revoked, "역할 권한 회수");
    Ok(StatusCode::NO_CONTENT)
}

/// 역할 관리 라우트.
pub fn role_routes() -> CatalogRouter<Arc<AppState>> {
    CatalogRouter::new()
        .get(ROLES_PATH, list_roles)
        .post(ROLES_PATH, create_role)
        .put(ROLE_PATH, update_role)
        .delete(ROLE_PATH, delete_role)
        .get(ROLE_PERMISSIONS_PATH, list_role_permissions)
        .put(ROLE_PERMISSION_PATH, grant_permission)
        .delete(ROLE_PERMISSION_PATH, revoke_permission)
}

#[cfg(test)]
mod tests {
    use super::super::testing::{admin_app, member_with, send, MEMBER_PASSWORD};
    use super::*;
    use crate::repository::{DirectoryStore, NewPermission};
    use serde_json::json;

    #[tokio::test]
    async fn test_revoking_role_permission_ends_member_sessions() {
        let t = admin_app().await;
        let agent = member_with(&t, "agent1", &["get@/questions", "post@/questions"]).await;
        let access = agent.tokens.access_token.as_str();
        let (status, _) = send(&t.app, "GET", "/api/v1/auth/me", Some(access), None).await;
        assert_eq!(status, StatusCode::OK);

        let uri = format!(
            "{}/{}/permissions/{}",
            ROLES_PATH, agent.role_id, agent.permission_ids[1]
        );
        let (status, _) = send(&t.app, "DELETE", &uri, Some(&t.token), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, body) = send(&t.app, "GET", "/api/v1/auth/me", Some(access), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "TOKEN_REVOKED");

        // 다시 로그인하면 남은 권한만 받습니다.
        let fresh = t.state.issuer.login("agent1", MEMBER_PASSWORD).await.unwrap();
        let claims = t.state.issuer.keys().decode(&fresh.access_token).unwrap();
        assert_eq!(claims.list_permission, vec!["get@/questions"]);

        // 관리자 세션은 영향을 받지 않습니다.
        let (status, _) = send(&t.app, "GET", ROLES_PATH, Some(&t.token), None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_deleting_role_ends_member_sessions() {
        let t = admin_app().await;
        let agent = member_with(&t, "agent2", &["get@/questions"]).await;

        let uri = format!("{}/{}", ROLES_PATH, agent.role_id);
        let (status, _) = send(&t.app, "DELETE", &uri, Some(&t.token), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        assert!(t.state.revocation.is_revoked(&agent.tokens.access_jti).await);
        assert!(t.state.revocation.is_revoked(&agent.tokens.refresh_jti).await);
    }

    #[tokio::test]
    async fn test_create_role_and_grant_permission() {
        let t = admin_app().await;
        let (status, role) = send(
            &t.app,
            "POST",
            ROLES_PATH,
            Some(&t.token),
            Some(json!({"key": " Agent ", "name": "Support agent"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(role["key"], "agent");

        let permission = t
            .store
            .create_permission(NewPermission {
                name: "질문 목록".to_string(),
                resource: "get@/questions".to_string(),
            })
            .await
            .unwrap();

        let role_id = role["id"].as_str().unwrap();
        let uri = format!("{}/{}/permissions/{}", ROLES_PATH, role_id, permission.id);
        let (status, _) = send(&t.app, "PUT", &uri, Some(&t.token), None).await;
        assert_eq!(status, StatusCode::CREATED);

        let list_uri = format!("{}/{}/permissions", ROLES_PATH, role_id);
        let (_, permissions) = send(&t.app, "GET", &list_uri, Some(&t.token), None).await;
        assert_eq!(permissions[0]["resource"], "get@/questions");
    }

    #[tokio::test]
    async fn test_duplicate_role_key_conflicts() {
        let t = admin_app().await;
        let body = json!({"key": "agent", "name": "Agent"});
        send(&t.app, "POST", ROLES_PATH, Some(&t.token), Some(body.clone())).await;
        let (status, _) = send(&t.app, "POST", ROLES_PATH, Some(&t.token), Some(body)).await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_grant_unknown_permission_is_not_found() {
        let t = admin_app().await;
        let (_, role) = send(
            &t.app,
            "POST",
            ROLES_PATH,
            Some(&t.token),
            Some(json!({"key": "reviewer", "name": "Reviewer"})),
        )
        .await;
        let uri = format!(
            "{}/{}/permissions/{}",
            ROLES_PATH,
            role["id"].as_str().unwrap(),
            Uuid::new_v4()
        );
        let (status, _) = send(&t.app, "PUT", &uri, Some(&t.token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
