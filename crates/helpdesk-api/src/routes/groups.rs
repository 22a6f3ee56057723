//! 그룹 관리 endpoint.

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

use helpdesk_core::{Group, GroupRole, Role};

use super::catalog::CatalogRouter;
use super::extract::{not_blank, ValidatedJson};
use crate::auth::{Claims, JwtAuth};
use crate::error::{api_error, not_found, ApiError, ApiResult};
use crate::repository::{NewGroup, Page, PageRequest, UpdateGroup};
use crate::state::AppState;

pub const GROUPS_PATH: &str = "/api/v1/admin/groups";
pub const GROUP_PATH: &str = "/api/v1/admin/groups/{group_id}";
pub const GROUP_ROLES_PATH: &str = "/api/v1/admin/groups/{group_id}/roles";
pub const GROUP_ROLE_PATH: &str = "/api/v1/admin/groups/{group_id}/roles/{role_id}";

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateGroupRequest {
    #[validate(
        length(min = 1, max = 100, message = "그룹 이름은 1-100자여야 합니다"),
        custom(function = "not_blank")
    )]
    pub name: String,
    #[validate(length(max = 500))]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateGroupRequest {
    #[validate(
        length(min = 1, max = 100, message = "그룹 이름은 1-100자여야 합니다"),
        custom(function = "not_blank")
    )]
    pub name: Option<String>,
    #[validate(length(max = 500))]
    pub description: Option<String>,
}

pub(crate) fn creator_of(claims: &Claims) -> Option<Uuid> {
    claims.user_id()
}

fn super_admin_locked(name: &str) -> ApiError {
    api_error(
        StatusCode::CONFLICT,
        "CONFLICT",
        format!("슈퍼 관리자 그룹은 이름을 바꾸거나 삭제할 수 없습니다: {}", name),
    )
}

async fn existing_group(state: &AppState, group_id: Uuid) -> ApiResult<Group> {
    state
        .directory
        .find_group(group_id)
        .await?
        .ok_or_else(|| not_found(format!("group {}", group_id)))
}

/// GET /api/v1/admin/groups
pub async fn list_groups(
    State(state): State<Arc<AppState>>,
    Query(page): Query<PageRequest>,
) -> ApiResult<Json<Page<Group>>> {
    Ok(Json(state.directory.list_groups(&page).await?))
}

/// POST /api/v1/admin/groups
pub async fn create_group(
    State(state): State<Arc<AppState>>,
    JwtAuth(claims): JwtAuth,
    ValidatedJson(request): ValidatedJson<CreateGroupRequest>,
) -> ApiResult<(StatusCode, Json<Group>)> {
    let group = state
        .directory
        .create_group(NewGroup {
            name: request.name.trim().to_string(),
            description: request.description,
            creator_id: creator_of(&claims),
        })
        .await?;
    info!(group_id = %group.id, name = %group.name, "그룹 생성");
    Ok((StatusCode::CREATED, Json(group)))
}

/// PUT /api/v1/admin/groups/{group_id}
///
/// 슈퍼 관리자 그룹의 이름을 바꾸거나 다른 그룹에 그 이름을 주면 409를 반환합니다.
pub async fn update_group(
    State(state): State<Arc<AppState>>,
    Path(group_id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<UpdateGroupRequest>,
) -> ApiResult<Json<Group>> {
    let name = request.name.map(|n| n.trim().to_string());
    if let Some(name) = &name {
        let current = existing_group(&state, group_id).await?;
        let super_admin = state.resolver.super_admin_group();
        if (current.name == super_admin) != (name == super_admin) {
            return Err(super_admin_locked(super_admin));
        }
    }

    let group = state
        .directory
        .update_group(
            group_id,
            UpdateGroup {
                name,
                description: request.description,
            },
        )
        .await?;
    Ok(Json(group))
}

/// DELETE /api/v1/admin/groups/{group_id}
///
/// 소속 사용자가 남아 있거나 슈퍼 관리자 그룹이면 409를 반환합니다.
pub async fn delete_group(
    State(state): State<Arc<AppState>>,
    Path(group_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let current = existing_group(&state, group_id).await?;
    if current.name == state.resolver.super_admin_group() {
        return Err(super_admin_locked(&current.name));
    }
    state.directory.delete_group(group_id).await?;
    info!(%group_id, "그룹 삭제");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/admin/groups/{group_id}/roles
pub async fn list_group_roles(
    State(state): State<Arc<AppState>>,
    Path(group_id): Path<Uuid>,
) -> ApiResult<Json<Vec<Role>>> {
    if state.directory.find_group(group_id).await?.is_none() {
        return Err(not_found(format!("group {}", group_id)));
    }
    Ok(Json(state.directory.roles_of_group(group_id).await?))
}

/// PUT /api/v1/admin/groups/{group_id}/roles/{role_id}
pub async fn assign_role(
    State(state): State<Arc<AppState>>,
    JwtAuth(claims): JwtAuth,
    Path((group_id, role_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<(StatusCode, Json<GroupRole>)> {
    let link = state
        .directory
        .assign_role(group_id, role_id, creator_of(&claims))
        .await?;
    info!(%group_id, %role_id, "그룹에 역할 부여");
    Ok((StatusCode::CREATED, Json(link)))
}

/// DELETE /api/v1/admin/groups/{group_id}/roles/{role_id}
///
/// 그룹 소속 사용자의 토큰을 폐기합니다.
pub async fn unassign_role(
    State(state): State<Arc<AppState>>,
    Path((group_id, role_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    let members = state.directory.members_of_group(group_id).await?;
    state.directory.unassign_role(group_id, role_id).await?;
    let revoked = state.revocation.revoke_users(&members).await?;
    info!(%group_id, %role_id, revoked, "그룹 역할 해제");
    Ok(StatusCode::NO_CONTENT)
}

/// 그룹 관리 라우트.
pub fn group_routes() -> CatalogRouter<Arc<AppState>> {
    CatalogRouter::new()
        .get(GROUPS_PATH, list_groups)
        .post(GROUPS_PATH, create_group)
        .put(GROUP_PATH, update_group)
        .delete(GROUP_PATH, delete_group)
        .get(GROUP_ROLES_PATH, list_group_roles)
        .put(GROUP_ROLE_PATH, assign_role)
        .delete(GROUP_ROLE_PATH, unassign_role)
}

#[cfg(test)]
mod tests {
    use super::super::testing::{admin_app, member_with, send};
    use super::*;
    use crate::repository::{DirectoryStore, NewRole};
    use serde_json::json;

    #[tokio::test]
    async fn test_create_group_records_creator() {
        let t = admin_app().await;
        let (status, body) = send(
            &t.app,
            "POST",
            GROUPS_PATH,
            Some(&t.token),
            Some(json!({"name": "support", "description": "1차 지원"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["name"], "support");
        assert_eq!(body["creator_id"], t.admin_id.to_string());
    }

    #[tokio::test]
    async fn test_creator_id_in_body_is_ignored() {
        let t = admin_app().await;
        let (_, body) = send(
            &t.app,
            "POST",
            GROUPS_PATH,
            Some(&t.token),
            Some(json!({"name": "billing", "creator_id": Uuid::new_v4()})),
        )
        .await;
        assert_eq!(body["creator_id"], t.admin_id.to_string());
    }

    #[tokio::test]
    async fn test_delete_group_with_members_conflicts() {
        let t = admin_app().await;
        let member = member_with(&t, "mgr", &[]).await;
        let uri = format!("{}/{}", GROUPS_PATH, member.group_id);
        let (status, body) = send(&t.app, "DELETE", &uri, Some(&t.token), None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "CONFLICT");
    }

    #[tokio::test]
    async fn test_group_editor_cannot_take_over_super_admin_name() {
        let t = admin_app().await;
        let editor = format!("put@{}", GROUP_PATH);
        let mgr = member_with(&t, "mgr", &[editor.as_str()]).await;
        let tokens = &mgr.tokens;

        let admin_uri = format!("{}/{}", GROUPS_PATH, t.admin_group_id);
        let (status, body) = send(
            &t.app,
            "PUT",
            &admin_uri,
            Some(&tokens.access_token),
            Some(json!({"name": "retired"})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "CONFLICT");

        let managers_uri = format!("{}/{}", GROUPS_PATH, mgr.group_id);
        let (status, _) = send(
            &t.app,
            "PUT",
            &managers_uri,
            Some(&tokens.access_token),
            Some(json!({"name": " admin "})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let admin_group = t.store.find_group(t.admin_group_id).await.unwrap().unwrap();
        assert_eq!(admin_group.name, "admin");

        let refreshed = t.state.issuer.refresh(&tokens.refresh_token).await.unwrap();
        let claims = t.state.issuer.keys().decode(&refreshed.access_token).unwrap();
        assert_eq!(claims.list_permission, vec![editor]);
    }

    #[tokio::test]
    async fn test_super_admin_group_keeps_name_on_description_update() {
        let t = admin_app().await;
        let uri = format!("{}/{}", GROUPS_PATH, t.admin_group_id);
        let (status, body) = send(
            &t.app,
            "PUT",
            &uri,
            Some(&t.token),
            Some(json!({"name": "admin", "description": "운영자"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["description"], "운영자");
    }

    #[tokio::test]
    async fn test_super_admin_group_cannot_be_deleted_even_when_empty() {
        let t = admin_app().await;
        // 토큰은 그대로 두고 소속 사용자만 제거합니다.
        t.store.delete_user(t.admin_id).await.unwrap();

        let uri = format!("{}/{}", GROUPS_PATH, t.admin_group_id);
        let (status, body) = send(&t.app, "DELETE", &uri, Some(&t.token), None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "CONFLICT");
        assert!(t.store.find_group(t.admin_group_id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_update_unknown_group_is_not_found() {
        let t = admin_app().await;
        let uri = format!("{}/{}", GROUPS_PATH, Uuid::new_v4());
        let (status, _) = send(&t.app, "PUT", &uri, Some(&t.token), Some(json!({"name": "x"}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_assign_and_list_roles() {
        let t = admin_app().await;
        let support = t
            .store
            .create_group(NewGroup {
                name: "support".to_string(),
                description: None,
                creator_id: None,
            })
            .await
            .unwrap();
        let role = t
            .store
            .create_role(NewRole {
                key: "agent".to_string(),
                name: "Agent".to_string(),
                description: None,
                creator_id: None,
            })
            .await
            .unwrap();

        let uri = format!("{}/{}/roles/{}", GROUPS_PATH, support.id, role.id);
        let (status, link) = send(&t.app, "PUT", &uri, Some(&t.token), None).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(link["role_id"], role.id.to_string());

        let (status, _) = send(&t.app, "PUT", &uri, Some(&t.token), None).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let list_uri = format!("{}/{}/roles", GROUPS_PATH, support.id);
        let (_, roles) = send(&t.app, "GET", &list_uri, Some(&t.token), None).await;
        assert_eq!(roles.as_array().unwrap().len(), 1);

        let (status, _) = send(&t.app, "DELETE", &uri, Some(&t.token), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (_, roles) = send(&t.app, "GET", &list_uri, Some(&t.token), None).await;
        assert!(roles.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_roles_of_unknown_group() {
        let t = admin_app().await;
        let uri = format!("{}/{}/roles", GROUPS_PATH, Uuid::new_v4());
        let (status, _) = send(&t.app, "GET", &uri, Some(&t.token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_unassigning_role_ends_member_sessions() {
        let t = admin_app().await;
        let agent = member_with(&t, "agent", &["get@/questions"]).await;
        let other = member_with(&t, "other", &["get@/topics"]).await;
        assert_eq!(
            t.store.members_of_group(agent.group_id).await.unwrap(),
            vec![agent.user_id]
        );

        let uri = format!("{}/{}/roles/{}", GROUPS_PATH, agent.group_id, agent.role_id);
        let (status, _) = send(&t.app, "DELETE", &uri, Some(&t.token), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        assert!(t.state.revocation.is_revoked(&agent.tokens.access_jti).await);
        assert!(t.state.revocation.is_revoked(&agent.tokens.refresh_jti).await);
        assert!(!t.state.revocation.is_revoked(&other.tokens.access_jti).await);
    }
}
