//! 사용자 관리 endpoint.
//!
//! 그룹 변경, 비활성화, 삭제는 해당 사용자의 모든 토큰을 폐기합니다.

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

use helpdesk_core::{normalize_login, User, UserStatus};

use super::auth::RevokedResponse;
use super::catalog::CatalogRouter;
use super::extract::{double_option, not_blank, ValidatedJson};
use crate::auth::{hash_password, validate_password_strength, JwtAuth};
use crate::error::{api_error, not_found, ApiResult};
use crate::repository::{NewUser, Page, PageRequest, UpdateUser};
use crate::state::AppState;

pub const USERS_PATH: &str = "/api/v1/admin/users";
pub const USER_PATH: &str = "/api/v1/admin/users/{user_id}";
pub const USER_TOKENS_PATH: &str = "/api/v1/admin/users/{user_id}/tokens";

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateUserRequest {
    #[validate(length(min = 3, max = 50, message = "사용자명은 3-50자여야 합니다"))]
    pub username: String,
    #[validate(email(message = "이메일 형식이 올바르지 않습니다"))]
    pub email: String,
    #[validate(length(min = 1, max = 255))]
    pub password: String,
    #[validate(
        length(min = 1, max = 100, message = "이름은 1-100자여야 합니다"),
        custom(function = "not_blank")
    )]
    pub first_name: String,
    #[validate(
        length(min = 1, max = 100, message = "성은 1-100자여야 합니다"),
        custom(function = "not_blank")
    )]
    pub last_name: String,
    #[serde(default)]
    pub group_id: Option<Uuid>,
    #[serde(default)]
    pub status: Option<UserStatus>,
}

/// 수정 가능한 필드만 받습니다. `id`, `username`, `creator_id`는 바꿀 수 없습니다.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateUserRequest {
    #[validate(email(message = "이메일 형식이 올바르지 않습니다"))]
    pub email: Option<String>,
    #[validate(length(min = 1, max = 100), custom(function = "not_blank"))]
    pub first_name: Option<String>,
    #[validate(length(min = 1, max = 100), custom(function = "not_blank"))]
    pub last_name: Option<String>,
    /// 키를 생략하면 유지, `null`이면 그룹 해제
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<Uuid>, nullable)]
    pub group_id: Option<Option<Uuid>>,
    pub status: Option<UserStatus>,
}

/// GET /api/v1/admin/users
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    Query(page): Query<PageRequest>,
) -> ApiResult<Json<Page<User>>> {
    Ok(Json(state.directory.list_users(&page).await?))
}

/// POST /api/v1/admin/users
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    JwtAuth(claims): JwtAuth,
    ValidatedJson(request): ValidatedJson<CreateUserRequest>,
) -> ApiResult<(StatusCode, Json<User>)> {
    validate_password_strength(&request.password).map_err(|e| {
        api_error(StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR", e.to_string())
    })?;
    let password_hash = hash_password(&request.password).map_err(|e| {
        api_error(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", e.to_string())
    })?;

    let user = state
        .directory
        .create_user(NewUser {
            username: normalize_login(&request.username),
            email: normalize_login(&request.email),
            password_hash,
            first_name: request.first_name.trim().to_string(),
            last_name: request.last_name.trim().to_string(),
            group_id: request.group_id,
            status: request.status.unwrap_or(UserStatus::Active),
        })
        .await?;

    info!(user_id = %user.id, by = %claims.sub, "사용자 생성");
    Ok((StatusCode::CREATED, Json(user)))
}

/// GET /api/v1/admin/users/{user_id}
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<User>> {
    state
        .directory
        .find_user(user_id)
        .await?
        .map(Json)
        .ok_or_else(|| not_found(format!("user {}", user_id)))
}

/// PUT /api/v1/admin/users/{user_id}
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    JwtAuth(claims): JwtAuth,
    Path(user_id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<UpdateUserRequest>,
) -> ApiResult<Json<User>> {
    let before = state
        .directory
        .find_user(user_id)
        .await?
        .ok_or_else(|| not_found(format!("user {}", user_id)))?;

    let user = state
        .directory
        .update_user(
            user_id,
            UpdateUser {
                email: request.email.as_deref().map(normalize_login),
                first_name: request.first_name.map(|s| s.trim().to_string()),
                last_name: request.last_name.map(|s| s.trim().to_string()),
                group_id: request.group_id,
                status: request.status,
            },
        )
        .await?;

    let group_changed = before.group_id != user.group_id;
    let deactivated = before.is_active() && !user.is_active();
    if group_changed || deactivated {
        let revoked = state.revocation.revoke_all(&[user.id.to_string()]).await?;
        info!(user_id = %user.id, revoked, group_changed, deactivated, "권한 변경으로 토큰 폐기");
    }

    info!(user_id = %user.id, by = %claims.sub, "사용자 수정");
    Ok(Json(user))
}

/// DELETE /api/v1/admin/users/{user_id}
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    JwtAuth(claims): JwtAuth,
    Path(user_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.directory.delete_user(user_id).await?;
    let revoked = state.revocation.revoke_all(&[user_id.to_string()]).await?;
    info!(%user_id, revoked, by = %claims.sub, "사용자 삭제");
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/v1/admin/users/{user_id}/tokens
///
/// 사용자의 모든 세션을 강제 종료합니다.
pub async fn revoke_user_tokens(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<RevokedResponse>> {
    if state.directory.find_user(user_id).await?.is_none() {
        return Err(not_found(format!("user {}", user_id)));
    }
    let revoked = state.revocation.revoke_all(&[user_id.to_string()]).await?;
    Ok(Json(RevokedResponse { revoked }))
}

/// 사용자 관리 라우트.
pub fn user_routes() -> CatalogRouter<Arc<AppState>> {
    CatalogRouter::new()
        .get(USERS_PATH, list_users)
        .post(USERS_PATH, create_user)
        .get(USER_PATH, get_user)
        .put(USER_PATH, update_user)
        .delete(USER_PATH, delete_user)
        .delete(USER_TOKENS_PATH, revoke_user_tokens)
}
