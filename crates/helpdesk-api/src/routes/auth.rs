//! 인증 endpoint.
//!
//! 로그인과 토큰 갱신은 공개 라우트이고, 나머지는 Access 토큰만 확인합니다
//! (라우트 권한 검사는 적용되지 않습니다).

use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use helpdesk_core::User;

use super::catalog::CatalogRouter;
use super::extract::ValidatedJson;
use crate::auth::{bearer_token, AuthError, Claims, JwtAuth};
use crate::error::{not_found, ApiErrorResponse, ApiResult};
use crate::state::AppState;

pub const LOGIN_PATH: &str = "/api/v1/auth/login";
pub const REFRESH_PATH: &str = "/api/v1/auth/token/refresh";
pub const LOGOUT_PATH: &str = "/api/v1/auth/logout";
pub const PASSWORD_PATH: &str = "/api/v1/auth/password";
pub const SESSIONS_PATH: &str = "/api/v1/auth/sessions";
pub const ME_PATH: &str = "/api/v1/auth/me";

// ==================== 요청/응답 타입 ====================

/// 로그인 요청. `username` 대신 `email` 키도 받습니다.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    /// 사용자명 또는 이메일
    #[serde(alias = "email")]
    #[validate(length(min = 1, max = 255, message = "사용자명을 입력해주세요"))]
    pub username: String,
    #[validate(length(min = 1, max = 255, message = "비밀번호를 입력해주세요"))]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub user_id: Uuid,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RefreshResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub user_id: Uuid,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, message = "현재 비밀번호를 입력해주세요"))]
    pub old_password: String,
    #[validate(length(min = 1, max = 255))]
    pub new_password: String,
}

/// 폐기된 토큰 수.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RevokedResponse {
    pub revoked: u64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MeResponse {
    pub user: User,
    /// 현재 토큰에 담긴 권한 목록
    pub permissions: Vec<String>,
}

fn caller_id(claims: &Claims) -> Result<Uuid, AuthError> {
    claims.user_id().ok_or(AuthError::InvalidToken)
}

// ==================== 핸들러 ====================

/// 로그인.
#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "토큰 발급", body = LoginResponse),
        (status = 401, description = "인증 실패", body = ApiErrorResponse),
        (status = 422, description = "입력 검증 실패", body = ApiErrorResponse)
    )
)]
pub async fn login(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let tokens = state
        .issuer
        .login(&request.username, &request.password)
        .await?;

    Ok(Json(LoginResponse {
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
        user_id: tokens.user.id,
        first_name: tokens.user.first_name,
        last_name: tokens.user.last_name,
    }))
}

/// Refresh 토큰으로 새 토큰 쌍 발급.
#[utoipa::path(
    post,
    path = "/api/v1/auth/token/refresh",
    tag = "auth",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "토큰 재발급", body = RefreshResponse),
        (status = 401, description = "유효하지 않거나 폐기된 토큰", body = ApiErrorResponse)
    )
)]
pub async fn refresh(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Json<RefreshResponse>> {
    let token = bearer_token(&headers)?;
    let tokens = state.issuer.refresh(token).await?;

    Ok(Json(RefreshResponse {
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
        user_id: tokens.user.id,
    }))
}

/// 현재 토큰 폐기.
#[utoipa::path(
    delete,
    path = "/api/v1/auth/logout",
    tag = "auth",
    security(("bearer_auth" = [])),
    responses(
        (status = 204, description = "로그아웃"),
        (status = 401, description = "인증 실패", body = ApiErrorResponse)
    )
)]
pub async fn logout(
    State(state): State<Arc<AppState>>,
    JwtAuth(claims): JwtAuth,
) -> ApiResult<StatusCode> {
    state.revocation.revoke(&claims.jti).await?;
    info!(sub = %claims.sub, "로그아웃");
    Ok(StatusCode::NO_CONTENT)
}

/// 비밀번호 변경. 성공하면 현재 세션을 포함한 모든 토큰이 폐기됩니다.
#[utoipa::path(
    put,
    path = "/api/v1/auth/password",
    tag = "auth",
    security(("bearer_auth" = [])),
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "변경 완료", body = RevokedResponse),
        (status = 401, description = "현재 비밀번호 불일치", body = ApiErrorResponse),
        (status = 422, description = "새 비밀번호가 약함", body = ApiErrorResponse)
    )
)]
pub async fn change_password(
    State(state): State<Arc<AppState>>,
    JwtAuth(claims): JwtAuth,
    ValidatedJson(request): ValidatedJson<ChangePasswordRequest>,
) -> ApiResult<Json<RevokedResponse>> {
    let user_id = caller_id(&claims)?;
    let revoked = state
        .issuer
        .change_password(user_id, &request.old_password, &request.new_password)
        .await?;
    Ok(Json(RevokedResponse { revoked }))
}

/// 현재 세션(호출한 Access 토큰과 짝 Refresh 토큰)을 제외한 모든 세션 종료.
#[utoipa::path(
    delete,
    path = "/api/v1/auth/sessions",
    tag = "auth",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "다른 세션 종료", body = RevokedResponse),
        (status = 401, description = "인증 실패", body = ApiErrorResponse)
    )
)]
pub async fn logout_other_sessions(
    State(state): State<Arc<AppState>>,
    JwtAuth(claims): JwtAuth,
) -> ApiResult<Json<RevokedResponse>> {
    let revoked = state
        .revocation
        .revoke_all_except_current(&claims.sub, &claims.session_jtis())
        .await?;
    Ok(Json(RevokedResponse { revoked }))
}

/// 내 정보와 현재 토큰의 권한.
#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    tag = "auth",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "내 정보", body = MeResponse),
        (status = 401, description = "인증 실패", body = ApiErrorResponse)
    )
)]
pub async fn me(
    State(state): State<Arc<AppState>>,
    JwtAuth(claims): JwtAuth,
) -> ApiResult<Json<MeResponse>> {
    let user_id = caller_id(&claims)?;
    let user = state
        .directory
        .find_user(user_id)
        .await?
        .ok_or_else(|| not_found(format!("user {}", user_id)))?;

    Ok(Json(MeResponse {
        user,
        permissions: claims.list_permission,
    }))
}

/// 인증 라우트.
pub fn auth_routes() -> CatalogRouter<Arc<AppState>> {
    CatalogRouter::new()
        .post(LOGIN_PATH, login)
        .post(REFRESH_PATH, refresh)
        .delete(LOGOUT_PATH, logout)
        .put(PASSWORD_PATH, change_password)
        .delete(SESSIONS_PATH, logout_other_sessions)
        .get(ME_PATH, me)
}
