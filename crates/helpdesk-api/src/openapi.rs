//! OpenAPI 문서화 설정.
//!
//! utoipa를 사용하여 REST API의 OpenAPI 3.0 스펙을 생성합니다.
//! Swagger UI는 `/swagger-ui` 경로에서 사용 가능합니다.
//!
//! 새로운 엔드포인트를 추가할 때:
//!
//! 1. 응답/요청 타입에 `#[derive(ToSchema)]` 추가
//! 2. 핸들러에 `#[utoipa::path(...)]` 어노테이션 추가
//! 3. 이 파일의 `components(schemas(...))` 및 `paths(...)` 섹션에 추가

use axum::Router;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use helpdesk_core::{
    Comment, Group, GroupRole, HistoryKind, Permission, Question, QuestionHistory, QuestionStatus,
    Role, RolePermission, User, UserStatus,
};

use crate::error::ApiErrorResponse;
use crate::routes::{
    groups::{CreateGroupRequest, UpdateGroupRequest},
    permissions::CreatePermissionRequest,
    questions::{
        AssignQuestionRequest, CreateCommentRequest, CreateQuestionRequest, QuestionStatusRequest,
        UpdateQuestionRequest,
    },
    roles::{CreateRoleRequest, UpdateRoleRequest},
    users::{CreateUserRequest, UpdateUserRequest},
    ComponentHealth, ComponentStatus, HealthResponse, LoginRequest, LoginResponse, MeResponse,
    RefreshResponse, RevokedResponse, SiteMapResponse,
};
use crate::routes::auth::ChangePasswordRequest;

/// `Authorization: Bearer <token>` 보안 스키마 등록.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Helpdesk API 문서.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Helpdesk API",
        description = r#"
# Helpdesk RBAC REST API

사용자 → 그룹 → 역할 → 권한 그래프 기반의 접근 제어를 제공합니다.

## 인증

`POST /api/v1/auth/login`으로 받은 Access 토큰을
`Authorization: Bearer <token>` 헤더에 포함하세요.

## 권한

`/api/v1/admin/*` 라우트는 토큰의 `list_permission`에
`"<method>@<route-template>"` 항목이 있어야 호출할 수 있습니다.
"#
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "health", description = "헬스 체크 - 서버 상태 확인"),
        (name = "auth", description = "인증 - 로그인, 토큰 갱신, 로그아웃")
    ),
    components(
        schemas(
            // ===== Health =====
            HealthResponse,
            ComponentHealth,
            ComponentStatus,

            // ===== Common =====
            ApiErrorResponse,

            // ===== Auth =====
            LoginRequest,
            LoginResponse,
            RefreshResponse,
            ChangePasswordRequest,
            RevokedResponse,
            MeResponse,

            // ===== Directory =====
            User,
            UserStatus,
            Group,
            GroupRole,
            Role,
            RolePermission,
            Permission,
            CreateUserRequest,
            UpdateUserRequest,
            CreateGroupRequest,
            UpdateGroupRequest,
            CreateRoleRequest,
            UpdateRoleRequest,
            CreatePermissionRequest,
            SiteMapResponse,

            // ===== Questions =====
            Question,
            QuestionStatus,
            Comment,
            QuestionHistory,
            HistoryKind,
            CreateQuestionRequest,
            UpdateQuestionRequest,
            AssignQuestionRequest,
            QuestionStatusRequest,
            CreateCommentRequest,
        )
    ),
    paths(
        // ===== Health =====
        crate::routes::health::health_check,
        crate::routes::health::health_ready,

        // ===== Auth =====
        crate::routes::auth::login,
        crate::routes::auth::refresh,
        crate::routes::auth::logout,
        crate::routes::auth::change_password,
        crate::routes::auth::logout_other_sessions,
        crate::routes::auth::me,
    )
)]
pub struct ApiDoc;

/// Swagger UI 라우터 생성.
///
/// - `/swagger-ui` - Swagger UI 대화형 문서
/// - `/api-docs/openapi.json` - OpenAPI JSON 스펙
pub fn swagger_ui_router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDoc::openapi())
        .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_spec_valid() {
        let json = serde_json::to_string_pretty(&ApiDoc::openapi()).unwrap();

        assert!(json.contains("Helpdesk API"));
        assert!(json.contains("/health/ready"));
        assert!(json.contains("/api/v1/auth/login"));
        assert!(json.contains("/api/v1/auth/token/refresh"));
        assert!(json.contains("bearer_auth"));
    }

    #[test]
    fn test_openapi_contains_schemas() {
        let json = serde_json::to_string(&ApiDoc::openapi()).unwrap();

        assert!(json.contains("LoginRequest"));
        assert!(json.contains("ApiErrorResponse"));
        assert!(json.contains("CreatePermissionRequest"));
        assert!(json.contains("QuestionHistory"));
    }

    #[test]
    fn test_swagger_ui_router_creates() {
        let _router: Router<()> = swagger_ui_router();
    }
}
