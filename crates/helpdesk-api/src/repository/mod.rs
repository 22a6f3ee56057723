//! 저장소 계층.
//!
//! 라우트 핸들러와 인증 컴포넌트는 구체 저장소가 아닌 트레이트에만 의존합니다:
//!
//! - [`DirectoryStore`]: 사용자/그룹/역할/권한 조회 및 관리자 쓰기 작업
//! - [`TokenStore`]: 발급된 토큰 행 기록 및 폐기
//! - [`TicketStore`]: 질문, 댓글, 처리 이력
//!
//! 구현체는 PostgreSQL용 [`PgStore`]와 테스트/개발용 [`MemoryStore`] 두 가지입니다.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

use helpdesk_core::{
    Comment, Group, GroupRole, NewTokenRecord, Permission, Question, QuestionHistory,
    QuestionStatus, Role, RolePermission, TokenRecord, User, UserStatus,
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// 목록 조회 기본 페이지 크기.
pub const DEFAULT_PAGE_SIZE: u32 = 15;
/// 목록 조회 최대 페이지 크기.
pub const MAX_PAGE_SIZE: u32 = 100;

// ================================================================================================
// Errors
// ================================================================================================

/// 저장소 에러.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("찾을 수 없음: {0}")]
    NotFound(String),
    #[error("이미 존재합니다: {0}")]
    Conflict(String),
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => StoreError::NotFound("row".to_string()),
            sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505") => {
                StoreError::Conflict(
                    db_err
                        .constraint()
                        .map(str::to_string)
                        .unwrap_or_else(|| db_err.message().to_string()),
                )
            }
            _ => StoreError::Unexpected(anyhow::Error::new(err)),
        }
    }
}

// ================================================================================================
// Paging
// ================================================================================================

/// 목록 조회 파라미터 (`?page=&page_size=&search=`).
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct PageRequest {
    /// 1부터 시작하는 페이지 번호
    #[serde(default)]
    pub page: Option<u32>,
    /// 페이지 크기 (기본 15, 최대 100)
    #[serde(default)]
    pub page_size: Option<u32>,
    /// 이름/식별자 부분 일치 검색어
    #[serde(default)]
    pub search: Option<String>,
}

impl PageRequest {
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE)
    }

    pub fn offset(&self) -> u32 {
        (self.page() - 1) * self.page_size()
    }

    /// 공백을 제거한 소문자 검색어. 비어 있으면 `None`.
    pub fn search_term(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
    }
}

/// 페이지 단위 목록 응답.
#[derive(Debug, Clone, serde::Serialize, ToSchema)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub total_pages: u64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: u64, request: &PageRequest) -> Self {
        let size = u64::from(request.page_size());
        Self {
            items,
            total,
            total_pages: total.div_ceil(size),
        }
    }
}

/// 질문 목록 조회 파라미터.
///
/// `search`는 제목과 설명에서 찾습니다.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct QuestionQuery {
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub page_size: Option<u32>,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub status: Option<QuestionStatus>,
    #[serde(default)]
    pub assignee_user_id: Option<Uuid>,
}

impl QuestionQuery {
    pub fn page_request(&self) -> PageRequest {
        PageRequest {
            page: self.page,
            page_size: self.page_size,
            search: self.search.clone(),
        }
    }
}

// ================================================================================================
// Inputs
// ================================================================================================

/// 새 사용자 입력 (비밀번호는 이미 해시됨).
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub group_id: Option<Uuid>,
    pub status: UserStatus,
}

/// 사용자 수정 입력. 여기에 없는 필드는 요청으로 바꿀 수 없습니다.
#[derive(Debug, Clone, Default)]
pub struct UpdateUser {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    /// `Some(None)`이면 그룹 해제
    pub group_id: Option<Option<Uuid>>,
    pub status: Option<UserStatus>,
}

#[derive(Debug, Clone)]
pub struct NewGroup {
    pub name: String,
    pub description: Option<String>,
    pub creator_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateGroup {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewRole {
    pub key: String,
    pub name: String,
    pub description: Option<String>,
    pub creator_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateRole {
    pub key: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewPermission {
    pub name: String,
    /// 검증된 `<method>@<path>` 문자열
    pub resource: String,
}

#[derive(Debug, Clone)]
pub struct NewQuestion {
    pub title: String,
    pub description: Option<String>,
    pub creator_id: Option<Uuid>,
}

/// 질문 수정 입력. 상태와 담당자는 전용 작업으로만 바뀝니다.
#[derive(Debug, Clone, Default)]
pub struct UpdateQuestion {
    pub title: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub question_id: Uuid,
    pub sender_id: Option<Uuid>,
    pub content: String,
}

// ================================================================================================
// Traits
// ================================================================================================

/// 사용자 디렉터리 (User → Group → Role → Permission 그래프).
#[async_trait]
pub trait DirectoryStore: Send + Sync {
    /// username 또는 email로 사용자 조회. `login`은 정규화된 값이어야 합니다.
    async fn find_user_by_login(&self, login: &str) -> StoreResult<Option<User>>;
    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>>;
    async fn find_group(&self, id: Uuid) -> StoreResult<Option<Group>>;
    async fn find_group_by_name(&self, name: &str) -> StoreResult<Option<Group>>;
    async fn roles_of_group(&self, group_id: Uuid) -> StoreResult<Vec<Role>>;
    async fn permissions_of_role(&self, role_id: Uuid) -> StoreResult<Vec<Permission>>;
    /// 그룹 소속 사용자 ID.
    async fn members_of_group(&self, group_id: Uuid) -> StoreResult<Vec<Uuid>>;
    /// 역할이 부여된 그룹들의 소속 사용자 ID.
    async fn members_with_role(&self, role_id: Uuid) -> StoreResult<Vec<Uuid>>;
    /// 권한을 가진 역할을 거쳐 닿는 사용자 ID.
    async fn members_with_permission(&self, permission_id: Uuid) -> StoreResult<Vec<Uuid>>;
    async fn update_password(&self, user_id: Uuid, password_hash: &str) -> StoreResult<()>;

    async fn list_users(&self, page: &PageRequest) -> StoreResult<Page<User>>;
    async fn create_user(&self, input: NewUser) -> StoreResult<User>;
    async fn update_user(&self, id: Uuid, input: UpdateUser) -> StoreResult<User>;
    async fn delete_user(&self, id: Uuid) -> StoreResult<()>;

    async fn list_groups(&self, page: &PageRequest) -> StoreResult<Page<Group>>;
    async fn create_group(&self, input: NewGroup) -> StoreResult<Group>;
    async fn update_group(&self, id: Uuid, input: UpdateGroup) -> StoreResult<Group>;
    /// 소속 사용자가 남아 있으면 `Conflict`.
    async fn delete_group(&self, id: Uuid) -> StoreResult<()>;
    async fn assign_role(
        &self,
        group_id: Uuid,
        role_id: Uuid,
        creator_id: Option<Uuid>,
    ) -> StoreResult<GroupRole>;
    async fn unassign_role(&self, group_id: Uuid, role_id: Uuid) -> StoreResult<()>;

    async fn list_roles(&self, page: &PageRequest) -> StoreResult<Page<Role>>;
    async fn create_role(&self, input: NewRole) -> StoreResult<Role>;
    async fn update_role(&self, id: Uuid, input: UpdateRole) -> StoreResult<Role>;
    async fn delete_role(&self, id: Uuid) -> StoreResult<()>;
    async fn grant_permission(
        &self,
        role_id: Uuid,
        permission_id: Uuid,
        creator_id: Option<Uuid>,
    ) -> StoreResult<RolePermission>;
    async fn revoke_permission(&self, role_id: Uuid, permission_id: Uuid) -> StoreResult<()>;

    async fn list_permissions(&self, page: &PageRequest) -> StoreResult<Page<Permission>>;
    async fn create_permission(&self, input: NewPermission) -> StoreResult<Permission>;
    async fn delete_permission(&self, id: Uuid) -> StoreResult<()>;
}

/// 발급된 토큰 행 저장소.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn record_issued(&self, token: NewTokenRecord) -> StoreResult<TokenRecord>;
    async fn find_by_jti(&self, jti: &str) -> StoreResult<Option<TokenRecord>>;
    /// 알 수 없는 jti는 아무 일도 하지 않습니다.
    async fn revoke(&self, jti: &str) -> StoreResult<()>;
    /// 주어진 사용자들의 폐기되지 않은 토큰을 모두 폐기하고 바뀐 행 수를 반환.
    async fn revoke_all(&self, identities: &[String]) -> StoreResult<u64>;
    /// `keep`에 든 jti를 제외한 사용자의 토큰을 모두 폐기.
    async fn revoke_all_except(&self, identity: &str, keep: &[String]) -> StoreResult<u64>;
    /// `expires < now`인 행을 삭제하고 삭제된 행 수를 반환.
    async fn prune_expired(&self, now: i64) -> StoreResult<u64>;
}

/// 질문(티켓) 저장소.
#[async_trait]
pub trait TicketStore: Send + Sync {
    /// 최근 생성 순.
    async fn list_questions(&self, query: &QuestionQuery) -> StoreResult<Page<Question>>;
    async fn find_question(&self, id: Uuid) -> StoreResult<Option<Question>>;
    /// `open` 상태로 생성.
    async fn create_question(&self, input: NewQuestion) -> StoreResult<Question>;
    async fn update_question(&self, id: Uuid, input: UpdateQuestion) -> StoreResult<Question>;
    /// 댓글과 이력도 함께 삭제합니다.
    async fn delete_question(&self, id: Uuid) -> StoreResult<()>;
    /// 담당자를 바꾸고 `assigned` 이력을 같은 트랜잭션에 남깁니다.
    async fn assign_question(
        &self,
        id: Uuid,
        assignee_user_id: Uuid,
        actor_id: Option<Uuid>,
    ) -> StoreResult<Question>;
    /// 상태를 바꾸고 `status_changed` 이력을 같은 트랜잭션에 남깁니다.
    async fn set_question_status(
        &self,
        id: Uuid,
        status: QuestionStatus,
        actor_id: Option<Uuid>,
    ) -> StoreResult<Question>;
    /// 최근 댓글부터.
    async fn list_comments(&self, question_id: Uuid, page: &PageRequest)
        -> StoreResult<Page<Comment>>;
    /// 질문이 없으면 `NotFound`.
    async fn add_comment(&self, input: NewComment) -> StoreResult<Comment>;
    /// 오래된 이력부터.
    async fn list_history(
        &self,
        question_id: Uuid,
        page: &PageRequest,
    ) -> StoreResult<Page<QuestionHistory>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_request_defaults() {
        let req = PageRequest::default();
        assert_eq!(req.page(), 1);
        assert_eq!(req.page_size(), DEFAULT_PAGE_SIZE);
        assert_eq!(req.offset(), 0);
        assert!(req.search_term().is_none());
    }

    #[test]
    fn test_page_request_clamps() {
        let req = PageRequest {
            page: Some(0),
            page_size: Some(1000),
            search: Some("  Agent ".to_string()),
        };
        assert_eq!(req.page(), 1);
        assert_eq!(req.page_size(), MAX_PAGE_SIZE);
        assert_eq!(req.search_term().as_deref(), Some("agent"));

        let req = PageRequest {
            page: Some(3),
            page_size: Some(10),
            search: None,
        };
        assert_eq!(req.offset(), 20);
    }

    #[test]
    fn test_question_query_keeps_paging_fields() {
        let query = QuestionQuery {
            page: Some(2),
            page_size: Some(5),
            search: Some("Printer".to_string()),
            status: Some(QuestionStatus::Open),
            assignee_user_id: None,
        };
        let page = query.page_request();
        assert_eq!(page.offset(), 5);
        assert_eq!(page.search_term().as_deref(), Some("printer"));
    }

    #[test]
    fn test_total_pages() {
        let req = PageRequest::default();
        assert_eq!(Page::new(Vec::<u8>::new(), 0, &req).total_pages, 0);
        assert_eq!(Page::new(Vec::<u8>::new(), 15, &req).total_pages, 1);
        assert_eq!(Page::new(Vec::<u8>::new(), 16, &req).total_pages, 2);
    }
}
