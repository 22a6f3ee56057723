//! 도메인 엔티티.
//!
//! - [`user`]: 사용자 계정
//! - [`group`]: 사용자 그룹 및 그룹-역할 연결
//! - [`role`]: 역할 및 역할-권한 연결
//! - [`permission`]: 권한 리소스 문자열과 권한 집합
//! - [`token`]: 발급된 JWT 메타데이터
//! - [`question`]: 헬프데스크 질문, 댓글, 처리 이력

pub mod group;
pub mod permission;
pub mod question;
pub mod role;
pub mod token;
pub mod user;

pub use group::{Group, GroupRole};
pub use permission::{permission_key, Permission, PermissionResource, PermissionSet, WILDCARD};
pub use question::{Comment, HistoryKind, Question, QuestionHistory, QuestionStatus};
pub use role::{Role, RolePermission};
pub use token::{NewTokenRecord, TokenRecord, TokenType};
pub use user::{normalize_login, User, UserStatus};
