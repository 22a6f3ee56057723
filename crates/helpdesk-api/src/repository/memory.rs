//! 인메모리 저장소.
//!
//! `tokio::sync::RwLock`으로 보호되는 `HashMap` 기반 구현입니다.
//! 테스트와 데이터베이스 없는 로컬 개발에 사용되며 재시작하면 모든 상태가 사라집니다.
//! 유일성 제약과 연결 행 정리는 PostgreSQL 스키마와 같은 규칙을 따릅니다.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use helpdesk_core::{
    Comment, Group, GroupRole, HistoryKind, NewTokenRecord, Permission, Question,
    QuestionHistory, QuestionStatus, Role, RolePermission, TokenRecord, User,
};

use super::{
    DirectoryStore, NewComment, NewGroup, NewPermission, NewQuestion, NewRole, NewUser, Page,
    PageRequest, QuestionQuery, StoreError, StoreResult, TicketStore, TokenStore, UpdateGroup,
    UpdateQuestion, UpdateRole, UpdateUser,
};

#[derive(Debug, Default)]
struct State {
    users: HashMap<Uuid, User>,
    groups: HashMap<Uuid, Group>,
    roles: HashMap<Uuid, Role>,
    permissions: HashMap<Uuid, Permission>,
    group_roles: Vec<GroupRole>,
    role_permissions: Vec<RolePermission>,
    tokens: HashMap<String, TokenRecord>,
    questions: HashMap<Uuid, Question>,
    comments: Vec<Comment>,
    histories: Vec<QuestionHistory>,
}

/// 인메모리 [`DirectoryStore`] + [`TokenStore`] + [`TicketStore`].
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<State>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 저장된 토큰 행 수 (테스트 확인용).
    pub async fn token_count(&self) -> usize {
        self.state.read().await.tokens.len()
    }
}

fn paginate<T>(
    mut items: Vec<T>,
    request: &PageRequest,
    sort_key: impl Fn(&T) -> String,
) -> Page<T> {
    items.sort_by_key(|item| sort_key(item));
    page_of(items, request)
}

/// 이미 정렬된 목록을 자릅니다.
fn page_of<T>(items: Vec<T>, request: &PageRequest) -> Page<T> {
    let total = items.len() as u64;
    let items = items
        .into_iter()
        .skip(request.offset() as usize)
        .take(request.page_size() as usize)
        .collect();
    Page::new(items, total, request)
}

fn matches_search(term: &Option<String>, fields: &[&str]) -> bool {
    match term {
        Some(term) => fields.iter().any(|f| f.to_lowercase().contains(term)),
        None => true,
    }
}

fn record_history(
    state: &mut State,
    question: &Question,
    kind: HistoryKind,
    actor_id: Option<Uuid>,
) {
    state.histories.push(QuestionHistory {
        id: Uuid::new_v4(),
        question_id: question.id,
        kind: kind.as_str().to_string(),
        status: question.status.clone(),
        assignee_user_id: question.assignee_user_id,
        creator_id: actor_id,
        created_at: question.updated_at,
    });
}

fn members_of(state: &State, groups: &HashSet<Uuid>) -> Vec<Uuid> {
    state
        .users
        .values()
        .filter(|u| u.group_id.is_some_and(|g| groups.contains(&g)))
        .map(|u| u.id)
        .collect()
}

fn groups_with_roles(state: &State, roles: &HashSet<Uuid>) -> HashSet<Uuid> {
    state
        .group_roles
        .iter()
        .filter(|link| roles.contains(&link.role_id))
        .map(|link| link.group_id)
        .collect()
}

#[async_trait]
impl DirectoryStore for MemoryStore {
    async fn find_user_by_login(&self, login: &str) -> StoreResult<Option<User>> {
        let state = self.state.read().await;
        Ok(state
            .users
            .values()
            .find(|u| u.matches_login(login))
            .cloned())
    }

    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.state.read().await.users.get(&id).cloned())
    }

    async fn find_group(&self, id: Uuid) -> StoreResult<Option<Group>> {
        Ok(self.state.read().await.groups.get(&id).cloned())
    }

    async fn find_group_by_name(&self, name: &str) -> StoreResult<Option<Group>> {
        let state = self.state.read().await;
        Ok(state.groups.values().find(|g| g.name == name).cloned())
    }

    async fn roles_of_group(&self, group_id: Uuid) -> StoreResult<Vec<Role>> {
        let state = self.state.read().await;
        Ok(state
            .group_roles
            .iter()
            .filter(|link| link.group_id == group_id)
            .filter_map(|link| state.roles.get(&link.role_id).cloned())
            .collect())
    }

    async fn permissions_of_role(&self, role_id: Uuid) -> StoreResult<Vec<Permission>> {
        let state = self.state.read().await;
        Ok(state
            .role_permissions
            .iter()
            .filter(|link| link.role_id == role_id)
            .filter_map(|link| state.permissions.get(&link.permission_id).cloned())
            .collect())
    }

    async fn members_of_group(&self, group_id: Uuid) -> StoreResult<Vec<Uuid>> {
        let state = self.state.read().await;
        Ok(members_of(&state, &HashSet::from([group_id])))
    }

    async fn members_with_role(&self, role_id: Uuid) -> StoreResult<Vec<Uuid>> {
        let state = self.state.read().await;
        let groups = groups_with_roles(&state, &HashSet::from([role_id]));
        Ok(members_of(&state, &groups))
    }

    async fn members_with_permission(&self, permission_id: Uuid) -> StoreResult<Vec<Uuid>> {
        let state = self.state.read().await;
        let roles: HashSet<Uuid> = state
            .role_permissions
            .iter()
            .filter(|link| link.permission_id == permission_id)
            .map(|link| link.role_id)
            .collect();
        let groups = groups_with_roles(&state, &roles);
        Ok(members_of(&state, &groups))
    }

    async fn update_password(&self, user_id: Uuid, password_hash: &str) -> StoreResult<()> {
        let mut state = self.state.write().await;
        let user = state
            .users
            .get_mut(&user_id)
            .ok_or_else(|| StoreError::NotFound(format!("user {}", user_id)))?;
        user.password_hash = password_hash.to_string();
        Ok(())
    }

    // ===== Users =====

    async fn list_users(&self, page: &PageRequest) -> StoreResult<Page<User>> {
        let term = page.search_term();
        let state = self.state.read().await;
        let items = state
            .users
            .values()
            .filter(|u| {
                matches_search(
                    &term,
                    &[
                        u.username.as_str(),
                        u.email.as_str(),
                        u.first_name.as_str(),
                        u.last_name.as_str(),
                    ],
                )
            })
            .cloned()
            .collect();
        Ok(paginate(items, page, |u: &User| u.username.clone()))
    }

    async fn create_user(&self, input: NewUser) -> StoreResult<User> {
        let mut state = self.state.write().await;
        if state
            .users
            .values()
            .any(|u| u.username == input.username || u.email == input.email)
        {
            return Err(StoreError::Conflict("username or email".to_string()));
        }
        if let Some(group_id) = input.group_id {
            if !state.groups.contains_key(&group_id) {
                return Err(StoreError::NotFound(format!("group {}", group_id)));
            }
        }

        let user = User {
            id: Uuid::new_v4(),
            username: input.username,
            email: input.email,
            password_hash: input.password_hash,
            first_name: input.first_name,
            last_name: input.last_name,
            group_id: input.group_id,
            status: input.status.as_str().to_string(),
            created_at: Utc::now(),
        };
        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update_user(&self, id: Uuid, input: UpdateUser) -> StoreResult<User> {
        let mut state = self.state.write().await;
        if !state.users.contains_key(&id) {
            return Err(StoreError::NotFound(format!("user {}", id)));
        }
        if let Some(email) = &input.email {
            if state.users.values().any(|u| u.id != id && &u.email == email) {
                return Err(StoreError::Conflict("email".to_string()));
            }
        }
        if let Some(Some(group_id)) = input.group_id {
            if !state.groups.contains_key(&group_id) {
                return Err(StoreError::NotFound(format!("group {}", group_id)));
            }
        }

        let user = state
            .users
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("user {}", id)))?;
        if let Some(email) = input.email {
            user.email = email;
        }
        if let Some(first_name) = input.first_name {
            user.first_name = first_name;
        }
        if let Some(last_name) = input.last_name {
            user.last_name = last_name;
        }
        if let Some(group_id) = input.group_id {
            user.group_id = group_id;
        }
        if let Some(status) = input.status {
            user.status = status.as_str().to_string();
        }
        Ok(user.clone())
    }

    async fn delete_user(&self, id: Uuid) -> StoreResult<()> {
        let mut state = self.state.write().await;
        state
            .users
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(format!("user {}", id)))
    }

    // ===== Groups =====

    async fn list_groups(&self, page: &PageRequest) -> StoreResult<Page<Group>> {
        let term = page.search_term();
        let state = self.state.read().await;
        let items = state
            .groups
            .values()
            .filter(|g| matches_search(&term, &[g.name.as_str()]))
            .cloned()
            .collect();
        Ok(paginate(items, page, |g: &Group| g.name.clone()))
    }

    async fn create_group(&self, input: NewGroup) -> StoreResult<Group> {
        let mut state = self.state.write().await;
        if state.groups.values().any(|g| g.name == input.name) {
            return Err(StoreError::Conflict(format!("group {}", input.name)));
        }
        let now = Utc::now();
        let group = Group {
            id: Uuid::new_v4(),
            name: input.name,
            description: input.description,
            creator_id: input.creator_id,
            created_at: now,
            updated_at: now,
        };
        state.groups.insert(group.id, group.clone());
        Ok(group)
    }

    async fn update_group(&self, id: Uuid, input: UpdateGroup) -> StoreResult<Group> {
        let mut state = self.state.write().await;
        if let Some(name) = &input.name {
            if state.groups.values().any(|g| g.id != id && &g.name == name) {
                return Err(StoreError::Conflict(format!("group {}", name)));
            }
        }
        let group = state
            .groups
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("group {}", id)))?;
        if let Some(name) = input.name {
            group.name = name;
        }
        if let Some(description) = input.description {
            group.description = Some(description);
        }
        group.updated_at = Utc::now();
        Ok(group.clone())
    }

    async fn delete_group(&self, id: Uuid) -> StoreResult<()> {
        let mut state = self.state.write().await;
        if !state.groups.contains_key(&id) {
            return Err(StoreError::NotFound(format!("group {}", id)));
        }
        if state.users.values().any(|u| u.group_id == Some(id)) {
            return Err(StoreError::Conflict("group still has members".to_string()));
        }
        state.groups.remove(&id);
        state.group_roles.retain(|link| link.group_id != id);
        Ok(())
    }

    async fn assign_role(
        &self,
        group_id: Uuid,
        role_id: Uuid,
        creator_id: Option<Uuid>,
    ) -> StoreResult<GroupRole> {
        let mut state = self.state.write().await;
        if !state.groups.contains_key(&group_id) {
            return Err(StoreError::NotFound(format!("group {}", group_id)));
        }
        if !state.roles.contains_key(&role_id) {
            return Err(StoreError::NotFound(format!("role {}", role_id)));
        }
        if state
            .group_roles
            .iter()
            .any(|link| link.group_id == group_id && link.role_id == role_id)
        {
            return Err(StoreError::Conflict("group role".to_string()));
        }
        let link = GroupRole {
            id: Uuid::new_v4(),
            group_id,
            role_id,
            creator_id,
            created_at: Utc::now(),
        };
        state.group_roles.push(link.clone());
        Ok(link)
    }

    async fn unassign_role(&self, group_id: Uuid, role_id: Uuid) -> StoreResult<()> {
        let mut state = self.state.write().await;
        let before = state.group_roles.len();
        state
            .group_roles
            .retain(|link| !(link.group_id == group_id && link.role_id == role_id));
        if state.group_roles.len() == before {
            return Err(StoreError::NotFound("group role".to_string()));
        }
        Ok(())
    }

    // ===== Roles =====

    async fn list_roles(&self, page: &PageRequest) -> StoreResult<Page<Role>> {
        let term = page.search_term();
        let state = self.state.read().await;
        let items = state
            .roles
            .values()
            .filter(|r| matches_search(&term, &[r.key.as_str(), r.name.as_str()]))
            .cloned()
            .collect();
        Ok(paginate(items, page, |r: &Role| r.name.clone()))
    }

    async fn create_role(&self, input: NewRole) -> StoreResult<Role> {
        let mut state = self.state.write().await;
        if state
            .roles
            .values()
            .any(|r| r.key == input.key || r.name == input.name)
        {
            return Err(StoreError::Conflict(format!("role {}", input.key)));
        }
        let now = Utc::now();
        let role = Role {
            id: Uuid::new_v4(),
            key: input.key,
            name: input.name,
            description: input.description,
            creator_id: input.creator_id,
            created_at: now,
            updated_at: now,
        };
        state.roles.insert(role.id, role.clone());
        Ok(role)
    }

    async fn update_role(&self, id: Uuid, input: UpdateRole) -> StoreResult<Role> {
        let mut state = self.state.write().await;
        let clash = state.roles.values().any(|r| {
            r.id != id
                && (input.key.as_ref() == Some(&r.key) || input.name.as_ref() == Some(&r.name))
        });
        if clash {
            return Err(StoreError::Conflict("role key or name".to_string()));
        }
        let role = state
            .roles
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("role {}", id)))?;
        if let Some(key) = input.key {
            role.key = key;
        }
        if let Some(name) = input.name {
            role.name = name;
        }
        if let Some(description) = input.description {
            role.description = Some(description);
        }
        role.updated_at = Utc::now();
        Ok(role.clone())
    }

    async fn delete_role(&self, id: Uuid) -> StoreResult<()> {
        let mut state = self.state.write().await;
        if state.roles.remove(&id).is_none() {
            return Err(StoreError::NotFound(format!("role {}", id)));
        }
        state.group_roles.retain(|link| link.role_id != id);
        state.role_permissions.retain(|link| link.role_id != id);
        Ok(())
    }

    async fn grant_permission(
        &self,
        role_id: Uuid,
        permission_id: Uuid,
        creator_id: Option<Uuid>,
    ) -> StoreResult<RolePermission> {
        let mut state = self.state.write().await;
        if !state.roles.contains_key(&role_id) {
            return Err(StoreError::NotFound(format!("role {}", role_id)));
        }
        if !state.permissions.contains_key(&permission_id) {
            return Err(StoreError::NotFound(format!("permission {}", permission_id)));
        }
        if state
            .role_permissions
            .iter()
            .any(|link| link.role_id == role_id && link.permission_id == permission_id)
        {
            return Err(StoreError::Conflict("role permission".to_string()));
        }
        let link = RolePermission {
            id: Uuid::new_v4(),
            role_id,
            permission_id,
            creator_id,
            created_at: Utc::now(),
        };
        state.role_permissions.push(link.clone());
        Ok(link)
    }

    async fn revoke_permission(&self, role_id: Uuid, permission_id: Uuid) -> StoreResult<()> {
        let mut state = self.state.write().await;
        let before = state.role_permissions.len();
        state
            .role_permissions
            .retain(|link| !(link.role_id == role_id && link.permission_id == permission_id));
        if state.role_permissions.len() == before {
            return Err(StoreError::NotFound("role permission".to_string()));
        }
        Ok(())
    }

    // ===== Permissions =====

    async fn list_permissions(&self, page: &PageRequest) -> StoreResult<Page<Permission>> {
        let term = page.search_term();
        let state = self.state.read().await;
        let items = state
            .permissions
            .values()
            .filter(|p| matches_search(&term, &[p.name.as_str(), p.resource.as_str()]))
            .cloned()
            .collect();
        Ok(paginate(items, page, |p: &Permission| p.resource.clone()))
    }

    async fn create_permission(&self, input: NewPermission) -> StoreResult<Permission> {
        let mut state = self.state.write().await;
        if state
            .permissions
            .values()
            .any(|p| p.resource == input.resource)
        {
            return Err(StoreError::Conflict(format!("permission {}", input.resource)));
        }
        let permission = Permission {
            id: Uuid::new_v4(),
            name: input.name,
            resource: input.resource,
        };
        state.permissions.insert(permission.id, permission.clone());
        Ok(permission)
    }

    async fn delete_permission(&self, id: Uuid) -> StoreResult<()> {
        let mut state = self.state.write().await;
        if state.permissions.remove(&id).is_none() {
            return Err(StoreError::NotFound(format!("permission {}", id)));
        }
        state.role_permissions.retain(|link| link.permission_id != id);
        Ok(())
    }
}

#[async_trait]
impl TokenStore for MemoryStore {
    async fn record_issued(&self, token: NewTokenRecord) -> StoreResult<TokenRecord> {
        let mut state = self.state.write().await;
        if state.tokens.contains_key(&token.jti) {
            return Err(StoreError::Conflict(format!("jti {}", token.jti)));
        }
        let record = token.into_record();
        state.tokens.insert(record.jti.clone(), record.clone());
        Ok(record)
    }

    async fn find_by_jti(&self, jti: &str) -> StoreResult<Option<TokenRecord>> {
        Ok(self.state.read().await.tokens.get(jti).cloned())
    }

    async fn revoke(&self, jti: &str) -> StoreResult<()> {
        if let Some(record) = self.state.write().await.tokens.get_mut(jti) {
            record.revoked = true;
        }
        Ok(())
    }

    async fn revoke_all(&self, identities: &[String]) -> StoreResult<u64> {
        let mut state = self.state.write().await;
        let mut changed = 0;
        for record in state.tokens.values_mut() {
            if !record.revoked && identities.contains(&record.user_identity) {
                record.revoked = true;
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn revoke_all_except(&self, identity: &str, keep: &[String]) -> StoreResult<u64> {
        let mut state = self.state.write().await;
        let mut changed = 0;
        for record in state.tokens.values_mut() {
            if !record.revoked && record.user_identity == identity && !keep.contains(&record.jti) {
                record.revoked = true;
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn prune_expired(&self, now: i64) -> StoreResult<u64> {
        let mut state = self.state.write().await;
        let before = state.tokens.len();
        state.tokens.retain(|_, record| !record.is_expired_at(now));
        Ok((before - state.tokens.len()) as u64)
    }
}

#[async_trait]
impl TicketStore for MemoryStore {
    async fn list_questions(&self, query: &QuestionQuery) -> StoreResult<Page<Question>> {
        let page = query.page_request();
        let term = page.search_term();
        let state = self.state.read().await;
        let mut items: Vec<Question> = state
            .questions
            .values()
            .filter(|q| {
                matches_search(
                    &term,
                    &[q.title.as_str(), q.description.as_deref().unwrap_or("")],
                )
            })
            .filter(|q| query.status.map_or(true, |s| q.status() == Some(s)))
            .filter(|q| {
                query
                    .assignee_user_id
                    .map_or(true, |a| q.assignee_user_id == Some(a))
            })
            .cloned()
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(page_of(items, &page))
    }

    async fn find_question(&self, id: Uuid) -> StoreResult<Option<Question>> {
        Ok(self.state.read().await.questions.get(&id).cloned())
    }

    async fn create_question(&self, input: NewQuestion) -> StoreResult<Question> {
        let now = Utc::now();
        let question = Question {
            id: Uuid::new_v4(),
            title: input.title,
            description: input.description,
            status: QuestionStatus::Open.as_str().to_string(),
            creator_id: input.creator_id,
            assignee_user_id: None,
            created_at: now,
            updated_at: now,
        };
        let mut state = self.state.write().await;
        state.questions.insert(question.id, question.clone());
        Ok(question)
    }

    async fn update_question(&self, id: Uuid, input: UpdateQuestion) -> StoreResult<Question> {
        let mut state = self.state.write().await;
        let question = state
            .questions
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("question {}", id)))?;
        if let Some(title) = input.title {
            question.title = title;
        }
        if let Some(description) = input.description {
            question.description = Some(description);
        }
        question.updated_at = Utc::now();
        Ok(question.clone())
    }

    async fn delete_question(&self, id: Uuid) -> StoreResult<()> {
        let mut state = self.state.write().await;
        if state.questions.remove(&id).is_none() {
            return Err(StoreError::NotFound(format!("question {}", id)));
        }
        state.comments.retain(|c| c.question_id != id);
        state.histories.retain(|h| h.question_id != id);
        Ok(())
    }

    async fn assign_question(
        &self,
        id: Uuid,
        assignee_user_id: Uuid,
        actor_id: Option<Uuid>,
    ) -> StoreResult<Question> {
        let mut state = self.state.write().await;
        if !state.users.contains_key(&assignee_user_id) {
            return Err(StoreError::NotFound(format!("user {}", assignee_user_id)));
        }
        let question = state
            .questions
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("question {}", id)))?;
        question.assignee_user_id = Some(assignee_user_id);
        question.updated_at = Utc::now();
        let question = question.clone();
        record_history(&mut state, &question, HistoryKind::Assigned, actor_id);
        Ok(question)
    }

    async fn set_question_status(
        &self,
        id: Uuid,
        status: QuestionStatus,
        actor_id: Option<Uuid>,
    ) -> StoreResult<Question> {
        let mut state = self.state.write().await;
        let question = state
            .questions
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("question {}", id)))?;
        question.status = status.as_str().to_string();
        question.updated_at = Utc::now();
        let question = question.clone();
        record_history(&mut state, &question, HistoryKind::StatusChanged, actor_id);
        Ok(question)
    }

    async fn list_comments(
        &self,
        question_id: Uuid,
        page: &PageRequest,
    ) -> StoreResult<Page<Comment>> {
        let state = self.state.read().await;
        let mut items: Vec<Comment> = state
            .comments
            .iter()
            .filter(|c| c.question_id == question_id)
            .cloned()
            .collect();
        // 같은 시각이면 나중에 추가된 댓글이 먼저
        items.reverse();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(page_of(items, page))
    }

    async fn add_comment(&self, input: NewComment) -> StoreResult<Comment> {
        let mut state = self.state.write().await;
        if !state.questions.contains_key(&input.question_id) {
            return Err(StoreError::NotFound(format!("question {}", input.question_id)));
        }
        let comment = Comment {
            id: Uuid::new_v4(),
            question_id: input.question_id,
            sender_id: input.sender_id,
            content: input.content,
            created_at: Utc::now(),
        };
        state.comments.push(comment.clone());
        Ok(comment)
    }

    async fn list_history(
        &self,
        question_id: Uuid,
        page: &PageRequest,
    ) -> StoreResult<Page<QuestionHistory>> {
        let state = self.state.read().await;
        let items: Vec<QuestionHistory> = state
            .histories
            .iter()
            .filter(|h| h.question_id == question_id)
            .cloned()
            .collect();
        Ok(page_of(items, page))
    }
}
