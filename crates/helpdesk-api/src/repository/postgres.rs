//! PostgreSQL 저장소.
//!
//! 사용하는 테이블:
//! `users`, `user_groups`, `roles`, `permissions`, `group_roles`, `role_permissions`, `tokens`,
//! `questions`, `question_comments`, `question_histories`.
//! 유일성 위반(`23505`)은 [`StoreError::Conflict`]로 변환됩니다.

use async_trait::async_trait;
use sqlx::{PgConnection, PgPool};
use tracing::debug;
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

const USER_COLUMNS: &str = "id, username, email, password_hash, first_name, last_name, \
                            group_id, status, created_at";

const QUESTION_COLUMNS: &str = "id, title, description, status, creator_id, assignee_user_id, \
                                created_at, updated_at";

const HISTORY_COLUMNS: &str = "id, question_id, kind, status, assignee_user_id, creator_id, \
                               created_at";

/// PostgreSQL [`DirectoryStore`] + [`TokenStore`] + [`TicketStore`].
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// `ILIKE` 패턴. 검색어가 없으면 모두 일치.
fn like_pattern(page: &PageRequest) -> String {
    match page.search_term() {
        Some(term) => format!("%{}%", term.replace('%', "\\%").replace('_', "\\_")),
        None => "%".to_string(),
    }
}

fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().as_deref() == Some("23503"),
        _ => false,
    }
}

fn not_found(what: &str, id: Uuid) -> StoreError {
    StoreError::NotFound(format!("{} {}", what, id))
}

async fn insert_history(
    conn: &mut PgConnection,
    question: &Question,
    kind: HistoryKind,
    actor_id: Option<Uuid>,
) -> StoreResult<()> {
    sqlx::query(
        "INSERT INTO question_histories \
         (id, question_id, kind, status, assignee_user_id, creator_id) \
         VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(Uuid::new_v4())
    .bind(question.id)
    .bind(kind.as_str())
    .bind(&question.status)
    .bind(question.assignee_user_id)
    .bind(actor_id)
    .execute(conn)
    .await?;
    Ok(())
}

#[async_trait]
impl DirectoryStore for PgStore {
    async fn find_user_by_login(&self, login: &str) -> StoreResult<Option<User>> {
        let sql = format!(
            "SELECT {} FROM users WHERE username = $1 OR email = $1 LIMIT 1",
            USER_COLUMNS
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(login)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_group(&self, id: Uuid) -> StoreResult<Option<Group>> {
        let group = sqlx::query_as::<_, Group>(
            "SELECT id, name, description, creator_id, created_at, updated_at \
             FROM user_groups WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(group)
    }

    async fn find_group_by_name(&self, name: &str) -> StoreResult<Option<Group>> {
        let group = sqlx::query_as::<_, Group>(
            "SELECT id, name, description, creator_id, created_at, updated_at \
             FROM user_groups WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(group)
    }

    async fn roles_of_group(&self, group_id: Uuid) -> StoreResult<Vec<Role>> {
        let roles = sqlx::query_as::<_, Role>(
            r#"
            SELECT r.id, r.key, r.name, r.description, r.creator_id, r.created_at, r.updated_at
            FROM group_roles gr
            JOIN roles r ON r.id = gr.role_id
            WHERE gr.group_id = $1
            ORDER BY gr.created_at
            "#,
        )
        .bind(group_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(roles)
    }

    async fn permissions_of_role(&self, role_id: Uuid) -> StoreResult<Vec<Permission>> {
        let permissions = sqlx::query_as::<_, Permission>(
            r#"
            SELECT p.id, p.name, p.resource
            FROM role_permissions rp
            JOIN permissions p ON p.id = rp.permission_id
            WHERE rp.role_id = $1
            ORDER BY rp.created_at
            "#,
        )
        .bind(role_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(permissions)
    }

    async fn members_of_group(&self, group_id: Uuid) -> StoreResult<Vec<Uuid>> {
        let ids = sqlx::query_scalar::<_, Uuid>("SELECT id FROM users WHERE group_id = $1")
            .bind(group_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }

    async fn members_with_role(&self, role_id: Uuid) -> StoreResult<Vec<Uuid>> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT DISTINCT u.id
            FROM users u
            JOIN group_roles gr ON gr.group_id = u.group_id
            WHERE gr.role_id = $1
            "#,
        )
        .bind(role_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn members_with_permission(&self, permission_id: Uuid) -> StoreResult<Vec<Uuid>> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT DISTINCT u.id
            FROM users u
            JOIN group_roles gr ON gr.group_id = u.group_id
            JOIN role_permissions rp ON rp.role_id = gr.role_id
            WHERE rp.permission_id = $1
            "#,
        )
        .bind(permission_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn update_password(&self, user_id: Uuid, password_hash: &str) -> StoreResult<()> {
        let result = sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
            .bind(user_id)
            .bind(password_hash)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(not_found("user", user_id));
        }
        Ok(())
    }

    // ===== Users =====

    async fn list_users(&self, page: &PageRequest) -> StoreResult<Page<User>> {
        let pattern = like_pattern(page);
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM users \
             WHERE username ILIKE $1 OR email ILIKE $1 OR first_name ILIKE $1 OR last_name ILIKE $1",
        )
        .bind(&pattern)
        .fetch_one(&self.pool)
        .await?;

        let sql = format!(
            "SELECT {} FROM users \
             WHERE username ILIKE $1 OR email ILIKE $1 OR first_name ILIKE $1 OR last_name ILIKE $1 \
             ORDER BY username LIMIT $2 OFFSET $3",
            USER_COLUMNS
        );
        let items = sqlx::query_as::<_, User>(&sql)
            .bind(&pattern)
            .bind(i64::from(page.page_size()))
            .bind(i64::from(page.offset()))
            .fetch_all(&self.pool)
            .await?;

        Ok(Page::new(items, total as u64, page))
    }

    async fn create_user(&self, input: NewUser) -> StoreResult<User> {
        let sql = format!(
            "INSERT INTO users (id, username, email, password_hash, first_name, last_name, group_id, status) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {}",
            USER_COLUMNS
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(Uuid::new_v4())
            .bind(&input.username)
            .bind(&input.email)
            .bind(&input.password_hash)
            .bind(&input.first_name)
            .bind(&input.last_name)
            .bind(input.group_id)
            .bind(input.status.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                if is_foreign_key_violation(&e) {
                    StoreError::NotFound("group".to_string())
                } else {
                    StoreError::from(e)
                }
            })?;
        debug!(user_id = %user.id, "사용자 생성");
        Ok(user)
    }

    async fn update_user(&self, id: Uuid, input: UpdateUser) -> StoreResult<User> {
        if let Some(Some(group_id)) = input.group_id {
            if self.find_group(group_id).await?.is_none() {
                return Err(not_found("group", group_id));
            }
        }

        // $5: group_id 키가 있었는지, $6: 새 값 (NULL이면 그룹 해제)
        let sql = format!(
            r#"
            UPDATE users SET
                email = COALESCE($2, email),
                first_name = COALESCE($3, first_name),
                last_name = COALESCE($4, last_name),
                group_id = CASE WHEN $5 THEN $6 ELSE group_id END,
                status = COALESCE($7, status)
            WHERE id = $1
            RETURNING {}
            "#,
            USER_COLUMNS
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(input.email)
            .bind(input.first_name)
            .bind(input.last_name)
            .bind(input.group_id.is_some())
            .bind(input.group_id.flatten())
            .bind(input.status.map(|s| s.as_str()))
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| not_found("user", id))
    }

    async fn delete_user(&self, id: Uuid) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(not_found("user", id));
        }
        Ok(())
    }

    // ===== Groups =====

    async fn list_groups(&self, page: &PageRequest) -> StoreResult<Page<Group>> {
        let pattern = like_pattern(page);
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM user_groups WHERE name ILIKE $1")
            .bind(&pattern)
            .fetch_one(&self.pool)
            .await?;
        let items = sqlx::query_as::<_, Group>(
            "SELECT id, name, description, creator_id, created_at, updated_at \
             FROM user_groups WHERE name ILIKE $1 ORDER BY name LIMIT $2 OFFSET $3",
        )
        .bind(&pattern)
        .bind(i64::from(page.page_size()))
        .bind(i64::from(page.offset()))
        .fetch_all(&self.pool)
        .await?;
        Ok(Page::new(items, total as u64, page))
    }

    async fn create_group(&self, input: NewGroup) -> StoreResult<Group> {
        let group = sqlx::query_as::<_, Group>(
            "INSERT INTO user_groups (id, name, description, creator_id) VALUES ($1, $2, $3, $4) \
             RETURNING id, name, description, creator_id, created_at, updated_at",
        )
        .bind(Uuid::new_v4())
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.creator_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(group)
    }

    async fn update_group(&self, id: Uuid, input: UpdateGroup) -> StoreResult<Group> {
        sqlx::query_as::<_, Group>(
            r#"
            UPDATE user_groups SET
                name = COALESCE($2, name),
                description = COALESCE($3, description),
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, description, creator_id, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(input.name)
        .bind(input.description)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| not_found("group", id))
    }

    async fn delete_group(&self, id: Uuid) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        let members: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE group_id = $1")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
        if members > 0 {
            return Err(StoreError::Conflict("group still has members".to_string()));
        }

        sqlx::query("DELETE FROM group_roles WHERE group_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM user_groups WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(not_found("group", id));
        }

        tx.commit().await?;
        Ok(())
    }

    async fn assign_role(
        &self,
        group_id: Uuid,
        role_id: Uuid,
        creator_id: Option<Uuid>,
    ) -> StoreResult<GroupRole> {
        if self.find_group(group_id).await?.is_none() {
            return Err(not_found("group", group_id));
        }
        let role_exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM roles WHERE id = $1)")
                .bind(role_id)
                .fetch_one(&self.pool)
                .await?;
        if !role_exists {
            return Err(not_found("role", role_id));
        }

        let link = sqlx::query_as::<_, GroupRole>(
            "INSERT INTO group_roles (id, group_id, role_id, creator_id) VALUES ($1, $2, $3, $4) \
             RETURNING id, group_id, role_id, creator_id, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(group_id)
        .bind(role_id)
        .bind(creator_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(link)
    }

    async fn unassign_role(&self, group_id: Uuid, role_id: Uuid) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM group_roles WHERE group_id = $1 AND role_id = $2")
            .bind(group_id)
            .bind(role_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("group role".to_string()));
        }
        Ok(())
    }

    // ===== Roles =====

    async fn list_roles(&self, page: &PageRequest) -> StoreResult<Page<Role>> {
        let pattern = like_pattern(page);
        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM roles WHERE key ILIKE $1 OR name ILIKE $1")
                .bind(&pattern)
                .fetch_one(&self.pool)
                .await?;
        let items = sqlx::query_as::<_, Role>(
            "SELECT id, key, name, description, creator_id, created_at, updated_at FROM roles \
             WHERE key ILIKE $1 OR name ILIKE $1 ORDER BY name LIMIT $2 OFFSET $3",
        )
        .bind(&pattern)
        .bind(i64::from(page.page_size()))
        .bind(i64::from(page.offset()))
        .fetch_all(&self.pool)
        .await?;
        Ok(Page::new(items, total as u64, page))
    }

    async fn create_role(&self, input: NewRole) -> StoreResult<Role> {
        let role = sqlx::query_as::<_, Role>(
            "INSERT INTO roles (id, key, name, description, creator_id) VALUES ($1, $2, $3, $4, $5) \
             RETURNING id, key, name, description, creator_id, created_at, updated_at",
        )
        .bind(Uuid::new_v4())
        .bind(&input.key)
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.creator_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(role)
    }

    async fn update_role(&self, id: Uuid, input: UpdateRole) -> StoreResult<Role> {
        sqlx::query_as::<_, Role>(
            r#"
            UPDATE roles SET
                key = COALESCE($2, key),
                name = COALESCE($3, name),
                description = COALESCE($4, description),
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, key, name, description, creator_id, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(input.key)
        .bind(input.name)
        .bind(input.description)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| not_found("role", id))
    }

    async fn delete_role(&self, id: Uuid) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM group_roles WHERE role_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM role_permissions WHERE role_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM roles WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(not_found("role", id));
        }
        tx.commit().await?;
        Ok(())
    }

    async fn grant_permission(
        &self,
        role_id: Uuid,
        permission_id: Uuid,
        creator_id: Option<Uuid>,
    ) -> StoreResult<RolePermission> {
        let (role_exists, permission_exists): (bool, bool) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM roles WHERE id = $1), \
                    EXISTS(SELECT 1 FROM permissions WHERE id = $2)",
        )
        .bind(role_id)
        .bind(permission_id)
        .fetch_one(&self.pool)
        .await?;
        if !role_exists {
            return Err(not_found("role", role_id));
        }
        if !permission_exists {
            return Err(not_found("permission", permission_id));
        }

        let link = sqlx::query_as::<_, RolePermission>(
            "INSERT INTO role_permissions (id, role_id, permission_id, creator_id) \
             VALUES ($1, $2, $3, $4) \
             RETURNING id, role_id, permission_id, creator_id, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(role_id)
        .bind(permission_id)
        .bind(creator_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(link)
    }

    async fn revoke_permission(&self, role_id: Uuid, permission_id: Uuid) -> StoreResult<()> {
        let result =
            sqlx::query("DELETE FROM role_permissions WHERE role_id = $1 AND permission_id = $2")
                .bind(role_id)
                .bind(permission_id)
                .execute(&self.pool)
                .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("role permission".to_string()));
        }
        Ok(())
    }

    // ===== Permissions =====

    async fn list_permissions(&self, page: &PageRequest) -> StoreResult<Page<Permission>> {
        let pattern = like_pattern(page);
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM permissions WHERE name ILIKE $1 OR resource ILIKE $1",
        )
        .bind(&pattern)
        .fetch_one(&self.pool)
        .await?;
        let items = sqlx::query_as::<_, Permission>(
            "SELECT id, name, resource FROM permissions \
             WHERE name ILIKE $1 OR resource ILIKE $1 ORDER BY resource LIMIT $2 OFFSET $3",
        )
        .bind(&pattern)
        .bind(i64::from(page.page_size()))
        .bind(i64::from(page.offset()))
        .fetch_all(&self.pool)
        .await?;
        Ok(Page::new(items, total as u64, page))
    }

    async fn create_permission(&self, input: NewPermission) -> StoreResult<Permission> {
        let permission = sqlx::query_as::<_, Permission>(
            "INSERT INTO permissions (id, name, resource) VALUES ($1, $2, $3) \
             RETURNING id, name, resource",
        )
        .bind(Uuid::new_v4())
        .bind(&input.name)
        .bind(&input.resource)
        .fetch_one(&self.pool)
        .await?;
        Ok(permission)
    }

    async fn delete_permission(&self, id: Uuid) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM role_permissions WHERE permission_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM permissions WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(not_found("permission", id));
        }
        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl TokenStore for PgStore {
    async fn record_issued(&self, token: NewTokenRecord) -> StoreResult<TokenRecord> {
        let record = token.into_record();
        sqlx::query(
            "INSERT INTO tokens (id, jti, token_type, user_identity, revoked, expires) \
             VALUES ($1, $2, $3, $4, FALSE, $5)",
        )
        .bind(record.id)
        .bind(&record.jti)
        .bind(&record.token_type)
        .bind(&record.user_identity)
        .bind(record.expires)
        .execute(&self.pool)
        .await?;
        Ok(record)
    }

    async fn find_by_jti(&self, jti: &str) -> StoreResult<Option<TokenRecord>> {
        let record = sqlx::query_as::<_, TokenRecord>(
            "SELECT id, jti, token_type, user_identity, revoked, expires FROM tokens WHERE jti = $1",
        )
        .bind(jti)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    async fn revoke(&self, jti: &str) -> StoreResult<()> {
        sqlx::query("UPDATE tokens SET revoked = TRUE WHERE jti = $1")
            .bind(jti)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn revoke_all(&self, identities: &[String]) -> StoreResult<u64> {
        let result = sqlx::query(
            "UPDATE tokens SET revoked = TRUE WHERE user_identity = ANY($1) AND revoked = FALSE",
        )
        .bind(identities)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn revoke_all_except(&self, identity: &str, keep: &[String]) -> StoreResult<u64> {
        let result = sqlx::query(
            "UPDATE tokens SET revoked = TRUE \
             WHERE user_identity = $1 AND jti <> ALL($2) AND revoked = FALSE",
        )
        .bind(identity)
        .bind(keep)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn prune_expired(&self, now: i64) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM tokens WHERE expires < $1")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl TicketStore for PgStore {
    async fn list_questions(&self, query: &QuestionQuery) -> StoreResult<Page<Question>> {
        let page = query.page_request();
        let pattern = like_pattern(&page);
        let status = query.status.map(|s| s.as_str());
        let filter = "(title ILIKE $1 OR COALESCE(description, '') ILIKE $1) \
                      AND ($2::text IS NULL OR status = $2) \
                      AND ($3::uuid IS NULL OR assignee_user_id = $3)";

        let count_sql = format!("SELECT COUNT(*) FROM questions WHERE {}", filter);
        let total: i64 = sqlx::query_scalar(&count_sql)
            .bind(&pattern)
            .bind(status)
            .bind(query.assignee_user_id)
            .fetch_one(&self.pool)
            .await?;

        let sql = format!(
            "SELECT {} FROM questions WHERE {} \
             ORDER BY created_at DESC, id LIMIT $4 OFFSET $5",
            QUESTION_COLUMNS, filter
        );
        let items = sqlx::query_as::<_, Question>(&sql)
            .bind(&pattern)
            .bind(status)
            .bind(query.assignee_user_id)
            .bind(i64::from(page.page_size()))
            .bind(i64::from(page.offset()))
            .fetch_all(&self.pool)
            .await?;

        Ok(Page::new(items, total as u64, &page))
    }

    async fn find_question(&self, id: Uuid) -> StoreResult<Option<Question>> {
        let sql = format!("SELECT {} FROM questions WHERE id = $1", QUESTION_COLUMNS);
        let question = sqlx::query_as::<_, Question>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(question)
    }

    async fn create_question(&self, input: NewQuestion) -> StoreResult<Question> {
        let sql = format!(
            "INSERT INTO questions (id, title, description, status, creator_id) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            QUESTION_COLUMNS
        );
        let question = sqlx::query_as::<_, Question>(&sql)
            .bind(Uuid::new_v4())
            .bind(&input.title)
            .bind(&input.description)
            .bind(QuestionStatus::Open.as_str())
            .bind(input.creator_id)
            .fetch_one(&self.pool)
            .await?;
        debug!(question_id = %question.id, "질문 생성");
        Ok(question)
    }

    async fn update_question(&self, id: Uuid, input: UpdateQuestion) -> StoreResult<Question> {
        let sql = format!(
            r#"
            UPDATE questions SET
                title = COALESCE($2, title),
                description = COALESCE($3, description),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            QUESTION_COLUMNS
        );
        sqlx::query_as::<_, Question>(&sql)
            .bind(id)
            .bind(input.title)
            .bind(input.description)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| not_found("question", id))
    }

    async fn delete_question(&self, id: Uuid) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM question_comments WHERE question_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM question_histories WHERE question_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM questions WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(not_found("question", id));
        }
        tx.commit().await?;
        Ok(())
    }

    async fn assign_question(
        &self,
        id: Uuid,
        assignee_user_id: Uuid,
        actor_id: Option<Uuid>,
    ) -> StoreResult<Question> {
        if self.find_user(assignee_user_id).await?.is_none() {
            return Err(not_found("user", assignee_user_id));
        }

        let mut tx = self.pool.begin().await?;
        let sql = format!(
            "UPDATE questions SET assignee_user_id = $2, updated_at = NOW() \
             WHERE id = $1 RETURNING {}",
            QUESTION_COLUMNS
        );
        let question = sqlx::query_as::<_, Question>(&sql)
            .bind(id)
            .bind(assignee_user_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| not_found("question", id))?;
        insert_history(&mut *tx, &question, HistoryKind::Assigned, actor_id).await?;
        tx.commit().await?;
        Ok(question)
    }

    async fn set_question_status(
        &self,
        id: Uuid,
        status: QuestionStatus,
        actor_id: Option<Uuid>,
    ) -> StoreResult<Question> {
        let mut tx = self.pool.begin().await?;
        let sql = format!(
            "UPDATE questions SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
            QUESTION_COLUMNS
        );
        let question = sqlx::query_as::<_, Question>(&sql)
            .bind(id)
            .bind(status.as_str())
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| not_found("question", id))?;
        insert_history(&mut *tx, &question, HistoryKind::StatusChanged, actor_id).await?;
        tx.commit().await?;
        Ok(question)
    }

    async fn list_comments(
        &self,
        question_id: Uuid,
        page: &PageRequest,
    ) -> StoreResult<Page<Comment>> {
        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM question_comments WHERE question_id = $1")
                .bind(question_id)
                .fetch_one(&self.pool)
                .await?;
        let items = sqlx::query_as::<_, Comment>(
            "SELECT id, question_id, sender_id, content, created_at FROM question_comments \
             WHERE question_id = $1 ORDER BY created_at DESC, id LIMIT $2 OFFSET $3",
        )
        .bind(question_id)
        .bind(i64::from(page.page_size()))
        .bind(i64::from(page.offset()))
        .fetch_all(&self.pool)
        .await?;
        Ok(Page::new(items, total as u64, page))
    }

    async fn add_comment(&self, input: NewComment) -> StoreResult<Comment> {
        sqlx::query_as::<_, Comment>(
            "INSERT INTO question_comments (id, question_id, sender_id, content) \
             VALUES ($1, $2, $3, $4) \
             RETURNING id, question_id, sender_id, content, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(input.question_id)
        .bind(input.sender_id)
        .bind(&input.content)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                not_found("question", input.question_id)
            } else {
                StoreError::from(e)
            }
        })
    }

    async fn list_history(
        &self,
        question_id: Uuid,
        page: &PageRequest,
    ) -> StoreResult<Page<QuestionHistory>> {
        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM question_histories WHERE question_id = $1")
                .bind(question_id)
                .fetch_one(&self.pool)
                .await?;
        let sql = format!(
            "SELECT {} FROM question_histories WHERE question_id = $1 \
             ORDER BY created_at, id LIMIT $2 OFFSET $3",
            HISTORY_COLUMNS
        );
        let items = sqlx::query_as::<_, QuestionHistory>(&sql)
            .bind(question_id)
            .bind(i64::from(page.page_size()))
            .bind(i64::from(page.offset()))
            .fetch_all(&self.pool)
            .await?;
        Ok(Page::new(items, total as u64, page))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        let page = PageRequest {
            page: None,
            page_size: None,
            search: Some(" 50%_Off ".to_string()),
        };
        assert_eq!(like_pattern(&page), "%50\\%\\_off%");
        assert_eq!(like_pattern(&PageRequest::default()), "%");
    }
}
