//! 질문(티켓) endpoint.
//!
//! 질문 본문 수정은 제목과 설명만 받습니다.
//! 상태와 담당자는 `/status`, `/assignee`로만 바뀌고 그때마다 이력이 남습니다.

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

use helpdesk_core::{Comment, Question, QuestionHistory, QuestionStatus};

use super::catalog::CatalogRouter;
use super::extract::{not_blank, ValidatedJson};
use super::groups::creator_of;
use crate::auth::JwtAuth;
use crate::error::{not_found, ApiResult};
use crate::repository::{
    NewComment, NewQuestion, Page, PageRequest, QuestionQuery, UpdateQuestion,
};
use crate::state::AppState;

pub const QUESTIONS_PATH: &str = "/api/v1/admin/questions";
pub const QUESTION_PATH: &str = "/api/v1/admin/questions/{question_id}";
pub const QUESTION_ASSIGNEE_PATH: &str = "/api/v1/admin/questions/{question_id}/assignee";
pub const QUESTION_STATUS_PATH: &str = "/api/v1/admin/questions/{question_id}/status";
pub const QUESTION_COMMENTS_PATH: &str = "/api/v1/admin/questions/{question_id}/comments";
pub const QUESTION_HISTORIES_PATH: &str = "/api/v1/admin/questions/{question_id}/histories";

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateQuestionRequest {
    #[validate(
        length(min = 1, max = 200, message = "제목은 1-200자여야 합니다"),
        custom(function = "not_blank")
    )]
    pub title: String,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
}

/// 질문 수정 요청. 여기에 없는 필드(상태, 담당자, 작성자)는 무시됩니다.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateQuestionRequest {
    #[validate(length(min = 1, max = 200), custom(function = "not_blank"))]
    pub title: Option<String>,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AssignQuestionRequest {
    pub assignee_user_id: Uuid,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct QuestionStatusRequest {
    pub status: QuestionStatus,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateCommentRequest {
    #[validate(
        length(min = 1, max = 2000, message = "댓글은 1-2000자여야 합니다"),
        custom(function = "not_blank")
    )]
    pub content: String,
}

async fn existing_question(state: &AppState, question_id: Uuid) -> ApiResult<Question> {
    state
        .tickets
        .find_question(question_id)
        .await?
        .ok_or_else(|| not_found(format!("question {}", question_id)))
}

/// GET /api/v1/admin/questions
///
/// `?status=&assignee_user_id=&search=`로 거를 수 있습니다.
pub async fn list_questions(
    State(state): State<Arc<AppState>>,
    Query(query): Query<QuestionQuery>,
) -> ApiResult<Json<Page<Question>>> {
    Ok(Json(state.tickets.list_questions(&query).await?))
}

/// POST /api/v1/admin/questions
pub async fn create_question(
    State(state): State<Arc<AppState>>,
    JwtAuth(claims): JwtAuth,
    ValidatedJson(request): ValidatedJson<CreateQuestionRequest>,
) -> ApiResult<(StatusCode, Json<Question>)> {
    let question = state
        .tickets
        .create_question(NewQuestion {
            title: request.title.trim().to_string(),
            description: request.description,
            creator_id: creator_of(&claims),
        })
        .await?;
    info!(question_id = %question.id, "질문 생성");
    Ok((StatusCode::CREATED, Json(question)))
}

/// GET /api/v1/admin/questions/{question_id}
pub async fn get_question(
    State(state): State<Arc<AppState>>,
    Path(question_id): Path<Uuid>,
) -> ApiResult<Json<Question>> {
    Ok(Json(existing_question(&state, question_id).await?))
}

/// PUT /api/v1/admin/questions/{question_id}
pub async fn update_question(
    State(state): State<Arc<AppState>>,
    Path(question_id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<UpdateQuestionRequest>,
) -> ApiResult<Json<Question>> {
    let question = state
        .tickets
        .update_question(
            question_id,
            UpdateQuestion {
                title: request.title.map(|t| t.trim().to_string()),
                description: request.description,
            },
        )
        .await?;
    Ok(Json(question))
}

/// DELETE /api/v1/admin/questions/{question_id}
pub async fn delete_question(
    State(state): State<Arc<AppState>>,
    Path(question_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.tickets.delete_question(question_id).await?;
    info!(%question_id, "질문 삭제");
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/v1/admin/questions/{question_id}/assignee
pub async fn assign_question(
    State(state): State<Arc<AppState>>,
    JwtAuth(claims): JwtAuth,
    Path(question_id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<AssignQuestionRequest>,
) -> ApiResult<Json<Question>> {
    let question = state
        .tickets
        .assign_question(question_id, request.assignee_user_id, creator_of(&claims))
        .await?;
    info!(%question_id, assignee = %request.assignee_user_id, "질문 담당자 지정");
    Ok(Json(question))
}

/// PUT /api/v1/admin/questions/{question_id}/status
pub async fn set_question_status(
    State(state): State<Arc<AppState>>,
    JwtAuth(claims): JwtAuth,
    Path(question_id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<QuestionStatusRequest>,
) -> ApiResult<Json<Question>> {
    let question = state
        .tickets
        .set_question_status(question_id, request.status, creator_of(&claims))
        .await?;
    info!(%question_id, status = %request.status, "질문 상태 변경");
    Ok(Json(question))
}

/// GET /api/v1/admin/questions/{question_id}/comments
pub async fn list_comments(
    State(state): State<Arc<AppState>>,
    Path(question_id): Path<Uuid>,
    Query(page): Query<PageRequest>,
) -> ApiResult<Json<Page<Comment>>> {
    existing_question(&state, question_id).await?;
    Ok(Json(state.tickets.list_comments(question_id, &page).await?))
}

/// POST /api/v1/admin/questions/{question_id}/comments
pub async fn add_comment(
    State(state): State<Arc<AppState>>,
    JwtAuth(claims): JwtAuth,
    Path(question_id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<CreateCommentRequest>,
) -> ApiResult<(StatusCode, Json<Comment>)> {
    let comment = state
        .tickets
        .add_comment(NewComment {
            question_id,
            sender_id: creator_of(&claims),
            content: request.content.trim().to_string(),
        })
        .await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

/// GET /api/v1/admin/questions/{question_id}/histories
pub async fn list_histories(
    State(state): State<Arc<AppState>>,
    Path(question_id): Path<Uuid>,
    Query(page): Query<PageRequest>,
) -> ApiResult<Json<Page<QuestionHistory>>> {
    existing_question(&state, question_id).await?;
    Ok(Json(state.tickets.list_history(question_id, &page).await?))
}

/// 질문 라우트.
pub fn question_routes() -> CatalogRouter<Arc<AppState>> {
    CatalogRouter::new()
        .get(QUESTIONS_PATH, list_questions)
        .post(QUESTIONS_PATH, create_question)
        .get(QUESTION_PATH, get_question)
        .put(QUESTION_PATH, update_question)
        .delete(QUESTION_PATH, delete_question)
        .put(QUESTION_ASSIGNEE_PATH, assign_question)
        .put(QUESTION_STATUS_PATH, set_question_status)
        .get(QUESTION_COMMENTS_PATH, list_comments)
        .post(QUESTION_COMMENTS_PATH, add_comment)
        .get(QUESTION_HISTORIES_PATH, list_histories)
}

#[cfg(test)]
mod tests {
    use super::super::testing::{admin_app, member_with, send, TestApp};
    use super::*;
    use serde_json::{json, Value};

    async fn create(t: &TestApp, title: &str) -> Value {
        let (status, body) = send(
            &t.app,
            "POST",
            QUESTIONS_PATH,
            Some(&t.token),
            Some(json!({"title": title, "description": "모니터가 켜지지 않습니다"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        body
    }

    #[tokio::test]
    async fn test_create_and_get_question() {
        let t = admin_app().await;
        let created = create(&t, "  Monitor broken ").await;
        assert_eq!(created["title"], "Monitor broken");
        assert_eq!(created["status"], "open");
        assert_eq!(created["creator_id"], t.admin_id.to_string());

        let uri = format!("{}/{}", QUESTIONS_PATH, created["id"].as_str().unwrap());
        let (status, body) = send(&t.app, "GET", &uri, Some(&t.token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], created["id"]);

        let missing = format!("{}/{}", QUESTIONS_PATH, Uuid::new_v4());
        let (status, _) = send(&t.app, "GET", &missing, Some(&t.token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_update_ignores_status_and_assignee() {
        let t = admin_app().await;
        let created = create(&t, "Printer jam").await;
        let uri = format!("{}/{}", QUESTIONS_PATH, created["id"].as_str().unwrap());

        let (status, body) = send(
            &t.app,
            "PUT",
            &uri,
            Some(&t.token),
            Some(json!({
                "title": "Printer jam on 3F",
                "status": "closed",
                "assignee_user_id": t.admin_id,
                "creator_id": Uuid::new_v4(),
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["title"], "Printer jam on 3F");
        assert_eq!(body["status"], "open");
        assert_eq!(body["assignee_user_id"], Value::Null);
        assert_eq!(body["creator_id"], t.admin_id.to_string());

        let (_, history) =
            send(&t.app, "GET", &format!("{}/histories", uri), Some(&t.token), None).await;
        assert_eq!(history["total"], 0);
    }

    #[tokio::test]
    async fn test_status_and_assignee_changes_are_recorded() {
        let t = admin_app().await;
        let agent = member_with(&t, "agent", &[]).await;
        let created = create(&t, "VPN down").await;
        let uri = format!("{}/{}", QUESTIONS_PATH, created["id"].as_str().unwrap());

        let (status, body) = send(
            &t.app,
            "PUT",
            &format!("{}/assignee", uri),
            Some(&t.token),
            Some(json!({"assignee_user_id": agent.user_id})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["assignee_user_id"], agent.user_id.to_string());

        let (status, body) = send(
            &t.app,
            "PUT",
            &format!("{}/status", uri),
            Some(&t.token),
            Some(json!({"status": "in_progress"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "in_progress");

        let (status, history) =
            send(&t.app, "GET", &format!("{}/histories", uri), Some(&t.token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(history["total"], 2);
        assert_eq!(history["items"][0]["kind"], "assigned");
        assert_eq!(history["items"][1]["kind"], "status_changed");
        assert_eq!(history["items"][1]["status"], "in_progress");
        assert_eq!(history["items"][1]["creator_id"], t.admin_id.to_string());
    }

    #[tokio::test]
    async fn test_invalid_status_and_unknown_assignee_are_rejected() {
        let t = admin_app().await;
        let created = create(&t, "VPN down").await;
        let uri = format!("{}/{}", QUESTIONS_PATH, created["id"].as_str().unwrap());

        let (status, _) = send(
            &t.app,
            "PUT",
            &format!("{}/status", uri),
            Some(&t.token),
            Some(json!({"status": "done"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            &t.app,
            "PUT",
            &format!("{}/assignee", uri),
            Some(&t.token),
            Some(json!({"assignee_user_id": Uuid::new_v4()})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, history) =
            send(&t.app, "GET", &format!("{}/histories", uri), Some(&t.token), None).await;
        assert_eq!(history["total"], 0);
    }

    #[tokio::test]
    async fn test_comments_newest_first() {
        let t = admin_app().await;
        let created = create(&t, "Printer jam").await;
        let comments = format!(
            "{}/{}/comments",
            QUESTIONS_PATH,
            created["id"].as_str().unwrap()
        );

        for content in ["첫 번째", "두 번째"] {
            let (status, body) = send(
                &t.app,
                "POST",
                &comments,
                Some(&t.token),
                Some(json!({"content": content})),
            )
            .await;
            assert_eq!(status, StatusCode::CREATED);
            assert_eq!(body["sender_id"], t.admin_id.to_string());
        }

        let (status, _) = send(
            &t.app,
            "POST",
            &comments,
            Some(&t.token),
            Some(json!({"content": "   "})),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (status, body) = send(&t.app, "GET", &comments, Some(&t.token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 2);
        assert_eq!(body["items"][0]["content"], "두 번째");
    }

    #[tokio::test]
    async fn test_comments_on_unknown_question_are_not_found() {
        let t = admin_app().await;
        let comments = format!("{}/{}/comments", QUESTIONS_PATH, Uuid::new_v4());

        let (status, _) = send(&t.app, "GET", &comments, Some(&t.token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send(
            &t.app,
            "POST",
            &comments,
            Some(&t.token),
            Some(json!({"content": "안녕하세요"})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_delete_question() {
        let t = admin_app().await;
        let created = create(&t, "Printer jam").await;
        let uri = format!("{}/{}", QUESTIONS_PATH, created["id"].as_str().unwrap());

        let (status, _) = send(&t.app, "DELETE", &uri, Some(&t.token), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = send(&t.app, "DELETE", &uri, Some(&t.token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_agent_limited_to_granted_question_routes() {
        let t = admin_app().await;
        let created = create(&t, "Printer jam").await;
        let agent = member_with(
            &t,
            "agent",
            &[
                "get@/api/v1/admin/questions",
                "post@/api/v1/admin/questions/{question_id}/comments",
            ],
        )
        .await;
        let access = agent.tokens.access_token.as_str();
        let id = created["id"].as_str().unwrap();

        let (status, body) = send(&t.app, "GET", QUESTIONS_PATH, Some(access), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 1);

        let (status, _) = send(
            &t.app,
            "POST",
            &format!("{}/{}/comments", QUESTIONS_PATH, id),
            Some(access),
            Some(json!({"content": "확인 중입니다"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = send(
            &t.app,
            "PUT",
            &format!("{}/{}/status", QUESTIONS_PATH, id),
            Some(access),
            Some(json!({"status": "closed"})),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["code"], "INSUFFICIENT_PERMISSION");

        let (status, _) = send(
            &t.app,
            "DELETE",
            &format!("{}/{}", QUESTIONS_PATH, id),
            Some(access),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_list_filters_by_status() {
        let t = admin_app().await;
        let first = create(&t, "Printer jam").await;
        create(&t, "VPN down").await;

        let uri = format!("{}/{}/status", QUESTIONS_PATH, first["id"].as_str().unwrap());
        send(&t.app, "PUT", &uri, Some(&t.token), Some(json!({"status": "resolved"}))).await;

        let (status, body) = send(
            &t.app,
            "GET",
            &format!("{}?status=resolved", QUESTIONS_PATH),
            Some(&t.token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 1);
        assert_eq!(body["items"][0]["title"], "Printer jam");
    }
}
