//! 헬프데스크 질문(티켓)과 댓글, 처리 이력.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 질문 처리 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa-support", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum QuestionStatus {
    Open,
    InProgress,
    Resolved,
    Closed,
}

impl QuestionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionStatus::Open => "open",
            QuestionStatus::InProgress => "in_progress",
            QuestionStatus::Resolved => "resolved",
            QuestionStatus::Closed => "closed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "open" => Some(QuestionStatus::Open),
            "in_progress" => Some(QuestionStatus::InProgress),
            "resolved" => Some(QuestionStatus::Resolved),
            "closed" => Some(QuestionStatus::Closed),
            _ => None,
        }
    }
}

impl std::fmt::Display for QuestionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 접수된 질문.
///
/// `status`와 `assignee_user_id`는 전용 endpoint로만 바뀌며
/// 바뀔 때마다 [`QuestionHistory`] 행이 남습니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx-support", derive(sqlx::FromRow))]
#[cfg_attr(feature = "utoipa-support", derive(utoipa::ToSchema))]
pub struct Question {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    /// `open` | `in_progress` | `resolved` | `closed`
    pub status: String,
    pub creator_id: Option<Uuid>,
    pub assignee_user_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Question {
    pub fn status(&self) -> Option<QuestionStatus> {
        QuestionStatus::parse(&self.status)
    }
}

/// 질문에 달린 댓글.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx-support", derive(sqlx::FromRow))]
#[cfg_attr(feature = "utoipa-support", derive(utoipa::ToSchema))]
pub struct Comment {
    pub id: Uuid,
    pub question_id: Uuid,
    pub sender_id: Option<Uuid>,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// 이력 종류.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa-support", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum HistoryKind {
    /// 상태 변경
    StatusChanged,
    /// 담당자 지정
    Assigned,
}

impl HistoryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryKind::StatusChanged => "status_changed",
            HistoryKind::Assigned => "assigned",
        }
    }
}

/// 상태 변경/담당자 지정 이력 행.
///
/// `status`와 `assignee_user_id`는 변경 직후의 값입니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx-support", derive(sqlx::FromRow))]
#[cfg_attr(feature = "utoipa-support", derive(utoipa::ToSchema))]
pub struct QuestionHistory {
    pub id: Uuid,
    pub question_id: Uuid,
    /// `status_changed` | `assigned`
    pub kind: String,
    pub status: String,
    pub assignee_user_id: Option<Uuid>,
    /// 변경을 수행한 사용자
    pub creator_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}
