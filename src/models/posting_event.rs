//! Publication attempts reported by the browser extension.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::PostingStatus;

pub const POSTING_EVENTS_TABLE: &str = "posting_events";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PostingEvent {
    pub id: Uuid,
    pub content_id: Uuid,
    #[serde(default)]
    pub generated_comment_id: Option<Uuid>,
    pub status: PostingStatus,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub created_by: Option<Uuid>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewPostingEvent {
    pub content_id: Uuid,
    pub generated_comment_id: Option<Uuid>,
    pub status: PostingStatus,
    pub error_message: Option<String>,
}
