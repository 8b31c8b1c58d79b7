//! Inputs and results of pipeline operations.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{
    Actor, Content, ContentState, GeneratedComment, PostingEvent, PostingStatus, Transaction,
};

/// Triage verdict for an ingested item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ClassifyDecision {
    /// Move the item on to opportunity review.
    #[serde(alias = "move_to_opportunity_review")]
    Advance,
    /// Trash the item.
    #[serde(alias = "trash")]
    Reject,
}

impl ClassifyDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClassifyDecision::Advance => "advance",
            ClassifyDecision::Reject => "reject",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClassifyCommand {
    pub decision: ClassifyDecision,
    pub actor: Actor,
    pub details: Map<String, JsonValue>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DraftCommand {
    pub draft_text: String,
    pub model_name: String,
    pub model_temperature: Option<f64>,
    pub prompt_version: Option<String>,
    pub safety_flags: JsonValue,
    pub is_selected: bool,
    pub actor: Actor,
}

/// Publication outcome reported by the browser extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ExtensionStatus {
    Submitted,
    Deleted,
}

impl From<ExtensionStatus> for PostingStatus {
    fn from(status: ExtensionStatus) -> Self {
        match status {
            ExtensionStatus::Submitted => PostingStatus::Submitted,
            ExtensionStatus::Deleted => PostingStatus::Deleted,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExtensionReport {
    pub status: ExtensionStatus,
    pub generated_comment_id: Option<Uuid>,
    pub error_message: Option<String>,
    pub actor: Actor,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct IntakeOutcome {
    /// `false` when the item had already been ingested.
    pub created: bool,
    pub content: Content,
    pub content_state: ContentState,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DraftOutcome {
    pub generated_comment: GeneratedComment,
    pub content_state: ContentState,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ExtensionOutcome {
    pub posting_event: PostingEvent,
    /// Audit rows actually written; empty if the best-effort append failed.
    pub transactions: Vec<Transaction>,
}
