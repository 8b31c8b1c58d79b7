//! # Data Models
//!
//! Typed records exchanged with the relational store, plus the
//! construction-time checks that keep them valid.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

pub mod content;
pub mod content_state;
pub mod enums;
pub mod generated_comment;
pub mod posting_event;
pub mod transaction;

pub use content::{CONTENT_TABLE, Content, NewContent};
pub use content_state::{CONTENT_STATE_TABLE, ContentState, GuardViolation, Priority, StatePatch};
pub use enums::{ActionType, ActorType, ContentSource, PipelineState, PostingStatus};
pub use generated_comment::{GENERATED_COMMENTS_TABLE, GeneratedComment, NewGeneratedComment};
pub use posting_event::{NewPostingEvent, POSTING_EVENTS_TABLE, PostingEvent};
pub use transaction::{Actor, NewTransaction, TRANSACTIONS_TABLE, Transaction, TransactionBuilder};

/// Validation failures raised while constructing a record, before any store
/// call is made.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("priority must be between 1 and 5, got {0}")]
    PriorityOutOfRange(i16),
    #[error("state_moved transactions require from_state and to_state")]
    StateMovedWithoutStates,
    #[error("{field} must not be empty")]
    EmptyField { field: &'static str },
    #[error("{field} must be a JSON object")]
    NotAnObject { field: &'static str },
    #[error("unknown pipeline state '{0}'")]
    UnknownState(String),
}

pub(crate) fn require_non_blank(field: &'static str, value: &str) -> Result<(), ModelError> {
    if value.trim().is_empty() {
        Err(ModelError::EmptyField { field })
    } else {
        Ok(())
    }
}

/// Basic service information response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ServiceInfo {
    /// The name of the service
    pub service: String,
    /// The version of the service
    pub version: String,
}

impl Default for ServiceInfo {
    fn default() -> Self {
        Self {
            service: "content-pipeline".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
