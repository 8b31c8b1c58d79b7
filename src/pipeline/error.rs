use thiserror::Error;
use uuid::Uuid;

use crate::models::{GuardViolation, ModelError};
use crate::store::StoreError;

/// Outcome of a rejected pipeline operation.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid input: {0}")]
    Validation(#[from] ModelError),
    #[error("content {content_id} not found")]
    NotFound { content_id: Uuid },
    #[error("{0}")]
    Conflict(GuardViolation),
    #[error("store unavailable: {0}")]
    Upstream(#[from] StoreError),
}

impl PipelineError {
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Validation(_) => "validation",
            PipelineError::NotFound { .. } => "not_found",
            PipelineError::Conflict(_) => "conflict",
            PipelineError::Upstream(_) => "upstream",
        }
    }
}

impl From<GuardViolation> for PipelineError {
    fn from(violation: GuardViolation) -> Self {
        PipelineError::Conflict(violation)
    }
}
