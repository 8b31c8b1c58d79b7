//! Mutable pipeline position of a content item.
//!
//! Exactly one [`ContentState`] row exists per [`Content`](super::Content).
//! It is written only by the pipeline service, which addresses it by
//! `content_id`.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{ModelError, PipelineState};

/// Table holding one state row per content item.
pub const CONTENT_STATE_TABLE: &str = "content_state";

/// Review priority, 1 (highest) through 5 inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i16", into = "i16")]
pub struct Priority(i16);

impl Priority {
    pub const MIN: i16 = 1;
    pub const MAX: i16 = 5;

    pub fn new(value: i16) -> Result<Self, ModelError> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Self(value))
        } else {
            Err(ModelError::PriorityOutOfRange(value))
        }
    }

    pub fn get(self) -> i16 {
        self.0
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self(3)
    }
}

impl TryFrom<i16> for Priority {
    type Error = ModelError;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Priority> for i16 {
    fn from(priority: Priority) -> Self {
        priority.0
    }
}

/// Where a content item currently sits in the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ContentState {
    pub content_id: Uuid,
    pub state: PipelineState,
    #[serde(default)]
    pub is_trashed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trashed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trashed_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trashed_by_user_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<Uuid>,
    #[serde(default)]
    #[schema(value_type = i16, minimum = 1, maximum = 5)]
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ContentState {
    /// Builds the initial `ingested` state for a freshly created content row.
    pub fn new(content_id: Uuid, priority: i16) -> Result<Self, ModelError> {
        Ok(Self {
            content_id,
            state: PipelineState::Ingested,
            is_trashed: false,
            trashed_at: None,
            trashed_reason: None,
            trashed_by_user_id: None,
            assigned_to: None,
            priority: Priority::new(priority)?,
            ai_confidence: None,
            last_transition_at: None,
            updated_at: None,
        })
    }

    /// Checks the guard shared by every pipeline transition: not trashed and
    /// currently in `expected`. Trashing wins over a state mismatch.
    pub fn check_transition(&self, expected: PipelineState) -> Result<(), GuardViolation> {
        if self.is_trashed {
            return Err(GuardViolation::AlreadyTrashed);
        }
        if self.state != expected {
            return Err(GuardViolation::WrongState {
                expected,
                actual: self.state,
            });
        }
        Ok(())
    }
}

/// Which transition guard rejected an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardViolation {
    AlreadyTrashed,
    WrongState {
        expected: PipelineState,
        actual: PipelineState,
    },
    /// The guarded write matched no row although a fresh read satisfies the
    /// guard: another writer moved the item in between.
    ConcurrentModification,
}

impl fmt::Display for GuardViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GuardViolation::AlreadyTrashed => f.write_str("Content is already trashed"),
            GuardViolation::WrongState { expected, actual } => {
                write!(f, "Content must be in {expected} (currently {actual})")
            }
            GuardViolation::ConcurrentModification => {
                f.write_str("Content state changed concurrently")
            }
        }
    }
}

/// Partial update applied to a [`ContentState`] row by a transition.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<PipelineState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_trashed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trashed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trashed_reason: Option<String>,
    pub last_transition_at: DateTime<Utc>,
}

impl StatePatch {
    pub fn move_to(state: PipelineState, now: DateTime<Utc>) -> Self {
        Self {
            state: Some(state),
            last_transition_at: now,
            ..Self::empty(now)
        }
    }

    pub fn trash(reason: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            is_trashed: Some(true),
            trashed_at: Some(now),
            trashed_reason: Some(reason.into()),
            ..Self::empty(now)
        }
    }

    fn empty(now: DateTime<Utc>) -> Self {
        Self {
            state: None,
            is_trashed: None,
            trashed_at: None,
            trashed_reason: None,
            last_transition_at: now,
        }
    }
}
