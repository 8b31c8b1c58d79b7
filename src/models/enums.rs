//! Closed vocabularies shared by every pipeline record.
//!
//! Each enum serializes to the lowercase snake_case literal stored in the
//! relational store, so rows round-trip through `serde_json` without any
//! string handling at call sites.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::ModelError;

/// Platform a piece of content was scraped from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ContentSource {
    Reddit,
    X,
    Youtube,
}

impl ContentSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentSource::Reddit => "reddit",
            ContentSource::X => "x",
            ContentSource::Youtube => "youtube",
        }
    }
}

/// Editorial stage of a content item.
///
/// The stages form a line; trashing is tracked separately on
/// [`ContentState`](super::ContentState) and is not a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Ingested,
    OpportunityReview,
    DraftingQueue,
    ApprovalReview,
    ReadyToPublish,
}

impl PipelineState {
    pub const ALL: [PipelineState; 5] = [
        PipelineState::Ingested,
        PipelineState::OpportunityReview,
        PipelineState::DraftingQueue,
        PipelineState::ApprovalReview,
        PipelineState::ReadyToPublish,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineState::Ingested => "ingested",
            PipelineState::OpportunityReview => "opportunity_review",
            PipelineState::DraftingQueue => "drafting_queue",
            PipelineState::ApprovalReview => "approval_review",
            PipelineState::ReadyToPublish => "ready_to_publish",
        }
    }
}

impl FromStr for PipelineState {
    type Err = ModelError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        PipelineState::ALL
            .into_iter()
            .find(|state| state.as_str() == value)
            .ok_or_else(|| ModelError::UnknownState(value.to_string()))
    }
}

/// Kind of audit record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Ingested,
    Classified,
    StateMoved,
    CommentGenerated,
    CommentRegenerated,
    Approved,
    Rejected,
    Posted,
    Trashed,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::Ingested => "ingested",
            ActionType::Classified => "classified",
            ActionType::StateMoved => "state_moved",
            ActionType::CommentGenerated => "comment_generated",
            ActionType::CommentRegenerated => "comment_regenerated",
            ActionType::Approved => "approved",
            ActionType::Rejected => "rejected",
            ActionType::Posted => "posted",
            ActionType::Trashed => "trashed",
        }
    }
}

/// Kind of principal performing an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ActorType {
    System,
    Agent,
    User,
}

impl ActorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActorType::System => "system",
            ActorType::Agent => "agent",
            ActorType::User => "user",
        }
    }
}

/// Outcome reported for one publication attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PostingStatus {
    Opened,
    Autofilled,
    Submitted,
    Failed,
    Deleted,
}

impl PostingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostingStatus::Opened => "opened",
            PostingStatus::Autofilled => "autofilled",
            PostingStatus::Submitted => "submitted",
            PostingStatus::Failed => "failed",
            PostingStatus::Deleted => "deleted",
        }
    }
}

macro_rules! display_as_str {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(self.as_str())
                }
            }
        )+
    };
}

display_as_str!(ContentSource, PipelineState, ActionType, ActorType, PostingStatus);
