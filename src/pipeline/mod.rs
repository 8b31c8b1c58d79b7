//! # Pipeline State Machine
//!
//! The single authority on legal transitions for a content item:
//!
//! ```text
//! ingested -> opportunity_review -> drafting_queue -> approval_review -> ready_to_publish
//! ```
//!
//! Trashing is a side flag settable from any stage and absorbing for every
//! guarded transition. Each transition commits with one targeted write to
//! `content_state` whose filter carries the guard, so a concurrent caller that
//! loses the race sees a conflict instead of repeating the transition. The
//! audit rows describing the transition are appended afterwards on a
//! best-effort basis (see [`AuditLog::record`]).

use std::sync::Arc;

use chrono::Utc;
use metrics::counter;
use serde_json::{Map, Value as JsonValue};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::audit::AuditLog;
use crate::models::{
    ActionType, Actor, Content, ContentState, GuardViolation, NewContent, NewGeneratedComment,
    NewPostingEvent, NewTransaction, PipelineState, Priority, StatePatch,
};
use crate::repositories::{
    ContentRepository, ContentStateRepository, GeneratedCommentRepository,
    PostingEventRepository, QueueRepository,
};
use crate::store::{Row, Store, StoreError};

pub mod commands;
pub mod error;

pub use commands::{
    ClassifyCommand, ClassifyDecision, DraftCommand, DraftOutcome, ExtensionOutcome,
    ExtensionReport, ExtensionStatus, IntakeOutcome,
};
pub use error::PipelineError;

/// Trash reason recorded when triage rejects without giving one.
pub const DEFAULT_REJECT_REASON: &str = "scraper_triage_rejected";
/// Trash reason recorded when the extension reports the post deleted.
pub const DELETED_BY_EXTENSION: &str = "deleted_by_extension";

pub struct PipelineService {
    contents: ContentRepository,
    states: ContentStateRepository,
    comments: GeneratedCommentRepository,
    postings: PostingEventRepository,
    queues: QueueRepository,
    audit: AuditLog,
}

impl PipelineService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            contents: ContentRepository::new(store.clone()),
            states: ContentStateRepository::new(store.clone()),
            comments: GeneratedCommentRepository::new(store.clone()),
            postings: PostingEventRepository::new(store.clone()),
            queues: QueueRepository::new(store.clone()),
            audit: AuditLog::new(store),
        }
    }

    /// Ingests an item, or returns the existing record for its
    /// `(source, source_content_id)` without writing anything.
    #[instrument(
        skip_all,
        fields(source = %content.source, source_content_id = %content.source_content_id)
    )]
    pub async fn intake(
        &self,
        content: NewContent,
        actor: Actor,
    ) -> Result<IntakeOutcome, PipelineError> {
        content.validate()?;

        if let Some(existing) = self
            .contents
            .find_by_source_key(content.source, &content.source_content_id)
            .await?
        {
            return self.existing_intake(existing, &actor).await;
        }

        let created = match self.contents.insert(&content).await {
            Ok(created) => created,
            Err(err @ StoreError::UniqueViolation { .. }) => {
                debug!("Concurrent intake won the insert; returning its record");
                return match self
                    .contents
                    .find_by_source_key(content.source, &content.source_content_id)
                    .await?
                {
                    Some(existing) => self.existing_intake(existing, &actor).await,
                    None => Err(err.into()),
                };
            }
            Err(err) => return Err(err.into()),
        };

        let content_state = self.create_initial_state(&created, &actor).await?;
        counter!("intake_total", "created" => "true").increment(1);
        info!(content_id = %created.id, "Content ingested");

        Ok(IntakeOutcome {
            created: true,
            content: created,
            content_state,
        })
    }

    async fn existing_intake(
        &self,
        content: Content,
        actor: &Actor,
    ) -> Result<IntakeOutcome, PipelineError> {
        let content_state = match self.states.find(content.id).await? {
            Some(state) => state,
            None => {
                // An earlier intake stored the content but failed before its state row.
                warn!(content_id = %content.id, "Completing interrupted intake");
                self.create_initial_state(&content, actor).await?
            }
        };
        counter!("intake_total", "created" => "false").increment(1);
        debug!(content_id = %content.id, "Duplicate intake ignored");

        Ok(IntakeOutcome {
            created: false,
            content,
            content_state,
        })
    }

    async fn create_initial_state(
        &self,
        content: &Content,
        actor: &Actor,
    ) -> Result<ContentState, PipelineError> {
        let initial = ContentState::new(content.id, Priority::default().get())?;
        let ingested = NewTransaction::builder(content.id, ActionType::Ingested, actor)
            .detail("source", content.source.as_str())
            .build()?;

        let state = match self.states.insert(&initial).await {
            Ok(state) => state,
            Err(err @ StoreError::UniqueViolation { .. }) => {
                // A concurrent intake created and logged the row first.
                return self
                    .states
                    .find(content.id)
                    .await?
                    .ok_or_else(|| err.into());
            }
            Err(err) => return Err(err.into()),
        };
        self.audit.record(content.id, vec![ingested]).await;
        Ok(state)
    }

    /// Triage of an `ingested` item: advance it to opportunity review or
    /// trash it.
    #[instrument(skip(self, command), fields(decision = command.decision.as_str()))]
    pub async fn classify(
        &self,
        content_id: Uuid,
        command: ClassifyCommand,
    ) -> Result<ContentState, PipelineError> {
        let from = PipelineState::Ingested;
        let now = Utc::now();
        let actor = &command.actor;

        let classified = NewTransaction::builder(content_id, ActionType::Classified, actor)
            .detail("decision", command.decision.as_str())
            .details(command.details)
            .build()?;

        let (patch, follow_up) = match command.decision {
            ClassifyDecision::Advance => {
                let to = PipelineState::OpportunityReview;
                (
                    StatePatch::move_to(to, now),
                    NewTransaction::state_moved(
                        content_id,
                        actor,
                        from,
                        to,
                        via("scraper_classification"),
                    ),
                )
            }
            ClassifyDecision::Reject => {
                let reason = command
                    .reason
                    .unwrap_or_else(|| DEFAULT_REJECT_REASON.to_string());
                let trashed = NewTransaction::builder(content_id, ActionType::Trashed, actor)
                    .from_state(from)
                    .detail("reason", reason.as_str())
                    .build()?;
                (StatePatch::trash(reason, now), trashed)
            }
        };

        let updated = self
            .transition(content_id, from, &patch, "classify")
            .await?;
        self.audit
            .record(content_id, vec![classified, follow_up])
            .await;

        Ok(updated)
    }

    /// Stores a drafted reply for an item in the drafting queue and moves it
    /// to approval review.
    #[instrument(skip(self, command), fields(model_name = %command.model_name))]
    pub async fn generate_comment(
        &self,
        content_id: Uuid,
        command: DraftCommand,
    ) -> Result<DraftOutcome, PipelineError> {
        let from = PipelineState::DraftingQueue;
        let to = PipelineState::ApprovalReview;
        let actor = command.actor;

        let draft = NewGeneratedComment {
            content_id,
            draft_text: command.draft_text,
            model_name: command.model_name,
            model_temperature: command.model_temperature,
            prompt_version: command.prompt_version,
            safety_flags: command.safety_flags,
            is_selected: command.is_selected,
            generated_by_actor: actor.kind,
        };
        draft.validate()?;
        let generated = NewTransaction::builder(content_id, ActionType::CommentGenerated, &actor)
            .detail("model_name", draft.model_name.as_str())
            .build()?;
        let moved = NewTransaction::state_moved(content_id, &actor, from, to, via("comment_subagent"));

        // Check before inserting so a rejected call leaves no draft behind.
        let current = self
            .states
            .find(content_id)
            .await?
            .ok_or(PipelineError::NotFound { content_id })?;
        if let Err(violation) = current.check_transition(from) {
            return Err(self.rejected("generate_comment", content_id, violation.into()));
        }

        let generated_comment = self.comments.insert(&draft).await?;
        let content_state = self
            .transition(content_id, from, &StatePatch::move_to(to, Utc::now()), "generate_comment")
            .await
            .inspect_err(|_| {
                warn!(
                    %content_id,
                    generated_comment_id = %generated_comment.id,
                    "Draft stored but the state moved concurrently"
                );
            })?;
        self.audit.record(content_id, vec![generated, moved]).await;

        Ok(DraftOutcome {
            generated_comment,
            content_state,
        })
    }

    /// Records a publication outcome reported by the browser extension.
    /// A `deleted` report trashes the item whatever its stage.
    #[instrument(skip(self, report), fields(status = ?report.status))]
    pub async fn extension_status(
        &self,
        content_id: Uuid,
        report: ExtensionReport,
    ) -> Result<ExtensionOutcome, PipelineError> {
        let current = self
            .states
            .find(content_id)
            .await?
            .ok_or(PipelineError::NotFound { content_id })?;

        let posting_event = self
            .postings
            .insert(&NewPostingEvent {
                content_id,
                generated_comment_id: report.generated_comment_id,
                status: report.status.into(),
                error_message: report.error_message,
            })
            .await?;
        let event_id = posting_event.id.to_string();

        let rows = match report.status {
            ExtensionStatus::Submitted => {
                vec![
                    NewTransaction::builder(content_id, ActionType::Posted, &report.actor)
                        .detail("posting_event_id", event_id)
                        .build()?,
                ]
            }
            ExtensionStatus::Deleted => {
                let updated = self
                    .states
                    .update_unguarded(content_id, &StatePatch::trash(DELETED_BY_EXTENSION, Utc::now()))
                    .await?;
                let from_state = updated.as_ref().map_or(current.state, |state| state.state);
                let snapshot = serde_json::to_value(&updated).map_err(StoreError::Encode)?;
                info!(%content_id, from = %from_state, "Content trashed by extension");

                vec![
                    NewTransaction::builder(content_id, ActionType::Trashed, &report.actor)
                        .from_state(from_state)
                        .detail("reason", DELETED_BY_EXTENSION)
                        .detail("posting_event_id", event_id)
                        .detail("updated_state", snapshot)
                        .build()?,
                ]
            }
        };

        let transactions = self.audit.record(content_id, rows).await;
        Ok(ExtensionOutcome {
            posting_event,
            transactions,
        })
    }

    /// Lists one page of the read projection for `state`.
    pub async fn list_queue(
        &self,
        state: PipelineState,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Row>, PipelineError> {
        Ok(self.queues.list(state, limit, offset).await?)
    }

    /// Performs the guarded write. When it matches no row, re-reads to tell
    /// the caller which guard failed.
    async fn transition(
        &self,
        content_id: Uuid,
        from: PipelineState,
        patch: &StatePatch,
        operation: &'static str,
    ) -> Result<ContentState, PipelineError> {
        if let Some(updated) = self.states.update_guarded(content_id, from, patch).await? {
            counter!("pipeline_transitions_total", "operation" => operation, "outcome" => "applied")
                .increment(1);
            info!(
                %content_id,
                operation,
                from = %from,
                to = %updated.state,
                trashed = updated.is_trashed,
                "Pipeline transition applied"
            );
            return Ok(updated);
        }

        let error = match self.states.find(content_id).await? {
            None => PipelineError::NotFound { content_id },
            Some(state) => match state.check_transition(from) {
                Err(violation) => violation.into(),
                Ok(()) => GuardViolation::ConcurrentModification.into(),
            },
        };
        Err(self.rejected(operation, content_id, error))
    }

    fn rejected(
        &self,
        operation: &'static str,
        content_id: Uuid,
        error: PipelineError,
    ) -> PipelineError {
        counter!("pipeline_transitions_total", "operation" => operation, "outcome" => error.kind())
            .increment(1);
        debug!(%content_id, operation, %error, "Pipeline transition rejected");
        error
    }
}

fn via(route: &str) -> Map<String, JsonValue> {
    let mut details = Map::new();
    details.insert("via".to_string(), JsonValue::from(route));
    details
}
