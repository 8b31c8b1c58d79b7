//! # Queue Projections
//!
//! Read-only listings of the per-state views maintained by the store. Each
//! view holds the non-trashed content currently in one pipeline state.

use std::sync::Arc;

use crate::models::PipelineState;
use crate::store::{ListQuery, Row, Store, StoreError};

/// Relation name of the read projection for `state`.
pub fn view_relation(state: PipelineState) -> &'static str {
    match state {
        PipelineState::Ingested => "v_ingested",
        PipelineState::OpportunityReview => "v_opportunity_review",
        PipelineState::DraftingQueue => "v_drafting_queue",
        PipelineState::ApprovalReview => "v_approval_review",
        PipelineState::ReadyToPublish => "v_ready_to_publish",
    }
}

/// Repository for queue listings
#[derive(Clone)]
pub struct QueueRepository {
    store: Arc<dyn Store>,
}

impl QueueRepository {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn list(
        &self,
        state: PipelineState,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Row>, StoreError> {
        self.store
            .list_rows(view_relation(state), &ListQuery::page(limit, offset))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn every_state_has_a_distinct_view() {
        let relations: HashSet<_> = PipelineState::ALL.into_iter().map(view_relation).collect();
        assert_eq!(relations.len(), PipelineState::ALL.len());
        assert_eq!(view_relation(PipelineState::ReadyToPublish), "v_ready_to_publish");
    }
}
