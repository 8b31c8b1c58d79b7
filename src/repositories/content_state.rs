//! # ContentState Repository
//!
//! Every write here is a single targeted update keyed by `content_id`.
//! Guarded transitions carry their precondition in the update filter, so the
//! store applies the write only if the row still satisfies it.

use std::sync::Arc;

use uuid::Uuid;

use crate::models::{CONTENT_STATE_TABLE, ContentState, PipelineState, StatePatch};
use crate::store::{Filter, IsValue, Store, StoreError, from_row, to_row};

/// Repository for content_state rows
#[derive(Clone)]
pub struct ContentStateRepository {
    store: Arc<dyn Store>,
}

impl ContentStateRepository {
    /// Create a new ContentStateRepository backed by the given store
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn find(&self, content_id: Uuid) -> Result<Option<ContentState>, StoreError> {
        self.store
            .get_one(CONTENT_STATE_TABLE, &[Filter::eq("content_id", content_id)])
            .await?
            .map(from_row)
            .transpose()
    }

    pub async fn insert(&self, state: &ContentState) -> Result<ContentState, StoreError> {
        let row = self
            .store
            .insert_one(CONTENT_STATE_TABLE, to_row(state)?)
            .await?;
        from_row(row)
    }

    /// Applies `patch` only if the row is still in `expected` and not
    /// trashed. Returns `None` when the guard no longer holds (or the row
    /// does not exist); callers diagnose which by re-reading.
    pub async fn update_guarded(
        &self,
        content_id: Uuid,
        expected: PipelineState,
        patch: &StatePatch,
    ) -> Result<Option<ContentState>, StoreError> {
        let filters = [
            Filter::eq("content_id", content_id),
            Filter::eq("state", expected),
            Filter::is("is_trashed", IsValue::False),
        ];
        self.update(&filters, patch).await
    }

    /// Applies `patch` to the row regardless of its current state.
    pub async fn update_unguarded(
        &self,
        content_id: Uuid,
        patch: &StatePatch,
    ) -> Result<Option<ContentState>, StoreError> {
        self.update(&[Filter::eq("content_id", content_id)], patch)
            .await
    }

    async fn update(
        &self,
        filters: &[Filter],
        patch: &StatePatch,
    ) -> Result<Option<ContentState>, StoreError> {
        let rows = self
            .store
            .update_rows(CONTENT_STATE_TABLE, filters, to_row(patch)?)
            .await?;
        rows.into_iter().next().map(from_row).transpose()
    }
}
