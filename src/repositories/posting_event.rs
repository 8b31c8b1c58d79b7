use std::sync::Arc;

use crate::models::{NewPostingEvent, POSTING_EVENTS_TABLE, PostingEvent};
use crate::store::{Store, StoreError, from_row, to_row};

/// Repository for the append-only posting event log
#[derive(Clone)]
pub struct PostingEventRepository {
    store: Arc<dyn Store>,
}

impl PostingEventRepository {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn insert(&self, event: &NewPostingEvent) -> Result<PostingEvent, StoreError> {
        let row = self
            .store
            .insert_one(POSTING_EVENTS_TABLE, to_row(event)?)
            .await?;
        from_row(row)
    }
}
