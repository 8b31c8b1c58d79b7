//! # Content Repository
//!
//! Lookup by business key and creation of `content` rows.

use std::sync::Arc;

use crate::models::{CONTENT_TABLE, Content, ContentSource, NewContent};
use crate::store::{Filter, Store, StoreError, from_row, to_row};

/// Repository for content rows
#[derive(Clone)]
pub struct ContentRepository {
    store: Arc<dyn Store>,
}

impl ContentRepository {
    /// Create a new ContentRepository backed by the given store
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Find content by its natural key `(source, source_content_id)`
    pub async fn find_by_source_key(
        &self,
        source: ContentSource,
        source_content_id: &str,
    ) -> Result<Option<Content>, StoreError> {
        let filters = [
            Filter::eq("source", source),
            Filter::eq("source_content_id", source_content_id),
        ];
        self.store
            .get_one(CONTENT_TABLE, &filters)
            .await?
            .map(from_row)
            .transpose()
    }

    /// Insert a new content row and return it as stored
    pub async fn insert(&self, content: &NewContent) -> Result<Content, StoreError> {
        let row = self.store.insert_one(CONTENT_TABLE, to_row(content)?).await?;
        from_row(row)
    }
}
