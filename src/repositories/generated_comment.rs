use std::sync::Arc;

use crate::models::{GENERATED_COMMENTS_TABLE, GeneratedComment, NewGeneratedComment};
use crate::store::{Store, StoreError, from_row, to_row};

/// Repository for drafted replies
#[derive(Clone)]
pub struct GeneratedCommentRepository {
    store: Arc<dyn Store>,
}

impl GeneratedCommentRepository {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn insert(
        &self,
        comment: &NewGeneratedComment,
    ) -> Result<GeneratedComment, StoreError> {
        let row = self
            .store
            .insert_one(GENERATED_COMMENTS_TABLE, to_row(comment)?)
            .await?;
        from_row(row)
    }
}
