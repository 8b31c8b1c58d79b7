//! # Audit Log Writer
//!
//! Appends immutable transaction rows. Rows are never updated or deleted.
//! Within one batch the caller's order is kept as insertion order; it is a
//! reading aid only and nothing reconstructs state from it.

use std::sync::Arc;

use metrics::counter;
use uuid::Uuid;

use crate::models::{NewTransaction, TRANSACTIONS_TABLE, Transaction};
use crate::store::{Store, StoreError, from_row, to_row};

#[derive(Clone)]
pub struct AuditLog {
    store: Arc<dyn Store>,
}

impl AuditLog {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Appends `rows` as a single batch write. An empty batch never reaches
    /// the store.
    pub async fn append(&self, rows: Vec<NewTransaction>) -> Result<Vec<Transaction>, StoreError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let rows = rows.iter().map(to_row).collect::<Result<Vec<_>, _>>()?;
        self.store
            .insert_many(TRANSACTIONS_TABLE, rows)
            .await?
            .into_iter()
            .map(from_row)
            .collect()
    }

    /// Appends `rows` after a state write has already committed.
    ///
    /// The state write is authoritative, so a failed append is logged and
    /// counted but not returned as an error; the result is then empty.
    pub async fn record(&self, content_id: Uuid, rows: Vec<NewTransaction>) -> Vec<Transaction> {
        let count = rows.len();
        match self.append(rows).await {
            Ok(logged) => logged,
            Err(error) => {
                counter!("audit_append_failures_total").increment(1);
                tracing::warn!(
                    %content_id,
                    transactions = count,
                    %error,
                    "Audit append failed after committed state write"
                );
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ActionType, Actor, ActorType, PipelineState};
    use crate::store::MemoryStore;
    use serde_json::Map;

    fn fixture() -> (Arc<MemoryStore>, AuditLog) {
        let store = Arc::new(MemoryStore::new());
        let log = AuditLog::new(store.clone());
        (store, log)
    }

    fn batch(content_id: Uuid) -> Vec<NewTransaction> {
        let actor = Actor::new(ActorType::Agent, "scraper-subagent");
        vec![
            NewTransaction::builder(content_id, ActionType::Classified, &actor)
                .detail("decision", "advance")
                .build()
                .unwrap(),
            NewTransaction::state_moved(
                content_id,
                &actor,
                PipelineState::Ingested,
                PipelineState::OpportunityReview,
                Map::new(),
            ),
        ]
    }

    #[tokio::test]
    async fn empty_batch_is_a_no_op() {
        let (store, log) = fixture();
        // A failing table proves the store is never called.
        store.fail_writes_to(TRANSACTIONS_TABLE);
        let logged = log.append(Vec::new()).await.unwrap();
        assert!(logged.is_empty());
    }

    #[tokio::test]
    async fn batch_keeps_caller_order() {
        let (store, log) = fixture();
        let content_id = Uuid::new_v4();
        let logged = log.append(batch(content_id)).await.unwrap();

        let actions: Vec<_> = logged.iter().map(|tx| tx.action).collect();
        assert_eq!(actions, vec![ActionType::Classified, ActionType::StateMoved]);
        assert!(logged[0].id < logged[1].id);
        assert_eq!(logged[1].from_state, Some(PipelineState::Ingested));
        assert_eq!(store.rows(TRANSACTIONS_TABLE).len(), 2);
    }

    #[tokio::test]
    async fn record_swallows_store_failures() {
        let (store, log) = fixture();
        store.fail_writes_to(TRANSACTIONS_TABLE);
        let logged = log.record(Uuid::new_v4(), batch(Uuid::new_v4())).await;
        assert!(logged.is_empty());
        assert!(store.rows(TRANSACTIONS_TABLE).is_empty());
    }
}
