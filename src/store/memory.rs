//! In-process store with the same addressing semantics as the hosted one.
//!
//! Backs the `memory` store backend for local runs and the test suites.
//! It emulates the column defaults, unique keys and read projections the
//! hosted schema provides.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Value as JsonValue, json};
use uuid::Uuid;

use super::{Filter, ListQuery, Row, Store, StoreError};
use crate::models::{
    CONTENT_STATE_TABLE, CONTENT_TABLE, PipelineState, TRANSACTIONS_TABLE,
};
use crate::repositories::queue::view_relation;

#[derive(Default)]
struct Tables {
    rows: HashMap<String, Vec<Row>>,
    next_serial: i64,
    failing: HashSet<String>,
}

/// Thread-safe in-memory [`Store`].
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent write to `table` fail as if the store were
    /// unreachable.
    pub fn fail_writes_to(&self, table: &str) {
        self.lock().failing.insert(table.to_string());
    }

    pub fn restore_writes_to(&self, table: &str) {
        self.lock().failing.remove(table);
    }

    /// Snapshot of a table, in insertion order.
    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.lock().rows.get(table).cloned().unwrap_or_default()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        // A panic while holding the lock leaves plain data behind; keep serving it.
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Tables {
    fn check_writable(&self, table: &str) -> Result<(), StoreError> {
        if self.failing.contains(table) {
            return Err(StoreError::Unavailable(format!(
                "writes to '{table}' are disabled"
            )));
        }
        Ok(())
    }

    fn insert(&mut self, table: &str, mut row: Row) -> Result<Row, StoreError> {
        let now = json!(Utc::now());
        if table == TRANSACTIONS_TABLE {
            self.next_serial += 1;
            row.entry("id").or_insert(json!(self.next_serial));
        } else if table != CONTENT_STATE_TABLE {
            row.entry("id").or_insert_with(|| json!(Uuid::new_v4()));
        }
        match table {
            CONTENT_TABLE => {
                row.entry("scraped_at").or_insert_with(|| now.clone());
                row.entry("updated_at").or_insert_with(|| now.clone());
                row.entry("raw_payload").or_insert_with(|| json!({}));
                self.ensure_unique(table, &row, &["source", "source_content_id"])?;
            }
            CONTENT_STATE_TABLE => {
                row.entry("state").or_insert(json!(PipelineState::Ingested));
                row.entry("is_trashed").or_insert(json!(false));
                row.entry("priority").or_insert(json!(3));
                row.entry("last_transition_at").or_insert_with(|| now.clone());
                row.entry("updated_at").or_insert_with(|| now.clone());
                self.ensure_unique(table, &row, &["content_id"])?;
            }
            _ => {}
        }
        if table != CONTENT_STATE_TABLE {
            row.entry("created_at").or_insert(now);
        }

        self.rows
            .entry(table.to_string())
            .or_default()
            .push(row.clone());
        Ok(row)
    }

    fn ensure_unique(&self, table: &str, row: &Row, columns: &[&str]) -> Result<(), StoreError> {
        let duplicate = self.rows.get(table).is_some_and(|existing| {
            existing
                .iter()
                .any(|other| columns.iter().all(|column| other.get(*column) == row.get(*column)))
        });
        if duplicate {
            return Err(StoreError::UniqueViolation {
                body: format!(
                    "{{\"code\":\"23505\",\"message\":\"duplicate key on {table} ({})\"}}",
                    columns.join(", ")
                ),
            });
        }
        Ok(())
    }

    fn relation(&self, relation: &str) -> Vec<Row> {
        match projection_state(relation) {
            Some(state) => self.project(state),
            None => self.rows.get(relation).cloned().unwrap_or_default(),
        }
    }

    /// Non-trashed content in `state`, joined with its pipeline fields.
    fn project(&self, state: PipelineState) -> Vec<Row> {
        let contents = self.rows.get(CONTENT_TABLE).cloned().unwrap_or_default();
        let states = self.rows.get(CONTENT_STATE_TABLE).cloned().unwrap_or_default();
        let wanted = json!(state);

        states
            .iter()
            .filter(|row| row.get("state") == Some(&wanted))
            .filter(|row| row.get("is_trashed") != Some(&JsonValue::Bool(true)))
            .filter_map(|state_row| {
                let content_id = state_row.get("content_id")?;
                let mut projected = contents
                    .iter()
                    .find(|content| content.get("id") == Some(content_id))?
                    .clone();
                projected.insert("content_id".to_string(), content_id.clone());
                for column in ["state", "priority", "assigned_to", "ai_confidence", "last_transition_at"] {
                    if let Some(value) = state_row.get(column) {
                        projected.insert(column.to_string(), value.clone());
                    }
                }
                Some(projected)
            })
            .collect()
    }
}

fn projection_state(relation: &str) -> Option<PipelineState> {
    PipelineState::ALL
        .into_iter()
        .find(|state| view_relation(*state) == relation)
}

fn matches_all(filters: &[Filter], row: &Row) -> bool {
    filters.iter().all(|filter| filter.matches(row))
}

#[async_trait]
impl Store for MemoryStore {
    async fn list_rows(&self, relation: &str, query: &ListQuery) -> Result<Vec<Row>, StoreError> {
        // Yield like a network round trip so concurrent callers interleave.
        tokio::task::yield_now().await;
        let tables = self.lock();
        Ok(tables
            .relation(relation)
            .into_iter()
            .filter(|row| matches_all(&query.filters, row))
            .skip(query.offset as usize)
            .take(query.limit as usize)
            .collect())
    }

    async fn insert_one(&self, table: &str, row: Row) -> Result<Row, StoreError> {
        tokio::task::yield_now().await;
        let mut tables = self.lock();
        tables.check_writable(table)?;
        tables.insert(table, row)
    }

    async fn insert_many(&self, table: &str, rows: Vec<Row>) -> Result<Vec<Row>, StoreError> {
        tokio::task::yield_now().await;
        let mut tables = self.lock();
        tables.check_writable(table)?;
        rows.into_iter()
            .map(|row| tables.insert(table, row))
            .collect()
    }

    async fn update_rows(
        &self,
        table: &str,
        filters: &[Filter],
        changes: Row,
    ) -> Result<Vec<Row>, StoreError> {
        tokio::task::yield_now().await;
        let mut tables = self.lock();
        tables.check_writable(table)?;
        let now = json!(Utc::now());

        let Some(rows) = tables.rows.get_mut(table) else {
            return Ok(Vec::new());
        };
        let mut updated = Vec::new();
        for row in rows.iter_mut().filter(|row| matches_all(filters, row)) {
            row.extend(changes.clone());
            if table == CONTENT_STATE_TABLE {
                row.insert("updated_at".to_string(), now.clone());
            }
            updated.push(row.clone());
        }
        Ok(updated)
    }
}
