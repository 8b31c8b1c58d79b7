//! # Relational Store Access
//!
//! The hosted store is reached only through a REST interface offering
//! filter-addressed CRUD on JSON rows. [`Store`] is the seam the rest of the
//! crate depends on; [`PostgrestStore`] talks to the real service and
//! [`MemoryStore`] provides the same semantics in-process.

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Value as JsonValue};
use thiserror::Error;

pub mod memory;
pub mod postgrest;

pub use memory::MemoryStore;
pub use postgrest::PostgrestStore;

/// One record as exchanged with the store.
pub type Row = Map<String, JsonValue>;

/// Errors surfaced by a [`Store`] implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store returned HTTP {status}")]
    Http { status: u16, body: String },
    #[error("store rejected a duplicate key")]
    UniqueViolation { body: String },
    #[error("store request timed out")]
    Timeout,
    #[error("store unreachable: {0}")]
    Unavailable(String),
    #[error("unexpected store response: {0}")]
    MalformedResponse(String),
    #[error("failed to encode store row: {0}")]
    Encode(#[source] serde_json::Error),
}

impl StoreError {
    /// Upstream HTTP status, when the store answered at all.
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            StoreError::Http { status, .. } => Some(*status),
            StoreError::UniqueViolation { .. } => Some(409),
            _ => None,
        }
    }

    pub fn upstream_body(&self) -> Option<&str> {
        match self {
            StoreError::Http { body, .. } | StoreError::UniqueViolation { body } => {
                Some(body.as_str())
            }
            _ => None,
        }
    }
}

/// Literal accepted by an `is` filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsValue {
    Null,
    True,
    False,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterOp {
    Eq(String),
    Is(IsValue),
}

/// A single column predicate. All filters passed to one call are ANDed.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub column: String,
    pub op: FilterOp,
}

impl Filter {
    pub fn eq(column: impl Into<String>, value: impl ToString) -> Self {
        Self {
            column: column.into(),
            op: FilterOp::Eq(value.to_string()),
        }
    }

    pub fn is(column: impl Into<String>, value: IsValue) -> Self {
        Self {
            column: column.into(),
            op: FilterOp::Is(value),
        }
    }

    /// Value rendered in PostgREST query syntax, e.g. `eq.ingested`.
    pub fn to_query_value(&self) -> String {
        match &self.op {
            FilterOp::Eq(value) => format!("eq.{value}"),
            FilterOp::Is(IsValue::Null) => "is.null".to_string(),
            FilterOp::Is(IsValue::True) => "is.true".to_string(),
            FilterOp::Is(IsValue::False) => "is.false".to_string(),
        }
    }

    /// Evaluates the predicate against an in-memory row.
    pub fn matches(&self, row: &Row) -> bool {
        let value = row.get(&self.column).unwrap_or(&JsonValue::Null);
        match &self.op {
            FilterOp::Eq(expected) => match value {
                JsonValue::String(actual) => actual == expected,
                JsonValue::Number(actual) => actual.to_string() == *expected,
                JsonValue::Bool(actual) => actual.to_string() == *expected,
                _ => false,
            },
            FilterOp::Is(IsValue::Null) => value.is_null(),
            FilterOp::Is(IsValue::True) => value == &JsonValue::Bool(true),
            FilterOp::Is(IsValue::False) => value == &JsonValue::Bool(false),
        }
    }
}

/// Paging and filtering for [`Store::list_rows`].
#[derive(Debug, Clone, PartialEq)]
pub struct ListQuery {
    pub filters: Vec<Filter>,
    pub limit: u32,
    pub offset: u32,
}

impl ListQuery {
    pub fn page(limit: u32, offset: u32) -> Self {
        Self {
            filters: Vec::new(),
            limit,
            offset,
        }
    }

    pub fn filtered(filters: Vec<Filter>, limit: u32) -> Self {
        Self {
            filters,
            limit,
            offset: 0,
        }
    }
}

/// Atomic single-row CRUD addressed by filters.
#[async_trait]
pub trait Store: Send + Sync {
    async fn list_rows(&self, relation: &str, query: &ListQuery) -> Result<Vec<Row>, StoreError>;

    async fn insert_one(&self, table: &str, row: Row) -> Result<Row, StoreError>;

    async fn insert_many(&self, table: &str, rows: Vec<Row>) -> Result<Vec<Row>, StoreError>;

    /// Applies `changes` to every row matching `filters` and returns the
    /// updated rows. An empty result means nothing matched.
    async fn update_rows(
        &self,
        table: &str,
        filters: &[Filter],
        changes: Row,
    ) -> Result<Vec<Row>, StoreError>;

    async fn get_one(&self, relation: &str, filters: &[Filter]) -> Result<Option<Row>, StoreError> {
        let rows = self
            .list_rows(relation, &ListQuery::filtered(filters.to_vec(), 1))
            .await?;
        Ok(rows.into_iter().next())
    }
}

pub fn to_row<T: Serialize>(value: &T) -> Result<Row, StoreError> {
    match serde_json::to_value(value).map_err(StoreError::Encode)? {
        JsonValue::Object(row) => Ok(row),
        other => Err(StoreError::MalformedResponse(format!(
            "expected a JSON object row, got {other}"
        ))),
    }
}

pub fn from_row<T: DeserializeOwned>(row: Row) -> Result<T, StoreError> {
    serde_json::from_value(JsonValue::Object(row))
        .map_err(|err| StoreError::MalformedResponse(err.to_string()))
}
