//! # Common API Types
//!
//! Shared request and response types used across handlers.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, de};
use utoipa::{IntoParams, ToSchema};

use crate::error::{ApiError, validation_error};
use crate::store::Row;

pub const DEFAULT_PAGE_LIMIT: u32 = 50;
pub const MAX_PAGE_LIMIT: u32 = 200;

/// Epoch numbers above this are read as milliseconds.
const EPOCH_MILLIS_THRESHOLD: f64 = 2e10;

/// Pagination parameters for listing endpoints
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageQuery {
    /// Maximum number of rows to return (default 50, between 1 and 200)
    pub limit: Option<i64>,
    /// Number of rows to skip (default 0)
    pub offset: Option<i64>,
}

impl PageQuery {
    /// Resolves defaults and checks bounds, returning `(limit, offset)`.
    pub fn resolve(&self) -> Result<(u32, u32), ApiError> {
        let limit = match self.limit {
            None => DEFAULT_PAGE_LIMIT,
            Some(value) if (1..=i64::from(MAX_PAGE_LIMIT)).contains(&value) => value as u32,
            Some(_) => {
                return Err(validation_error(
                    "Invalid limit",
                    serde_json::json!({ "limit": "Must be between 1 and 200" }),
                ));
            }
        };

        let offset = match self.offset {
            None => 0,
            Some(value) => u32::try_from(value).map_err(|_| {
                validation_error(
                    "Invalid offset",
                    serde_json::json!({ "offset": "Must be a non-negative integer" }),
                )
            })?,
        };

        Ok((limit, offset))
    }
}

/// One page of a read projection
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PageResponse {
    /// Rows of the projection, as stored
    #[schema(value_type = Vec<Object>)]
    pub items: Vec<Row>,
    pub limit: u32,
    pub offset: u32,
    /// Number of items in this page
    pub count: usize,
}

impl PageResponse {
    pub fn new(items: Vec<Row>, limit: u32, offset: u32) -> Self {
        let count = items.len();
        Self {
            items,
            limit,
            offset,
            count,
        }
    }
}

/// Timestamp as scrapers send it: RFC 3339, a naive ISO 8601 value taken as
/// UTC, or a Unix epoch in seconds (milliseconds for very large values).
#[derive(Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Integer(i64),
    Float(f64),
    Text(String),
}

fn epoch_to_utc(value: f64) -> Option<DateTime<Utc>> {
    let seconds = if value.abs() > EPOCH_MILLIS_THRESHOLD {
        value / 1000.0
    } else {
        value
    };
    if !seconds.is_finite() {
        return None;
    }
    let whole = seconds.floor();
    let nanos = ((seconds - whole) * 1e9).round().min(999_999_999.0) as u32;
    DateTime::from_timestamp(whole as i64, nanos)
}

fn text_to_utc(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .map(|naive| naive.and_utc())
}

/// `deserialize_with` target for optional timestamps in request bodies.
pub fn optional_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(raw) = Option::<RawTimestamp>::deserialize(deserializer)? else {
        return Ok(None);
    };
    let parsed = match &raw {
        RawTimestamp::Integer(value) if value.unsigned_abs() as f64 > EPOCH_MILLIS_THRESHOLD => {
            DateTime::from_timestamp_millis(*value)
        }
        RawTimestamp::Integer(value) => DateTime::from_timestamp(*value, 0),
        RawTimestamp::Float(value) => epoch_to_utc(*value),
        RawTimestamp::Text(text) => text_to_utc(text),
    };
    parsed.map(Some).ok_or_else(|| match raw {
        RawTimestamp::Text(text) => de::Error::custom(format!("invalid timestamp '{text}'")),
        RawTimestamp::Integer(value) => de::Error::custom(format!("epoch {value} out of range")),
        RawTimestamp::Float(value) => de::Error::custom(format!("epoch {value} out of range")),
    })
}

/// Liveness response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    #[schema(example = "ok")]
    pub status: String,
}
