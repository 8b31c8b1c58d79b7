//! Ingested content records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use utoipa::ToSchema;
use uuid::Uuid;

use super::{ContentSource, ModelError, require_non_blank};

/// Table holding one row per ingested item.
pub const CONTENT_TABLE: &str = "content";

/// One scraped item. `(source, source_content_id)` is the business key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Content {
    pub id: Uuid,
    pub source: ContentSource,
    pub source_content_id: String,
    pub source_url: String,
    #[serde(default)]
    pub source_author: Option<String>,
    #[serde(default)]
    pub source_created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body_text: Option<String>,
    #[serde(default = "empty_object")]
    #[schema(value_type = Object)]
    pub raw_payload: JsonValue,
    #[serde(default)]
    pub scraped_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Insert payload for [`Content`]; the store assigns the id and timestamps.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewContent {
    pub source: ContentSource,
    pub source_content_id: String,
    pub source_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body_text: Option<String>,
    pub raw_payload: JsonValue,
}

impl NewContent {
    pub fn validate(&self) -> Result<(), ModelError> {
        require_non_blank("source_content_id", &self.source_content_id)?;
        require_non_blank("source_url", &self.source_url)?;
        if !self.raw_payload.is_object() {
            return Err(ModelError::NotAnObject {
                field: "raw_payload",
            });
        }
        Ok(())
    }
}

pub(crate) fn empty_object() -> JsonValue {
    JsonValue::Object(Default::default())
}
