//! Candidate replies drafted for a content item.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use utoipa::ToSchema;
use uuid::Uuid;

use super::content::empty_object;
use super::{ActorType, ModelError, require_non_blank};

pub const GENERATED_COMMENTS_TABLE: &str = "generated_comments";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct GeneratedComment {
    pub id: Uuid,
    pub content_id: Uuid,
    pub draft_text: String,
    pub model_name: String,
    #[serde(default)]
    pub model_temperature: Option<f64>,
    #[serde(default)]
    pub prompt_version: Option<String>,
    #[serde(default = "empty_object")]
    #[schema(value_type = Object)]
    pub safety_flags: JsonValue,
    /// Whether this draft is the one to publish. Uniqueness per content is a
    /// caller convention, not enforced here.
    #[serde(default)]
    pub is_selected: bool,
    pub generated_by_actor: ActorType,
    #[serde(default)]
    pub generated_by_user_id: Option<Uuid>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewGeneratedComment {
    pub content_id: Uuid,
    pub draft_text: String,
    pub model_name: String,
    pub model_temperature: Option<f64>,
    pub prompt_version: Option<String>,
    pub safety_flags: JsonValue,
    pub is_selected: bool,
    pub generated_by_actor: ActorType,
}

impl NewGeneratedComment {
    pub fn validate(&self) -> Result<(), ModelError> {
        require_non_blank("draft_text", &self.draft_text)?;
        require_non_blank("model_name", &self.model_name)?;
        if !self.safety_flags.is_object() {
            return Err(ModelError::NotAnObject {
                field: "safety_flags",
            });
        }
        Ok(())
    }
}
