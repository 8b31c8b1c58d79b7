//! # Content Intake Handler
//!
//! Entry point for freshly scraped items.

use axum::{
    extract::{State, rejection::JsonRejection},
    response::Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use utoipa::ToSchema;

use crate::auth::ServiceAuth;
use crate::error::ApiError;
use crate::handlers::types::optional_timestamp;
use crate::models::content::empty_object;
use crate::models::{Actor, ActorType, ContentSource, NewContent};
use crate::pipeline::IntakeOutcome;
use crate::server::AppState;

/// Request body for content intake
#[derive(Debug, Deserialize, ToSchema)]
pub struct IngestRequest {
    pub source: ContentSource,
    /// Identifier of the item on its platform
    #[schema(example = "abc123")]
    pub source_content_id: String,
    #[schema(example = "https://reddit.com/r/rust/comments/abc123")]
    pub source_url: String,
    pub source_author: Option<String>,
    /// RFC 3339, naive ISO 8601 (read as UTC) or Unix epoch seconds
    #[serde(default, deserialize_with = "optional_timestamp")]
    pub source_created_at: Option<DateTime<Utc>>,
    pub title: Option<String>,
    pub body_text: Option<String>,
    /// Raw scraper payload, stored verbatim
    #[serde(default = "empty_object")]
    #[schema(value_type = Object)]
    pub raw_payload: JsonValue,
    #[serde(default = "default_actor")]
    pub actor: ActorType,
    #[serde(default = "default_actor_label")]
    pub actor_label: String,
}

fn default_actor() -> ActorType {
    ActorType::System
}

fn default_actor_label() -> String {
    "scraper-daemon".to_string()
}

/// Ingest a scraped item, deduplicating on `(source, source_content_id)`
#[utoipa::path(
    post,
    path = "/v1/content/ingest",
    security(("api_key" = [])),
    request_body = IngestRequest,
    responses(
        (status = 200, description = "Item ingested, or the existing record when already known", body = IntakeOutcome),
        (status = 400, description = "Invalid request body", body = ApiError),
        (status = 401, description = "Missing or invalid API key", body = ApiError),
        (status = 502, description = "Store unavailable", body = ApiError)
    ),
    tag = "content"
)]
pub async fn ingest_content(
    State(state): State<AppState>,
    _auth: ServiceAuth,
    body: Result<Json<IngestRequest>, JsonRejection>,
) -> Result<Json<IntakeOutcome>, ApiError> {
    let Json(request) = body?;

    let content = NewContent {
        source: request.source,
        source_content_id: request.source_content_id,
        source_url: request.source_url,
        source_author: request.source_author,
        source_created_at: request.source_created_at,
        title: request.title,
        body_text: request.body_text,
        raw_payload: request.raw_payload,
    };
    let actor = Actor::new(request.actor, request.actor_label);

    let outcome = state.pipeline.intake(content, actor).await?;
    Ok(Json(outcome))
}
