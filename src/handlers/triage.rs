//! # Triage Handler
//!
//! Classification of ingested items by the scraping sub-agent.

use axum::{
    extract::{Path, State, rejection::JsonRejection, rejection::PathRejection},
    response::Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::ServiceAuth;
use crate::error::ApiError;
use crate::models::{Actor, ActorType, ContentState};
use crate::pipeline::{ClassifyCommand, ClassifyDecision};
use crate::server::AppState;

/// Request body for classifying an ingested item
#[derive(Debug, Deserialize, ToSchema)]
pub struct ClassifyRequest {
    pub decision: ClassifyDecision,
    #[serde(default = "default_actor")]
    pub actor: ActorType,
    #[serde(default = "default_actor_label")]
    pub actor_label: String,
    /// Extra fields merged into the `classified` audit row
    #[serde(default)]
    #[schema(value_type = Object)]
    pub details: Map<String, JsonValue>,
    /// Trash reason for a `reject` decision
    pub reason: Option<String>,
}

fn default_actor() -> ActorType {
    ActorType::Agent
}

fn default_actor_label() -> String {
    "scraper-subagent".to_string()
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ClassifyResponse {
    pub content_state: ContentState,
}

/// Advance an ingested item to opportunity review, or trash it
#[utoipa::path(
    post,
    path = "/v1/queues/ingested/{content_id}/classify",
    security(("api_key" = [])),
    params(("content_id" = Uuid, Path, description = "Content identifier")),
    request_body = ClassifyRequest,
    responses(
        (status = 200, description = "Updated content state", body = ClassifyResponse),
        (status = 400, description = "Invalid identifier or body", body = ApiError),
        (status = 401, description = "Missing or invalid API key", body = ApiError),
        (status = 404, description = "Content not found", body = ApiError),
        (status = 409, description = "Content trashed or not in ingested", body = ApiError),
        (status = 502, description = "Store unavailable", body = ApiError)
    ),
    tag = "pipeline"
)]
pub async fn classify_content(
    State(state): State<AppState>,
    _auth: ServiceAuth,
    path: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<ClassifyRequest>, JsonRejection>,
) -> Result<Json<ClassifyResponse>, ApiError> {
    let Path(content_id) = path?;
    let Json(request) = body?;

    let command = ClassifyCommand {
        decision: request.decision,
        actor: Actor::new(request.actor, request.actor_label),
        details: request.details,
        reason: request.reason,
    };

    let content_state = state.pipeline.classify(content_id, command).await?;
    Ok(Json(ClassifyResponse { content_state }))
}
