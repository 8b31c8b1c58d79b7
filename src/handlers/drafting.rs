//! # Drafting Handler

use axum::{
    extract::{Path, State, rejection::JsonRejection, rejection::PathRejection},
    response::Json,
};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::ServiceAuth;
use crate::error::ApiError;
use crate::models::content::empty_object;
use crate::models::{Actor, ActorType};
use crate::pipeline::{DraftCommand, DraftOutcome};
use crate::server::AppState;

/// Request body for storing a drafted reply
#[derive(Debug, Deserialize, ToSchema)]
pub struct GenerateCommentRequest {
    pub draft_text: String,
    #[schema(example = "gpt-4o-mini")]
    pub model_name: String,
    pub model_temperature: Option<f64>,
    pub prompt_version: Option<String>,
    #[serde(default = "empty_object")]
    #[schema(value_type = Object)]
    pub safety_flags: JsonValue,
    #[serde(default = "default_is_selected")]
    pub is_selected: bool,
    #[serde(default = "default_actor")]
    pub actor: ActorType,
    #[serde(default = "default_actor_label")]
    pub actor_label: String,
}

fn default_is_selected() -> bool {
    true
}

fn default_actor() -> ActorType {
    ActorType::Agent
}

fn default_actor_label() -> String {
    "comment-subagent".to_string()
}

/// Store a drafted reply and move the item to approval review
#[utoipa::path(
    post,
    path = "/v1/queues/drafting/{content_id}/generate-comment",
    security(("api_key" = [])),
    params(("content_id" = Uuid, Path, description = "Content identifier")),
    request_body = GenerateCommentRequest,
    responses(
        (status = 200, description = "Draft stored and state advanced", body = DraftOutcome),
        (status = 400, description = "Invalid identifier or body", body = ApiError),
        (status = 401, description = "Missing or invalid API key", body = ApiError),
        (status = 404, description = "Content not found", body = ApiError),
        (status = 409, description = "Content trashed or not in drafting_queue", body = ApiError),
        (status = 502, description = "Store unavailable", body = ApiError)
    ),
    tag = "pipeline"
)]
pub async fn generate_comment(
    State(state): State<AppState>,
    _auth: ServiceAuth,
    path: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<GenerateCommentRequest>, JsonRejection>,
) -> Result<Json<DraftOutcome>, ApiError> {
    let Path(content_id) = path?;
    let Json(request) = body?;

    let command = DraftCommand {
        draft_text: request.draft_text,
        model_name: request.model_name,
        model_temperature: request.model_temperature,
        prompt_version: request.prompt_version,
        safety_flags: request.safety_flags,
        is_selected: request.is_selected,
        actor: Actor::new(request.actor, request.actor_label),
    };

    let outcome = state.pipeline.generate_comment(content_id, command).await?;
    Ok(Json(outcome))
}
