//! # Browser Extension Handler
//!
//! Publication outcomes reported by the browser extension. A `deleted`
//! report trashes the item regardless of its current stage.

use axum::{
    extract::{Path, State, rejection::JsonRejection, rejection::PathRejection},
    response::Json,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::ServiceAuth;
use crate::error::ApiError;
use crate::models::{Actor, ActorType};
use crate::pipeline::{ExtensionOutcome, ExtensionReport, ExtensionStatus};
use crate::server::AppState;

/// Request body for an extension status report
#[derive(Debug, Deserialize, ToSchema)]
pub struct ExtensionStatusRequest {
    pub status: ExtensionStatus,
    pub generated_comment_id: Option<Uuid>,
    pub error_message: Option<String>,
    #[serde(default = "default_actor")]
    pub actor: ActorType,
    #[serde(default = "default_actor_label")]
    pub actor_label: String,
}

fn default_actor() -> ActorType {
    ActorType::User
}

fn default_actor_label() -> String {
    "chrome-extension".to_string()
}

/// Record a publication outcome for a content item
#[utoipa::path(
    post,
    path = "/v1/extension/tasks/{content_id}/status",
    security(("api_key" = [])),
    params(("content_id" = Uuid, Path, description = "Content identifier")),
    request_body = ExtensionStatusRequest,
    responses(
        (status = 200, description = "Posting event recorded", body = ExtensionOutcome),
        (status = 400, description = "Invalid identifier or body", body = ApiError),
        (status = 401, description = "Missing or invalid API key", body = ApiError),
        (status = 404, description = "Content not found", body = ApiError),
        (status = 502, description = "Store unavailable", body = ApiError)
    ),
    tag = "extension"
)]
pub async fn update_extension_status(
    State(state): State<AppState>,
    _auth: ServiceAuth,
    path: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<ExtensionStatusRequest>, JsonRejection>,
) -> Result<Json<ExtensionOutcome>, ApiError> {
    let Path(content_id) = path?;
    let Json(request) = body?;

    let report = ExtensionReport {
        status: request.status,
        generated_comment_id: request.generated_comment_id,
        error_message: request.error_message,
        actor: Actor::new(request.actor, request.actor_label),
    };

    let outcome = state.pipeline.extension_status(content_id, report).await?;
    Ok(Json(outcome))
}
