//! # Queue Listing Handlers
//!
//! Paginated reads of the per-state projections. The three named queues are
//! shortcuts for the matching `/v1/views/{view_name}` listing.

use std::str::FromStr;

use axum::{
    extract::{Path, Query, State, rejection::PathRejection, rejection::QueryRejection},
    response::Json,
};

use super::types::{PageQuery, PageResponse};
use crate::auth::ServiceAuth;
use crate::error::{ApiError, not_found};
use crate::models::PipelineState;
use crate::server::AppState;

async fn list(
    state: &AppState,
    pipeline_state: PipelineState,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> Result<Json<PageResponse>, ApiError> {
    let Query(page) = query?;
    let (limit, offset) = page.resolve()?;
    let items = state
        .pipeline
        .list_queue(pipeline_state, limit, offset)
        .await?;
    Ok(Json(PageResponse::new(items, limit, offset)))
}

/// List content waiting for triage
#[utoipa::path(
    get,
    path = "/v1/queues/ingested",
    security(("api_key" = [])),
    params(PageQuery),
    responses(
        (status = 200, description = "Page of the ingested queue", body = PageResponse),
        (status = 400, description = "Invalid pagination parameters", body = ApiError),
        (status = 401, description = "Missing or invalid API key", body = ApiError),
        (status = 502, description = "Store unavailable", body = ApiError)
    ),
    tag = "queues"
)]
pub async fn list_ingested(
    State(state): State<AppState>,
    _auth: ServiceAuth,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> Result<Json<PageResponse>, ApiError> {
    list(&state, PipelineState::Ingested, query).await
}

/// List content waiting for a drafted reply
#[utoipa::path(
    get,
    path = "/v1/queues/drafting",
    security(("api_key" = [])),
    params(PageQuery),
    responses(
        (status = 200, description = "Page of the drafting queue", body = PageResponse),
        (status = 400, description = "Invalid pagination parameters", body = ApiError),
        (status = 401, description = "Missing or invalid API key", body = ApiError),
        (status = 502, description = "Store unavailable", body = ApiError)
    ),
    tag = "queues"
)]
pub async fn list_drafting(
    State(state): State<AppState>,
    _auth: ServiceAuth,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> Result<Json<PageResponse>, ApiError> {
    list(&state, PipelineState::DraftingQueue, query).await
}

/// List content approved for publication
#[utoipa::path(
    get,
    path = "/v1/queues/ready-to-publish",
    security(("api_key" = [])),
    params(PageQuery),
    responses(
        (status = 200, description = "Page of the ready-to-publish queue", body = PageResponse),
        (status = 400, description = "Invalid pagination parameters", body = ApiError),
        (status = 401, description = "Missing or invalid API key", body = ApiError),
        (status = 502, description = "Store unavailable", body = ApiError)
    ),
    tag = "queues"
)]
pub async fn list_ready_to_publish(
    State(state): State<AppState>,
    _auth: ServiceAuth,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> Result<Json<PageResponse>, ApiError> {
    list(&state, PipelineState::ReadyToPublish, query).await
}

/// List any named pipeline projection
#[utoipa::path(
    get,
    path = "/v1/views/{view_name}",
    security(("api_key" = [])),
    params(
        ("view_name" = PipelineState, Path, description = "Pipeline state whose projection to list"),
        PageQuery
    ),
    responses(
        (status = 200, description = "Page of the projection", body = PageResponse),
        (status = 400, description = "Invalid pagination parameters", body = ApiError),
        (status = 401, description = "Missing or invalid API key", body = ApiError),
        (status = 404, description = "Unknown view", body = ApiError),
        (status = 502, description = "Store unavailable", body = ApiError)
    ),
    tag = "queues"
)]
pub async fn read_view(
    State(state): State<AppState>,
    _auth: ServiceAuth,
    path: Result<Path<String>, PathRejection>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> Result<Json<PageResponse>, ApiError> {
    let Path(view_name) = path?;
    let pipeline_state = PipelineState::from_str(&view_name)
        .map_err(|_| not_found(&format!("Unknown view '{}'", view_name)))?;
    list(&state, pipeline_state, query).await
}
