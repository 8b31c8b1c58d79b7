//! # API Handlers
//!
//! This module contains all the HTTP endpoint handlers for the pipeline API.

use crate::models::ServiceInfo;
use axum::response::Json;

pub mod content;
pub mod drafting;
pub mod extension;
pub mod queues;
pub mod triage;
pub mod types;

use types::HealthResponse;

/// Root handler that returns basic service information
#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Service information", body = ServiceInfo)
    ),
    tag = "root"
)]
pub async fn root() -> Json<ServiceInfo> {
    Json(ServiceInfo::default())
}

/// Liveness probe; never touches the store
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is alive", body = HealthResponse)
    ),
    tag = "root"
)]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}
