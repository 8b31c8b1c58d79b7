//! # Error Handling
//!
//! Unified problem+json responses for the pipeline API, with trace ID
//! propagation. Domain errors from the pipeline and the store are mapped to
//! HTTP statuses here and nowhere else.

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;

use crate::models::{GuardViolation, ModelError};
use crate::pipeline::PipelineError;
use crate::store::StoreError;
use crate::telemetry;

/// Longest upstream body excerpt echoed back to clients, in characters.
const BODY_SNIPPET_CHARS: usize = 200;

/// Unified API error response structure
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ApiError {
    /// HTTP status code for the response
    #[serde(skip_serializing, skip_deserializing)]
    pub status: StatusCode,
    /// Error code for programmatic handling
    pub code: Box<str>,
    /// Human-readable error message
    pub message: Box<str>,
    /// Additional error details (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub details: Option<Box<serde_json::Value>>,
    /// Correlation trace ID for debugging (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    pub trace_id: Option<Box<str>>,
}

impl ApiError {
    /// Create a new API error with the given status code and message
    pub fn new(status: StatusCode, code: &str, message: &str) -> Self {
        Self {
            status,
            code: code.into(),
            message: message.into(),
            details: None,
            trace_id: Self::current_trace_id(),
        }
    }

    /// Add details to the error
    pub fn with_details<V: Into<serde_json::Value>>(mut self, details: V) -> Self {
        self.details = Some(Box::new(details.into()));
        self
    }

    /// Trace ID of the request being served, or a fresh correlation ID
    /// outside of one.
    fn current_trace_id() -> Option<Box<str>> {
        telemetry::current_trace_id()
            .map(String::into_boxed_str)
            .or_else(|| {
                Some(format!("corr-{}", &uuid::Uuid::new_v4().to_string()[..8]).into_boxed_str())
            })
    }
}

/// Upstream store failure information
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpstreamError {
    /// HTTP status returned by the store, absent for transport failures
    pub status: Option<u16>,
    /// Response body snippet from the store (truncated)
    pub body_snippet: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut headers = HeaderMap::new();
        headers.insert(
            "content-type",
            HeaderValue::from_static("application/problem+json"),
        );

        (self.status, headers, axum::Json(self)).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(error: anyhow::Error) -> Self {
        tracing::error!("Internal error: {:?}", error);

        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_SERVER_ERROR",
            "An internal error occurred",
        )
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        let message = match rejection {
            JsonRejection::JsonDataError(err) => format!("Invalid JSON: {}", err.body_text()),
            JsonRejection::JsonSyntaxError(err) => {
                format!("JSON syntax error: {}", err.body_text())
            }
            JsonRejection::MissingJsonContentType(_) => {
                "Missing 'Content-Type: application/json' header".to_string()
            }
            _ => "Invalid request body".to_string(),
        };

        Self::new(StatusCode::BAD_REQUEST, "VALIDATION_FAILED", &message)
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        validation_error(
            "Invalid path parameter",
            json!({ "path": rejection.body_text() }),
        )
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        validation_error(
            "Invalid query parameters",
            json!({ "query": rejection.body_text() }),
        )
    }
}

impl From<ModelError> for ApiError {
    fn from(error: ModelError) -> Self {
        let details = match &error {
            ModelError::EmptyField { field } | ModelError::NotAnObject { field } => {
                json!({ "field": field })
            }
            _ => json!({}),
        };
        validation_error(&error.to_string(), details)
    }
}

impl From<GuardViolation> for ApiError {
    fn from(violation: GuardViolation) -> Self {
        let message = violation.to_string();
        match violation {
            GuardViolation::AlreadyTrashed => {
                Self::new(StatusCode::CONFLICT, "ALREADY_TRASHED", &message)
            }
            GuardViolation::WrongState { expected, actual } => {
                Self::new(StatusCode::CONFLICT, "INVALID_STATE", &message)
                    .with_details(json!({ "expected": expected, "actual": actual }))
            }
            GuardViolation::ConcurrentModification => {
                Self::new(StatusCode::CONFLICT, "CONCURRENT_MODIFICATION", &message)
            }
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::UniqueViolation { .. } => {
                tracing::debug!(%error, "Unique constraint violation reported by store");
                Self::new(StatusCode::CONFLICT, "CONFLICT", "Resource already exists")
            }
            StoreError::Encode(source) => {
                tracing::error!("Failed to encode store row: {:?}", source);
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_SERVER_ERROR",
                    "An internal error occurred",
                )
            }
            other => {
                tracing::error!(error = %other, "Store request failed");
                upstream_error(
                    other.upstream_status(),
                    other.upstream_body().map(str::to_string),
                )
            }
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(error: PipelineError) -> Self {
        match error {
            PipelineError::Validation(err) => err.into(),
            PipelineError::NotFound { content_id } => not_found(&format!(
                "Content {} not found",
                content_id
            )),
            PipelineError::Conflict(violation) => violation.into(),
            PipelineError::Upstream(err) => err.into(),
        }
    }
}

/// Create an upstream store error (502) with a truncated body snippet
pub fn upstream_error(status: Option<u16>, body: Option<String>) -> ApiError {
    let upstream = UpstreamError {
        status,
        body_snippet: body.map(|b| {
            if b.chars().count() > BODY_SNIPPET_CHARS {
                b.chars().take(BODY_SNIPPET_CHARS).collect()
            } else {
                b
            }
        }),
    };

    let message = match status {
        Some(status) => format!("Store returned error status {}", status),
        None => "Store unavailable".to_string(),
    };

    ApiError::new(StatusCode::BAD_GATEWAY, "UPSTREAM_UNAVAILABLE", &message)
        .with_details(json!(upstream))
}

/// Create an unauthorized error (401)
pub fn unauthorized(message: Option<&str>) -> ApiError {
    let msg = message.unwrap_or("Authentication required");
    ApiError::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg)
}

/// Create a not found error (404)
pub fn not_found(message: &str) -> ApiError {
    ApiError::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
}

/// Create a validation error with field details
pub fn validation_error(message: &str, field_errors: serde_json::Value) -> ApiError {
    ApiError::new(StatusCode::BAD_REQUEST, "VALIDATION_FAILED", message).with_details(field_errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PipelineState;
    use axum::http::StatusCode;
    use serde_json::json;
    use uuid::Uuid;

    #[test]
    fn test_api_error_basic() {
        let error = ApiError::new(
            StatusCode::BAD_REQUEST,
            "VALIDATION_FAILED",
            "Test error message",
        );

        assert_eq!(error.code, Box::from("VALIDATION_FAILED"));
        assert_eq!(error.message, Box::from("Test error message"));
        assert_eq!(error.details, None);
    }

    #[test]
    fn test_trace_id_generation() {
        let error = ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_SERVER_ERROR",
            "Test error",
        );

        let trace_id = error.trace_id.unwrap();
        assert!(trace_id.starts_with("corr-"));
        assert_eq!(trace_id.len(), 13);
    }

    #[test]
    fn test_content_type_header() {
        let response = unauthorized(None).into_response();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get("content-type").unwrap(),
            "application/problem+json"
        );
    }

    #[test]
    fn test_from_anyhow() {
        let api_error: ApiError = anyhow::anyhow!("Something went wrong").into();

        assert_eq!(api_error.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(api_error.message, Box::from("An internal error occurred"));
    }

    #[test]
    fn test_guard_violations_map_to_distinct_conflicts() {
        let trashed: ApiError = GuardViolation::AlreadyTrashed.into();
        assert_eq!(trashed.status, StatusCode::CONFLICT);
        assert_eq!(trashed.code, Box::from("ALREADY_TRASHED"));

        let wrong: ApiError = GuardViolation::WrongState {
            expected: PipelineState::Ingested,
            actual: PipelineState::DraftingQueue,
        }
        .into();
        assert_eq!(wrong.status, StatusCode::CONFLICT);
        assert_eq!(wrong.code, Box::from("INVALID_STATE"));
        assert_eq!(
            wrong.details,
            Some(Box::new(
                json!({"expected": "ingested", "actual": "drafting_queue"})
            ))
        );

        let raced: ApiError = GuardViolation::ConcurrentModification.into();
        assert_eq!(raced.code, Box::from("CONCURRENT_MODIFICATION"));
    }

    #[test]
    fn test_pipeline_not_found() {
        let content_id = Uuid::new_v4();
        let error: ApiError = PipelineError::NotFound { content_id }.into();

        assert_eq!(error.status, StatusCode::NOT_FOUND);
        assert_eq!(error.code, Box::from("NOT_FOUND"));
        assert!(error.message.contains(&content_id.to_string()));
    }

    #[test]
    fn test_model_error_is_validation_failure() {
        let error: ApiError = PipelineError::Validation(ModelError::EmptyField {
            field: "draft_text",
        })
        .into();

        assert_eq!(error.status, StatusCode::BAD_REQUEST);
        assert_eq!(error.code, Box::from("VALIDATION_FAILED"));
        assert_eq!(error.details, Some(Box::new(json!({"field": "draft_text"}))));
    }

    #[test]
    fn test_store_http_error_maps_to_bad_gateway() {
        let error: ApiError = StoreError::Http {
            status: 503,
            body: "x".repeat(500),
        }
        .into();

        assert_eq!(error.status, StatusCode::BAD_GATEWAY);
        assert_eq!(error.code, Box::from("UPSTREAM_UNAVAILABLE"));
        let details = error.details.unwrap();
        assert_eq!(details["status"], 503);
        assert_eq!(
            details["body_snippet"].as_str().unwrap().chars().count(),
            BODY_SNIPPET_CHARS
        );
    }

    #[test]
    fn test_store_timeout_has_no_upstream_status() {
        let error: ApiError = StoreError::Timeout.into();

        assert_eq!(error.status, StatusCode::BAD_GATEWAY);
        assert_eq!(error.details.unwrap()["status"], serde_json::Value::Null);
    }

    #[test]
    fn test_utf8_safe_truncation() {
        let body = "测试中文字符🚀 snippet ".repeat(40);
        let error = upstream_error(Some(500), Some(body));

        let details = error.details.unwrap();
        let snippet = details["body_snippet"].as_str().unwrap();
        assert_eq!(snippet.chars().count(), BODY_SNIPPET_CHARS);
        assert!(snippet.starts_with("测试中文字符🚀"));
    }

    #[test]
    fn test_validation_error_with_details() {
        let field_errors = json!({"limit": "must be between 1 and 200"});
        let error = validation_error("Validation failed", field_errors.clone());

        assert_eq!(error.status, StatusCode::BAD_REQUEST);
        assert_eq!(error.details, Some(Box::new(field_errors)));
    }
}
