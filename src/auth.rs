//! # Authentication
//!
//! Service-token authentication for the `/v1` API. Callers present a shared
//! token in the `X-API-Key` header; it is compared in constant time against
//! every configured token.

use std::sync::Arc;

use axum::{
    extract::{FromRef, FromRequestParts, Request, State},
    http::{HeaderMap, request::Parts},
    middleware::Next,
    response::Response,
};
use subtle::ConstantTimeEq;

use crate::config::AppConfig;
use crate::error::{ApiError, unauthorized};
use crate::server::AppState;

/// Header carrying the service token.
pub const API_KEY_HEADER: &str = "X-API-Key";

/// Marker type for requests that passed service-token authentication
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceAuth;

impl FromRef<AppState> for Arc<AppConfig> {
    fn from_ref(app_state: &AppState) -> Self {
        Arc::clone(&app_state.config)
    }
}

/// Authentication middleware that validates the `X-API-Key` header
pub async fn auth_middleware(
    State(config): State<Arc<AppConfig>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_api_key(request.headers())?;
    validate_token(&config, token)?;
    tracing::debug!("Authenticated service request");

    request.extensions_mut().insert(ServiceAuth);
    Ok(next.run(request).await)
}

fn extract_api_key(headers: &HeaderMap) -> Result<&str, ApiError> {
    headers
        .get(API_KEY_HEADER)
        .ok_or_else(|| unauthorized(Some("Missing X-API-Key header")))?
        .to_str()
        .map_err(|_| unauthorized(Some("Invalid X-API-Key header")))
}

fn validate_token(config: &AppConfig, token: &str) -> Result<(), ApiError> {
    // Fold over every token so timing does not reveal which one matched.
    let is_valid = config
        .service_tokens
        .iter()
        .fold(false, |matched, configured| {
            let equal: bool = token.as_bytes().ct_eq(configured.as_bytes()).into();
            matched | equal
        });

    if is_valid && !token.is_empty() {
        Ok(())
    } else {
        tracing::debug!("Rejected request with invalid service token");
        Err(unauthorized(Some("Invalid API key")))
    }
}

impl<S> FromRequestParts<S> for ServiceAuth
where
    Arc<AppConfig>: FromRef<S>,
    S: Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<ServiceAuth>()
            .copied()
            .ok_or_else(|| unauthorized(Some("Service authentication required")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::PipelineService;
    use crate::store::MemoryStore;
    use axum::{
        Router,
        body::Body,
        http::{Request, StatusCode},
        routing::get,
    };
    use tower::ServiceExt;

    fn create_test_config() -> Arc<AppConfig> {
        Arc::new(AppConfig {
            service_tokens: vec!["test-token-123".to_string()],
            ..Default::default()
        })
    }

    async fn run_middleware(config: Arc<AppConfig>, request: Request<Body>) -> Response {
        async fn handler(_auth: ServiceAuth) -> &'static str {
            "OK"
        }

        let state = AppState {
            config: Arc::clone(&config),
            pipeline: Arc::new(PipelineService::new(Arc::new(MemoryStore::new()))),
        };

        Router::new()
            .route("/test", get(handler))
            .layer(axum::middleware::from_fn_with_state(
                Arc::clone(&config),
                auth_middleware,
            ))
            .with_state(state)
            .oneshot(request)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn missing_api_key_returns_401() {
        let request = Request::builder().uri("/test").body(Body::empty()).unwrap();

        let response = run_middleware(create_test_config(), request).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn bearer_header_is_not_accepted() {
        let request = Request::builder()
            .uri("/test")
            .header("Authorization", "Bearer test-token-123")
            .body(Body::empty())
            .unwrap();

        let response = run_middleware(create_test_config(), request).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn invalid_token_returns_401() {
        let request = Request::builder()
            .uri("/test")
            .header("X-API-Key", "wrong-token")
            .body(Body::empty())
            .unwrap();

        let response = run_middleware(create_test_config(), request).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get("content-type").unwrap(),
            "application/problem+json"
        );
    }

    #[tokio::test]
    async fn valid_request_passes_through() {
        let request = Request::builder()
            .uri("/test")
            .header("X-API-Key", "test-token-123")
            .body(Body::empty())
            .unwrap();

        let response = run_middleware(create_test_config(), request).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn multiple_tokens_supported() {
        let config = Arc::new(AppConfig {
            service_tokens: vec![
                "token-one".to_string(),
                "token-two".to_string(),
                "token-three".to_string(),
            ],
            ..Default::default()
        });

        for candidate in ["token-one", "token-two", "token-three"] {
            let request = Request::builder()
                .uri("/test")
                .header("X-API-Key", candidate)
                .body(Body::empty())
                .unwrap();

            let response = run_middleware(Arc::clone(&config), request).await;
            assert_eq!(response.status(), StatusCode::OK);
        }
    }

    #[tokio::test]
    async fn extractor_rejects_unauthenticated_route() {
        async fn handler(_auth: ServiceAuth) -> &'static str {
            "OK"
        }

        let state = AppState {
            config: create_test_config(),
            pipeline: Arc::new(PipelineService::new(Arc::new(MemoryStore::new()))),
        };
        let response = Router::new()
            .route("/test", get(handler))
            .with_state(state)
            .oneshot(Request::builder().uri("/test").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
