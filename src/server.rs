//! # Server Configuration
//!
//! Router assembly, store selection and the serve loop for the pipeline API.

use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{get, post},
};
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use utoipa::{
    Modify, OpenApi,
    openapi::security::{ApiKey, ApiKeyValue, SecurityScheme},
};
use utoipa_swagger_ui::SwaggerUi;

use crate::auth::{API_KEY_HEADER, auth_middleware};
use crate::config::{AppConfig, ConfigError, StoreBackend};
use crate::handlers;
use crate::pipeline::PipelineService;
use crate::store::{MemoryStore, PostgrestStore, Store, StoreError};
use crate::telemetry::trace_context_middleware;

/// Application state containing shared resources
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub pipeline: Arc<PipelineService>,
}

impl AppState {
    pub fn new(config: Arc<AppConfig>, store: Arc<dyn Store>) -> Self {
        Self {
            config,
            pipeline: Arc::new(PipelineService::new(store)),
        }
    }
}

/// Errors raised while starting the server
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to build store client: {0}")]
    Store(#[from] StoreError),
    #[error("server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Builds the store selected by `config.store_backend`.
pub fn build_store(config: &AppConfig) -> Result<Arc<dyn Store>, ServerError> {
    match config.store_backend {
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store; data is lost on shutdown");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackend::Postgrest => {
            let url = config.store_url.as_deref().ok_or(ConfigError::MissingStoreUrl)?;
            let key = config
                .store_api_key
                .as_deref()
                .ok_or(ConfigError::MissingStoreApiKey)?;
            let store = PostgrestStore::new(url, key, config.store_timeout())?;
            Ok(Arc::new(store))
        }
    }
}

/// Creates and configures the Axum application router
pub fn create_app(state: AppState) -> Router {
    let protected = Router::new()
        .route("/content/ingest", post(handlers::content::ingest_content))
        .route("/queues/ingested", get(handlers::queues::list_ingested))
        .route(
            "/queues/ingested/{content_id}/classify",
            post(handlers::triage::classify_content),
        )
        .route("/queues/drafting", get(handlers::queues::list_drafting))
        .route(
            "/queues/drafting/{content_id}/generate-comment",
            post(handlers::drafting::generate_comment),
        )
        .route(
            "/queues/ready-to-publish",
            get(handlers::queues::list_ready_to_publish),
        )
        .route("/views/{view_name}", get(handlers::queues::read_view))
        .route(
            "/extension/tasks/{content_id}/status",
            post(handlers::extension::update_extension_status),
        )
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state.config),
            auth_middleware,
        ));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .nest("/v1", protected)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()))
        .layer(middleware::from_fn(trace_context_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Starts the server and serves until `shutdown` is cancelled
pub async fn run_server(
    config: Arc<AppConfig>,
    store: Arc<dyn Store>,
    shutdown: CancellationToken,
) -> Result<(), ServerError> {
    let addr = config.bind_addr()?;
    let state = AppState::new(Arc::clone(&config), store);
    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(
        %addr,
        profile = %config.profile,
        store_backend = %config.store_backend,
        "Server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "api_key",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new(API_KEY_HEADER))),
            );
        }
    }
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::root,
        crate::handlers::health,
        crate::handlers::content::ingest_content,
        crate::handlers::queues::list_ingested,
        crate::handlers::queues::list_drafting,
        crate::handlers::queues::list_ready_to_publish,
        crate::handlers::queues::read_view,
        crate::handlers::triage::classify_content,
        crate::handlers::drafting::generate_comment,
        crate::handlers::extension::update_extension_status,
    ),
    components(
        schemas(
            crate::models::ServiceInfo,
            crate::models::Content,
            crate::models::ContentState,
            crate::models::GeneratedComment,
            crate::models::PostingEvent,
            crate::models::Transaction,
            crate::models::ContentSource,
            crate::models::PipelineState,
            crate::models::ActionType,
            crate::models::ActorType,
            crate::models::PostingStatus,
            crate::pipeline::ClassifyDecision,
            crate::pipeline::ExtensionStatus,
            crate::pipeline::IntakeOutcome,
            crate::pipeline::DraftOutcome,
            crate::pipeline::ExtensionOutcome,
            crate::handlers::types::PageResponse,
            crate::handlers::types::HealthResponse,
            crate::handlers::content::IngestRequest,
            crate::handlers::triage::ClassifyRequest,
            crate::handlers::triage::ClassifyResponse,
            crate::handlers::drafting::GenerateCommentRequest,
            crate::handlers::extension::ExtensionStatusRequest,
            crate::error::ApiError,
            crate::error::UpstreamError,
        )
    ),
    modifiers(&SecurityAddon),
    info(
        title = "Content Pipeline API",
        description = "Editorial pipeline for scraped social content: intake, triage, drafting and publication tracking",
        version = env!("CARGO_PKG_VERSION"),
    )
)]
pub struct ApiDoc;
