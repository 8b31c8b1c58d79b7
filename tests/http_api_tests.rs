//! HTTP-level tests for the assembled router.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
    response::Response,
};
use content_pipeline::config::AppConfig;
use content_pipeline::models::{CONTENT_STATE_TABLE, GENERATED_COMMENTS_TABLE};
use content_pipeline::server::{AppState, create_app, run_server};
use content_pipeline::store::{Filter, MemoryStore, Row, Store};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

const TOKEN: &str = "pipeline-test-token";

struct TestApp {
    router: Router,
    store: Arc<MemoryStore>,
}

impl TestApp {
    fn new() -> Self {
        let config = AppConfig {
            service_tokens: vec![TOKEN.to_string(), "second-token".to_string()],
            ..Default::default()
        };
        let store = Arc::new(MemoryStore::new());
        let router = create_app(AppState::new(Arc::new(config), store.clone()));
        Self { router, store }
    }

    async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header("x-api-key", TOKEN)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        read_json(self.send(request).await).await
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .uri(uri)
            .header("x-api-key", TOKEN)
            .body(Body::empty())
            .unwrap();
        read_json(self.send(request).await).await
    }

    async fn ingest(&self, key: &str) -> String {
        let (status, body) = self
            .post(
                "/v1/content/ingest",
                json!({
                    "source": "reddit",
                    "source_content_id": key,
                    "source_url": format!("https://reddit.com/r/rust/{key}"),
                    "title": "Tokio or smol?"
                }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        body["content"]["id"].as_str().unwrap().to_string()
    }

    async fn force_state(&self, content_id: &str, state: &str) {
        let mut changes = Row::new();
        changes.insert("state".to_string(), json!(state));
        self.store
            .update_rows(
                CONTENT_STATE_TABLE,
                &[Filter::eq("content_id", content_id)],
                changes,
            )
            .await
            .unwrap();
    }
}

async fn read_json(response: Response) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

#[tokio::test]
async fn health_and_root_need_no_key() {
    let app = TestApp::new();

    let response = app
        .send(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await;
    let (status, body) = read_json(response).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let response = app
        .send(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await;
    let (status, body) = read_json(response).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["service"], "content-pipeline");
}

#[tokio::test]
async fn openapi_document_lists_pipeline_routes() {
    let app = TestApp::new();
    let response = app
        .send(Request::builder().uri("/openapi.json").body(Body::empty()).unwrap())
        .await;
    let (status, body) = read_json(response).await;

    assert_eq!(status, StatusCode::OK);
    let paths = body["paths"].as_object().unwrap();
    for path in [
        "/v1/content/ingest",
        "/v1/queues/ingested/{content_id}/classify",
        "/v1/queues/drafting/{content_id}/generate-comment",
        "/v1/extension/tasks/{content_id}/status",
        "/v1/views/{view_name}",
    ] {
        assert!(paths.contains_key(path), "missing {path}");
    }
    assert!(body["components"]["securitySchemes"]["api_key"].is_object());
}

#[tokio::test]
async fn missing_or_wrong_key_is_unauthorized() {
    let app = TestApp::new();

    let response = app
        .send(
            Request::builder()
                .uri("/v1/queues/ingested")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/problem+json"
    );
    let (status, body) = read_json(response).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHORIZED");

    let response = app
        .send(
            Request::builder()
                .uri("/v1/queues/ingested")
                .header("x-api-key", "nope")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(app.store.rows("content").is_empty());
}

#[tokio::test]
async fn any_configured_token_is_accepted() {
    let app = TestApp::new();
    let response = app
        .send(
            Request::builder()
                .uri("/v1/queues/drafting")
                .header("x-api-key", "second-token")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn ingest_is_idempotent_over_http() {
    let app = TestApp::new();
    let body = json!({
        "source": "youtube",
        "source_content_id": "vid-1",
        "source_url": "https://youtube.com/watch?v=vid-1",
        "raw_payload": {"views": 10}
    });

    let (status, first) = app.post("/v1/content/ingest", body.clone()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["created"], true);
    assert_eq!(first["content_state"]["state"], "ingested");

    let (status, second) = app.post("/v1/content/ingest", body).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["created"], false);
    assert_eq!(second["content"]["id"], first["content"]["id"]);
}

#[tokio::test]
async fn ingest_accepts_naive_and_epoch_creation_times() {
    let app = TestApp::new();

    for (key, created_at) in [
        ("naive", json!("2026-01-01T00:00:00")),
        ("epoch", json!(1767225600)),
        ("offset", json!("2026-01-01T01:00:00+01:00")),
    ] {
        let (status, body) = app
            .post(
                "/v1/content/ingest",
                json!({
                    "source": "reddit",
                    "source_content_id": key,
                    "source_url": format!("https://reddit.com/r/rust/{key}"),
                    "source_created_at": created_at
                }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{key}: {body}");
        assert_eq!(body["content"]["source_created_at"], "2026-01-01T00:00:00Z");
    }

    let (status, body) = app
        .post(
            "/v1/content/ingest",
            json!({
                "source": "reddit",
                "source_content_id": "garbled",
                "source_url": "https://reddit.com/r/rust/garbled",
                "source_created_at": "yesterday"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_FAILED");
}

#[tokio::test]
async fn invalid_input_is_a_validation_failure() {
    let app = TestApp::new();

    let (status, body) = app
        .post(
            "/v1/queues/ingested/not-a-uuid/classify",
            json!({"decision": "advance"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_FAILED");

    let (status, body) = app
        .post("/v1/content/ingest", json!({"source": "myspace"}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_FAILED");

    let request = Request::builder()
        .method(Method::POST)
        .uri("/v1/content/ingest")
        .header("x-api-key", TOKEN)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = read_json(app.send(request).await).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_FAILED");

    let (status, body) = app
        .post(
            "/v1/content/ingest",
            json!({"source": "reddit", "source_content_id": "", "source_url": "u"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"]["field"], "source_content_id");

    let (status, _) = app.get("/v1/queues/ingested?limit=0").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = app.get("/v1/queues/ingested?offset=-1").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = app.get("/v1/queues/ingested?limit=ten").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn classify_distinguishes_missing_from_wrong_state() {
    let app = TestApp::new();
    let content_id = app.ingest("abc123").await;

    let (status, body) = app
        .post(
            &format!("/v1/queues/ingested/{}/classify", uuid::Uuid::new_v4()),
            json!({"decision": "advance"}),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");

    let uri = format!("/v1/queues/ingested/{content_id}/classify");
    let (status, body) = app.post(&uri, json!({"decision": "advance"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["content_state"]["state"], "opportunity_review");

    let (status, body) = app.post(&uri, json!({"decision": "advance"})).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "INVALID_STATE");
    assert_eq!(body["details"]["expected"], "ingested");
    assert_eq!(body["details"]["actual"], "opportunity_review");
}

#[tokio::test]
async fn trashed_item_reports_already_trashed() {
    let app = TestApp::new();
    let content_id = app.ingest("abc123").await;
    let uri = format!("/v1/queues/ingested/{content_id}/classify");

    let (status, body) = app
        .post(&uri, json!({"decision": "trash", "reason": "spam"}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["content_state"]["is_trashed"], true);
    assert_eq!(body["content_state"]["trashed_reason"], "spam");

    let (status, body) = app.post(&uri, json!({"decision": "advance"})).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "ALREADY_TRASHED");
}

#[tokio::test]
async fn drafting_flow_reaches_approval_review() {
    let app = TestApp::new();
    let content_id = app.ingest("abc123").await;
    let uri = format!("/v1/queues/drafting/{content_id}/generate-comment");
    let draft = json!({"draft_text": "Start with tokio.", "model_name": "gpt-4o-mini"});

    let (status, body) = app.post(&uri, draft.clone()).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "INVALID_STATE");
    assert!(app.store.rows(GENERATED_COMMENTS_TABLE).is_empty());

    app.force_state(&content_id, "drafting_queue").await;
    let (status, body) = app.get("/v1/queues/drafting").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);

    let (status, body) = app.post(&uri, draft).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["content_state"]["state"], "approval_review");
    assert_eq!(body["generated_comment"]["is_selected"], true);

    let (_, body) = app.get("/v1/queues/drafting").await;
    assert_eq!(body["count"], 0);
    let (_, body) = app.get("/v1/views/approval_review").await;
    assert_eq!(body["count"], 1);
}

#[tokio::test]
async fn extension_delete_trashes_and_hides_from_views() {
    let app = TestApp::new();
    let content_id = app.ingest("abc123").await;
    app.force_state(&content_id, "ready_to_publish").await;

    let (_, body) = app.get("/v1/queues/ready-to-publish").await;
    assert_eq!(body["count"], 1);

    let (status, body) = app
        .post(
            &format!("/v1/extension/tasks/{content_id}/status"),
            json!({"status": "deleted"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["posting_event"]["status"], "deleted");
    assert_eq!(body["transactions"][0]["action"], "trashed");
    assert_eq!(
        body["transactions"][0]["details"]["posting_event_id"],
        body["posting_event"]["id"]
    );

    let (_, body) = app.get("/v1/queues/ready-to-publish").await;
    assert_eq!(body["count"], 0);
}

#[tokio::test]
async fn views_page_and_reject_unknown_names() {
    let app = TestApp::new();
    for key in ["a", "b", "c"] {
        app.ingest(key).await;
    }

    let (status, body) = app.get("/v1/views/ingested?limit=2&offset=2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["limit"], 2);
    assert_eq!(body["offset"], 2);
    assert_eq!(body["count"], 1);

    let (status, body) = app.get("/v1/views/trash_bin").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn request_id_is_echoed_and_used_as_trace_id() {
    let app = TestApp::new();
    let request = Request::builder()
        .method(Method::POST)
        .uri(format!(
            "/v1/queues/ingested/{}/classify",
            uuid::Uuid::new_v4()
        ))
        .header("x-api-key", TOKEN)
        .header("x-request-id", "req-from-client")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({"decision": "advance"}).to_string()))
        .unwrap();

    let response = app.send(request).await;
    assert_eq!(
        response.headers().get("x-request-id").unwrap(),
        "req-from-client"
    );
    let (status, body) = read_json(response).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["trace_id"], "req-from-client");
}

#[tokio::test]
async fn generated_request_id_matches_error_trace_id() {
    let app = TestApp::new();
    let response = app
        .send(
            Request::builder()
                .uri("/v1/queues/ingested")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    let echoed = response
        .headers()
        .get("x-request-id")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(echoed.starts_with("req-"));
    let (_, body) = read_json(response).await;
    assert_eq!(body["trace_id"], echoed.as_str());
}

#[tokio::test]
async fn server_stops_when_cancelled() -> Result<()> {
    let config = Arc::new(AppConfig {
        api_bind_addr: "127.0.0.1:0".to_string(),
        service_tokens: vec![TOKEN.to_string()],
        ..Default::default()
    });
    let shutdown = CancellationToken::new();
    let server = tokio::spawn(run_server(
        config,
        Arc::new(MemoryStore::new()),
        shutdown.clone(),
    ));

    tokio::time::sleep(Duration::from_millis(50)).await;
    shutdown.cancel();

    tokio::time::timeout(Duration::from_secs(5), server).await???;
    Ok(())
}
