// tests/api_http.rs
//
// HTTP-level tests for the public API Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.
//
// Covered:
// - GET /health
// - POST /api/scan (+ 409 while a scan runs, 502/500 failures)
// - POST /api/verify (stateless + stamped, 410 for stale stamps)
// - POST /api/email
// - GET/POST /api/cron (auth before any upstream call)
// - GET /api/session, GET /report

use std::sync::Arc;

use axum::{
    body::{self, Body},
    Router,
};
use http::{Request, StatusCode};
use serde_json::json;
use serde_json::Value as Json;
use tower::ServiceExt as _; // for `oneshot`

use morning_brief::api::{self, AppState};
use morning_brief::llm::{ScriptedGenerator, UpstreamError};
use morning_brief::notify::MemoryMailer;
use morning_brief::pipeline::Pipeline;

const BODY_LIMIT: usize = 1024 * 1024; // 1MB, safe for tests
const SECRET: &str = "cron-test-secret";

struct Harness {
    state: AppState,
    gen: Arc<ScriptedGenerator>,
    mailer: Arc<MemoryMailer>,
}

impl Harness {
    fn new(gen: ScriptedGenerator) -> Self {
        let gen = Arc::new(gen);
        let mailer = Arc::new(MemoryMailer::new("reader@example.com"));
        let pipeline = Arc::new(Pipeline::new(gen.clone(), mailer.clone()));
        Self {
            state: AppState::new(pipeline, Some(SECRET.to_string())),
            gen,
            mailer,
        }
    }

    /// Build the same Router the binary uses, sharing this harness's session.
    fn router(&self) -> Router {
        api::router(self.state.clone())
    }
}

async fn send(app: Router, req: Request<Body>) -> (StatusCode, Vec<u8>) {
    let resp = app.oneshot(req).await.expect("oneshot");
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body")
        .to_vec();
    (status, bytes)
}

fn post_json(uri: &str, payload: Json) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .expect("build POST")
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("build GET")
}

fn json_of(bytes: &[u8]) -> Json {
    serde_json::from_slice(bytes).expect("parse json")
}

#[tokio::test]
async fn api_health_returns_200_and_ok_body() {
    let h = Harness::new(ScriptedGenerator::canned());
    let (status, bytes) = send(h.router(), get("/health")).await;
    assert_eq!(status, StatusCode::OK, "health should be 200");
    assert_eq!(String::from_utf8(bytes).unwrap().trim(), "OK");
}

#[tokio::test]
async fn api_scan_returns_stamped_items() {
    let h = Harness::new(ScriptedGenerator::canned());
    let (status, bytes) = send(h.router(), post_json("/api/scan", json!({ "focus": "oil" }))).await;
    assert_eq!(status, StatusCode::OK, "scan should be 200");

    let v = json_of(&bytes);
    assert_eq!(v["generation"], 1);
    assert!(v.get("generatedAt").is_some(), "missing 'generatedAt'");
    let items = v["items"].as_array().expect("items array");
    assert_eq!(items.len(), 3);
    assert_eq!(items[0]["signal"], "NEUTRAL");
    assert_eq!(items[0]["sector"], "Macro & Fed");
    assert!(h.gen.requests()[0].user.contains("EXTRA FOCUS: oil"));
}

#[tokio::test]
async fn api_scan_accepts_empty_body() {
    let h = Harness::new(ScriptedGenerator::canned());
    let req = Request::builder()
        .method("POST")
        .uri("/api/scan")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(h.router(), req).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn api_scan_while_scanning_is_conflict() {
    let h = Harness::new(ScriptedGenerator::canned());
    let _permit = h.state.session.try_begin_scan().unwrap();
    let (status, bytes) = send(h.router(), post_json("/api/scan", json!({}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json_of(&bytes)["kind"], "conflict");
    assert_eq!(h.gen.call_count(), 0, "no generation call while another scan runs");
}

#[tokio::test]
async fn api_scan_upstream_failure_is_502() {
    let h = Harness::new(ScriptedGenerator::failing(UpstreamError::Transport {
        service: "anthropic",
        message: "timeout".into(),
    }));
    let (status, bytes) = send(h.router(), post_json("/api/scan", json!({}))).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    let v = json_of(&bytes);
    assert_eq!(v["kind"], "upstream");
    assert!(v["error"].as_str().unwrap().contains("timeout"));
    assert!(!h.state.session.is_scanning(), "scan flag released after failure");
}

#[tokio::test]
async fn api_scan_extraction_failure_carries_excerpt() {
    let h = Harness::new(ScriptedGenerator::scan_text("Markets were closed today."));
    let (status, bytes) = send(h.router(), post_json("/api/scan", json!({}))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let v = json_of(&bytes);
    assert_eq!(v["kind"], "extraction");
    assert_eq!(v["excerpt"], "Markets were closed today.");
}

#[tokio::test]
async fn api_verify_stateless_requires_headline() {
    let h = Harness::new(ScriptedGenerator::canned());
    let (status, _) = send(h.router(), post_json("/api/verify", json!({ "headline": "  " }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, bytes) = send(
        h.router(),
        post_json("/api/verify", json!({ "headline": "Fed holds rates", "source": "Reuters" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let v = json_of(&bytes);
    assert_eq!(v["accuracy"], "CONFIRMED");
    assert!(v.get("stamp").is_none());
}

#[tokio::test]
async fn api_verify_stamped_flow_and_repeat_conflict() {
    let h = Harness::new(ScriptedGenerator::canned());
    let (_, bytes) = send(h.router(), post_json("/api/scan", json!({}))).await;
    let generation = json_of(&bytes)["generation"].as_u64().unwrap();

    let (status, bytes) = send(
        h.router(),
        post_json("/api/verify", json!({ "generation": generation, "index": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let v = json_of(&bytes);
    assert_eq!(v["applied"], true);
    assert_eq!(v["stamp"]["index"], 1);

    let (status, _) = send(
        h.router(),
        post_json("/api/verify", json!({ "generation": generation, "index": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT, "an item is verified at most once");

    let (_, bytes) = send(h.router(), get("/api/session")).await;
    let snap = json_of(&bytes);
    assert_eq!(snap["items"][1]["verification"]["state"], "resolved");
    assert_eq!(snap["items"][0]["verification"]["state"], "idle");
}

#[tokio::test]
async fn api_verify_stale_generation_is_gone() {
    let h = Harness::new(ScriptedGenerator::canned());
    send(h.router(), post_json("/api/scan", json!({}))).await;
    send(h.router(), post_json("/api/scan", json!({}))).await;

    let (status, bytes) = send(
        h.router(),
        post_json("/api/verify", json!({ "generation": 1, "index": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::GONE);
    assert_eq!(json_of(&bytes)["kind"], "stale_batch");
}

#[tokio::test]
async fn api_email_sends_validated_items() {
    let h = Harness::new(ScriptedGenerator::canned());
    let payload = json!({
        "items": [
            { "headline": "Fed holds", "analysis": "Unchanged.", "impact": "HIGH" },
            { "headline": "missing analysis" }
        ]
    });
    let (status, bytes) = send(h.router(), post_json("/api/email", payload)).await;
    assert_eq!(status, StatusCode::OK);
    let v = json_of(&bytes);
    assert_eq!(v["success"], true);
    assert_eq!(v["itemCount"], 1);
    assert_eq!(v["sentTo"], "reader@example.com");
    assert_eq!(v["messageId"], "memory-1");
    assert_eq!(h.mailer.sent().len(), 1);
}

#[tokio::test]
async fn api_email_without_items_is_400() {
    let h = Harness::new(ScriptedGenerator::canned());
    let (status, bytes) = send(h.router(), post_json("/api/email", json!({ "items": [] }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json_of(&bytes)["error"], "No items to send");
    assert!(h.mailer.sent().is_empty());
}

#[tokio::test]
async fn api_cron_rejects_bad_secret_before_any_work() {
    let h = Harness::new(ScriptedGenerator::canned());
    for auth in [None, Some("Bearer wrong"), Some(SECRET)] {
        let mut req = Request::builder().method("GET").uri("/api/cron");
        if let Some(a) = auth {
            req = req.header("authorization", a);
        }
        let (status, bytes) = send(h.router(), req.body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "auth {auth:?} should be rejected");
        assert_eq!(json_of(&bytes)["kind"], "unauthorized");
    }
    assert_eq!(h.gen.call_count(), 0, "no upstream call on rejected triggers");
    assert!(h.mailer.sent().is_empty());
}

#[tokio::test]
async fn api_cron_with_secret_scans_and_delivers() {
    let h = Harness::new(ScriptedGenerator::canned());
    let req = Request::builder()
        .method("POST")
        .uri("/api/cron")
        .header("authorization", format!("Bearer {SECRET}"))
        .body(Body::empty())
        .unwrap();
    let (status, bytes) = send(h.router(), req).await;
    assert_eq!(status, StatusCode::OK);
    let v = json_of(&bytes);
    assert_eq!(v["success"], true);
    assert_eq!(v["itemCount"], 3);
    assert_eq!(v["sentTo"], "reader@example.com");

    let sent = h.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].html.contains("Automated Daily Scan"));
}

#[tokio::test]
async fn api_cron_without_configured_secret_rejects_everything() {
    let gen = Arc::new(ScriptedGenerator::canned());
    let pipeline = Arc::new(Pipeline::new(
        gen.clone(),
        Arc::new(MemoryMailer::new("reader@example.com")),
    ));
    let app = api::router(AppState::new(pipeline, None));
    let req = Request::builder()
        .method("GET")
        .uri("/api/cron")
        .header("authorization", "Bearer ")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(gen.call_count(), 0);
}

#[tokio::test]
async fn api_session_filters_by_sector_keeping_indices() {
    let h = Harness::new(ScriptedGenerator::canned());
    send(h.router(), post_json("/api/scan", json!({}))).await;

    let (status, bytes) = send(h.router(), get("/api/session?sector=Energy")).await;
    assert_eq!(status, StatusCode::OK);
    let v = json_of(&bytes);
    let items = v["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["stamp"]["index"], 2);
    assert_eq!(v["counts"]["total"], 3);

    let (status, _) = send(h.router(), get("/api/session?sector=Weather")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn api_report_needs_a_batch() {
    let h = Harness::new(ScriptedGenerator::canned());
    let (status, _) = send(h.router(), get("/report")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    send(h.router(), post_json("/api/scan", json!({}))).await;
    let (status, bytes) = send(h.router(), get("/report")).await;
    assert_eq!(status, StatusCode::OK);
    let html = String::from_utf8(bytes).unwrap();
    assert!(html.contains("Complete Briefing"));
    assert!(html.contains("Priority Alerts"));
}
