//! End-to-end coverage of the batch-scrape and extract executors against a
//! local stub HTTP origin (spec §4.7/§4.9, §7C). `e2e.rs` already exercises
//! the crawl executor this way; this file covers the two SPEC_FULL §7C
//! promised but previously untested cases, including the `ignoreInvalidURLs`
//! scenario from spec §8 scenario 4.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::routing::get;
use raito::api::{build_state, router};
use raito::config::Config;
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::time::sleep;
use tower::ServiceExt;

const ADMIN_KEY: &str = "raito_executor_test_admin_key";

async fn spawn_origin() -> String {
    let app = axum::Router::new()
        .route("/a", get(|| async { axum::response::Html("<html><body><h1>Page A</h1></body></html>") }))
        .route("/b", get(|| async { axum::response::Html("<html><body><h1>Page B</h1></body></html>") }));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app.into_make_service()).await.unwrap();
    });
    format!("http://{addr}")
}

fn auth_get(uri: String) -> Request<Body> {
    Request::builder().uri(uri).header(header::AUTHORIZATION, format!("Bearer {ADMIN_KEY}")).body(Body::empty()).unwrap()
}

fn auth_post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .method("POST")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, format!("Bearer {ADMIN_KEY}"))
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn test_app() -> (axum::Router, TempDir) {
    let temp_dir = TempDir::new().expect("temp dir");
    let mut config = Config::default();
    config.server.fjall_path = temp_dir.path().join("store");
    config.auth.admin_api_key = Some(ADMIN_KEY.to_string());
    config.queue.poll_interval_ms = 50;

    let handle = build_state(Arc::new(config.clone())).await.expect("build state");
    let app = router(handle.state.clone(), config.server.api.max_payload_bytes.as_u64() as usize);
    std::mem::forget(handle);
    (app, temp_dir)
}

/// Polls `path` (a crawl/batch/extract status endpoint) until its `status`
/// field reaches a terminal state or the retry budget runs out.
async fn poll_until_terminal(app: &axum::Router, path: String) -> Value {
    let mut last = Value::Null;
    for _ in 0..100 {
        let response = app.clone().oneshot(auth_get(path.clone())).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        let status = body["status"].as_str().unwrap_or_default();
        last = body;
        if status == "completed" || status == "failed" {
            return last;
        }
        sleep(Duration::from_millis(50)).await;
    }
    last
}

#[tokio::test]
async fn batch_scrape_runs_every_url_through_the_worker_pool() {
    let (app, _dir) = test_app().await;
    let origin = spawn_origin().await;

    let create = auth_post(
        "/v1/batch/scrape",
        json!({"urls": [format!("{origin}/a"), format!("{origin}/b")]}),
    );
    let response = app.clone().oneshot(create).await.unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let id = json_body(response).await["id"].as_str().unwrap().to_string();

    let body = poll_until_terminal(&app, format!("/v1/batch/scrape/{id}")).await;
    assert_eq!(body["status"], "completed", "batch scrape did not complete in time: {body:?}");

    let documents = body["data"].as_array().expect("documents array");
    assert_eq!(documents.len(), 2);
    let markdown: Vec<&str> = documents.iter().filter_map(|d| d["markdown"].as_str()).collect();
    assert!(markdown.iter().any(|m| m.contains("Page A")));
    assert!(markdown.iter().any(|m| m.contains("Page B")));
}

#[tokio::test]
async fn extract_reports_a_failure_per_url_when_the_llm_is_not_configured() {
    let (app, _dir) = test_app().await;
    let origin = spawn_origin().await;

    let create = auth_post(
        "/v1/extract",
        json!({
            "urls": [format!("{origin}/a")],
            "schema": {"type": "object", "properties": {"title": {"type": "string"}}},
        }),
    );
    let response = app.clone().oneshot(create).await.unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let id = json_body(response).await["id"].as_str().unwrap().to_string();

    let body = poll_until_terminal(&app, format!("/v1/extract/{id}")).await;
    assert_eq!(body["status"], "completed", "extract did not complete in time: {body:?}");

    let summary = &body["data"]["summary"];
    assert_eq!(summary["total"], 1);
    assert_eq!(summary["success"], 0);
    assert_eq!(summary["failed"], 1);
    assert_eq!(body["data"]["results"][0]["error"], "EXTRACT_FAILED");
}

/// spec §8 scenario 4: a 3-URL extract request with one malformed URL and
/// `ignoreInvalidURLs: true` drops the malformed URL before scraping, so
/// `summary.total` is 2, not 3.
#[tokio::test]
async fn extract_drops_malformed_urls_when_ignore_invalid_urls_is_set() {
    let (app, _dir) = test_app().await;
    let origin = spawn_origin().await;

    let create = auth_post(
        "/v1/extract",
        json!({
            "urls": [format!("{origin}/a"), "not a url", format!("{origin}/b")],
            "schema": {"type": "object", "properties": {"title": {"type": "string"}}},
            "ignoreInvalidURLs": true,
        }),
    );
    let response = app.clone().oneshot(create).await.unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let id = json_body(response).await["id"].as_str().unwrap().to_string();

    let body = poll_until_terminal(&app, format!("/v1/extract/{id}")).await;
    assert_eq!(body["status"], "completed", "extract did not complete in time: {body:?}");

    let summary = &body["data"]["summary"];
    assert_eq!(summary["total"], 2);
    assert_eq!(body["data"]["results"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn extract_rejects_malformed_urls_by_default() {
    let (app, _dir) = test_app().await;
    let origin = spawn_origin().await;

    let create = auth_post(
        "/v1/extract",
        json!({
            "urls": [format!("{origin}/a"), "not a url"],
            "schema": {"type": "object"},
        }),
    );
    let response = app.oneshot(create).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["code"], "BAD_REQUEST_INVALID_URL");
}
