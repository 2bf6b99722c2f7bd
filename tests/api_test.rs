//! HTTP-surface integration tests for the `/v1/*` routes (spec §6).
//!
//! Each test spins up an isolated `FjallStore` (via `TempDir`) plus, where
//! network access is needed, a tiny axum server acting as the scrape
//! target — the same "local origin instead of a real network call" idiom
//! the donor used for its own end-to-end test.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::routing::get;
use raito::api::{build_state, router};
use raito::config::Config;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

const ADMIN_KEY: &str = "raito_test_admin_key";

fn test_config(temp_dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.server.fjall_path = temp_dir.path().join("store");
    config.auth.admin_api_key = Some(ADMIN_KEY.to_string());
    config
}

async fn build_test_app() -> (axum::Router, TempDir) {
    let temp_dir = TempDir::new().expect("temp dir");
    let config = test_config(&temp_dir);
    let handle = build_state(Arc::new(config.clone())).await.expect("build state");
    let app = router(handle.state.clone(), config.server.api.max_payload_bytes.as_u64() as usize);
    // Tests never shut the worker pool down cleanly; it stops when the
    // process exits. Discard the handle rather than leak the warning about
    // an unused CancellationToken.
    std::mem::forget(handle);
    (app, temp_dir)
}

/// A minimal local HTTP origin serving canned HTML, so scrape/map/crawl
/// tests don't depend on the network.
async fn spawn_origin() -> String {
    let app = axum::Router::new()
        .route(
            "/",
            get(|| async {
                axum::response::Html(
                    r#"<html><head><title>Home</title></head><body>
                        <h1>Welcome</h1>
                        <a href="/about">About</a>
                    </body></html>"#,
                )
            }),
        )
        .route(
            "/about",
            get(|| async { axum::response::Html("<html><body><h1>About</h1></body></html>") }),
        );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app.into_make_service()).await.unwrap();
    });
    format!("http://{addr}")
}

fn auth_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .method(method)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, format!("Bearer {ADMIN_KEY}"))
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn healthz_requires_no_auth() {
    let (app, _dir) = build_test_app().await;
    let request = Request::builder().uri("/healthz").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn scrape_without_credentials_is_unauthenticated() {
    let (app, _dir) = build_test_app().await;
    let request = Request::builder()
        .uri("/v1/scrape")
        .method("POST")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({"url": "https://example.com"}).to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn scrape_rejects_non_http_url() {
    let (app, _dir) = build_test_app().await;
    let request = auth_request("POST", "/v1/scrape", json!({"url": "ftp://example.com"}));
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = json_body(response).await;
    assert_eq!(body["code"], "BAD_REQUEST_INVALID_URL");
}

#[tokio::test]
async fn scrape_returns_markdown_for_a_live_origin() {
    let (app, _dir) = build_test_app().await;
    let origin = spawn_origin().await;

    let request = auth_request("POST", "/v1/scrape", json!({"url": origin}));
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert!(body["success"].as_bool().unwrap());
    assert!(body["data"]["markdown"].as_str().unwrap().contains("Welcome"));
}

#[tokio::test]
async fn map_discovers_linked_pages() {
    let (app, _dir) = build_test_app().await;
    let origin = spawn_origin().await;

    let request = auth_request("POST", "/v1/map", json!({"url": origin}));
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    let links = body["links"].as_array().unwrap();
    assert!(links.iter().any(|l| l["url"].as_str().unwrap().ends_with("/about")));
}

#[tokio::test]
async fn crawl_is_accepted_and_reachable_via_get() {
    let (app, _dir) = build_test_app().await;
    let origin = spawn_origin().await;

    let create = auth_request("POST", "/v1/crawl", json!({"url": origin}));
    let response = app.clone().oneshot(create).await.unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let body = json_body(response).await;
    let id = body["id"].as_str().unwrap();

    let get_request = Request::builder()
        .uri(format!("/v1/crawl/{id}"))
        .header(header::AUTHORIZATION, format!("Bearer {ADMIN_KEY}"))
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(get_request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn batch_scrape_rejects_empty_url_list() {
    let (app, _dir) = build_test_app().await;
    let request = auth_request("POST", "/v1/batch/scrape", json!({"urls": []}));
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn extract_rejects_non_object_schema() {
    let (app, _dir) = build_test_app().await;
    let request = auth_request(
        "POST",
        "/v1/extract",
        json!({"urls": ["https://example.com"], "schema": "not-an-object"}),
    );
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["code"], "INVALID_SCHEMA");
}

#[tokio::test]
async fn search_rejects_disallowed_format() {
    let (app, _dir) = build_test_app().await;
    let request = auth_request(
        "POST",
        "/v1/search",
        json!({"query": "rust", "scrapeOptions": {"formats": ["json"]}}),
    );
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["code"], "UNSUPPORTED_FORMAT");
}

#[tokio::test]
async fn jobs_list_is_scoped_to_admin_tenant() {
    let (app, _dir) = build_test_app().await;
    let origin = spawn_origin().await;

    let create = auth_request("POST", "/v1/crawl", json!({"url": origin}));
    app.clone().oneshot(create).await.unwrap();

    let list_request = Request::builder()
        .uri("/v1/jobs")
        .header(header::AUTHORIZATION, format!("Bearer {ADMIN_KEY}"))
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(list_request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["jobs"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn unknown_job_id_is_not_found() {
    let (app, _dir) = build_test_app().await;
    let id = uuid::Uuid::now_v7();
    let request = Request::builder()
        .uri(format!("/v1/jobs/{id}"))
        .header(header::AUTHORIZATION, format!("Bearer {ADMIN_KEY}"))
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
