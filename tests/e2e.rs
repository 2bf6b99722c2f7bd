//! End-to-end test of the asynchronous job path:
//!
//! 1. `POST /v1/crawl` enqueues a job.
//! 2. The worker pool picks it up, crawls a small local site, and stores
//!    the resulting documents.
//! 3. `GET /v1/crawl/:id` reports `completed` with the crawled documents.
//! 4. `GET /v1/jobs/:id/download` returns the same documents as a bundle.
//!
//! Runs entirely against a local origin server and an isolated on-disk
//! store — no external services required.

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

const ADMIN_KEY: &str = "raito_e2e_admin_key";

async fn spawn_site() -> String {
    let app = axum::Router::new()
        .route(
            "/",
            get(|| async {
                axum::response::Html(
                    r#"<html><head><title>Docs</title></head><body>
                        <h1>Docs Home</h1>
                        <a href="/guide">Guide</a>
                    </body></html>"#,
                )
            }),
        )
        .route(
            "/guide",
            get(|| async {
                axum::response::Html("<html><body><h1>Guide</h1><p>Getting started.</p></body></html>")
            }),
        );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app.into_make_service()).await.unwrap();
    });
    format!("http://{addr}")
}

fn auth_get(uri: String) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {ADMIN_KEY}"))
        .body(Body::empty())
        .unwrap()
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

#[tokio::test]
async fn crawl_job_runs_to_completion_via_worker_pool() {
    let temp_dir = TempDir::new().expect("temp dir");
    let mut config = Config::default();
    config.server.fjall_path = temp_dir.path().join("store");
    config.auth.admin_api_key = Some(ADMIN_KEY.to_string());
    config.queue.poll_interval_ms = 50;

    let handle = build_state(Arc::new(config.clone())).await.expect("build state");
    let app = router(handle.state.clone(), config.server.api.max_payload_bytes.as_u64() as usize);

    let site = spawn_site().await;

    let create = auth_post("/v1/crawl", json!({"url": site, "limit": 5}));
    let response = app.clone().oneshot(create).await.unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let body = json_body(response).await;
    let job_id = body["id"].as_str().unwrap().to_string();

    let mut status = String::new();
    let mut final_body = Value::Null;
    for _ in 0..100 {
        let response = app.clone().oneshot(auth_get(format!("/v1/crawl/{job_id}"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        status = body["status"].as_str().unwrap().to_string();
        final_body = body;
        if status == "completed" || status == "failed" {
            break;
        }
        sleep(Duration::from_millis(50)).await;
    }

    assert_eq!(status, "completed", "crawl did not complete in time: {final_body:?}");
    let documents = final_body["data"].as_array().expect("documents array");
    assert!(!documents.is_empty());
    assert!(documents.iter().any(|d| d["markdown"].as_str().unwrap_or_default().contains("Docs Home")));

    let download = app.clone().oneshot(auth_get(format!("/v1/jobs/{job_id}/download"))).await.unwrap();
    assert_eq!(download.status(), StatusCode::OK);

    handle.shutdown().await.expect("clean shutdown");
}
