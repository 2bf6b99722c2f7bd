//! Route handlers for the `/v1/*` surface (spec §6).

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use uuid::Uuid;

use super::error::ApiError;
use super::models::*;
use super::state::AppState;
use super::validation::{require_valid_url, validate_search_formats};
use crate::authz::Principal;
use crate::executor::extract;
use crate::executor::scrape::{scrape_one, ScrapeOptions};
use crate::format::parse_formats;
use crate::observability::now_ms;
use crate::store::{JobFilter, JobStatus, JobType, DEFAULT_PRIORITY};

/// Resolves the caller's `Principal` from `Authorization: Bearer` or a
/// signed session cookie, then applies the sliding-window rate limit
/// (spec §4.10). Does not record job-acceptance metrics — callers do that
/// once they know the request actually results in work.
fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<Principal, ApiError> {
    let bearer = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    let cookie = headers.get(axum::http::header::COOKIE).and_then(|v| v.to_str().ok()).and_then(|v| {
        v.split(';').map(str::trim).find_map(|kv| kv.strip_prefix("raito_session="))
    });

    let principal = state.authz.resolve(bearer, cookie)?;
    if let Err(e) = state.authz.check_rate_limit(&principal, now_ms()) {
        state.metrics.rate_limited();
        return Err(e.into());
    }
    Ok(principal)
}

/// `POST /v1/scrape` (spec §6): single-URL scrape, enqueued like every
/// other job type (spec §2/§4.2) and usually returned synchronously.
pub async fn scrape(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<ScrapeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = authenticate(&state, &headers)?;
    require_valid_url(&req.url)?;

    let body = json!({
        "url": req.url,
        "useBrowser": req.use_browser,
        "formats": req.formats,
        "headers": req.headers,
        "timeout": req.timeout,
        "location": req.location,
    });

    match run_sync_job(&state, &principal, JobType::Scrape, req.url.clone(), body).await? {
        SyncJobOutcome::Completed(output) => {
            let data = output.get("document").cloned().unwrap_or(serde_json::Value::Null);
            let warning = output.get("warning").and_then(|w| w.as_str()).map(str::to_string);
            Ok((StatusCode::OK, Json(ScrapeResponse { success: true, data, warning })).into_response())
        }
        SyncJobOutcome::Deferred(id) => Ok(deferred_response(id)),
    }
}

/// `POST /v1/map` (spec §6): discovery-only request, enqueued like every
/// other job type and usually returned synchronously.
pub async fn map_urls(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<MapRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = authenticate(&state, &headers)?;
    require_valid_url(&req.url)?;

    let body = json!({
        "url": req.url,
        "limit": req.limit,
        "search": req.search,
        "includeSubdomains": req.include_subdomains,
        "ignoreQueryParameters": req.ignore_query_parameters,
        "allowExternalLinks": req.allow_external_links,
    });

    match run_sync_job(&state, &principal, JobType::Map, req.url.clone(), body).await? {
        SyncJobOutcome::Completed(output) => {
            let links = output.get("links").cloned().unwrap_or_else(|| json!([]));
            let warning = output.get("warning").cloned().unwrap_or(serde_json::Value::Null);
            Ok((StatusCode::OK, Json(json!({ "success": true, "links": links, "warning": warning }))).into_response())
        }
        SyncJobOutcome::Deferred(id) => Ok(deferred_response(id)),
    }
}

/// Outcome of [`run_sync_job`]: either the job finished within the
/// deadline, or it's still running and the caller gets a deferred response
/// (spec §4.2: "If the deadline elapses first the caller receives a
/// deferred/202-style response containing the id; the job continues").
enum SyncJobOutcome {
    Completed(serde_json::Value),
    Deferred(Uuid),
}

/// Enqueues `job_type` with `sync=true`, registers a waiter before the job
/// can be claimed (spec §4.2), and waits up to
/// `config.queue.sync_job_wait_timeout_ms` for the worker pool to finish
/// it. A job registered terminally as `Failed` surfaces as an `ApiError`
/// via [`ApiError::from_job_error`]; a timeout or dropped waiter surfaces
/// as [`SyncJobOutcome::Deferred`] so the caller can poll `GET
/// /v1/jobs/:id` instead.
async fn run_sync_job(
    state: &AppState,
    principal: &Principal,
    job_type: JobType,
    url: String,
    input: serde_json::Value,
) -> Result<SyncJobOutcome, ApiError> {
    let id = Uuid::now_v7();
    let rx = state.queue.waiters().register(id);
    state.queue.enqueue(
        id,
        job_type,
        url,
        input,
        true,
        DEFAULT_PRIORITY,
        principal.tenant_id,
        principal.api_key_id,
        now_ms(),
    )?;
    state.metrics.job_accepted();

    let deadline = std::time::Duration::from_millis(state.config.queue.sync_job_wait_timeout_ms);
    match tokio::time::timeout(deadline, rx).await {
        Ok(Ok(job)) if job.status == JobStatus::Completed => {
            state.metrics.job_completed();
            Ok(SyncJobOutcome::Completed(job.output.unwrap_or(serde_json::Value::Null)))
        }
        Ok(Ok(job)) => {
            state.metrics.job_failed();
            Err(ApiError::from_job_error(job.error.as_deref().unwrap_or("job failed")))
        }
        Ok(Err(_)) | Err(_) => Ok(SyncJobOutcome::Deferred(id)),
    }
}

fn deferred_response(id: Uuid) -> Response {
    (StatusCode::ACCEPTED, Json(JobCreatedResponse { success: true, id, status: "pending", warning: None }))
        .into_response()
}

/// `POST /v1/crawl` (spec §6): asynchronous crawl job.
pub async fn create_crawl(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = authenticate(&state, &headers)?;
    let url = body
        .get("url")
        .and_then(|v| v.as_str())
        .ok_or_else(|| ApiError::BadRequest("url is required".to_string()))?;
    require_valid_url(url)?;

    enqueue_job(&state, &principal, &headers, JobType::Crawl, url.to_string(), body, false)
}

/// `GET /v1/crawl/:id`
pub async fn get_crawl(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    crawl_like_status(&state, &headers, id)
}

/// `POST /v1/batch/scrape` (spec §6)
pub async fn create_batch(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<BatchScrapeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = authenticate(&state, &headers)?;
    if req.urls.is_empty() || req.urls.len() > 1000 {
        return Err(ApiError::BadRequest("urls must contain between 1 and 1000 entries".to_string()));
    }
    for url in &req.urls {
        require_valid_url(url)?;
    }

    let body = json!({ "urls": req.urls, "formats": req.formats, "maxConcurrency": req.max_concurrency });
    enqueue_job(&state, &principal, &headers, JobType::BatchScrape, req.urls[0].clone(), body, false)
}

/// `GET /v1/batch/scrape/:id` (mirrors crawl status, spec §6)
pub async fn get_batch(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    crawl_like_status(&state, &headers, id)
}

fn crawl_like_status(state: &AppState, headers: &HeaderMap, id: Uuid) -> Result<impl IntoResponse + use<>, ApiError> {
    let principal = authenticate(state, headers)?;
    let job = state.queue.store().get_job(&id)?.ok_or_else(|| ApiError::NotFound(id.to_string()))?;
    if !principal.can_access_tenant(job.tenant_id) {
        return Err(ApiError::NotFound(id.to_string()));
    }

    let documents = state.queue.store().get_documents_by_job(&id)?;
    let data: Vec<_> = documents.iter().map(|d| d.metadata.clone()).collect();
    let total = job.output.as_ref().and_then(|o| o.get("total")).and_then(|v| v.as_u64()).map(|n| n as usize);

    Ok(Json(JobStatusResponse {
        success: true,
        status: job.status.as_str(),
        total,
        completed: Some(documents.len()),
        data: Some(json!(data)),
        expires_at: None,
        error: job.error,
    }))
}

/// `POST /v1/extract` (spec §6): asynchronous structured extraction job.
pub async fn create_extract(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<ExtractRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = authenticate(&state, &headers)?;

    if req.urls.is_empty() {
        return Err(ApiError::BadRequest("urls must not be empty".to_string()));
    }

    let input = extract::ExtractInput {
        urls: req.urls.clone(),
        schema: req.schema.clone(),
        prompt: req.prompt.clone(),
        strict: req.strict,
        ignore_invalid_urls: req.ignore_invalid_urls,
        show_sources: req.show_sources,
        model: req.model.clone(),
    };
    extract::validate(&input).map_err(|failure| match failure.code {
        crate::executor::error::ErrorCode::InvalidSchema => ApiError::InvalidSchema(failure.message),
        crate::executor::error::ErrorCode::SchemaTooComplex => ApiError::SchemaTooComplex,
        crate::executor::error::ErrorCode::BadRequestInvalidUrl => ApiError::BadRequestInvalidUrl(failure.message),
        _ => ApiError::Internal(failure.message),
    })?;

    let body = json!({
        "urls": req.urls,
        "schema": req.schema,
        "prompt": req.prompt,
        "strict": req.strict,
        "ignoreInvalidURLs": req.ignore_invalid_urls,
        "showSources": req.show_sources,
        "model": req.model,
    });
    enqueue_job(&state, &principal, &headers, JobType::Extract, req.urls[0].clone(), body, false)
}

/// `GET /v1/extract/:id`
pub async fn get_extract(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = authenticate(&state, &headers)?;
    let job = state.queue.store().get_job(&id)?.ok_or_else(|| ApiError::NotFound(id.to_string()))?;
    if !principal.can_access_tenant(job.tenant_id) {
        return Err(ApiError::NotFound(id.to_string()));
    }

    Ok(Json(JobStatusResponse {
        success: true,
        status: job.status.as_str(),
        total: None,
        completed: None,
        data: job.output,
        expires_at: None,
        error: job.error,
    }))
}

/// `POST /v1/search` (spec §6): synchronous keyword search, optionally
/// scraping each hit. `scrapeOptions.formats` restricted to
/// {markdown, html, rawHtml}.
pub async fn search(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<SearchRequest>,
) -> Result<impl IntoResponse, ApiError> {
    authenticate(&state, &headers)?;
    validate_search_formats(req.scrape_options.as_ref())?;

    let limit = req.limit.unwrap_or(10);
    let hits = state
        .ctx
        .search
        .search(&req.query, limit)
        .await
        .map_err(|e| ApiError::UpstreamError(e.to_string()))?;

    let formats = parse_formats(req.scrape_options.as_ref().and_then(|o| o.get("formats")));
    let mut web = Vec::new();
    for hit in hits {
        if formats.is_empty() {
            web.push(json!({"url": hit.url, "title": hit.title, "description": hit.description}));
            continue;
        }
        match scrape_one(&state.ctx, &hit.url, &formats, &ScrapeOptions::default(), false).await {
            Ok(result) => web.push(result.document_json),
            Err(_) if req.ignore_invalid_urls => continue,
            Err(e) => return Err(e.into()),
        }
    }

    Ok(Json(SearchResponse { success: true, data: SearchData { web } }))
}

/// `GET /v1/jobs`
pub async fn list_jobs(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<JobListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = authenticate(&state, &headers)?;

    let filter = JobFilter {
        job_type: query.job_type.as_deref().and_then(|s| s.parse().ok()),
        status: query.status.as_deref().and_then(|s| s.parse().ok()),
        sync: query.sync,
        tenant_id: if principal.is_system_admin { None } else { principal.tenant_id },
    };

    let jobs = state
        .queue
        .store()
        .list_jobs(&filter, query.limit.unwrap_or(50), query.offset.unwrap_or(0))?
        .into_iter()
        .filter(|j| principal.can_access_tenant(j.tenant_id))
        .map(|j| JobSummary {
            id: j.id,
            job_type: j.job_type.as_str().to_string(),
            status: j.status.as_str().to_string(),
            url: j.url,
            created_at_ms: j.created_at_ms,
            updated_at_ms: j.updated_at_ms,
        })
        .collect();

    Ok(Json(JobListResponse { success: true, jobs }))
}

/// `GET /v1/jobs/:id`
pub async fn get_job(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = authenticate(&state, &headers)?;
    let job = state.queue.store().get_job(&id)?.ok_or_else(|| ApiError::NotFound(id.to_string()))?;
    if !principal.can_access_tenant(job.tenant_id) {
        return Err(ApiError::NotFound(id.to_string()));
    }
    Ok(Json(json!({
        "success": true,
        "id": job.id,
        "type": job.job_type.as_str(),
        "status": job.status.as_str(),
        "url": job.url,
        "output": job.output,
        "error": job.error,
    })))
}

/// `DELETE /v1/jobs/:id`: hard-delete, cancels if still running.
pub async fn delete_job(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = authenticate(&state, &headers)?;
    let job = state.queue.store().get_job(&id)?.ok_or_else(|| ApiError::NotFound(id.to_string()))?;
    if !principal.can_access_tenant(job.tenant_id) {
        return Err(ApiError::NotFound(id.to_string()));
    }

    state.queue.cancel(&id);
    state.queue.store().delete_job(&id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /v1/jobs/:id/download`: raw job output.
pub async fn download_job(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = authenticate(&state, &headers)?;
    let job = state.queue.store().get_job(&id)?.ok_or_else(|| ApiError::NotFound(id.to_string()))?;
    if !principal.can_access_tenant(job.tenant_id) {
        return Err(ApiError::NotFound(id.to_string()));
    }
    if !job.status.is_terminal() {
        return Err(ApiError::BadRequest("job has not completed".to_string()));
    }
    Ok(Json(job.output.unwrap_or(serde_json::Value::Null)))
}

/// `GET /healthz`: no auth (spec §6).
pub async fn healthz() -> impl IntoResponse {
    Json(HealthResponse { status: "healthy", version: env!("CARGO_PKG_VERSION") })
}

/// `GET /metrics`: JSON `MetricsSnapshot`, not Prometheus exposition
/// (spec §1 Non-goal; see SPEC_FULL §6).
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.metrics.snapshot())
}

const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

/// Reuses a previously enqueued job if `headers` carries an `Idempotency-Key`
/// this tenant has already submitted (spec §3A): returns the prior job's
/// current status instead of creating a duplicate.
fn idempotent_replay(
    state: &AppState,
    principal: &Principal,
    headers: &HeaderMap,
) -> Result<Option<JobCreatedResponse>, ApiError> {
    let Some(key) = headers.get(IDEMPOTENCY_KEY_HEADER).and_then(|v| v.to_str().ok()) else {
        return Ok(None);
    };
    let Some(existing_id) = state.queue.store().get_idempotent(&principal.tenant_id, key)? else {
        return Ok(None);
    };
    let status = match state.queue.store().get_job(&existing_id)? {
        Some(job) => job.status.as_str(),
        None => "pending",
    };
    Ok(Some(JobCreatedResponse { success: true, id: existing_id, status, warning: None }))
}

fn enqueue_job(
    state: &AppState,
    principal: &Principal,
    headers: &HeaderMap,
    job_type: JobType,
    url: String,
    input: serde_json::Value,
    sync: bool,
) -> Result<impl IntoResponse + use<>, ApiError> {
    if let Some(replay) = idempotent_replay(state, principal, headers)? {
        return Ok((StatusCode::ACCEPTED, Json(replay)));
    }

    let id = Uuid::now_v7();
    let job = state.queue.enqueue(
        id,
        job_type,
        url,
        input,
        sync,
        DEFAULT_PRIORITY,
        principal.tenant_id,
        principal.api_key_id,
        now_ms(),
    )?;
    state.metrics.job_accepted();

    if let Some(key) = headers.get(IDEMPOTENCY_KEY_HEADER).and_then(|v| v.to_str().ok()) {
        state.queue.store().remember_idempotency(&principal.tenant_id, key, job.id, now_ms())?;
    }

    Ok((StatusCode::ACCEPTED, Json(JobCreatedResponse { success: true, id: job.id, status: "pending", warning: None })))
}
