//! Shared single-URL scrape pipeline (Fetcher → DocBuilder → FormatProjector)
//! used directly by the `scrape` job type and reused by crawl/batch/extract
//! (spec §2's flow diagram: "uses Fetcher/DocBuilder/FormatProjector").

use serde::Deserialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::docbuilder::{self, BuiltDocument};
use crate::executor::context::ExecutorContext;
use crate::executor::error::{ErrorCode, ExecutorError, Result};
use crate::executor::ExecutionOutcome;
use crate::format::{parse_formats, FormatSpec};
use crate::store::{Document, FetchEngine, Job};
use crate::worker::fetcher::FetchOptions;

#[derive(Debug, Clone, Default)]
pub struct ScrapeOptions {
    pub use_browser: bool,
    pub headers: Vec<(String, String)>,
    pub timeout: Option<std::time::Duration>,
    pub accept_language: Option<String>,
}

pub struct ScrapeResult {
    pub document_json: Value,
    pub built: BuiltDocument,
    pub engine: FetchEngine,
    pub status_code: u16,
    pub warnings: Vec<String>,
}

/// Fetches `url`, builds the parsed document, and projects it through
/// `formats`. Network failures classify as `UPSTREAM_ERROR` (spec §4.4);
/// non-2xx statuses are not errors and flow through to the caller.
pub async fn scrape_one(
    ctx: &ExecutorContext,
    url: &str,
    formats: &[FormatSpec],
    options: &ScrapeOptions,
    strict: bool,
) -> Result<ScrapeResult> {
    let fetch_options = FetchOptions {
        headers: options.headers.clone(),
        timeout: options.timeout.unwrap_or(ctx.default_fetch_timeout),
        user_agent: ctx.user_agent.clone(),
        accept_language: options.accept_language.clone(),
        use_browser: options.use_browser,
    };

    let outcome = if options.use_browser {
        ctx.browser.render(url, &fetch_options).await
    } else {
        ctx.fetcher.fetch(url, &fetch_options).await
    }
    .map_err(|e| ExecutorError::new(ErrorCode::UpstreamError, e.to_string()))?;

    let built = docbuilder::build(&outcome.raw_html, url, outcome.status_code);

    let projection = ctx
        .projector()
        .project(&built, url, formats, strict)
        .await
        .map_err(|e| ExecutorError::new(ErrorCode::ExtractFailed, e.to_string()))?;

    Ok(ScrapeResult {
        document_json: projection.document,
        built,
        engine: outcome.engine,
        status_code: outcome.status_code,
        warnings: projection.warnings,
    })
}

/// Wire shape of a `scrape` job's `input` column — the same fields
/// `ScrapeRequest` (spec §6) accepts, persisted verbatim so the job row is
/// self-contained for a worker slot to replay (spec §2: "a job row is
/// persisted as pending by JobQueue.Enqueue").
#[derive(Debug, Deserialize)]
pub struct ScrapeJobInput {
    pub url: String,
    #[serde(rename = "useBrowser", default)]
    pub use_browser: bool,
    pub formats: Option<Value>,
    #[serde(default)]
    pub headers: std::collections::BTreeMap<String, String>,
    pub timeout: Option<u64>,
    pub location: Option<String>,
}

/// `scrape` job executor: the same `scrape_one` pipeline `/v1/scrape` used
/// to call inline, now reached through `WorkerPool`/`JobQueue` like every
/// other job type (spec §2).
pub async fn execute(ctx: &ExecutorContext, job: &Job, _cancel: CancellationToken) -> ExecutionOutcome {
    let input: ScrapeJobInput = match serde_json::from_value(job.input.clone()) {
        Ok(i) => i,
        Err(e) => return ExecutionOutcome::Failed(format!("{}: invalid scrape input: {e}", ErrorCode::Internal.as_str())),
    };

    let formats = parse_formats(input.formats.as_ref());
    let options = ScrapeOptions {
        use_browser: input.use_browser,
        headers: input.headers.into_iter().collect(),
        timeout: input.timeout.map(std::time::Duration::from_millis),
        accept_language: input.location,
    };

    match scrape_one(ctx, &input.url, &formats, &options, false).await {
        Ok(result) => {
            let warning = result.warnings.first().cloned();
            ExecutionOutcome::Completed(serde_json::json!({
                "document": result.document_json,
                "warning": warning,
            }))
        }
        Err(e) => ExecutionOutcome::Failed(format!("{}: {}", e.code.as_str(), e.message)),
    }
}

pub fn to_stored_document(job_id: uuid::Uuid, url: &str, result: &ScrapeResult, now_ms: i64) -> Document {
    Document {
        id: uuid::Uuid::now_v7(),
        job_id,
        url: url.to_string(),
        markdown: Some(result.built.markdown.clone()),
        html: Some(result.built.html.clone()),
        raw_html: Some(result.built.raw_html.clone()),
        metadata: result.built.metadata.to_json(),
        engine: result.engine,
        status_code: Some(result.status_code as i32),
        created_at_ms: now_ms,
    }
}
