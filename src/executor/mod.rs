//! Per-job-type execution strategies (spec §4.7-§4.9). `dispatch` is the
//! "single-level match" from spec §9's "variants over inheritance" note:
//! the job's `JobType` selects the executor, each executor owns its input
//! payload shape and its own success/failure semantics, and returns a
//! uniform `ExecutionOutcome` for `WorkerPool` to persist.

pub mod batch;
pub mod context;
pub mod crawl;
pub mod discover;
pub mod error;
pub mod extract;
pub mod map;
pub mod scrape;

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::executor::context::ExecutorContext;
use crate::store::Job;

pub enum ExecutionOutcome {
    Completed(Value),
    Failed(String),
}

/// Dispatches `job` to its type-specific executor. Every job type (spec
/// §3: `scrape|map|crawl|batch_scrape|extract`) goes through the same
/// `JobQueue`/`WorkerPool` path; the HTTP layer chooses whether to wait for
/// the result synchronously (spec §4.2) or return the job id immediately.
pub async fn dispatch(ctx: &ExecutorContext, job: &Job, cancel: CancellationToken) -> ExecutionOutcome {
    use crate::store::JobType;

    match job.job_type {
        JobType::Scrape => scrape::execute(ctx, job, cancel).await,
        JobType::Map => map::execute(ctx, job, cancel).await,
        JobType::Crawl => crawl::execute(ctx, job, cancel).await,
        JobType::BatchScrape => batch::execute(ctx, job, cancel).await,
        JobType::Extract => extract::execute(ctx, job, cancel).await,
    }
}
