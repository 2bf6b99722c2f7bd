//! WorkerPool (spec §4.3): N cooperative task slots polling `JobQueue`,
//! dispatching claimed jobs to their executor, and recovering panics as
//! `INTERNAL` failures. The donor never built this loop at all — see
//! `worker/mod.rs`'s removed `WorkerConfig`/Iggy scaffolding — so the slot
//! shape here is new, grounded in the polling cadence described by the
//! spec rather than any donor dispatch code; only the retry/backoff
//! texture (exponential sleep, tracing spans) continues the donor's
//! `HttpFetcher` idiom.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::executor::context::ExecutorContext;
use crate::executor::{dispatch, ExecutionOutcome};
use crate::queue::JobQueue;
use crate::store::{JobStatus, JobType};

#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    pub max_concurrent_jobs: usize,
    pub poll_interval_ms: u64,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 4,
            poll_interval_ms: 250,
        }
    }
}

const DISPATCHABLE_TYPES: &[JobType] =
    &[JobType::Scrape, JobType::Map, JobType::Crawl, JobType::BatchScrape, JobType::Extract];

pub struct WorkerPool {
    queue: Arc<JobQueue>,
    ctx: ExecutorContext,
    config: WorkerPoolConfig,
    shutdown: CancellationToken,
}

impl WorkerPool {
    pub fn new(queue: Arc<JobQueue>, ctx: ExecutorContext, config: WorkerPoolConfig, shutdown: CancellationToken) -> Self {
        Self { queue, ctx, config, shutdown }
    }

    /// Spawns `max_concurrent_jobs` independent slot loops. Returns their
    /// join handles so callers can await a clean stop after cancelling
    /// `shutdown`.
    pub fn spawn(self: Arc<Self>) -> Vec<JoinHandle<()>> {
        (0..self.config.max_concurrent_jobs)
            .map(|slot| {
                let pool = self.clone();
                tokio::spawn(async move { pool.run_slot(slot).await })
            })
            .collect()
    }

    async fn run_slot(&self, slot: usize) {
        info!(slot, "worker slot started");
        loop {
            if self.shutdown.is_cancelled() {
                break;
            }

            let now_ms = crate::observability::now_ms();
            match self.queue.claim_next(DISPATCHABLE_TYPES, now_ms) {
                Ok(Some(job)) => {
                    let job_token = self.queue.token_for(&job.id).unwrap_or_default();
                    let cancel = combined_cancellation(self.shutdown.clone(), job_token);

                    let ctx = self.ctx.clone();
                    let job_for_task = job.clone();
                    let handle = tokio::spawn(async move { dispatch(&ctx, &job_for_task, cancel).await });

                    let now_ms = crate::observability::now_ms();
                    match handle.await {
                        Ok(ExecutionOutcome::Completed(output)) => {
                            if let Err(e) = self.queue.set_output(&job.id, output, now_ms) {
                                error!(job_id = %job.id, error = %e, "failed to persist job output");
                            }
                            if let Err(e) = self.queue.complete(&job.id, JobStatus::Completed, None, now_ms) {
                                error!(job_id = %job.id, error = %e, "failed to mark job completed");
                            }
                        }
                        Ok(ExecutionOutcome::Failed(message)) => {
                            warn!(job_id = %job.id, error = %message, "job failed");
                            let _ = self.queue.complete(&job.id, JobStatus::Failed, Some(message), now_ms);
                        }
                        Err(join_err) => {
                            error!(job_id = %job.id, error = %join_err, "executor panicked");
                            let _ = self.queue.complete(
                                &job.id,
                                JobStatus::Failed,
                                Some("INTERNAL: executor panicked".to_string()),
                                now_ms,
                            );
                        }
                    }
                }
                Ok(None) => {
                    let jitter = rand::thread_rng().gen_range(0.8..1.2);
                    let sleep_ms = (self.config.poll_interval_ms as f64 * jitter) as u64;
                    tokio::time::sleep(Duration::from_millis(sleep_ms)).await;
                }
                Err(e) => {
                    error!(slot, error = %e, "failed to claim next job");
                    tokio::time::sleep(Duration::from_millis(self.config.poll_interval_ms)).await;
                }
            }
        }
        info!(slot, "worker slot stopped");
    }
}

/// A token that cancels as soon as either `a` or `b` cancels. Lets a
/// per-job cancel (DELETE /jobs/{id}) and a pool-wide shutdown both reach
/// the same executor invocation without re-parenting either token.
fn combined_cancellation(a: CancellationToken, b: CancellationToken) -> CancellationToken {
    let combined = CancellationToken::new();
    let combined_task = combined.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = a.cancelled() => {}
            _ = b.cancelled() => {}
        }
        combined_task.cancel();
    });
    combined
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn combined_cancellation_fires_when_either_source_cancels() {
        let a = CancellationToken::new();
        let b = CancellationToken::new();
        let combined = combined_cancellation(a.clone(), b.clone());
        assert!(!combined.is_cancelled());
        b.cancel();
        combined.cancelled().await;
        assert!(combined.is_cancelled());
    }
}
