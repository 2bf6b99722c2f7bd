//! Priority-aware job queue atop `FjallStore`.
//!
//! The donor's `TaskBroker` (see `examples/oiwn-FetchBox/src/queue/broker.rs`)
//! persists a task then hands it to a worker via round-robin mpsc channels,
//! with no priority and no cancellation. `JobQueue` keeps the
//! "durable-write-first" sequencing but drops the channel fan-out: workers
//! pull via `claim_next_pending` (spec §4.2/§4.3) instead of having work
//! pushed at them, which is what makes priority ordering possible at all.
//!
//! Also owns the per-job `CancellationToken` registry (spec §5): a worker
//! checks its job's token between fetch/docbuild/format stages and a
//! DELETE /jobs/{id} cancels it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use crate::queue::error::Result;
use crate::queue::waiters::WaiterRegistry;
use crate::store::{FjallStore, Job, JobStatus, JobType};

pub struct JobQueue {
    store: Arc<FjallStore>,
    waiters: Arc<WaiterRegistry>,
    cancellations: Mutex<HashMap<Uuid, CancellationToken>>,
}

impl JobQueue {
    pub fn new(store: Arc<FjallStore>) -> Self {
        Self {
            store,
            waiters: Arc::new(WaiterRegistry::new()),
            cancellations: Mutex::new(HashMap::new()),
        }
    }

    pub fn waiters(&self) -> Arc<WaiterRegistry> {
        self.waiters.clone()
    }

    pub fn store(&self) -> Arc<FjallStore> {
        self.store.clone()
    }

    #[allow(clippy::too_many_arguments)]
    pub fn enqueue(
        &self,
        id: Uuid,
        job_type: JobType,
        url: String,
        input: Value,
        sync: bool,
        priority: i32,
        tenant_id: Option<Uuid>,
        api_key_id: Option<Uuid>,
        now_ms: i64,
    ) -> Result<Job> {
        let job = self.store.create_job(
            id, job_type, url, input, sync, priority, tenant_id, api_key_id, now_ms,
        )?;
        self.cancellations
            .lock()
            .unwrap()
            .insert(job.id, CancellationToken::new());
        debug!(job_id = %job.id, "job enqueued");
        Ok(job)
    }

    pub fn claim_next(&self, types_accepted: &[JobType], now_ms: i64) -> Result<Option<Job>> {
        Ok(self.store.claim_next_pending(types_accepted, now_ms)?)
    }

    /// Marks the job terminal, notifies any sync waiter, and drops its
    /// cancellation token.
    pub fn complete(
        &self,
        id: &Uuid,
        status: JobStatus,
        error: Option<String>,
        now_ms: i64,
    ) -> Result<Job> {
        let job = self.store.update_status(id, status, error, now_ms)?;
        self.cancellations.lock().unwrap().remove(id);
        self.waiters.notify(job.clone());
        Ok(job)
    }

    pub fn set_output(&self, id: &Uuid, output: Value, now_ms: i64) -> Result<Job> {
        Ok(self.store.set_output(id, output, now_ms)?)
    }

    pub fn token_for(&self, id: &Uuid) -> Option<CancellationToken> {
        self.cancellations.lock().unwrap().get(id).cloned()
    }

    /// Cancels an in-flight or pending job. Returns `false` if no token is
    /// registered (job already terminal or unknown).
    pub fn cancel(&self, id: &Uuid) -> bool {
        if let Some(token) = self.cancellations.lock().unwrap().remove(id) {
            token.cancel();
            self.waiters.cancel(id);
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn queue() -> (JobQueue, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(FjallStore::open(dir.path().join("store")).unwrap());
        (JobQueue::new(store), dir)
    }

    #[test]
    fn enqueue_then_claim_round_trips() {
        let (queue, _dir) = queue();
        let id = Uuid::now_v7();
        queue
            .enqueue(id, JobType::Scrape, "u".into(), json!({}), false, 10, None, None, 0)
            .unwrap();

        let claimed = queue.claim_next(&[JobType::Scrape], 1).unwrap().unwrap();
        assert_eq!(claimed.id, id);
        assert_eq!(claimed.status, JobStatus::Running);
    }

    #[test]
    fn cancel_revokes_token_and_returns_false_on_second_call() {
        let (queue, _dir) = queue();
        let id = Uuid::now_v7();
        queue
            .enqueue(id, JobType::Scrape, "u".into(), json!({}), false, 10, None, None, 0)
            .unwrap();

        let token = queue.token_for(&id).unwrap();
        assert!(!token.is_cancelled());
        assert!(queue.cancel(&id));
        assert!(token.is_cancelled());
        assert!(!queue.cancel(&id), "second cancel of same job is a no-op");
    }

    #[tokio::test]
    async fn complete_wakes_registered_waiter() {
        let (queue, _dir) = queue();
        let id = Uuid::now_v7();
        queue
            .enqueue(id, JobType::Scrape, "u".into(), json!({}), true, 10, None, None, 0)
            .unwrap();
        queue.claim_next(&[JobType::Scrape], 1).unwrap();

        let rx = queue.waiters().register(id);
        queue.complete(&id, JobStatus::Completed, None, 2).unwrap();

        let job = rx.await.unwrap();
        assert_eq!(job.status, JobStatus::Completed);
    }
}
