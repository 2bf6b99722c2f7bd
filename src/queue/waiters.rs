//! Process-local registry letting a synchronous request (`sync: true`,
//! spec §4.2) block on `oneshot::Receiver<Job>` until the worker pool
//! finishes the job, instead of polling `GetJob` in a loop.
//!
//! No donor equivalent (the donor never implemented a sync path); the
//! `Mutex<HashMap<..>>` shape follows the same locking idiom the donor uses
//! for `TaskBroker`'s round-robin index in `queue/broker.rs`.

use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::oneshot;
use uuid::Uuid;

use crate::store::Job;

#[derive(Default)]
pub struct WaiterRegistry {
    waiters: Mutex<HashMap<Uuid, oneshot::Sender<Job>>>,
}

impl WaiterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers interest in `job_id`'s completion. Must be called before
    /// the job can be claimed by a worker, or the completion notification
    /// may race ahead of the registration.
    pub fn register(&self, job_id: Uuid) -> oneshot::Receiver<Job> {
        let (tx, rx) = oneshot::channel();
        self.waiters.lock().unwrap().insert(job_id, tx);
        rx
    }

    /// Wakes a waiter with the finished job. A no-op if nobody is waiting
    /// (the common case: most jobs are async and have no registered waiter).
    pub fn notify(&self, job: Job) {
        if let Some(tx) = self.waiters.lock().unwrap().remove(&job.id) {
            // Ignore send errors: the receiver side may have timed out and
            // dropped, which is a legitimate outcome for a sync request.
            let _ = tx.send(job);
        }
    }

    pub fn cancel(&self, job_id: &Uuid) {
        self.waiters.lock().unwrap().remove(job_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{JobStatus, JobType};
    use serde_json::json;

    fn sample_job(id: Uuid) -> Job {
        Job {
            id,
            job_type: JobType::Scrape,
            status: JobStatus::Completed,
            url: "https://example.com".into(),
            input: json!({}),
            output: Some(json!({"markdown": "hi"})),
            error: None,
            priority: 10,
            sync: true,
            tenant_id: None,
            api_key_id: None,
            created_at_ms: 0,
            updated_at_ms: 1,
            completed_at_ms: Some(1),
        }
    }

    #[tokio::test]
    async fn register_then_notify_delivers_job() {
        let registry = WaiterRegistry::new();
        let id = Uuid::now_v7();
        let rx = registry.register(id);

        registry.notify(sample_job(id));

        let job = rx.await.unwrap();
        assert_eq!(job.id, id);
    }

    #[tokio::test]
    async fn notify_without_registration_is_a_no_op() {
        let registry = WaiterRegistry::new();
        registry.notify(sample_job(Uuid::now_v7()));
    }
}
