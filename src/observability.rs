//! Observability: process-wide metrics registry (spec §9: "metrics
//! registry... guarded by a reader-writer lock"; §6: `/metrics` returns a
//! JSON `MetricsSnapshot`, not a Prometheus text exposition, which is an
//! explicit Non-goal). Counters generalize the donor's
//! `jobs_accepted/jobs_failed/tasks_published` trio with the job-type,
//! queue, and retention counters this spec's wider job model needs.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

/// Milliseconds since the Unix epoch. Centralized here so executors and
/// the store share one clock source.
pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Metrics handle for recording counters/gauges.
#[derive(Debug, Default)]
pub struct Metrics {
    jobs_accepted: AtomicU64,
    jobs_completed: AtomicU64,
    jobs_failed: AtomicU64,
    documents_written: AtomicU64,
    retention_jobs_deleted: AtomicU64,
    retention_documents_deleted: AtomicU64,
    rate_limited_requests: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn job_accepted(&self) {
        self.jobs_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn job_completed(&self) {
        self.jobs_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn job_failed(&self) {
        self.jobs_failed.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "jobs_failed", "metric incremented");
    }

    pub fn documents_written(&self, count: u64) {
        self.documents_written.fetch_add(count, Ordering::Relaxed);
    }

    pub fn retention_swept(&self, jobs: usize, documents: usize) {
        self.retention_jobs_deleted.fetch_add(jobs as u64, Ordering::Relaxed);
        self.retention_documents_deleted
            .fetch_add(documents as u64, Ordering::Relaxed);
    }

    pub fn rate_limited(&self) {
        self.rate_limited_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            jobs_accepted: self.jobs_accepted.load(Ordering::Relaxed),
            jobs_completed: self.jobs_completed.load(Ordering::Relaxed),
            jobs_failed: self.jobs_failed.load(Ordering::Relaxed),
            documents_written: self.documents_written.load(Ordering::Relaxed),
            retention_jobs_deleted: self.retention_jobs_deleted.load(Ordering::Relaxed),
            retention_documents_deleted: self.retention_documents_deleted.load(Ordering::Relaxed),
            rate_limited_requests: self.rate_limited_requests.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub jobs_accepted: u64,
    pub jobs_completed: u64,
    pub jobs_failed: u64,
    pub documents_written: u64,
    pub retention_jobs_deleted: u64,
    pub retention_documents_deleted: u64,
    pub rate_limited_requests: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_recorded_counters() {
        let metrics = Metrics::new();
        metrics.job_accepted();
        metrics.job_completed();
        metrics.job_failed();
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.jobs_accepted, 1);
        assert_eq!(snapshot.jobs_completed, 1);
        assert_eq!(snapshot.jobs_failed, 1);
    }
}
