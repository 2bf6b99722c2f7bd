//! Retention sweeps over `FjallStore`.
//!
//! Generalizes the donor's `ledger::pruning` module, whose `prune_jobs` and
//! `prune_logs` were stubs (only a `last_prune` metadata timestamp was
//! touched) and whose `prune_idempotency` was all-or-nothing. Each sweep
//! here deletes exactly the rows older than their own per-job-type TTL,
//! using the `inserted_at_ms`/`created_at_ms` timestamps carried in the
//! partition values.

use tracing::info;

use crate::store::error::Result;
use crate::store::fjall_store::FjallStore;
use crate::store::model::JobType;

#[derive(Debug, Clone)]
pub struct RetentionConfig {
    pub scrape_ttl_ms: i64,
    pub map_ttl_ms: i64,
    pub crawl_ttl_ms: i64,
    pub batch_scrape_ttl_ms: i64,
    pub extract_ttl_ms: i64,
    pub document_ttl_ms: i64,
    pub idempotency_ttl_ms: i64,
}

impl RetentionConfig {
    fn ttl_for(&self, job_type: JobType) -> i64 {
        match job_type {
            JobType::Scrape => self.scrape_ttl_ms,
            JobType::Map => self.map_ttl_ms,
            JobType::Crawl => self.crawl_ttl_ms,
            JobType::BatchScrape => self.batch_scrape_ttl_ms,
            JobType::Extract => self.extract_ttl_ms,
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct RetentionReport {
    pub jobs_deleted: usize,
    pub documents_deleted: usize,
    pub idempotency_deleted: usize,
}

/// Runs one pass of the retention sweep. Intended to be called on a timer
/// by the owning process (see SPEC_FULL.md §7A) rather than per-request.
pub fn run_once(store: &FjallStore, config: &RetentionConfig, now_ms: i64) -> Result<RetentionReport> {
    let mut report = RetentionReport::default();

    for job_type in [
        JobType::Scrape,
        JobType::Map,
        JobType::Crawl,
        JobType::BatchScrape,
        JobType::Extract,
    ] {
        let cutoff = now_ms - config.ttl_for(job_type);
        let deleted = store.delete_expired_jobs_by_type(job_type, cutoff)?;
        if deleted > 0 {
            info!(job_type = job_type.as_str(), deleted, "retention: expired jobs deleted");
        }
        report.jobs_deleted += deleted;
    }

    let doc_cutoff = now_ms - config.document_ttl_ms;
    report.documents_deleted = store.delete_expired_documents(doc_cutoff)?;
    if report.documents_deleted > 0 {
        info!(deleted = report.documents_deleted, "retention: expired documents deleted");
    }

    let idempotency_cutoff = now_ms - config.idempotency_ttl_ms;
    report.idempotency_deleted = store.prune_idempotency_older_than(idempotency_cutoff)?;

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;
    use uuid::Uuid;

    fn config() -> RetentionConfig {
        RetentionConfig {
            scrape_ttl_ms: 1_000,
            map_ttl_ms: 1_000,
            crawl_ttl_ms: 1_000,
            batch_scrape_ttl_ms: 1_000,
            extract_ttl_ms: 1_000,
            document_ttl_ms: 1_000,
            idempotency_ttl_ms: 1_000,
        }
    }

    #[test]
    fn sweep_deletes_only_jobs_past_their_ttl() {
        let dir = TempDir::new().unwrap();
        let store = FjallStore::open(dir.path().join("store")).unwrap();

        let old = store
            .create_job(Uuid::now_v7(), JobType::Scrape, "old".into(), json!({}), false, 10, None, None, 0)
            .unwrap();
        let fresh = store
            .create_job(Uuid::now_v7(), JobType::Scrape, "fresh".into(), json!({}), false, 10, None, None, 5_000)
            .unwrap();

        let report = run_once(&store, &config(), 5_500).unwrap();
        assert_eq!(report.jobs_deleted, 1);
        assert!(store.get_job(&old.id).unwrap().is_none());
        assert!(store.get_job(&fresh.id).unwrap().is_some());
    }
}
