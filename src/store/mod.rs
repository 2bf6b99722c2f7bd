//! Persistence: the embedded Fjall-backed store for jobs, documents, API
//! keys and tenants. Generalizes the donor's `ledger` module (see
//! SPEC_FULL.md §3A/§4.1) from a single echo-manifest shape into the
//! five-variant `Job` model, and replaces its no-op pruning with real
//! per-job-type TTL deletion in `retention`.

pub mod error;
pub mod fjall_store;
pub mod model;
pub mod partitions;
pub mod retention;

pub use error::{Result, StoreError};
pub use fjall_store::{FjallStore, JobFilter, StoreStats};
pub use model::{ApiKey, Document, FetchEngine, Job, JobStatus, JobType, Tenant, TenantType, DEFAULT_PRIORITY};
pub use retention::{run_once as run_retention_once, RetentionConfig, RetentionReport};
