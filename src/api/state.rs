//! Shared capability bundle handed to every route handler. Replaces the
//! donor's `registry`/`broker` pair (a `HandlerRegistry` + `TaskBroker`
//! built around echo manifests) with the job-type-aware `JobQueue` and
//! `ExecutorContext` this crate's routes actually need.

use std::sync::Arc;

use crate::authz::AuthZ;
use crate::config::Config;
use crate::executor::context::ExecutorContext;
use crate::observability::Metrics;
use crate::queue::JobQueue;
use crate::storage::StorageClient;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub queue: Arc<JobQueue>,
    pub ctx: ExecutorContext,
    pub authz: Arc<AuthZ>,
    pub metrics: Arc<Metrics>,
    pub storage: Arc<StorageClient>,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        queue: Arc<JobQueue>,
        ctx: ExecutorContext,
        authz: Arc<AuthZ>,
        storage: Arc<StorageClient>,
    ) -> Self {
        Self { config, queue, ctx, authz, metrics: Arc::new(Metrics::new()), storage }
    }
}
