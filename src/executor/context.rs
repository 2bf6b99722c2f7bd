use std::sync::Arc;
use std::time::Duration;

use crate::format::{FormatProjector, LinkFilterConfig};
use crate::llm::LlmClient;
use crate::search::SearchProvider;
use crate::store::FjallStore;
use crate::worker::fetcher::{BrowserEngine, Fetcher};

/// Everything an executor needs beyond its own job input: shared
/// capabilities (Fetcher/LlmClient/SearchProvider/BrowserEngine per spec
/// §9's "interface abstraction" note) and the per-job-type concurrency
/// ceiling `U` (spec §4.3).
#[derive(Clone)]
pub struct ExecutorContext {
    pub fetcher: Arc<dyn Fetcher>,
    pub browser: Arc<dyn BrowserEngine>,
    pub llm: Arc<dyn LlmClient>,
    pub search: Arc<dyn SearchProvider>,
    pub store: Arc<FjallStore>,
    pub link_filters: LinkFilterConfig,
    pub max_concurrent_urls_per_job: usize,
    pub default_fetch_timeout: Duration,
    pub user_agent: String,
}

impl ExecutorContext {
    pub fn projector(&self) -> FormatProjector {
        FormatProjector::new(self.llm.clone(), self.browser.clone(), self.link_filters.clone())
    }

    /// Effective per-job concurrency: the request's `maxConcurrency` capped
    /// by the configured ceiling `U` (spec §4.3: "never above U").
    pub fn effective_concurrency(&self, requested: Option<usize>) -> usize {
        requested
            .map(|r| r.min(self.max_concurrent_urls_per_job))
            .unwrap_or(self.max_concurrent_urls_per_job)
            .max(1)
    }
}
