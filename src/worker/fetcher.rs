//! Fetcher (spec §4.4): issues a single HTTP GET or browser render and
//! returns raw HTML + status. Adapted from the donor's `worker::http::HttpClient`
//! (connect/request timeouts, retry with exponential backoff, proxy support);
//! generalized behind a `Fetcher` trait so executors can be tested against a
//! fake, and extended with the `Accept-Language` / non-2xx-is-not-an-error
//! rules this spec requires that the donor's downloader didn't have.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Proxy};
use thiserror::Error;
use tracing::{debug, warn};

use crate::store::FetchEngine;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("fetch cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, FetchError>;

#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub headers: Vec<(String, String)>,
    pub timeout: Duration,
    pub user_agent: String,
    /// `Accept-Language` built from `location.languages` (comma-joined) or
    /// `location.country` as a fallback token (spec §4.4).
    pub accept_language: Option<String>,
    pub use_browser: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            headers: Vec::new(),
            timeout: Duration::from_secs(30),
            user_agent: "Raito/0.1.0".to_string(),
            accept_language: None,
            use_browser: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub raw_html: String,
    pub status_code: u16,
    pub engine: FetchEngine,
}

#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str, options: &FetchOptions) -> Result<FetchOutcome>;
}

#[derive(Debug, Clone)]
pub struct HttpFetcherConfig {
    pub connect_timeout: Duration,
    pub max_retries: u32,
}

impl Default for HttpFetcherConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            max_retries: 3,
        }
    }
}

/// HTTP-engine Fetcher. Non-2xx status codes are not treated as errors —
/// the raw HTML and status propagate to DocBuilder regardless (spec §4.4);
/// only network-level failures become `UPSTREAM_ERROR`.
pub struct HttpFetcher {
    client: Client,
    config: HttpFetcherConfig,
}

impl HttpFetcher {
    pub fn new(config: HttpFetcherConfig, proxy_url: Option<&str>) -> Result<Self> {
        let mut builder = Client::builder()
            .connect_timeout(config.connect_timeout)
            .redirect(reqwest::redirect::Policy::limited(10));

        if let Some(url) = proxy_url {
            let proxy = Proxy::all(url).map_err(|e| FetchError::InvalidUrl(e.to_string()))?;
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| FetchError::Upstream(e.to_string()))?;

        Ok(Self { client, config })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str, options: &FetchOptions) -> Result<FetchOutcome> {
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            match self.fetch_once(url, options).await {
                Ok(outcome) => {
                    if attempts > 1 {
                        debug!(url, attempts, "fetch succeeded after retry");
                    }
                    return Ok(outcome);
                }
                Err(err) => {
                    if attempts >= self.config.max_retries {
                        warn!(url, attempts, error = %err, "fetch failed after retries");
                        return Err(FetchError::Upstream(format!(
                            "failed after {attempts} attempts: {err}"
                        )));
                    }
                    warn!(url, attempts, error = %err, "fetch failed, retrying");
                    let backoff = Duration::from_secs(2u64.pow(attempts - 1));
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
}

impl HttpFetcher {
    async fn fetch_once(&self, url: &str, options: &FetchOptions) -> Result<FetchOutcome> {
        debug!(url, "fetching");
        let mut request = self
            .client
            .get(url)
            .timeout(options.timeout)
            .header("User-Agent", &options.user_agent);

        if let Some(lang) = &options.accept_language {
            request = request.header("Accept-Language", lang);
        }
        for (name, value) in &options.headers {
            request = request.header(name, value);
        }

        let response = request
            .send()
            .await
            .map_err(|e| FetchError::Upstream(e.to_string()))?;

        let status_code = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| FetchError::Upstream(format!("failed to read body: {e}")))?;

        Ok(FetchOutcome {
            raw_html: body,
            status_code,
            engine: FetchEngine::Http,
        })
    }
}

/// Capability interface for a headless-browser render (spec §4.4). No
/// concrete implementation is in scope (out of scope per spec §1); a
/// disabled stub lets FormatProjector's `screenshot` format degrade per
/// the soft-failure rule in spec §4.6 instead of requiring a feature flag.
#[async_trait]
pub trait BrowserEngine: Send + Sync {
    async fn render(&self, url: &str, options: &FetchOptions) -> Result<FetchOutcome>;
    async fn capture_screenshot(&self, url: &str, full_page: bool) -> Result<String>;
}

pub struct DisabledBrowserEngine;

#[async_trait]
impl BrowserEngine for DisabledBrowserEngine {
    async fn render(&self, _url: &str, _options: &FetchOptions) -> Result<FetchOutcome> {
        Err(FetchError::Upstream("browser engine not configured".into()))
    }

    async fn capture_screenshot(&self, _url: &str, _full_page: bool) -> Result<String> {
        Err(FetchError::Upstream("browser engine not configured".into()))
    }
}
