use crate::humanize::ByteSize;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Top-level configuration (spec §7B).
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub proxy: ProxyConfig,
    #[serde(default)]
    pub retention: RetentionConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub ratelimit: RateLimitConfig,
    #[serde(default)]
    pub format: FormatConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
    #[serde(default = "default_fjall_path")]
    pub fjall_path: PathBuf,
    #[serde(default)]
    pub api: ApiLimits,
}

/// API request limits
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiLimits {
    #[serde(default = "default_max_payload_bytes")]
    pub max_payload_bytes: ByteSize,
    #[serde(default = "default_max_urls_per_batch")]
    pub max_urls_per_batch: usize,
    #[serde(default = "default_max_headers_per_request")]
    pub max_headers_per_request: usize,
    #[serde(default = "default_max_header_value_bytes")]
    pub max_header_value_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            fjall_path: default_fjall_path(),
            api: ApiLimits::default(),
        }
    }
}

impl Default for ApiLimits {
    fn default() -> Self {
        Self {
            max_payload_bytes: default_max_payload_bytes(),
            max_urls_per_batch: default_max_urls_per_batch(),
            max_headers_per_request: default_max_headers_per_request(),
            max_header_value_bytes: default_max_header_value_bytes(),
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    "0.0.0.0:8080".parse().unwrap()
}

fn default_max_payload_bytes() -> ByteSize {
    ByteSize(5 * 1024 * 1024)
}

/// Batch-scrape cap from spec §4.8 (`1 ≤ len(urls) ≤ 1000`).
fn default_max_urls_per_batch() -> usize {
    1000
}

fn default_max_headers_per_request() -> usize {
    10
}

fn default_max_header_value_bytes() -> usize {
    1024
}

fn default_fjall_path() -> PathBuf {
    PathBuf::from("data/store")
}

/// Storage provider type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageProvider {
    S3,
    #[default]
    Local,
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub provider: StorageProvider,
    #[serde(default = "default_bucket")]
    pub bucket: String,
    pub endpoint: Option<String>,
    #[serde(skip)]
    pub access_key: Option<String>,
    #[serde(skip)]
    pub secret_key: Option<String>,
    pub region: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            provider: StorageProvider::Local,
            bucket: default_bucket(),
            endpoint: None,
            access_key: None,
            secret_key: None,
            region: None,
        }
    }
}

fn default_bucket() -> String {
    "raito-documents".to_string()
}

/// WorkerPool configuration (spec §4.3).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueueConfig {
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_max_concurrent_urls_per_job")]
    pub max_concurrent_urls_per_job: usize,
    #[serde(default = "default_sync_job_wait_timeout_ms")]
    pub sync_job_wait_timeout_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: default_max_concurrent_jobs(),
            poll_interval_ms: default_poll_interval_ms(),
            max_concurrent_urls_per_job: default_max_concurrent_urls_per_job(),
            sync_job_wait_timeout_ms: default_sync_job_wait_timeout_ms(),
        }
    }
}

fn default_max_concurrent_jobs() -> usize {
    4
}

fn default_poll_interval_ms() -> u64 {
    250
}

fn default_max_concurrent_urls_per_job() -> usize {
    8
}

fn default_sync_job_wait_timeout_ms() -> u64 {
    30_000
}

/// Handler/proxy pool configuration (retained from the proxy resolver —
/// see `config::resolver`).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProxyPoolConfig {
    pub primary: Vec<String>,
    #[serde(default)]
    pub fallbacks: Vec<String>,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_retry_backoff_ms() -> u64 {
    500
}

fn default_max_retries() -> u32 {
    3
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ProxyConfig {
    #[serde(default)]
    pub pools: HashMap<String, ProxyPoolConfig>,
    /// Name of the pool `Fetcher` resolves its outbound proxy from. `None`
    /// (the default) means the Fetcher makes direct requests.
    #[serde(default)]
    pub default_pool: Option<String>,
}

/// Per-job-type retention TTLs plus the document sweep and cleanup cadence
/// (spec §4.11).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetentionConfig {
    #[serde(default = "default_scrape_ttl_days")]
    pub scrape_ttl_days: u32,
    #[serde(default = "default_job_ttl_days")]
    pub map_ttl_days: u32,
    #[serde(default = "default_job_ttl_days")]
    pub crawl_ttl_days: u32,
    #[serde(default = "default_job_ttl_days")]
    pub batch_scrape_ttl_days: u32,
    #[serde(default = "default_job_ttl_days")]
    pub extract_ttl_days: u32,
    #[serde(default = "default_document_ttl_days")]
    pub document_ttl_days: u32,
    #[serde(default = "default_idempotency_ttl_hours")]
    pub idempotency_ttl_hours: u32,
    #[serde(default = "default_cleanup_interval_minutes")]
    pub cleanup_interval_minutes: u32,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            scrape_ttl_days: default_scrape_ttl_days(),
            map_ttl_days: default_job_ttl_days(),
            crawl_ttl_days: default_job_ttl_days(),
            batch_scrape_ttl_days: default_job_ttl_days(),
            extract_ttl_days: default_job_ttl_days(),
            document_ttl_days: default_document_ttl_days(),
            idempotency_ttl_hours: default_idempotency_ttl_hours(),
            cleanup_interval_minutes: default_cleanup_interval_minutes(),
        }
    }
}

fn default_scrape_ttl_days() -> u32 {
    7
}

fn default_job_ttl_days() -> u32 {
    30
}

fn default_document_ttl_days() -> u32 {
    30
}

fn default_idempotency_ttl_hours() -> u32 {
    24
}

fn default_cleanup_interval_minutes() -> u32 {
    15
}

impl RetentionConfig {
    pub fn to_store_retention(&self) -> crate::store::RetentionConfig {
        const DAY_MS: i64 = 24 * 60 * 60 * 1000;
        const HOUR_MS: i64 = 60 * 60 * 1000;
        crate::store::RetentionConfig {
            scrape_ttl_ms: self.scrape_ttl_days as i64 * DAY_MS,
            map_ttl_ms: self.map_ttl_days as i64 * DAY_MS,
            crawl_ttl_ms: self.crawl_ttl_days as i64 * DAY_MS,
            batch_scrape_ttl_ms: self.batch_scrape_ttl_days as i64 * DAY_MS,
            extract_ttl_ms: self.extract_ttl_days as i64 * DAY_MS,
            document_ttl_ms: self.document_ttl_days as i64 * DAY_MS,
            idempotency_ttl_ms: self.idempotency_ttl_hours as i64 * HOUR_MS,
        }
    }
}

/// LLMClient configuration (spec §1: injected capability; out of scope to
/// bundle a concrete provider). `api_key` is loaded from the environment,
/// never from the TOML file, matching the donor's S3-secret convention in
/// `config::sources::load_secrets`.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct LlmConfig {
    pub base_url: Option<String>,
    #[serde(skip)]
    pub api_key: Option<String>,
    #[serde(default = "default_llm_model")]
    pub default_model: String,
}

fn default_llm_model() -> String {
    "gpt-4o-mini".to_string()
}

/// SearchProvider configuration (spec §1).
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct SearchConfig {
    pub base_url: Option<String>,
    #[serde(skip)]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_ratelimit_per_minute")]
    pub default_per_minute: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self { default_per_minute: default_ratelimit_per_minute() }
    }
}

fn default_ratelimit_per_minute() -> u32 {
    60
}

/// FormatProjector link filters (spec §4.6).
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct FormatConfig {
    pub links_max_per_document: Option<usize>,
    #[serde(default)]
    pub links_same_domain_only: bool,
}

/// Session-cookie signing secret and admin bootstrap key (spec §4.10 /
/// `EnsureAdminAPIKey`). `session_secret`/`admin_api_key` are
/// environment-only, never persisted to the TOML file.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct AuthConfig {
    #[serde(skip)]
    pub session_secret: Option<String>,
    #[serde(skip)]
    pub admin_api_key: Option<String>,
}

/// Telemetry configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_metrics_addr")]
    pub metrics_addr: SocketAddr,
    pub otlp_endpoint: Option<String>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            metrics_addr: default_metrics_addr(),
            otlp_endpoint: None,
        }
    }
}

fn default_metrics_addr() -> SocketAddr {
    "0.0.0.0:9090".parse().unwrap()
}

/// Resolved proxy pool with flattened tiers
#[derive(Debug, Clone)]
pub struct ResolvedProxyPool {
    pub tiers: Vec<Vec<ProxyEndpoint>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyEndpoint {
    pub uri: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_spec_defaults() {
        let config = Config {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            queue: QueueConfig::default(),
            proxy: ProxyConfig::default(),
            retention: RetentionConfig::default(),
            llm: LlmConfig::default(),
            search: SearchConfig::default(),
            ratelimit: RateLimitConfig::default(),
            format: FormatConfig::default(),
            auth: AuthConfig::default(),
            telemetry: TelemetryConfig::default(),
        };

        assert_eq!(config.server.bind_addr.to_string(), "0.0.0.0:8080");
        assert_eq!(config.server.api.max_payload_bytes.as_u64(), 5 * 1024 * 1024);
        assert_eq!(config.server.api.max_urls_per_batch, 1000);
        assert_eq!(config.ratelimit.default_per_minute, 60);
    }

    #[test]
    fn retention_converts_days_to_milliseconds() {
        let retention = RetentionConfig { scrape_ttl_days: 1, ..RetentionConfig::default() };
        let store_retention = retention.to_store_retention();
        assert_eq!(store_retention.scrape_ttl_ms, 24 * 60 * 60 * 1000);
    }
}
