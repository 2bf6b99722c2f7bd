//! Configuration management for Raito
//!
//! This module provides a layered configuration system that loads settings from:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables (highest priority)
//!
//! # Usage
//!
//! ```no_run
//! use raito::config::Config;
//!
//! let config = Config::load().expect("Failed to load configuration");
//! println!("Server listening on: {}", config.server.bind_addr);
//! ```
//!
//! # Environment Variables
//!
//! Configuration can be overridden using environment variables with the pattern:
//! `RAITO__<section>__<key>`
//!
//! Examples:
//! - `RAITO__SERVER__BIND_ADDR=0.0.0.0:9000`
//! - `RAITO__QUEUE__MAX_CONCURRENT_JOBS=8`
//!
//! Secrets (`RAITO_LLM_API_KEY`, `RAITO_SEARCH_API_KEY`, `RAITO_SESSION_SECRET`,
//! `RAITO_ADMIN_API_KEY`, `S3_ACCESS_KEY`/`S3_SECRET_KEY`) are read directly from
//! the environment and never accepted from the TOML file.
//!
//! # Configuration File
//!
//! By default, the configuration is loaded from `config/raito.toml`.
//! This can be overridden using the `RAITO_CONFIG` environment variable.

mod models;
mod resolver;
mod sources;
mod validation;

pub use crate::humanize::ByteSize;
pub use models::{
    ApiLimits, AuthConfig, Config, FormatConfig, LlmConfig, ProxyConfig, ProxyEndpoint,
    ProxyPoolConfig, QueueConfig, RateLimitConfig, ResolvedProxyPool, RetentionConfig,
    SearchConfig, ServerConfig, StorageConfig, StorageProvider, TelemetryConfig,
};
pub use resolver::{ProxyGraph, ResolverError};
pub use validation::ValidationError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),

    #[error("Proxy resolution failed: {0}")]
    ResolverError(#[from] ResolverError),
}

impl Config {
    /// Load configuration from all sources (file + environment)
    ///
    /// Configuration is loaded with the following priority (highest to lowest):
    /// 1. Environment variables (`RAITO__*`)
    /// 2. TOML file (default: `config/raito.toml`)
    /// 3. Default values
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration file is malformed
    /// - Validation fails (cycles, invalid references, etc.)
    pub fn load() -> Result<Self, ConfigError> {
        let config = sources::load()?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path
    ///
    /// Useful for testing with custom configuration files.
    pub fn load_from_path(path: std::path::PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Get a proxy resolver for this configuration
    pub fn proxy_resolver(&self) -> ProxyGraph<'_> {
        ProxyGraph::new(&self.proxy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_minimal_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[proxy.pools.default]
primary = ["http://proxy:8080"]
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let config = Config::load_from_path(config_path).unwrap();
        assert_eq!(config.proxy.pools.len(), 1);
    }

    #[test]
    fn test_validation_catches_fallback_cycle() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[proxy.pools.a]
primary = ["http://a:8080"]
fallbacks = ["b"]

[proxy.pools.b]
primary = ["http://b:8080"]
fallbacks = ["a"]
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let result = Config::load_from_path(config_path);
        assert!(result.is_err());
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::ValidationError(ValidationError::ProxyFallbackCycle { .. })
        ));
    }

    #[test]
    fn test_proxy_resolver_integration() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[proxy.pools.primary]
primary = ["http://primary:8080"]
fallbacks = ["backup"]

[proxy.pools.backup]
primary = ["http://backup:8080"]
fallbacks = []
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let config = Config::load_from_path(config_path).unwrap();
        let resolver = config.proxy_resolver();
        let resolved = resolver.resolve("primary").unwrap();

        assert_eq!(resolved.tiers.len(), 2);
        assert_eq!(resolved.tiers[0][0].uri, "http://primary:8080");
        assert_eq!(resolved.tiers[1][0].uri, "http://backup:8080");
    }

    #[test]
    fn test_full_config_example() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[server]
bind_addr = "0.0.0.0:8080"
fjall_path = "data/store"

[storage]
provider = "local"
bucket = "raito-default"

[queue]
max_concurrent_jobs = 4
poll_interval_ms = 250

[proxy.pools.default]
primary = ["http://proxy-a:8080", "http://proxy-b:8080"]
fallbacks = ["global"]
retry_backoff_ms = 500
max_retries = 3

[proxy.pools.global]
primary = ["http://global-1:8080"]
fallbacks = []

[retention]
scrape_ttl_days = 7
document_ttl_days = 30

[telemetry]
metrics_addr = "0.0.0.0:9090"
otlp_endpoint = "http://otel-collector:4317"
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let config = Config::load_from_path(config_path).unwrap();

        assert_eq!(config.server.bind_addr.to_string(), "0.0.0.0:8080");
        assert_eq!(config.proxy.pools.len(), 2);
        assert_eq!(config.retention.scrape_ttl_days, 7);
        assert!(config.telemetry.otlp_endpoint.is_some());

        let resolver = config.proxy_resolver();
        let resolved_default = resolver.resolve("default").unwrap();
        assert_eq!(resolved_default.tiers.len(), 2);
    }
}
