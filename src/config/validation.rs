use super::models::{Config, StorageProvider};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Proxy pool fallback cycle detected: {path}")]
    ProxyFallbackCycle { path: String },

    #[error("Proxy pool '{pool}' references non-existent fallback '{fallback}'")]
    InvalidFallbackReference { pool: String, fallback: String },

    #[error("max_payload_bytes ({actual}) exceeds limit of 5MB ({limit})")]
    PayloadSizeExceedsLimit { actual: u64, limit: u64 },

    #[error("Storage provider is S3 but missing credentials (access_key or secret_key)")]
    MissingS3Credentials,

    #[error("Retention TTL must be positive: {field}")]
    InvalidRetentionTTL { field: String },

    #[error("queue.max_concurrent_jobs must be positive")]
    InvalidConcurrency,
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_proxy_pools(config)?;
    validate_payload_size(config)?;
    validate_storage(config)?;
    validate_retention(config)?;
    validate_queue(config)?;
    Ok(())
}

/// Validate proxy pool fallback chains for cycles and invalid references
fn validate_proxy_pools(config: &Config) -> Result<(), ValidationError> {
    for (pool_name, pool_config) in &config.proxy.pools {
        for fallback in &pool_config.fallbacks {
            let fallback_name = fallback.strip_prefix("pools/").unwrap_or(fallback);

            if !config.proxy.pools.contains_key(fallback_name) {
                return Err(ValidationError::InvalidFallbackReference {
                    pool: pool_name.clone(),
                    fallback: fallback.clone(),
                });
            }
        }
    }

    for pool_name in config.proxy.pools.keys() {
        detect_cycles(pool_name, &config.proxy.pools, &mut HashSet::new(), &mut Vec::new())?;
    }

    Ok(())
}

/// DFS-based cycle detection in proxy fallback chains
fn detect_cycles(
    current: &str,
    pools: &HashMap<String, super::models::ProxyPoolConfig>,
    visited: &mut HashSet<String>,
    path: &mut Vec<String>,
) -> Result<(), ValidationError> {
    if path.contains(&current.to_string()) {
        path.push(current.to_string());
        return Err(ValidationError::ProxyFallbackCycle { path: path.join(" -> ") });
    }

    if visited.contains(current) {
        return Ok(());
    }

    visited.insert(current.to_string());
    path.push(current.to_string());

    if let Some(pool) = pools.get(current) {
        for fallback in &pool.fallbacks {
            let fallback_name = fallback.strip_prefix("pools/").unwrap_or(fallback);
            detect_cycles(fallback_name, pools, visited, path)?;
        }
    }

    path.pop();
    Ok(())
}

/// Ensure max_payload_bytes doesn't exceed 5MB (spec §7B request-size ceiling)
fn validate_payload_size(config: &Config) -> Result<(), ValidationError> {
    const MAX_PAYLOAD_BYTES: u64 = 5 * 1024 * 1024;

    if config.server.api.max_payload_bytes.as_u64() > MAX_PAYLOAD_BYTES {
        return Err(ValidationError::PayloadSizeExceedsLimit {
            actual: config.server.api.max_payload_bytes.as_u64(),
            limit: MAX_PAYLOAD_BYTES,
        });
    }

    Ok(())
}

/// Validate storage credentials when provider is S3
fn validate_storage(config: &Config) -> Result<(), ValidationError> {
    if config.storage.provider == StorageProvider::S3
        && (config.storage.access_key.is_none() || config.storage.secret_key.is_none())
    {
        return Err(ValidationError::MissingS3Credentials);
    }

    Ok(())
}

/// Validate per-job-type retention configuration
fn validate_retention(config: &Config) -> Result<(), ValidationError> {
    let fields = [
        ("scrape_ttl_days", config.retention.scrape_ttl_days),
        ("map_ttl_days", config.retention.map_ttl_days),
        ("crawl_ttl_days", config.retention.crawl_ttl_days),
        ("batch_scrape_ttl_days", config.retention.batch_scrape_ttl_days),
        ("extract_ttl_days", config.retention.extract_ttl_days),
        ("document_ttl_days", config.retention.document_ttl_days),
    ];

    for (field, value) in fields {
        if value == 0 {
            return Err(ValidationError::InvalidRetentionTTL { field: field.to_string() });
        }
    }

    Ok(())
}

fn validate_queue(config: &Config) -> Result<(), ValidationError> {
    if config.queue.max_concurrent_jobs == 0 {
        return Err(ValidationError::InvalidConcurrency);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::models::*;
    use super::*;

    fn create_test_config() -> Config {
        let mut pools = HashMap::new();
        pools.insert(
            "default".to_string(),
            ProxyPoolConfig {
                primary: vec!["http://proxy:8080".to_string()],
                fallbacks: vec![],
                retry_backoff_ms: 500,
                max_retries: 3,
            },
        );

        Config {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            queue: QueueConfig::default(),
            proxy: ProxyConfig { pools },
            retention: RetentionConfig::default(),
            llm: LlmConfig::default(),
            search: SearchConfig::default(),
            ratelimit: RateLimitConfig::default(),
            format: FormatConfig::default(),
            auth: AuthConfig::default(),
            telemetry: TelemetryConfig::default(),
        }
    }

    #[test]
    fn test_valid_config() {
        let config = create_test_config();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_cycle_detection() {
        let mut config = create_test_config();

        config.proxy.pools.insert(
            "pool_a".to_string(),
            ProxyPoolConfig {
                primary: vec!["http://a:8080".to_string()],
                fallbacks: vec!["pool_b".to_string()],
                retry_backoff_ms: 500,
                max_retries: 3,
            },
        );

        config.proxy.pools.insert(
            "pool_b".to_string(),
            ProxyPoolConfig {
                primary: vec!["http://b:8080".to_string()],
                fallbacks: vec!["pool_a".to_string()],
                retry_backoff_ms: 500,
                max_retries: 3,
            },
        );

        let result = validate(&config);
        assert!(matches!(result, Err(ValidationError::ProxyFallbackCycle { .. })));
    }

    #[test]
    fn test_invalid_fallback_reference() {
        let mut config = create_test_config();
        config.proxy.pools.get_mut("default").unwrap().fallbacks = vec!["nonexistent".to_string()];

        let result = validate(&config);
        assert!(matches!(result, Err(ValidationError::InvalidFallbackReference { .. })));
    }

    #[test]
    fn test_payload_size_limit() {
        let mut config = create_test_config();
        config.server.api.max_payload_bytes = ByteSize(10 * 1024 * 1024);

        let result = validate(&config);
        assert!(matches!(result, Err(ValidationError::PayloadSizeExceedsLimit { .. })));
    }

    #[test]
    fn test_s3_credentials_missing() {
        let mut config = create_test_config();
        config.storage.provider = StorageProvider::S3;
        config.storage.access_key = None;

        let result = validate(&config);
        assert!(matches!(result, Err(ValidationError::MissingS3Credentials)));
    }

    #[test]
    fn test_zero_retention_ttl() {
        let mut config = create_test_config();
        config.retention.scrape_ttl_days = 0;

        let result = validate(&config);
        assert!(matches!(result, Err(ValidationError::InvalidRetentionTTL { .. })));
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let mut config = create_test_config();
        config.queue.max_concurrent_jobs = 0;

        let result = validate(&config);
        assert!(matches!(result, Err(ValidationError::InvalidConcurrency)));
    }
}
