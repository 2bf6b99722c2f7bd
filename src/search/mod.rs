//! SearchProvider (spec §1, §6 `/search`): injected capability, "keyword →
//! URL list." Mirrors `llm::LlmClient`'s trait-seam shape; the HTTP
//! implementation targets a generic JSON search API (operators configure
//! the endpoint), following the same `reqwest::Client` idiom as the
//! donor's `worker::http::HttpClient`.

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("search provider not configured")]
    NotConfigured,

    #[error("search provider error: {0}")]
    Provider(String),
}

pub type Result<T> = std::result::Result<T, SearchError>;

#[derive(Debug, Clone)]
pub struct SearchResult {
    pub url: String,
    pub title: Option<String>,
    pub description: Option<String>,
}

#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>>;
}

pub struct NullSearchProvider;

#[async_trait]
impl SearchProvider for NullSearchProvider {
    async fn search(&self, _query: &str, _limit: usize) -> Result<Vec<SearchResult>> {
        Err(SearchError::NotConfigured)
    }
}

#[derive(Debug, Clone)]
pub struct HttpSearchConfig {
    pub base_url: String,
    pub api_key: Option<String>,
}

pub struct HttpSearchProvider {
    client: reqwest::Client,
    config: HttpSearchConfig,
}

impl HttpSearchProvider {
    pub fn new(config: HttpSearchConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }
}

#[derive(Deserialize)]
struct RawSearchResult {
    url: String,
    title: Option<String>,
    description: Option<String>,
}

#[async_trait]
impl SearchProvider for HttpSearchProvider {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>> {
        let mut request = self
            .client
            .get(&self.config.base_url)
            .query(&[("q", query), ("limit", &limit.to_string())]);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SearchError::Provider(e.to_string()))?;

        if !response.status().is_success() {
            return Err(SearchError::Provider(format!("status {}", response.status())));
        }

        let results: Vec<RawSearchResult> = response
            .json()
            .await
            .map_err(|e| SearchError::Provider(e.to_string()))?;

        Ok(results
            .into_iter()
            .take(limit)
            .map(|r| SearchResult {
                url: r.url,
                title: r.title,
                description: r.description,
            })
            .collect())
    }
}
