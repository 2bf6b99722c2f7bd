//! Request/response DTOs for the `/v1/*` surface (spec §6). Field names
//! follow the spec's camelCase wire contract; internal processing uses the
//! snake_case executor/store types in [`crate::executor`] and
//! [`crate::store`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct ScrapeRequest {
    pub url: String,
    #[serde(rename = "useBrowser", default)]
    pub use_browser: bool,
    pub formats: Option<Value>,
    #[serde(default)]
    pub headers: std::collections::BTreeMap<String, String>,
    pub timeout: Option<u64>,
    pub location: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ScrapeResponse {
    pub success: bool,
    pub data: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MapRequest {
    pub url: String,
    pub limit: Option<usize>,
    pub search: Option<String>,
    #[serde(rename = "includeSubdomains", default)]
    pub include_subdomains: bool,
    #[serde(rename = "ignoreQueryParameters", default)]
    pub ignore_query_parameters: bool,
    #[serde(rename = "allowExternalLinks", default)]
    pub allow_external_links: bool,
    pub timeout: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct JobCreatedResponse {
    pub success: bool,
    pub id: Uuid,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct JobStatusResponse {
    pub success: bool,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BatchScrapeRequest {
    pub urls: Vec<String>,
    pub formats: Option<Value>,
    #[serde(rename = "maxConcurrency")]
    pub max_concurrency: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct ExtractRequest {
    pub urls: Vec<String>,
    pub schema: Value,
    pub prompt: Option<String>,
    #[serde(default)]
    pub strict: bool,
    #[serde(rename = "ignoreInvalidURLs", default)]
    pub ignore_invalid_urls: bool,
    #[serde(rename = "enableWebSearch", default)]
    pub enable_web_search: bool,
    #[serde(rename = "allowExternalLinks", default)]
    pub allow_external_links: bool,
    #[serde(rename = "showSources", default)]
    pub show_sources: bool,
    pub provider: Option<String>,
    pub model: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    pub sources: Option<Vec<String>>,
    pub limit: Option<usize>,
    #[serde(rename = "scrapeOptions")]
    pub scrape_options: Option<Value>,
    #[serde(rename = "ignoreInvalidURLs", default)]
    pub ignore_invalid_urls: bool,
    pub timeout: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub success: bool,
    pub data: SearchData,
}

#[derive(Debug, Serialize)]
pub struct SearchData {
    pub web: Vec<Value>,
}

#[derive(Debug, Deserialize)]
pub struct JobListQuery {
    #[serde(rename = "type")]
    pub job_type: Option<String>,
    pub status: Option<String>,
    pub sync: Option<bool>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct JobSummary {
    pub id: Uuid,
    pub job_type: String,
    pub status: String,
    pub url: String,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

#[derive(Debug, Serialize)]
pub struct JobListResponse {
    pub success: bool,
    pub jobs: Vec<JobSummary>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}
