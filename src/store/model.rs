//! Rust-side shapes for the entities in `proto::raito_store`. The proto
//! messages are the wire/disk format; these types are what the rest of the
//! crate actually works with (typed enums, `serde_json::Value` instead of a
//! raw JSON string column).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::proto;
use crate::store::error::{Result, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    Scrape,
    Map,
    Crawl,
    BatchScrape,
    Extract,
}

impl JobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::Scrape => "scrape",
            JobType::Map => "map",
            JobType::Crawl => "crawl",
            JobType::BatchScrape => "batch_scrape",
            JobType::Extract => "extract",
        }
    }
}

impl std::str::FromStr for JobType {
    type Err = StoreError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "scrape" => Ok(JobType::Scrape),
            "map" => Ok(JobType::Map),
            "crawl" => Ok(JobType::Crawl),
            "batch_scrape" => Ok(JobType::BatchScrape),
            "extract" => Ok(JobType::Extract),
            other => Err(StoreError::InvalidKey(format!("unknown job type: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

impl std::str::FromStr for JobStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "running" => Ok(JobStatus::Running),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            other => Err(StoreError::InvalidKey(format!("unknown job status: {other}"))),
        }
    }
}

/// Default job priority (spec: higher first, default 10).
pub const DEFAULT_PRIORITY: i32 = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub job_type: JobType,
    pub status: JobStatus,
    pub url: String,
    pub input: Value,
    pub output: Option<Value>,
    pub error: Option<String>,
    pub priority: i32,
    pub sync: bool,
    pub tenant_id: Option<Uuid>,
    pub api_key_id: Option<Uuid>,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
    pub completed_at_ms: Option<i64>,
}

impl Job {
    pub fn to_proto(&self) -> Result<proto::Job> {
        Ok(proto::Job {
            id: self.id.to_string(),
            job_type: self.job_type.as_str().to_string(),
            status: self.status.as_str().to_string(),
            url: self.url.clone(),
            input_json: serde_json::to_string(&self.input)?,
            output_json: self
                .output
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?,
            error: self.error.clone(),
            priority: self.priority,
            sync: self.sync,
            tenant_id: self.tenant_id.map(|id| id.to_string()),
            api_key_id: self.api_key_id.map(|id| id.to_string()),
            created_at_ms: self.created_at_ms,
            updated_at_ms: self.updated_at_ms,
            completed_at_ms: self.completed_at_ms,
        })
    }

    pub fn from_proto(p: proto::Job) -> Result<Self> {
        Ok(Job {
            id: Uuid::parse_str(&p.id).map_err(|e| StoreError::InvalidKey(e.to_string()))?,
            job_type: p.job_type.parse()?,
            status: p.status.parse()?,
            url: p.url,
            input: serde_json::from_str(&p.input_json)?,
            output: p.output_json.map(|s| serde_json::from_str(&s)).transpose()?,
            error: p.error,
            priority: p.priority,
            sync: p.sync,
            tenant_id: p
                .tenant_id
                .map(|s| Uuid::parse_str(&s))
                .transpose()
                .map_err(|e| StoreError::InvalidKey(e.to_string()))?,
            api_key_id: p
                .api_key_id
                .map(|s| Uuid::parse_str(&s))
                .transpose()
                .map_err(|e| StoreError::InvalidKey(e.to_string()))?,
            created_at_ms: p.created_at_ms,
            updated_at_ms: p.updated_at_ms,
            completed_at_ms: p.completed_at_ms,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchEngine {
    Http,
    Browser,
}

impl FetchEngine {
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchEngine::Http => "http",
            FetchEngine::Browser => "browser",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub job_id: Uuid,
    pub url: String,
    pub markdown: Option<String>,
    pub html: Option<String>,
    pub raw_html: Option<String>,
    pub metadata: Value,
    pub engine: FetchEngine,
    pub status_code: Option<i32>,
    pub created_at_ms: i64,
}

impl Document {
    pub fn to_proto(&self) -> Result<proto::Document> {
        Ok(proto::Document {
            id: self.id.to_string(),
            job_id: self.job_id.to_string(),
            url: self.url.clone(),
            markdown: self.markdown.clone(),
            html: self.html.clone(),
            raw_html: self.raw_html.clone(),
            metadata_json: serde_json::to_string(&self.metadata)?,
            engine: self.engine.as_str().to_string(),
            status_code: self.status_code,
            created_at_ms: self.created_at_ms,
        })
    }

    pub fn from_proto(p: proto::Document) -> Result<Self> {
        Ok(Document {
            id: Uuid::parse_str(&p.id).map_err(|e| StoreError::InvalidKey(e.to_string()))?,
            job_id: Uuid::parse_str(&p.job_id).map_err(|e| StoreError::InvalidKey(e.to_string()))?,
            url: p.url,
            markdown: p.markdown,
            html: p.html,
            raw_html: p.raw_html,
            metadata: serde_json::from_str(&p.metadata_json)?,
            engine: match p.engine.as_str() {
                "browser" => FetchEngine::Browser,
                _ => FetchEngine::Http,
            },
            status_code: p.status_code,
            created_at_ms: p.created_at_ms,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKey {
    pub id: Uuid,
    pub key_hash: String,
    pub label: String,
    pub is_admin: bool,
    pub rate_limit_per_minute: Option<i32>,
    pub tenant_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub created_at_ms: i64,
    pub revoked_at_ms: Option<i64>,
}

impl ApiKey {
    pub fn to_proto(&self) -> proto::ApiKey {
        proto::ApiKey {
            id: self.id.to_string(),
            key_hash: self.key_hash.clone(),
            label: self.label.clone(),
            is_admin: self.is_admin,
            rate_limit_per_minute: self.rate_limit_per_minute,
            tenant_id: self.tenant_id.map(|id| id.to_string()),
            user_id: self.user_id.map(|id| id.to_string()),
            created_at_ms: self.created_at_ms,
            revoked_at_ms: self.revoked_at_ms,
        }
    }

    pub fn from_proto(p: proto::ApiKey) -> Result<Self> {
        Ok(ApiKey {
            id: Uuid::parse_str(&p.id).map_err(|e| StoreError::InvalidKey(e.to_string()))?,
            key_hash: p.key_hash,
            label: p.label,
            is_admin: p.is_admin,
            rate_limit_per_minute: p.rate_limit_per_minute,
            tenant_id: p
                .tenant_id
                .map(|s| Uuid::parse_str(&s))
                .transpose()
                .map_err(|e| StoreError::InvalidKey(e.to_string()))?,
            user_id: p
                .user_id
                .map(|s| Uuid::parse_str(&s))
                .transpose()
                .map_err(|e| StoreError::InvalidKey(e.to_string()))?,
            created_at_ms: p.created_at_ms,
            revoked_at_ms: p.revoked_at_ms,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TenantType {
    Personal,
    Org,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    pub tenant_type: TenantType,
    pub default_api_key_rate_limit_per_minute: Option<i32>,
}

impl Tenant {
    pub fn to_proto(&self) -> proto::Tenant {
        proto::Tenant {
            id: self.id.to_string(),
            slug: self.slug.clone(),
            name: self.name.clone(),
            tenant_type: match self.tenant_type {
                TenantType::Personal => "personal".to_string(),
                TenantType::Org => "org".to_string(),
            },
            default_api_key_rate_limit_per_minute: self.default_api_key_rate_limit_per_minute,
        }
    }

    pub fn from_proto(p: proto::Tenant) -> Result<Self> {
        Ok(Tenant {
            id: Uuid::parse_str(&p.id).map_err(|e| StoreError::InvalidKey(e.to_string()))?,
            slug: p.slug,
            name: p.name,
            tenant_type: match p.tenant_type.as_str() {
                "org" => TenantType::Org,
                _ => TenantType::Personal,
            },
            default_api_key_rate_limit_per_minute: p.default_api_key_rate_limit_per_minute,
        })
    }
}
