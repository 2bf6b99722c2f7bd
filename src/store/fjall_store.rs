use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle};
use prost::Message;
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use crate::store::error::{Result, StoreError};
use crate::store::model::{ApiKey, Document, Job, JobStatus, JobType, Tenant};
use crate::store::partitions::{
    api_key_key, decode_idempotency_value, decode_job_id, document_key, document_prefix,
    encode_idempotency_value, idempotency_key, job_key, priority_index_key, tenant_key,
    tenant_slug_key,
};

/// Fjall-backed implementation of the Store component (spec §4.1).
///
/// Mirrors the donor `ledger::FjallStore` shape (one `PartitionHandle` per
/// concern, opened together under a single `Keyspace`) generalized from a
/// single echo-manifest model to the five job-type variant model. The claim
/// path (`claim_next_pending`) takes a process-local mutex around the
/// scan-then-CAS sequence in place of the donor's absent locking — see
/// SPEC_FULL.md §3A for why a database-level `SKIP LOCKED` isn't available
/// on an embedded LSM store.
#[derive(Clone)]
pub struct FjallStore {
    keyspace: Keyspace,
    jobs: PartitionHandle,
    jobs_by_priority: PartitionHandle,
    documents: PartitionHandle,
    api_keys: PartitionHandle,
    tenants: PartitionHandle,
    tenants_by_slug: PartitionHandle,
    idempotency: PartitionHandle,
    claim_lock: std::sync::Arc<Mutex<()>>,
}

#[derive(Debug, Default, Clone)]
pub struct JobFilter {
    pub job_type: Option<JobType>,
    pub status: Option<JobStatus>,
    pub sync: Option<bool>,
    pub tenant_id: Option<Uuid>,
}

impl FjallStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "opening fjall store");
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let keyspace = Config::new(path).open()?;
        let jobs = keyspace.open_partition("jobs", PartitionCreateOptions::default())?;
        let jobs_by_priority =
            keyspace.open_partition("jobs_by_priority", PartitionCreateOptions::default())?;
        let documents = keyspace.open_partition("documents", PartitionCreateOptions::default())?;
        let api_keys = keyspace.open_partition("api_keys", PartitionCreateOptions::default())?;
        let tenants = keyspace.open_partition("tenants", PartitionCreateOptions::default())?;
        let tenants_by_slug =
            keyspace.open_partition("tenants_by_slug", PartitionCreateOptions::default())?;
        let idempotency =
            keyspace.open_partition("idempotency", PartitionCreateOptions::default())?;

        Ok(Self {
            keyspace,
            jobs,
            jobs_by_priority,
            documents,
            api_keys,
            tenants,
            tenants_by_slug,
            idempotency,
            claim_lock: std::sync::Arc::new(Mutex::new(())),
        })
    }

    fn put_job(&self, job: &Job) -> Result<()> {
        let value = job.to_proto()?.encode_to_vec();
        self.jobs.insert(job_key(&job.id), value)?;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    pub fn create_job(
        &self,
        id: Uuid,
        job_type: JobType,
        url: String,
        input: Value,
        sync: bool,
        priority: i32,
        tenant_id: Option<Uuid>,
        api_key_id: Option<Uuid>,
        now_ms: i64,
    ) -> Result<Job> {
        let job = Job {
            id,
            job_type,
            status: JobStatus::Pending,
            url,
            input,
            output: None,
            error: None,
            priority,
            sync,
            tenant_id,
            api_key_id,
            created_at_ms: now_ms,
            updated_at_ms: now_ms,
            completed_at_ms: None,
        };

        self.put_job(&job)?;
        self.jobs_by_priority.insert(
            priority_index_key(job.priority, job.created_at_ms, &job.id),
            job.id.as_bytes(),
        )?;

        debug!(job_id = %job.id, job_type = job.job_type.as_str(), "job created");
        Ok(job)
    }

    pub fn get_job(&self, id: &Uuid) -> Result<Option<Job>> {
        match self.jobs.get(job_key(id))? {
            Some(bytes) => Ok(Some(Job::from_proto(proto_decode_job(&bytes)?)?)),
            None => Ok(None),
        }
    }

    /// Atomically claim the highest-priority, earliest pending job whose
    /// type is in `types_accepted`. See SPEC_FULL.md §3A for why the mutex
    /// substitutes for `FOR UPDATE SKIP LOCKED`.
    pub fn claim_next_pending(&self, types_accepted: &[JobType], now_ms: i64) -> Result<Option<Job>> {
        let _guard = self.claim_lock.lock().unwrap();

        for item in self.jobs_by_priority.iter() {
            let (index_key, value) = item?;
            let job_id = match decode_job_id(&value) {
                Some(id) => id,
                None => continue,
            };

            let job_bytes = match self.jobs.get(job_key(&job_id))? {
                Some(bytes) => bytes,
                None => {
                    // Stale index entry; drop it and keep scanning.
                    self.jobs_by_priority.remove(index_key)?;
                    continue;
                }
            };

            let mut job = Job::from_proto(proto_decode_job(&job_bytes)?)?;
            if job.status != JobStatus::Pending || !types_accepted.contains(&job.job_type) {
                continue;
            }

            job.status = JobStatus::Running;
            job.updated_at_ms = now_ms;
            self.put_job(&job)?;
            self.jobs_by_priority.remove(index_key)?;

            debug!(job_id = %job.id, "job claimed");
            return Ok(Some(job));
        }

        Ok(None)
    }

    /// Status transition only from `pending`/`running`; sets `completed_at`
    /// when the new status is terminal (spec §4.1).
    pub fn update_status(
        &self,
        id: &Uuid,
        status: JobStatus,
        error: Option<String>,
        now_ms: i64,
    ) -> Result<Job> {
        let mut job = self
            .get_job(id)?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        if job.status.is_terminal() {
            return Err(StoreError::Conflict(format!(
                "job {id} is already in terminal status {:?}",
                job.status
            )));
        }

        job.status = status;
        job.error = error;
        job.updated_at_ms = now_ms;
        if status.is_terminal() {
            job.completed_at_ms = Some(now_ms);
        }
        self.put_job(&job)?;
        Ok(job)
    }

    pub fn set_output(&self, id: &Uuid, output: Value, now_ms: i64) -> Result<Job> {
        let mut job = self
            .get_job(id)?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        job.output = Some(output);
        job.updated_at_ms = now_ms;
        self.put_job(&job)?;
        Ok(job)
    }

    pub fn add_document(&self, document: &Document) -> Result<()> {
        let seq = self
            .documents
            .prefix(document_prefix(&document.job_id))
            .count() as u64;
        let value = document.to_proto()?.encode_to_vec();
        self.documents
            .insert(document_key(&document.job_id, seq), value)?;
        Ok(())
    }

    pub fn get_documents_by_job(&self, job_id: &Uuid) -> Result<Vec<Document>> {
        let mut docs = Vec::new();
        for item in self.documents.prefix(document_prefix(job_id)) {
            let (_, value) = item?;
            docs.push(Document::from_proto(proto::Document::decode(&*value)?)?);
        }
        Ok(docs)
    }

    pub fn list_jobs(&self, filter: &JobFilter, limit: usize, offset: usize) -> Result<Vec<Job>> {
        let limit = limit.min(500);
        let mut matched = Vec::new();
        let mut skipped = 0usize;

        for item in self.jobs.iter() {
            let (_, value) = item?;
            let job = Job::from_proto(proto_decode_job(&value)?)?;

            if let Some(jt) = filter.job_type {
                if job.job_type != jt {
                    continue;
                }
            }
            if let Some(st) = filter.status {
                if job.status != st {
                    continue;
                }
            }
            if let Some(sync) = filter.sync {
                if job.sync != sync {
                    continue;
                }
            }
            if let Some(tenant_id) = filter.tenant_id {
                if job.tenant_id != Some(tenant_id) {
                    continue;
                }
            }

            if skipped < offset {
                skipped += 1;
                continue;
            }
            matched.push(job);
            if matched.len() >= limit {
                break;
            }
        }

        Ok(matched)
    }

    pub fn delete_job(&self, id: &Uuid) -> Result<()> {
        self.jobs.remove(job_key(id))?;
        let prefix = document_prefix(id);
        let keys: Vec<_> = self
            .documents
            .prefix(prefix)
            .filter_map(|r| r.ok())
            .map(|(k, _)| k)
            .collect();
        for key in keys {
            self.documents.remove(key)?;
        }
        Ok(())
    }

    /// `DeleteExpiredJobsByType` (spec §4.1): cascade-removes documents.
    pub fn delete_expired_jobs_by_type(&self, job_type: JobType, cutoff_ms: i64) -> Result<usize> {
        let mut expired = Vec::new();
        for item in self.jobs.iter() {
            let (key, value) = item?;
            let job = Job::from_proto(proto_decode_job(&value)?)?;
            if job.job_type == job_type && job.created_at_ms < cutoff_ms {
                expired.push((key, job.id));
            }
        }
        for (key, id) in &expired {
            self.jobs.remove(key.clone())?;
            let doc_keys: Vec<_> = self
                .documents
                .prefix(document_prefix(id))
                .filter_map(|r| r.ok())
                .map(|(k, _)| k)
                .collect();
            for doc_key in doc_keys {
                self.documents.remove(doc_key)?;
            }
        }
        Ok(expired.len())
    }

    pub fn delete_expired_documents(&self, cutoff_ms: i64) -> Result<usize> {
        let mut expired = Vec::new();
        for item in self.documents.iter() {
            let (key, value) = item?;
            let doc = Document::from_proto(proto::Document::decode(&*value)?)?;
            if doc.created_at_ms < cutoff_ms {
                expired.push(key);
            }
        }
        let count = expired.len();
        for key in expired {
            self.documents.remove(key)?;
        }
        Ok(count)
    }

    pub fn get_api_key_by_hash(&self, key_hash: &str) -> Result<Option<ApiKey>> {
        match self.api_keys.get(api_key_key(key_hash))? {
            Some(bytes) => {
                let key = ApiKey::from_proto(proto::ApiKey::decode(&*bytes)?)?;
                if key.revoked_at_ms.is_some() {
                    Ok(None)
                } else {
                    Ok(Some(key))
                }
            }
            None => Ok(None),
        }
    }

    pub fn put_api_key(&self, key: &ApiKey) -> Result<()> {
        self.api_keys
            .insert(api_key_key(&key.key_hash), key.to_proto().encode_to_vec())?;
        Ok(())
    }

    /// Idempotent admin bootstrap: inserts the hashed key only if absent.
    pub fn ensure_admin_api_key(&self, key_hash: String, label: String, now_ms: i64) -> Result<ApiKey> {
        if let Some(existing) = self.get_api_key_by_hash(&key_hash)? {
            return Ok(existing);
        }
        let key = ApiKey {
            id: Uuid::now_v7(),
            key_hash,
            label,
            is_admin: true,
            rate_limit_per_minute: None,
            tenant_id: None,
            user_id: None,
            created_at_ms: now_ms,
            revoked_at_ms: None,
        };
        self.put_api_key(&key)?;
        Ok(key)
    }

    pub fn put_tenant(&self, tenant: &Tenant) -> Result<()> {
        self.tenants
            .insert(tenant_key(&tenant.id), tenant.to_proto().encode_to_vec())?;
        self.tenants_by_slug
            .insert(tenant_slug_key(&tenant.slug), tenant.id.as_bytes())?;
        Ok(())
    }

    pub fn get_tenant(&self, id: &Uuid) -> Result<Option<Tenant>> {
        match self.tenants.get(tenant_key(id))? {
            Some(bytes) => Ok(Some(Tenant::from_proto(proto::Tenant::decode(&*bytes)?)?)),
            None => Ok(None),
        }
    }

    pub fn get_tenant_by_slug(&self, slug: &str) -> Result<Option<Tenant>> {
        match self.tenants_by_slug.get(tenant_slug_key(slug))? {
            Some(id_bytes) => {
                let id = Uuid::from_slice(&id_bytes).map_err(|e| StoreError::InvalidKey(e.to_string()))?;
                self.get_tenant(&id)
            }
            None => Ok(None),
        }
    }

    pub fn remember_idempotency(&self, tenant_id: &Uuid, key: &str, job_id: Uuid, now_ms: i64) -> Result<()> {
        self.idempotency.insert(
            idempotency_key(tenant_id, key),
            encode_idempotency_value(&job_id, now_ms),
        )?;
        Ok(())
    }

    pub fn get_idempotent(&self, tenant_id: &Uuid, key: &str) -> Result<Option<Uuid>> {
        match self.idempotency.get(idempotency_key(tenant_id, key))? {
            Some(bytes) => Ok(decode_idempotency_value(&bytes).map(|(id, _)| id)),
            None => Ok(None),
        }
    }

    pub fn prune_idempotency_older_than(&self, cutoff_ms: i64) -> Result<usize> {
        let mut expired = Vec::new();
        for item in self.idempotency.iter() {
            let (key, value) = item?;
            if let Some((_, inserted_at_ms)) = decode_idempotency_value(&value) {
                if inserted_at_ms < cutoff_ms {
                    expired.push(key);
                }
            }
        }
        let count = expired.len();
        for key in expired {
            self.idempotency.remove(key)?;
        }
        Ok(count)
    }

    pub fn persist(&self) -> Result<()> {
        self.keyspace.persist(fjall::PersistMode::SyncAll)?;
        Ok(())
    }

    pub fn stats(&self) -> Result<StoreStats> {
        Ok(StoreStats {
            job_count: self.jobs.iter().count(),
            document_count: self.documents.iter().count(),
            pending_count: self.jobs_by_priority.iter().count(),
        })
    }
}

fn proto_decode_job(bytes: &[u8]) -> Result<proto::Job> {
    Ok(proto::Job::decode(bytes)?)
}

use crate::proto;

#[derive(Debug, Clone)]
pub struct StoreStats {
    pub job_count: usize,
    pub document_count: usize,
    pub pending_count: usize,
}

/// Per-job-type -> map used by callers building a `JobFilter` from query params.
pub type JobTypeCounts = HashMap<JobType, usize>;
