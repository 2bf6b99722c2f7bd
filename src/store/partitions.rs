//! Key layout for the Fjall partitions backing `FjallStore`.
//!
//! - `jobs`: {job_id:16} -> Job (protobuf)
//! - `jobs_by_priority`: {priority_rank:8}{created_at_ms:8}{job_id:16} -> job_id
//!   A forward scan yields `ORDER BY priority DESC, created_at ASC`.
//! - `documents`: {job_id:16}{seq:8} -> Document (protobuf)
//! - `api_keys`: {key_hash} -> ApiKey (protobuf)
//! - `tenants`: {tenant_id:16} -> Tenant (protobuf); `tenants_by_slug`: {slug} -> tenant_id
//! - `idempotency`: {tenant_id:16}{key} -> {job_id:16}{inserted_at_ms:8}

use uuid::Uuid;

pub fn job_key(job_id: &Uuid) -> Vec<u8> {
    job_id.as_bytes().to_vec()
}

pub fn decode_job_id(bytes: &[u8]) -> Option<Uuid> {
    Uuid::from_slice(bytes).ok()
}

/// Rank such that a forward byte-order scan visits higher priority first,
/// and within equal priority visits earlier `created_at_ms` first.
pub fn priority_index_key(priority: i32, created_at_ms: i64, job_id: &Uuid) -> Vec<u8> {
    let rank = (i64::MAX as i64).wrapping_sub(priority as i64) as u64;
    let created_rank = created_at_ms as u64;
    let mut key = Vec::with_capacity(8 + 8 + 16);
    key.extend_from_slice(&rank.to_be_bytes());
    key.extend_from_slice(&created_rank.to_be_bytes());
    key.extend_from_slice(job_id.as_bytes());
    key
}

pub fn document_key(job_id: &Uuid, seq: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(16 + 8);
    key.extend_from_slice(job_id.as_bytes());
    key.extend_from_slice(&seq.to_be_bytes());
    key
}

pub fn document_prefix(job_id: &Uuid) -> Vec<u8> {
    job_id.as_bytes().to_vec()
}

pub fn api_key_key(key_hash: &str) -> Vec<u8> {
    key_hash.as_bytes().to_vec()
}

pub fn tenant_key(tenant_id: &Uuid) -> Vec<u8> {
    tenant_id.as_bytes().to_vec()
}

pub fn tenant_slug_key(slug: &str) -> Vec<u8> {
    slug.as_bytes().to_vec()
}

pub fn idempotency_key(tenant_id: &Uuid, key: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(16 + key.len());
    out.extend_from_slice(tenant_id.as_bytes());
    out.extend_from_slice(key.as_bytes());
    out
}

pub fn encode_idempotency_value(job_id: &Uuid, inserted_at_ms: i64) -> Vec<u8> {
    let mut out = Vec::with_capacity(16 + 8);
    out.extend_from_slice(job_id.as_bytes());
    out.extend_from_slice(&inserted_at_ms.to_be_bytes());
    out
}

pub fn decode_idempotency_value(bytes: &[u8]) -> Option<(Uuid, i64)> {
    if bytes.len() != 24 {
        return None;
    }
    let job_id = Uuid::from_slice(&bytes[0..16]).ok()?;
    let inserted_at_ms = i64::from_be_bytes(bytes[16..24].try_into().ok()?);
    Some((job_id, inserted_at_ms))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_index_orders_higher_priority_first() {
        let job_a = Uuid::new_v4();
        let job_b = Uuid::new_v4();
        let key_high = priority_index_key(20, 1_000, &job_a);
        let key_low = priority_index_key(10, 1_000, &job_b);
        assert!(key_high < key_low, "higher priority must sort first");
    }

    #[test]
    fn priority_index_orders_fifo_within_priority() {
        let job_a = Uuid::new_v4();
        let job_b = Uuid::new_v4();
        let older = priority_index_key(10, 1_000, &job_a);
        let newer = priority_index_key(10, 2_000, &job_b);
        assert!(older < newer, "earlier created_at must sort first");
    }

    #[test]
    fn idempotency_round_trip() {
        let job_id = Uuid::new_v4();
        let encoded = encode_idempotency_value(&job_id, 42);
        let (decoded_id, decoded_ts) = decode_idempotency_value(&encoded).unwrap();
        assert_eq!(decoded_id, job_id);
        assert_eq!(decoded_ts, 42);
    }
}
