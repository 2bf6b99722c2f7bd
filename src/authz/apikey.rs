//! API-key hashing (spec §3: "Raw key is never stored"; §4.10: "SHA-256
//! hash matched against Store"). No donor equivalent — the donor never
//! implemented auth — grounded in `sha2`/`subtle` being the ecosystem-
//! standard pairing for hash-then-constant-time-compare secret checks.

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Lowercase hex SHA-256 of the raw key, used as the `api_keys` partition
/// lookup key (spec §3 / §4.1 `GetAPIKeyByHash`).
pub fn hash_key(raw: &str) -> String {
    let digest = Sha256::digest(raw.as_bytes());
    hex::encode(digest)
}

/// Constant-time equality for comparing a freshly computed hash against a
/// stored one, avoiding timing side-channels on a string compare.
pub fn hashes_match(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}
