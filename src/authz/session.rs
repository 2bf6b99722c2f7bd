//! Signed session cookies for the user-login path (spec §4.10). Format:
//! `base64(payload_json).hex(hmac_sha256(payload_json))`. No donor
//! equivalent (out of scope: OIDC/local-auth login flows per spec §1);
//! this only verifies a cookie minted elsewhere, using the `hmac`/`sha2`
//! pairing already pulled in for API-key hashing.

use base64::Engine;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionPayload {
    pub user_id: Uuid,
    pub tenant_id: Option<Uuid>,
    pub is_system_admin: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("malformed session cookie")]
    Malformed,
    #[error("session signature mismatch")]
    BadSignature,
}

pub fn sign(payload: &SessionPayload, secret: &[u8]) -> String {
    let payload_json = serde_json::to_vec(payload).expect("session payload always serializes");
    let encoded = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(&payload_json);
    let mut mac = HmacSha256::new_from_slice(secret).expect("hmac accepts any key length");
    mac.update(encoded.as_bytes());
    let signature = hex::encode(mac.finalize().into_bytes());
    format!("{encoded}.{signature}")
}

pub fn verify(cookie: &str, secret: &[u8]) -> Result<SessionPayload, SessionError> {
    let (encoded, signature) = cookie.split_once('.').ok_or(SessionError::Malformed)?;

    let mut mac = HmacSha256::new_from_slice(secret).expect("hmac accepts any key length");
    mac.update(encoded.as_bytes());
    let expected = hex::encode(mac.finalize().into_bytes());

    if !bool::from(expected.as_bytes().ct_eq(signature.as_bytes())) {
        return Err(SessionError::BadSignature);
    }

    let payload_json = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(encoded)
        .map_err(|_| SessionError::Malformed)?;
    serde_json::from_slice(&payload_json).map_err(|_| SessionError::Malformed)
}
