//! AuthZ (spec §4.10): resolves a caller `Principal`, scopes job
//! read/list/delete to its tenant, and rate-limits API-key traffic. No
//! donor equivalent — the donor shipped no auth layer — grounded in the
//! `sha2`/`hmac`/`subtle` crates this module introduces specifically for
//! hash comparison and cookie signing.

pub mod apikey;
pub mod ratelimit;
pub mod session;

use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

use crate::authz::ratelimit::RateLimiter;
use crate::authz::session::{verify, SessionError};
use crate::store::FjallStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrincipalType {
    User,
    ApiKey,
}

#[derive(Debug, Clone)]
pub struct Principal {
    pub subject: Uuid,
    pub principal_type: PrincipalType,
    pub tenant_id: Option<Uuid>,
    pub is_system_admin: bool,
    pub rate_limit_per_minute: Option<u32>,
    pub api_key_id: Option<Uuid>,
}

impl Principal {
    /// A non-admin Principal only sees rows whose `tenant_id` matches its
    /// own; admins see everything, including legacy `tenant_id=NULL` rows
    /// (spec §4.10).
    pub fn can_access_tenant(&self, row_tenant_id: Option<Uuid>) -> bool {
        if self.is_system_admin {
            return true;
        }
        match (self.tenant_id, row_tenant_id) {
            (Some(mine), Some(row)) => mine == row,
            _ => false,
        }
    }
}

#[derive(Debug, Error)]
pub enum AuthzError {
    #[error("unauthenticated")]
    Unauthenticated,
    #[error("forbidden")]
    Forbidden,
    #[error("rate limited")]
    RateLimited,
}

pub struct AuthZ {
    store: Arc<FjallStore>,
    session_secret: Vec<u8>,
    rate_limiter: RateLimiter,
    default_rate_limit_per_minute: u32,
}

impl AuthZ {
    pub fn new(store: Arc<FjallStore>, session_secret: Vec<u8>, default_rate_limit_per_minute: u32) -> Self {
        Self {
            store,
            session_secret,
            rate_limiter: RateLimiter::new(),
            default_rate_limit_per_minute,
        }
    }

    /// Resolves exactly one of `Authorization: Bearer <raw>` or a signed
    /// session cookie into a `Principal` (spec §4.10). Bearer takes
    /// priority when both are present.
    pub fn resolve(&self, bearer: Option<&str>, session_cookie: Option<&str>) -> Result<Principal, AuthzError> {
        if let Some(raw) = bearer {
            return self.resolve_api_key(raw);
        }
        if let Some(cookie) = session_cookie {
            return self.resolve_session(cookie);
        }
        Err(AuthzError::Unauthenticated)
    }

    fn resolve_api_key(&self, raw: &str) -> Result<Principal, AuthzError> {
        let hash = apikey::hash_key(raw);
        let key = self
            .store
            .get_api_key_by_hash(&hash)
            .map_err(|_| AuthzError::Unauthenticated)?
            .ok_or(AuthzError::Unauthenticated)?;

        let tenant_default = key
            .tenant_id
            .and_then(|id| self.store.get_tenant(&id).ok().flatten())
            .and_then(|t| t.default_api_key_rate_limit_per_minute);

        let rate_limit = key
            .rate_limit_per_minute
            .or(tenant_default)
            .unwrap_or(self.default_rate_limit_per_minute as i32)
            .max(0) as u32;

        Ok(Principal {
            subject: key.id,
            principal_type: PrincipalType::ApiKey,
            tenant_id: key.tenant_id,
            is_system_admin: key.is_admin,
            rate_limit_per_minute: Some(rate_limit),
            api_key_id: Some(key.id),
        })
    }

    fn resolve_session(&self, cookie: &str) -> Result<Principal, AuthzError> {
        let payload = verify(cookie, &self.session_secret).map_err(|e| match e {
            SessionError::Malformed | SessionError::BadSignature => AuthzError::Unauthenticated,
        })?;

        Ok(Principal {
            subject: payload.user_id,
            principal_type: PrincipalType::User,
            tenant_id: payload.tenant_id,
            is_system_admin: payload.is_system_admin,
            rate_limit_per_minute: None,
            api_key_id: None,
        })
    }

    /// Applies the sliding-window check for API-key principals; user
    /// sessions are not rate limited (spec §4.10 is scoped to `api_key`).
    pub fn check_rate_limit(&self, principal: &Principal, now_ms: i64) -> Result<(), AuthzError> {
        let (Some(api_key_id), Some(limit)) = (principal.api_key_id, principal.rate_limit_per_minute) else {
            return Ok(());
        };
        if self.rate_limiter.check(&api_key_id.to_string(), limit, now_ms) {
            Ok(())
        } else {
            Err(AuthzError::RateLimited)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{ApiKey, FjallStore};
    use tempfile::TempDir;

    fn authz() -> (AuthZ, TempDir, String) {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(FjallStore::open(dir.path().join("s")).unwrap());
        let raw_key = "raito_live_test";
        let key = ApiKey {
            id: Uuid::now_v7(),
            key_hash: apikey::hash_key(raw_key),
            label: "test".into(),
            is_admin: false,
            rate_limit_per_minute: Some(5),
            tenant_id: Some(Uuid::now_v7()),
            user_id: None,
            created_at_ms: 0,
            revoked_at_ms: None,
        };
        store.put_api_key(&key).unwrap();
        (AuthZ::new(store, b"secret".to_vec(), 60), dir, raw_key.to_string())
    }

    #[test]
    fn resolves_valid_api_key() {
        let (authz, _dir, raw_key) = authz();
        let principal = authz.resolve(Some(&raw_key), None).unwrap();
        assert_eq!(principal.principal_type, PrincipalType::ApiKey);
        assert_eq!(principal.rate_limit_per_minute, Some(5));
    }

    #[test]
    fn rejects_unknown_api_key() {
        let (authz, _dir, _raw_key) = authz();
        assert!(authz.resolve(Some("wrong-key"), None).is_err());
    }

    #[test]
    fn rejects_when_neither_credential_present() {
        let (authz, _dir, _raw_key) = authz();
        assert!(matches!(authz.resolve(None, None), Err(AuthzError::Unauthenticated)));
    }

    #[test]
    fn tenant_scoping_blocks_cross_tenant_access() {
        let principal = Principal {
            subject: Uuid::now_v7(),
            principal_type: PrincipalType::ApiKey,
            tenant_id: Some(Uuid::now_v7()),
            is_system_admin: false,
            rate_limit_per_minute: None,
            api_key_id: None,
        };
        assert!(!principal.can_access_tenant(Some(Uuid::now_v7())));
        assert!(!principal.can_access_tenant(None));
    }

    #[test]
    fn admin_sees_legacy_rows_with_no_tenant() {
        let admin = Principal {
            subject: Uuid::now_v7(),
            principal_type: PrincipalType::User,
            tenant_id: None,
            is_system_admin: true,
            rate_limit_per_minute: None,
            api_key_id: None,
        };
        assert!(admin.can_access_tenant(None));
    }

    #[test]
    fn rate_limit_trips_after_limit_exceeded() {
        let (authz, _dir, raw_key) = authz();
        let principal = authz.resolve(Some(&raw_key), None).unwrap();
        for i in 0..5 {
            assert!(authz.check_rate_limit(&principal, i * 100).is_ok());
        }
        assert!(matches!(authz.check_rate_limit(&principal, 500), Err(AuthzError::RateLimited)));
    }
}
