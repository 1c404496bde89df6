//! Opt-in cache of derived keys
//!
//! Derivation is deliberately expensive, so hosts with a high call volume can
//! keep recently derived keys in memory. Entries are scoped by
//! `(credential, domain, tenant)`; the credential itself is never stored, only
//! its SHA-256 digest. Evicted keys are zeroized when dropped.

use crate::kdf::{DerivedKey, KeyDomain};
use lru::LruCache;
use parking_lot::Mutex;
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};
use std::num::NonZeroUsize;

#[derive(Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    credential_digest: [u8; 32],
    domain: KeyDomain,
    tenant_id: String,
}

impl CacheKey {
    fn new(credential: &SecretString, domain: KeyDomain, tenant_id: &str) -> Self {
        let digest = Sha256::digest(credential.expose_secret().as_bytes());
        Self {
            credential_digest: digest.into(),
            domain,
            tenant_id: tenant_id.to_string(),
        }
    }
}

/// Bounded LRU cache of derived keys, safe to share between tasks
pub struct DerivedKeyCache {
    entries: Mutex<LruCache<CacheKey, DerivedKey>>,
}

impl DerivedKeyCache {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Look up a key, refreshing its recency
    pub fn get(
        &self,
        credential: &SecretString,
        domain: KeyDomain,
        tenant_id: &str,
    ) -> Option<DerivedKey> {
        let key = CacheKey::new(credential, domain, tenant_id);
        self.entries.lock().get(&key).cloned()
    }

    pub fn insert(
        &self,
        credential: &SecretString,
        domain: KeyDomain,
        tenant_id: &str,
        derived: DerivedKey,
    ) {
        let key = CacheKey::new(credential, domain, tenant_id);
        self.entries.lock().put(key, derived);
    }

    /// Drop every entry belonging to `tenant_id`
    pub fn invalidate_tenant(&self, tenant_id: &str) -> usize {
        let mut entries = self.entries.lock();
        let stale: Vec<CacheKey> = entries
            .iter()
            .filter(|(k, _)| k.tenant_id == tenant_id)
            .map(|(k, _)| k.clone())
            .collect();
        for key in &stale {
            entries.pop(key);
        }
        stale.len()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for DerivedKeyCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let entries = self.entries.lock();
        f.debug_struct("DerivedKeyCache")
            .field("len", &entries.len())
            .field("capacity", &entries.cap())
            .finish()
    }
}
