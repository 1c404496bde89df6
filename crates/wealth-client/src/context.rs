//! Per-call encryption context and key lookup

use crate::{EnvelopeConfig, Result};
use std::sync::Arc;
use tracing::debug;
use wealth_crypto::{
    domain_salt, CryptoError, DerivedKey, DerivedKeyCache, KeyDerivationService, KeyDomain,
    SecretString,
};

/// Tenant used when the caller has no partitioning of its own
pub const DEFAULT_TENANT: &str = "default";

/// Credential and tenant supplied by the caller for one operation.
///
/// Built fresh per call; never persisted by this crate.
#[derive(Clone)]
pub struct EncryptionContext {
    credential: SecretString,
    tenant_id: String,
}

impl EncryptionContext {
    pub fn new(credential: impl Into<String>, tenant_id: impl Into<String>) -> Self {
        Self {
            credential: SecretString::from(credential.into()),
            tenant_id: tenant_id.into(),
        }
    }

    /// Context for the `default` tenant
    pub fn with_default_tenant(credential: impl Into<String>) -> Self {
        Self::new(credential, DEFAULT_TENANT)
    }

    pub fn credential(&self) -> &SecretString {
        &self.credential
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }
}

impl std::fmt::Debug for EncryptionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionContext")
            .field("credential", &"[REDACTED]")
            .field("tenant_id", &self.tenant_id)
            .finish()
    }
}

/// Derives (and optionally caches) the key for a context and domain
#[derive(Clone, Debug)]
pub(crate) struct KeyProvider {
    kdf: KeyDerivationService,
    salt_prefix: String,
    cache: Option<Arc<DerivedKeyCache>>,
}

impl KeyProvider {
    pub(crate) fn from_config(config: &EnvelopeConfig) -> Self {
        Self {
            kdf: KeyDerivationService::new(config.kdf),
            salt_prefix: config.salt_prefix.clone(),
            cache: config
                .key_cache_capacity
                .map(|cap| Arc::new(DerivedKeyCache::new(cap))),
        }
    }

    pub(crate) fn cache(&self) -> Option<&Arc<DerivedKeyCache>> {
        self.cache.as_ref()
    }

    pub(crate) async fn key_for(
        &self,
        ctx: &EncryptionContext,
        domain: KeyDomain,
    ) -> Result<DerivedKey> {
        if ctx.tenant_id().is_empty() {
            let reason = "tenant id must not be empty".to_string();
            return Err(CryptoError::KeyDerivation(reason).into());
        }

        if let Some(cache) = &self.cache {
            if let Some(key) = cache.get(ctx.credential(), domain, ctx.tenant_id()) {
                debug!(%domain, tenant = ctx.tenant_id(), "derived key cache hit");
                return Ok(key);
            }
        }

        let salt = domain_salt(&self.salt_prefix, domain, ctx.tenant_id());
        let key = self.kdf.derive_key_async(ctx.credential(), &salt).await?;

        if let Some(cache) = &self.cache {
            cache.insert(ctx.credential(), domain, ctx.tenant_id(), key.clone());
        }
        Ok(key)
    }
}
