//! Structured (JSON) payload encryption
//!
//! Values are canonically serialized (object keys sorted, compact separators)
//! and encrypted under a key derived for the `json` domain. By default no
//! associated data is bound; with `bind_json_context` enabled the tenant and
//! key version are bound as AAD and unbound packages are refused.

use crate::{
    context::KeyProvider,
    package::{EncryptedPackage, PACKAGE_FORMAT_VERSION},
    EncryptionContext, EnvelopeConfig, EnvelopeError, Result,
};
use chrono::Utc;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, instrument, warn};
use wealth_crypto::{Aead, CryptoError, KeyDomain, Nonce};

/// Serialize `value` with object keys sorted at every level
pub fn canonical_json<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    let value = serde_json::to_value(value).map_err(serialization_error)?;
    serde_json::to_vec(&canonicalize(value)).map_err(serialization_error)
}

fn serialization_error(e: serde_json::Error) -> EnvelopeError {
    CryptoError::encryption("serializing value", CryptoError::Serialization(e.to_string())).into()
}

fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, canonicalize(v)))
                    .collect::<Map<String, Value>>(),
            )
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

/// AAD binding a JSON payload to its tenant and key version
fn context_aad(tenant_id: &str, key_version: &str) -> Result<Vec<u8>> {
    canonical_json(&serde_json::json!({
        "domain": KeyDomain::Json.as_str(),
        "keyVersion": key_version,
        "tenantId": tenant_id,
    }))
}

/// Encrypts and decrypts serializable values
#[derive(Clone, Debug)]
pub struct JsonEnvelopeCodec {
    config: Arc<EnvelopeConfig>,
    keys: KeyProvider,
}

impl JsonEnvelopeCodec {
    pub fn new(config: EnvelopeConfig) -> Self {
        let keys = KeyProvider::from_config(&config);
        Self::with_keys(Arc::new(config), keys)
    }

    pub(crate) fn with_keys(config: Arc<EnvelopeConfig>, keys: KeyProvider) -> Self {
        Self { config, keys }
    }

    /// Canonically serialize and encrypt `value`
    #[instrument(skip(self, value, ctx), fields(tenant = ctx.tenant_id()))]
    pub async fn encrypt_json<T: Serialize + ?Sized>(
        &self,
        value: &T,
        ctx: &EncryptionContext,
    ) -> Result<EncryptedPackage> {
        let plaintext = canonical_json(value)?;
        let aad = if self.config.bind_json_context {
            Some(context_aad(ctx.tenant_id(), &self.config.key_version)?)
        } else {
            None
        };

        let key = self.keys.key_for(ctx, KeyDomain::Json).await?;
        let nonce = Nonce::try_generate()?;
        let aead = Aead::new(&key, self.config.cipher)
            .map_err(|e| CryptoError::encryption("importing json key", e))?;
        let ciphertext = aead
            .encrypt(&nonce, &plaintext, aad.as_deref().unwrap_or_default())
            .map_err(|e| CryptoError::encryption("encrypting json", e))?;

        debug!(
            plaintext_len = plaintext.len(),
            bound = aad.is_some(),
            "encrypted json payload"
        );

        Ok(EncryptedPackage {
            version: PACKAGE_FORMAT_VERSION,
            ciphertext,
            nonce,
            aad,
            key_version: self.config.key_version.clone(),
            algorithm: self.config.cipher,
            tenant_id: ctx.tenant_id().to_string(),
            domain: KeyDomain::Json,
            created_at: Utc::now(),
        })
    }

    /// Decrypt and deserialize a JSON package
    #[instrument(
        skip(self, package, ctx),
        fields(tenant = ctx.tenant_id(), key_version = %package.key_version)
    )]
    pub async fn decrypt_json<T: DeserializeOwned>(
        &self,
        package: &EncryptedPackage,
        ctx: &EncryptionContext,
    ) -> Result<T> {
        package.ensure_openable(KeyDomain::Json, &self.config)?;
        if self.config.bind_json_context && package.aad.is_none() {
            return Err(EnvelopeError::InvalidPackage(
                "json package is not bound to its context".to_string(),
            ));
        }

        // The package's copy of the AAD is never trusted; it is rebuilt from the caller's context
        let aad = match package.aad {
            Some(_) => Some(context_aad(ctx.tenant_id(), &package.key_version)?),
            None => None,
        };

        let key = self.keys.key_for(ctx, KeyDomain::Json).await?;
        let aead = Aead::new(&key, package.algorithm)
            .map_err(|e| CryptoError::decryption("importing json key", e))?;
        let plaintext = aead
            .decrypt(&package.nonce, &package.ciphertext, aad.as_deref().unwrap_or_default())
            .inspect_err(|e| {
                if e.is_authentication_failure() {
                    warn!("json package failed authentication");
                }
            })?;

        serde_json::from_slice(&plaintext).map_err(|e| CryptoError::Parse(e).into())
    }

    /// Encrypt `value` into a single base64 string suitable for a settings file
    pub async fn seal_to_string<T: Serialize + ?Sized>(
        &self,
        value: &T,
        ctx: &EncryptionContext,
    ) -> Result<String> {
        self.encrypt_json(value, ctx).await?.to_base64()
    }

    /// Inverse of [`Self::seal_to_string`]
    pub async fn open_from_string<T: DeserializeOwned>(
        &self,
        sealed: &str,
        ctx: &EncryptionContext,
    ) -> Result<T> {
        let package = EncryptedPackage::from_base64(sealed)?;
        self.decrypt_json(&package, ctx).await
    }
}
