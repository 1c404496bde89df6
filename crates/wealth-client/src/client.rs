//! Envelope client: one configuration, one key provider, all operations

use crate::{
    context::KeyProvider,
    file::{FileEncryptionPackager, FileInput, FileMeta},
    json::JsonEnvelopeCodec,
    package::EncryptedPackage,
    upload::{SecureUploadBuilder, UploadBundle},
    EncryptionContext, EnvelopeConfig, Result,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use wealth_crypto::{CapabilityProbe, ProbeState};

/// Entry point for hosts that want every envelope operation behind one handle.
///
/// All components share the same configuration and, when enabled, the same
/// derived-key cache.
pub struct EnvelopeClient {
    config: Arc<EnvelopeConfig>,
    keys: KeyProvider,
    probe: CapabilityProbe,
    files: FileEncryptionPackager,
    json: JsonEnvelopeCodec,
    uploads: SecureUploadBuilder,
}

impl EnvelopeClient {
    /// Validate `config` and build the client
    pub fn new(config: EnvelopeConfig) -> Result<Self> {
        config.validate()?;
        let keys = KeyProvider::from_config(&config);
        let config = Arc::new(config);
        let files = FileEncryptionPackager::with_keys(Arc::clone(&config), keys.clone());

        Ok(Self {
            probe: CapabilityProbe::new(config.cipher, config.kdf),
            json: JsonEnvelopeCodec::with_keys(Arc::clone(&config), keys.clone()),
            uploads: SecureUploadBuilder::from_packager(files.clone()),
            files,
            keys,
            config,
        })
    }

    /// Build from defaults overridden by the environment
    pub fn from_env() -> Result<Self> {
        Self::new(EnvelopeConfig::from_env()?)
    }

    pub fn config(&self) -> &EnvelopeConfig {
        &self.config
    }

    /// Run the capability probe (once; later calls return the cached verdict)
    pub async fn check_support(&self) -> Result<bool> {
        Ok(self.probe.check_support().await?)
    }

    pub fn probe_state(&self) -> ProbeState {
        self.probe.state()
    }

    pub fn files(&self) -> &FileEncryptionPackager {
        &self.files
    }

    pub fn json(&self) -> &JsonEnvelopeCodec {
        &self.json
    }

    pub fn uploads(&self) -> &SecureUploadBuilder {
        &self.uploads
    }

    pub async fn encrypt_file(
        &self,
        bytes: &[u8],
        meta: &FileMeta,
        ctx: &EncryptionContext,
    ) -> Result<EncryptedPackage> {
        self.files.encrypt_file(bytes, meta, ctx).await
    }

    pub async fn decrypt_file(
        &self,
        package: &EncryptedPackage,
        ctx: &EncryptionContext,
    ) -> Result<Vec<u8>> {
        self.files.decrypt_file(package, ctx).await
    }

    pub async fn encrypt_json<T: Serialize + ?Sized>(
        &self,
        value: &T,
        ctx: &EncryptionContext,
    ) -> Result<EncryptedPackage> {
        self.json.encrypt_json(value, ctx).await
    }

    pub async fn decrypt_json<T: DeserializeOwned>(
        &self,
        package: &EncryptedPackage,
        ctx: &EncryptionContext,
    ) -> Result<T> {
        self.json.decrypt_json(package, ctx).await
    }

    pub async fn build_upload(
        &self,
        file: &FileInput,
        ctx: &EncryptionContext,
        extra_metadata: Option<Map<String, Value>>,
    ) -> Result<UploadBundle> {
        self.uploads.build_upload(file, ctx, extra_metadata).await
    }

    /// Forget cached keys for a tenant, e.g. after its credential was revoked
    pub fn invalidate_tenant_keys(&self, tenant_id: &str) -> usize {
        self.keys
            .cache()
            .map(|cache| cache.invalidate_tenant(tenant_id))
            .unwrap_or(0)
    }
}
