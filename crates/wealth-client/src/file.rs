//! File encryption
//!
//! File bytes are encrypted under a key derived for the `file` domain, with the
//! claimed file identity (name, size, modification time) bound as associated
//! data. Changing any of those claims after the fact makes decryption fail.

use crate::{
    context::KeyProvider,
    package::{EncryptedPackage, PACKAGE_FORMAT_VERSION},
    EncryptionContext, EnvelopeConfig, EnvelopeError, Result,
};
use bytes::Bytes;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, instrument, warn};
use wealth_crypto::{Aead, CryptoError, KeyDomain, Nonce};

/// Claimed identity of a file, bound to its ciphertext
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMeta {
    /// File name
    pub name: String,
    /// Size in bytes
    pub size: u64,
    /// Last modification time (milliseconds since the Unix epoch)
    pub last_modified: i64,
}

impl FileMeta {
    pub fn new(name: impl Into<String>, size: u64, last_modified: i64) -> Self {
        Self {
            name: name.into(),
            size,
            last_modified,
        }
    }

    /// Deterministic AAD encoding: `{"name":…,"size":…,"lastModified":…}`
    pub fn to_aad(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| {
            let source = CryptoError::Serialization(e.to_string());
            CryptoError::encryption("serializing file metadata", source).into()
        })
    }
}

/// A file as handed over by the caller
#[derive(Clone, Debug)]
pub struct FileInput {
    /// File name
    pub name: String,
    /// File contents
    pub bytes: Bytes,
    /// Last modification time (milliseconds since the Unix epoch)
    pub last_modified: i64,
    /// MIME type; guessed from the name when absent
    pub content_type: Option<String>,
}

impl FileInput {
    /// File modified "now"
    pub fn new(name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
            last_modified: Utc::now().timestamp_millis(),
            content_type: None,
        }
    }

    pub fn with_last_modified(mut self, millis: i64) -> Self {
        self.last_modified = millis;
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Read a file from disk, taking name and modification time from the filesystem
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                EnvelopeError::InvalidInput(format!("{} has no file name", path.display()))
            })?;

        let bytes = tokio::fs::read(path).await?;
        let modified = tokio::fs::metadata(path).await?.modified()?;
        let last_modified = epoch_millis(modified)?;

        Ok(Self {
            name,
            bytes: Bytes::from(bytes),
            last_modified,
            content_type: None,
        })
    }

    /// Metadata bound as AAD
    pub fn meta(&self) -> FileMeta {
        FileMeta::new(self.name.clone(), self.bytes.len() as u64, self.last_modified)
    }

    /// Declared MIME type, or a guess from the file name
    pub fn content_type(&self) -> String {
        self.content_type.clone().unwrap_or_else(|| {
            mime_guess::from_path(&self.name)
                .first_or_octet_stream()
                .to_string()
        })
    }
}

/// Milliseconds since the Unix epoch, rejecting times that do not fit
fn epoch_millis(time: SystemTime) -> Result<i64> {
    let since_epoch = time.duration_since(UNIX_EPOCH).map_err(|_| {
        EnvelopeError::InvalidInput("modification time is before the Unix epoch".to_string())
    })?;
    i64::try_from(since_epoch.as_millis()).map_err(|_| {
        EnvelopeError::InvalidInput("modification time is out of range".to_string())
    })
}

/// Encrypts and decrypts file contents
#[derive(Clone, Debug)]
pub struct FileEncryptionPackager {
    config: Arc<EnvelopeConfig>,
    keys: KeyProvider,
}

impl FileEncryptionPackager {
    pub fn new(config: EnvelopeConfig) -> Self {
        let keys = KeyProvider::from_config(&config);
        Self::with_keys(Arc::new(config), keys)
    }

    pub(crate) fn with_keys(config: Arc<EnvelopeConfig>, keys: KeyProvider) -> Self {
        Self { config, keys }
    }

    pub fn config(&self) -> &EnvelopeConfig {
        &self.config
    }

    /// Encrypt `bytes`, binding `meta` as associated data
    #[instrument(
        skip(self, bytes, meta, ctx),
        fields(tenant = ctx.tenant_id(), size = bytes.len())
    )]
    pub async fn encrypt_file(
        &self,
        bytes: &[u8],
        meta: &FileMeta,
        ctx: &EncryptionContext,
    ) -> Result<EncryptedPackage> {
        if meta.size != bytes.len() as u64 {
            return Err(EnvelopeError::InvalidInput(format!(
                "declared size {} does not match {} bytes of content",
                meta.size,
                bytes.len()
            )));
        }

        let key = self.keys.key_for(ctx, KeyDomain::File).await?;
        let aad = meta.to_aad()?;
        let nonce = Nonce::try_generate()?;

        let aead = Aead::new(&key, self.config.cipher)
            .map_err(|e| CryptoError::encryption("importing file key", e))?;
        let ciphertext = aead
            .encrypt(&nonce, bytes, &aad)
            .map_err(|e| CryptoError::encryption("encrypting file", e))?;

        debug!(
            algorithm = %self.config.cipher,
            key_version = %self.config.key_version,
            ciphertext_len = ciphertext.len(),
            "encrypted file"
        );

        Ok(EncryptedPackage {
            version: PACKAGE_FORMAT_VERSION,
            ciphertext,
            nonce,
            aad: Some(aad),
            key_version: self.config.key_version.clone(),
            algorithm: self.config.cipher,
            tenant_id: ctx.tenant_id().to_string(),
            domain: KeyDomain::File,
            created_at: Utc::now(),
        })
    }

    /// Encrypt a [`FileInput`] using its own metadata
    pub async fn encrypt_input(
        &self,
        file: &FileInput,
        ctx: &EncryptionContext,
    ) -> Result<EncryptedPackage> {
        self.encrypt_file(&file.bytes, &file.meta(), ctx).await
    }

    /// Decrypt a file package with the associated data it carries.
    ///
    /// The associated data covers the file's name, size and modification time
    /// only. `key_version` is checked against the accepted versions but is not
    /// authenticated, so a package relabelled from one accepted version to
    /// another still opens. JSON packages with context binding enabled do
    /// authenticate their key version.
    #[instrument(
        skip(self, package, ctx),
        fields(tenant = ctx.tenant_id(), key_version = %package.key_version)
    )]
    pub async fn decrypt_file(
        &self,
        package: &EncryptedPackage,
        ctx: &EncryptionContext,
    ) -> Result<Vec<u8>> {
        let aad = package.aad.clone().ok_or_else(|| {
            EnvelopeError::InvalidPackage("file package carries no associated data".to_string())
        })?;
        self.open(package, &aad, ctx).await
    }

    /// Decrypt a file package, verifying it against independently claimed metadata
    pub async fn decrypt_file_with_meta(
        &self,
        package: &EncryptedPackage,
        meta: &FileMeta,
        ctx: &EncryptionContext,
    ) -> Result<Vec<u8>> {
        let aad = meta.to_aad()?;
        self.open(package, &aad, ctx).await
    }

    async fn open(
        &self,
        package: &EncryptedPackage,
        aad: &[u8],
        ctx: &EncryptionContext,
    ) -> Result<Vec<u8>> {
        package.ensure_openable(KeyDomain::File, &self.config)?;
        if package.tenant_id != ctx.tenant_id() {
            warn!(
                package_tenant = %package.tenant_id,
                "decrypting file package under a different tenant"
            );
        }

        let key = self.keys.key_for(ctx, KeyDomain::File).await?;
        let aead = Aead::new(&key, package.algorithm)
            .map_err(|e| CryptoError::decryption("importing file key", e))?;

        match aead.decrypt(&package.nonce, &package.ciphertext, aad) {
            Ok(plaintext) => Ok(plaintext),
            Err(e) => {
                if e.is_authentication_failure() {
                    warn!("file package failed authentication");
                }
                Err(e.into())
            }
        }
    }
}
