//! Transmission-ready upload bundles
//!
//! A bundle pairs the raw ciphertext with a JSON metadata envelope holding
//! every non-secret parameter a receiver needs: nonce, algorithm, key version,
//! associated data, tenant, and the original file identity. Sending it is left
//! to the caller's transport.

use crate::{
    file::{FileEncryptionPackager, FileInput},
    package::EncryptedPackage,
    EncryptionContext, EnvelopeConfig, EnvelopeError, Result,
};
use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, instrument};

/// Non-secret metadata sent alongside the ciphertext
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadMetadata {
    /// Nonce as a byte array
    pub nonce: Vec<u8>,
    pub key_version: String,
    /// AEAD identifier, e.g. `AES-256-GCM`
    pub algorithm: String,
    pub original_name: String,
    pub original_size: u64,
    /// MIME type
    pub original_type: String,
    pub tenant_id: String,
    /// RFC 3339 timestamp with millisecond precision
    pub encrypted_at: String,
    /// Associated data as a byte array
    pub additional_data: Vec<u8>,
    /// Caller-supplied metadata
    #[serde(default)]
    pub file_metadata: Map<String, Value>,
}

/// Encrypted package plus its serialized metadata envelope
#[derive(Clone, Debug)]
pub struct UploadBundle {
    pub encrypted_package: EncryptedPackage,
    pub serialized_metadata: String,
    metadata: UploadMetadata,
}

impl UploadBundle {
    /// Raw ciphertext bytes (tag appended)
    pub fn ciphertext(&self) -> &[u8] {
        &self.encrypted_package.ciphertext
    }

    pub fn metadata(&self) -> &UploadMetadata {
        &self.metadata
    }

    /// Metadata envelope as a JSON value, parsed from the serialized form
    pub fn metadata_json(&self) -> Result<Value> {
        serde_json::from_str(&self.serialized_metadata).map_err(|e| {
            EnvelopeError::InvalidPackage(format!("metadata is not valid JSON: {}", e))
        })
    }

    /// Split into `(ciphertext, serialized metadata)` for a transport
    pub fn into_parts(self) -> (Vec<u8>, String) {
        (self.encrypted_package.ciphertext, self.serialized_metadata)
    }
}

/// Builds upload bundles from plaintext files
#[derive(Clone, Debug)]
pub struct SecureUploadBuilder {
    packager: FileEncryptionPackager,
}

impl SecureUploadBuilder {
    pub fn new(config: EnvelopeConfig) -> Self {
        Self::from_packager(FileEncryptionPackager::new(config))
    }

    pub fn from_packager(packager: FileEncryptionPackager) -> Self {
        Self { packager }
    }

    pub fn packager(&self) -> &FileEncryptionPackager {
        &self.packager
    }

    /// Encrypt `file` and assemble its metadata envelope
    #[instrument(
        skip(self, file, ctx, extra_metadata),
        fields(name = %file.name, tenant = ctx.tenant_id())
    )]
    pub async fn build_upload(
        &self,
        file: &FileInput,
        ctx: &EncryptionContext,
        extra_metadata: Option<Map<String, Value>>,
    ) -> Result<UploadBundle> {
        let package = self.packager.encrypt_input(file, ctx).await?;
        let meta = file.meta();

        let metadata = UploadMetadata {
            nonce: package.nonce.as_bytes().to_vec(),
            key_version: package.key_version.clone(),
            algorithm: package.algorithm.algorithm_id().to_string(),
            original_name: meta.name,
            original_size: meta.size,
            original_type: file.content_type(),
            tenant_id: package.tenant_id.clone(),
            encrypted_at: package.created_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            additional_data: package.aad.clone().unwrap_or_default(),
            file_metadata: extra_metadata.unwrap_or_default(),
        };
        let serialized_metadata = serde_json::to_string(&metadata)
            .map_err(|e| EnvelopeError::InvalidInput(format!("metadata not serializable: {}", e)))?;

        debug!(
            ciphertext_len = package.ciphertext.len(),
            metadata_len = serialized_metadata.len(),
            "built upload bundle"
        );

        Ok(UploadBundle {
            encrypted_package: package,
            serialized_metadata,
            metadata,
        })
    }
}
