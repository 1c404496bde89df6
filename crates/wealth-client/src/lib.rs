//! # Wealth Client
//!
//! Client-side envelope encryption for Wealth Vault uploads and settings.
//!
//! ## Features
//!
//! - **File packages**: AEAD-encrypted file bytes bound to name, size and
//!   modification time
//! - **JSON envelopes**: canonical serialization plus encryption of structured
//!   values, with optional context binding
//! - **Upload bundles**: ciphertext plus a metadata envelope, ready for any
//!   transport
//! - **Capability probing**: a startup check before offering encrypted uploads
//!
//! Keys are derived per call from the caller's session credential and tenant;
//! nothing is persisted.
//!
//! ## Example
//!
//! ```rust,ignore
//! use wealth_client::{EncryptionContext, EnvelopeClient, EnvelopeConfig, FileInput};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = EnvelopeClient::new(EnvelopeConfig::default())?;
//!     if !client.check_support().await? {
//!         return Ok(());
//!     }
//!
//!     let ctx = EncryptionContext::new(session_token, "default");
//!     let file = FileInput::from_path("statement.csv").await?;
//!     let bundle = client.build_upload(&file, &ctx, None).await?;
//!     let (ciphertext, metadata) = bundle.into_parts();
//!     Ok(())
//! }
//! ```

mod client;
mod config;
mod context;
mod error;
mod file;
mod json;
mod package;
mod upload;

pub use client::EnvelopeClient;
pub use config::{EnvelopeConfig, DEFAULT_KEY_VERSION, ENV_PREFIX};
pub use context::{EncryptionContext, DEFAULT_TENANT};
pub use error::{EnvelopeError, Result};
pub use file::{FileEncryptionPackager, FileInput, FileMeta};
pub use json::{canonical_json, JsonEnvelopeCodec};
pub use package::{EncryptedPackage, PACKAGE_FORMAT_VERSION};
pub use upload::{SecureUploadBuilder, UploadBundle, UploadMetadata};

// Re-export crypto types callers configure or inspect
pub use wealth_crypto::{AeadCipher, CryptoError, KdfHash, KdfParams, KeyDomain, Nonce, ProbeState};
