//! Key derivation: session credential + domain salt → symmetric key
//!
//! Keys are stretched with PBKDF2-HMAC. Derivation is deterministic so a
//! later session holding the same credential can re-derive the same key, and
//! the salt is scoped by `(domain, tenant)` so file keys and JSON keys never
//! coincide even for the same credential.

use crate::{CryptoError, Result, KEY_SIZE};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::{Sha256, Sha512};
use tracing::{debug, instrument};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// Default PBKDF2 iteration count
pub const DEFAULT_ITERATIONS: u32 = 100_000;

/// Default salt prefix, giving salts like `wealth-file-default`
pub const DEFAULT_SALT_PREFIX: &str = "wealth";

/// Operation domain a key is derived for
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyDomain {
    /// Raw file contents
    File,
    /// Structured (JSON) values
    Json,
}

impl KeyDomain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Json => "json",
        }
    }
}

impl std::fmt::Display for KeyDomain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build the deterministic salt for a `(domain, tenant)` pair
pub fn domain_salt(prefix: &str, domain: KeyDomain, tenant_id: &str) -> Vec<u8> {
    if prefix.is_empty() {
        format!("{}-{}", domain, tenant_id).into_bytes()
    } else {
        format!("{}-{}-{}", prefix, domain, tenant_id).into_bytes()
    }
}

/// HMAC hash used inside PBKDF2
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum KdfHash {
    #[default]
    #[serde(rename = "SHA-256")]
    Sha256,
    #[serde(rename = "SHA-512")]
    Sha512,
}

impl KdfHash {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Sha256 => "SHA-256",
            Self::Sha512 => "SHA-512",
        }
    }

    /// Parse a hash name as written in configuration
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().replace('_', "-").as_str() {
            "SHA-256" | "SHA256" => Some(Self::Sha256),
            "SHA-512" | "SHA512" => Some(Self::Sha512),
            _ => None,
        }
    }
}

/// PBKDF2 parameters
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// Iteration count (default: 100,000)
    pub iterations: u32,
    /// HMAC hash (default: SHA-256)
    pub hash: KdfHash,
    /// Output length in bytes (default: 32)
    pub key_len: usize,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
            hash: KdfHash::Sha256,
            key_len: KEY_SIZE,
        }
    }
}

impl KdfParams {
    /// Same parameters with a different iteration count
    pub fn with_iterations(mut self, iterations: u32) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn with_hash(mut self, hash: KdfHash) -> Self {
        self.hash = hash;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.iterations == 0 {
            return Err(CryptoError::KeyDerivation(
                "iteration count must be at least 1".to_string(),
            ));
        }
        if self.key_len == 0 || self.key_len > 64 {
            return Err(CryptoError::KeyDerivation(format!(
                "key length must be between 1 and 64 bytes, got {}",
                self.key_len
            )));
        }
        Ok(())
    }
}

/// Symmetric key material derived from a credential
///
/// Zeroized on drop. Never cached by the derivation service itself.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct DerivedKey {
    bytes: Vec<u8>,
}

impl DerivedKey {
    /// Wrap raw key bytes
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            bytes: bytes.to_vec(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedKey")
            .field("len", &self.bytes.len())
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Stretches a credential and domain salt into key material
#[derive(Clone, Copy, Debug, Default)]
pub struct KeyDerivationService {
    params: KdfParams,
}

impl KeyDerivationService {
    pub fn new(params: KdfParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &KdfParams {
        &self.params
    }

    /// Derive a key on the current thread.
    ///
    /// This is CPU-bound; async callers should use [`Self::derive_key_async`].
    pub fn derive_key(&self, credential: &SecretString, domain_salt: &[u8]) -> Result<DerivedKey> {
        derive_raw(&self.params, credential.expose_secret().as_bytes(), domain_salt)
    }

    /// Derive a key on the blocking pool
    #[instrument(
        skip(self, credential, domain_salt),
        fields(iterations = self.params.iterations, hash = self.params.hash.name())
    )]
    pub async fn derive_key_async(
        &self,
        credential: &SecretString,
        domain_salt: &[u8],
    ) -> Result<DerivedKey> {
        let params = self.params;
        let credential = Zeroizing::new(credential.expose_secret().as_bytes().to_vec());
        let salt = domain_salt.to_vec();

        let key = tokio::task::spawn_blocking(move || derive_raw(&params, &credential, &salt))
            .await
            .map_err(|e| CryptoError::KeyDerivation(format!("derivation task failed: {}", e)))??;

        debug!(key_len = key.len(), "derived key");
        Ok(key)
    }
}

fn derive_raw(params: &KdfParams, credential: &[u8], salt: &[u8]) -> Result<DerivedKey> {
    params.validate()?;
    if credential.is_empty() {
        return Err(CryptoError::KeyDerivation(
            "credential must not be empty".to_string(),
        ));
    }
    if salt.is_empty() {
        return Err(CryptoError::KeyDerivation(
            "domain salt must not be empty".to_string(),
        ));
    }

    let mut out = Zeroizing::new(vec![0u8; params.key_len]);
    let rounds = params.iterations;
    match params.hash {
        KdfHash::Sha256 => pbkdf2::pbkdf2_hmac::<Sha256>(credential, salt, rounds, &mut out[..]),
        KdfHash::Sha512 => pbkdf2::pbkdf2_hmac::<Sha512>(credential, salt, rounds, &mut out[..]),
    }
    Ok(DerivedKey::from_bytes(&out))
}
