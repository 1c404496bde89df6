//! Envelope configuration
//!
//! Algorithm, key length and derivation parameters are injected into every
//! component rather than read from globals, so tests can substitute cheap
//! parameters.

use crate::{EnvelopeError, Result};
use serde::Deserialize;
use std::num::NonZeroUsize;
use wealth_crypto::{kdf::DEFAULT_SALT_PREFIX, AeadCipher, KdfHash, KdfParams};

/// Key version stamped on new packages unless configured otherwise
pub const DEFAULT_KEY_VERSION: &str = "v1";

/// Environment variable prefix read by [`EnvelopeConfig::from_env`]
pub const ENV_PREFIX: &str = "WEALTH_ENVELOPE";

/// Envelope configuration
#[derive(Clone, Debug)]
pub struct EnvelopeConfig {
    /// AEAD used for new packages
    pub cipher: AeadCipher,
    /// PBKDF2 parameters
    pub kdf: KdfParams,
    /// Prefix of the `(domain, tenant)` salt
    pub salt_prefix: String,
    /// Key version stamped on new packages
    pub key_version: String,
    /// Older key versions still accepted on decrypt
    pub accepted_key_versions: Vec<String>,
    /// Bind tenant/key version as AAD on JSON payloads
    pub bind_json_context: bool,
    /// Capacity of the derived-key cache; `None` disables caching
    pub key_cache_capacity: Option<NonZeroUsize>,
}

impl Default for EnvelopeConfig {
    fn default() -> Self {
        Self {
            cipher: AeadCipher::Aes256Gcm,
            kdf: KdfParams::default(),
            salt_prefix: DEFAULT_SALT_PREFIX.to_string(),
            key_version: DEFAULT_KEY_VERSION.to_string(),
            accepted_key_versions: Vec::new(),
            bind_json_context: false,
            key_cache_capacity: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct Overrides {
    algorithm: Option<String>,
    kdf_iterations: Option<u32>,
    kdf_hash: Option<String>,
    salt_prefix: Option<String>,
    key_version: Option<String>,
    accepted_key_versions: Option<String>,
    bind_json_context: Option<bool>,
    key_cache_capacity: Option<usize>,
}

impl EnvelopeConfig {
    /// Defaults overridden by `WEALTH_ENVELOPE_*` environment variables
    pub fn from_env() -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?;
        Self::from_settings(settings)
    }

    /// Defaults overridden by any `config` source
    pub fn from_settings(settings: config::Config) -> Result<Self> {
        let overrides: Overrides = settings.try_deserialize()?;
        let mut cfg = Self::default();

        if let Some(id) = overrides.algorithm {
            cfg.cipher = AeadCipher::from_id(&id)
                .ok_or_else(|| EnvelopeError::Config(format!("unknown algorithm '{}'", id)))?;
        }
        if let Some(iterations) = overrides.kdf_iterations {
            cfg.kdf.iterations = iterations;
        }
        if let Some(name) = overrides.kdf_hash {
            cfg.kdf.hash = KdfHash::from_name(&name)
                .ok_or_else(|| EnvelopeError::Config(format!("unknown KDF hash '{}'", name)))?;
        }
        if let Some(prefix) = overrides.salt_prefix {
            cfg.salt_prefix = prefix;
        }
        if let Some(version) = overrides.key_version {
            cfg.key_version = version;
        }
        if let Some(list) = overrides.accepted_key_versions {
            cfg.accepted_key_versions = list
                .split(',')
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(bind) = overrides.bind_json_context {
            cfg.bind_json_context = bind;
        }
        if let Some(capacity) = overrides.key_cache_capacity {
            cfg.key_cache_capacity = NonZeroUsize::new(capacity);
        }

        cfg.validate()?;
        Ok(cfg)
    }

    /// Set the AEAD
    pub fn with_cipher(mut self, cipher: AeadCipher) -> Self {
        self.cipher = cipher;
        self
    }

    /// Set the PBKDF2 iteration count
    pub fn with_iterations(mut self, iterations: u32) -> Self {
        self.kdf.iterations = iterations;
        self
    }

    pub fn with_kdf(mut self, kdf: KdfParams) -> Self {
        self.kdf = kdf;
        self
    }

    /// Stamp new packages with `version`
    pub fn with_key_version(mut self, version: impl Into<String>) -> Self {
        self.key_version = version.into();
        self
    }

    /// Keep accepting packages stamped with `version`
    pub fn accept_key_version(mut self, version: impl Into<String>) -> Self {
        self.accepted_key_versions.push(version.into());
        self
    }

    pub fn with_json_context_binding(mut self, enabled: bool) -> Self {
        self.bind_json_context = enabled;
        self
    }

    /// Enable the derived-key cache
    pub fn with_key_cache(mut self, capacity: NonZeroUsize) -> Self {
        self.key_cache_capacity = Some(capacity);
        self
    }

    /// Whether packages stamped with `version` may be decrypted
    pub fn accepts_key_version(&self, version: &str) -> bool {
        self.key_version == version || self.accepted_key_versions.iter().any(|v| v == version)
    }

    pub fn validate(&self) -> Result<()> {
        self.kdf
            .validate()
            .map_err(|e| EnvelopeError::Config(e.to_string()))?;
        if self.kdf.key_len != self.cipher.key_size() {
            return Err(EnvelopeError::Config(format!(
                "{} needs a {}-byte key but the KDF produces {} bytes",
                self.cipher,
                self.cipher.key_size(),
                self.kdf.key_len
            )));
        }
        if self.key_version.trim().is_empty() {
            return Err(EnvelopeError::Config("key version must not be empty".to_string()));
        }
        Ok(())
    }
}
