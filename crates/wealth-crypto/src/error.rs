//! Error types for the wealth-crypto crate

use thiserror::Error;

/// Result type alias using `CryptoError`
pub type Result<T> = std::result::Result<T, CryptoError>;

/// Errors that can occur during cryptographic operations
#[derive(Error, Debug)]
pub enum CryptoError {
    /// A required platform primitive is missing or misbehaving
    #[error("cryptographic capability unavailable: {0}")]
    CapabilitySupport(String),

    /// Invalid credential or derivation parameters
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    /// AEAD tag verification failed
    #[error("authentication failed: ciphertext, nonce, or associated data did not verify")]
    Authentication,

    /// Decryption succeeded but the plaintext is not valid serialized structure
    #[error("decrypted payload could not be parsed: {0}")]
    Parse(#[source] serde_json::Error),

    /// Encryption failed in a lower layer
    #[error("encryption failed: {context}")]
    Encryption {
        context: String,
        #[source]
        source: Box<CryptoError>,
    },

    /// Decryption failed in a lower layer
    #[error("decryption failed: {context}")]
    Decryption {
        context: String,
        #[source]
        source: Box<CryptoError>,
    },

    /// The AEAD implementation rejected an operation
    #[error("cipher error: {0}")]
    Cipher(String),

    /// Invalid key format or length
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Invalid nonce
    #[error("invalid nonce: {0}")]
    InvalidNonce(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Base64 decode error
    #[error("base64 decode error: {0}")]
    Base64Decode(#[from] base64::DecodeError),
}

impl CryptoError {
    /// Wrap a lower-layer failure that happened while encrypting
    pub fn encryption(context: impl Into<String>, source: CryptoError) -> Self {
        Self::Encryption {
            context: context.into(),
            source: Box::new(source),
        }
    }

    /// Wrap a lower-layer failure that happened while decrypting
    pub fn decryption(context: impl Into<String>, source: CryptoError) -> Self {
        Self::Decryption {
            context: context.into(),
            source: Box::new(source),
        }
    }

    /// True if this error, or any error it wraps, is a tag verification failure
    pub fn is_authentication_failure(&self) -> bool {
        match self {
            Self::Authentication => true,
            Self::Encryption { source, .. } | Self::Decryption { source, .. } => {
                source.is_authentication_failure()
            }
            _ => false,
        }
    }

    /// True if this error, or any error it wraps, is a plaintext parse failure
    pub fn is_parse_failure(&self) -> bool {
        match self {
            Self::Parse(_) => true,
            Self::Encryption { source, .. } | Self::Decryption { source, .. } => {
                source.is_parse_failure()
            }
            _ => false,
        }
    }
}
