//! Client error types

use thiserror::Error;
use wealth_crypto::CryptoError;

/// Result type alias
pub type Result<T> = std::result::Result<T, EnvelopeError>;

/// Envelope layer errors
#[derive(Error, Debug)]
pub enum EnvelopeError {
    /// Failure in a cryptographic primitive
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// Caller-supplied input is inconsistent
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Package is malformed or not acceptable for this operation
    #[error("invalid package: {0}")]
    InvalidPackage(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EnvelopeError {
    /// Check if this is an AEAD tag verification failure
    pub fn is_authentication_failure(&self) -> bool {
        matches!(self, Self::Crypto(e) if e.is_authentication_failure())
    }

    /// Check if decryption succeeded but the plaintext did not parse
    pub fn is_parse_failure(&self) -> bool {
        matches!(self, Self::Crypto(e) if e.is_parse_failure())
    }

    /// Check if the credential or derivation inputs were rejected
    pub fn is_key_derivation_failure(&self) -> bool {
        matches!(self, Self::Crypto(CryptoError::KeyDerivation(_)))
    }
}

impl From<config::ConfigError> for EnvelopeError {
    fn from(e: config::ConfigError) -> Self {
        Self::Config(e.to_string())
    }
}
