//! # Wealth Crypto
//!
//! Cryptographic primitives for the Wealth Vault client-side encryption layer.
//!
//! This crate provides:
//! - **Key derivation**: PBKDF2-HMAC stretching of a session credential into
//!   per-domain, per-tenant keys
//! - **AEAD**: AES-256-GCM and ChaCha20-Poly1305 with 96-bit random nonces
//! - **Capability probing**: a one-shot startup check of the primitives above
//! - **Key cache**: an opt-in LRU of derived keys for high call volumes
//!
//! ## Example
//!
//! ```rust,ignore
//! use wealth_crypto::{Aead, AeadCipher, KdfParams, KeyDerivationService, Nonce};
//!
//! let kdf = KeyDerivationService::new(KdfParams::default());
//! let key = kdf.derive_key_async(&credential, b"wealth-file-default").await?;
//!
//! let aead = Aead::new(&key, AeadCipher::Aes256Gcm)?;
//! let nonce = Nonce::try_generate()?;
//! let ciphertext = aead.encrypt(&nonce, b"Hello, World!", b"")?;
//! ```

pub mod cache;
pub mod capability;
pub mod error;
pub mod kdf;
pub mod symmetric;

pub use cache::DerivedKeyCache;
pub use capability::{CapabilityProbe, ProbeState};
pub use error::{CryptoError, Result};
pub use kdf::{domain_salt, DerivedKey, KdfHash, KdfParams, KeyDerivationService, KeyDomain};
pub use symmetric::{Aead, AeadCipher, Nonce};

// Credentials are passed around as `SecretString`
pub use secrecy::{ExposeSecret, SecretString};

/// Size of a symmetric key in bytes (256 bits)
pub const KEY_SIZE: usize = 32;

/// Size of a nonce in bytes (96 bits for AES-GCM/ChaCha20-Poly1305)
pub const NONCE_SIZE: usize = 12;

/// Size of an AEAD authentication tag in bytes
pub const TAG_SIZE: usize = 16;
