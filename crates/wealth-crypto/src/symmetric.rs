//! Authenticated encryption using AES-GCM and ChaCha20-Poly1305
//!
//! Ciphertexts carry the 16-byte tag appended. Any change to the ciphertext,
//! nonce, associated data, or key makes decryption fail with
//! [`CryptoError::Authentication`]; no partial plaintext is ever returned.

use crate::{kdf::DerivedKey, CryptoError, Result, KEY_SIZE, NONCE_SIZE, TAG_SIZE};
use aes_gcm::{
    aead::{Aead as AeadTrait, Payload},
    Aes256Gcm, KeyInit,
};
use base64::Engine;
use chacha20poly1305::ChaCha20Poly1305;
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A 96-bit nonce for AEAD encryption
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Nonce {
    bytes: [u8; NONCE_SIZE],
}

impl Nonce {
    /// Generate a random nonce from the OS generator.
    ///
    /// Panics if the OS generator is unavailable; use [`Nonce::try_generate`]
    /// where that must surface as an error.
    pub fn generate() -> Self {
        let mut bytes = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut bytes);
        Self { bytes }
    }

    /// Generate a random nonce, reporting an unavailable OS generator
    pub fn try_generate() -> Result<Self> {
        let mut bytes = [0u8; NONCE_SIZE];
        OsRng.try_fill_bytes(&mut bytes).map_err(|e| {
            CryptoError::CapabilitySupport(format!("secure random generator: {}", e))
        })?;
        Ok(Self { bytes })
    }

    /// Create from raw bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != NONCE_SIZE {
            return Err(CryptoError::InvalidNonce(format!(
                "nonce must be {} bytes, got {}",
                NONCE_SIZE,
                bytes.len()
            )));
        }
        let mut arr = [0u8; NONCE_SIZE];
        arr.copy_from_slice(bytes);
        Ok(Self { bytes: arr })
    }

    /// Get the nonce bytes
    pub fn as_bytes(&self) -> &[u8; NONCE_SIZE] {
        &self.bytes
    }

    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(self.bytes)
    }

    pub fn from_base64(s: &str) -> Result<Self> {
        let bytes = base64::engine::general_purpose::STANDARD.decode(s)?;
        Self::from_bytes(&bytes)
    }
}

impl Serialize for Nonce {
    fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_str(&self.to_base64())
    }
}

impl<'de> Deserialize<'de> for Nonce {
    fn deserialize<D: Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        Self::from_base64(&s).map_err(serde::de::Error::custom)
    }
}

/// Supported AEAD ciphers
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AeadCipher {
    /// AES-256-GCM
    #[default]
    #[serde(rename = "AES-256-GCM")]
    Aes256Gcm,
    /// ChaCha20-Poly1305
    #[serde(rename = "ChaCha20-Poly1305")]
    ChaCha20Poly1305,
}

impl AeadCipher {
    /// Get the algorithm identifier string
    pub fn algorithm_id(&self) -> &'static str {
        match self {
            Self::Aes256Gcm => "AES-256-GCM",
            Self::ChaCha20Poly1305 => "ChaCha20-Poly1305",
        }
    }

    /// Look up a cipher by its identifier (case-insensitive)
    pub fn from_id(id: &str) -> Option<Self> {
        [Self::Aes256Gcm, Self::ChaCha20Poly1305]
            .into_iter()
            .find(|c| c.algorithm_id().eq_ignore_ascii_case(id))
    }

    pub fn key_size(&self) -> usize {
        KEY_SIZE
    }

    pub fn nonce_size(&self) -> usize {
        NONCE_SIZE
    }

    /// Get the authentication tag size
    pub fn tag_size(&self) -> usize {
        TAG_SIZE // Both use 128-bit tags
    }
}

impl std::fmt::Display for AeadCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.algorithm_id())
    }
}

enum CipherImpl {
    Aes(Box<Aes256Gcm>),
    ChaCha(Box<ChaCha20Poly1305>),
}

/// AEAD encryption/decryption bound to one key
pub struct Aead {
    cipher: AeadCipher,
    engine: CipherImpl,
}

impl Aead {
    /// Import `key` for the given cipher
    pub fn new(key: &DerivedKey, cipher: AeadCipher) -> Result<Self> {
        Self::from_key_bytes(key.as_bytes(), cipher)
    }

    /// Import with the default cipher (AES-256-GCM)
    pub fn new_default(key: &DerivedKey) -> Result<Self> {
        Self::new(key, AeadCipher::default())
    }

    /// Import raw key bytes
    pub fn from_key_bytes(key: &[u8], cipher: AeadCipher) -> Result<Self> {
        if key.len() != cipher.key_size() {
            return Err(CryptoError::InvalidKey(format!(
                "{} requires a {}-byte key, got {}",
                cipher,
                cipher.key_size(),
                key.len()
            )));
        }
        let engine = match cipher {
            AeadCipher::Aes256Gcm => CipherImpl::Aes(Box::new(
                Aes256Gcm::new_from_slice(key).map_err(|e| CryptoError::InvalidKey(e.to_string()))?,
            )),
            AeadCipher::ChaCha20Poly1305 => CipherImpl::ChaCha(Box::new(
                ChaCha20Poly1305::new_from_slice(key)
                    .map_err(|e| CryptoError::InvalidKey(e.to_string()))?,
            )),
        };
        Ok(Self { cipher, engine })
    }

    /// Encrypt `plaintext`, binding `aad`. Returns ciphertext with the tag appended.
    pub fn encrypt(&self, nonce: &Nonce, plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
        let payload = Payload { msg: plaintext, aad };
        let result = match &self.engine {
            CipherImpl::Aes(c) => c.encrypt(aes_gcm::Nonce::from_slice(nonce.as_bytes()), payload),
            CipherImpl::ChaCha(c) => {
                c.encrypt(chacha20poly1305::Nonce::from_slice(nonce.as_bytes()), payload)
            }
        };
        result.map_err(|e| CryptoError::Cipher(format!("{} encrypt: {}", self.cipher, e)))
    }

    /// Decrypt and verify `ciphertext` against `aad`
    pub fn decrypt(&self, nonce: &Nonce, ciphertext: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
        if ciphertext.len() < self.cipher.tag_size() {
            return Err(CryptoError::Authentication);
        }
        let payload = Payload { msg: ciphertext, aad };
        let result = match &self.engine {
            CipherImpl::Aes(c) => c.decrypt(aes_gcm::Nonce::from_slice(nonce.as_bytes()), payload),
            CipherImpl::ChaCha(c) => {
                c.decrypt(chacha20poly1305::Nonce::from_slice(nonce.as_bytes()), payload)
            }
        };
        result.map_err(|_| CryptoError::Authentication)
    }

    /// Get the cipher type
    pub fn cipher(&self) -> AeadCipher {
        self.cipher
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;
    use std::collections::HashSet;

    fn key(byte: u8) -> DerivedKey {
        DerivedKey::from_bytes(&[byte; KEY_SIZE])
    }

    #[rstest]
    #[case(AeadCipher::Aes256Gcm)]
    #[case(AeadCipher::ChaCha20Poly1305)]
    fn test_roundtrip(#[case] cipher: AeadCipher) {
        let aead = Aead::new(&key(1), cipher).unwrap();
        let nonce = Nonce::generate();
        let ciphertext = aead.encrypt(&nonce, b"Hello, World!", b"meta").unwrap();
        assert_eq!(ciphertext.len(), 13 + TAG_SIZE);

        let decrypted = aead.decrypt(&nonce, &ciphertext, b"meta").unwrap();
        assert_eq!(decrypted, b"Hello, World!");
    }

    #[rstest]
    #[case(AeadCipher::Aes256Gcm)]
    #[case(AeadCipher::ChaCha20Poly1305)]
    fn test_wrong_aad_fails(#[case] cipher: AeadCipher) {
        let aead = Aead::new(&key(1), cipher).unwrap();
        let nonce = Nonce::generate();
        let ciphertext = aead.encrypt(&nonce, b"secret data", b"correct aad").unwrap();
        let err = aead.decrypt(&nonce, &ciphertext, b"wrong aad").unwrap_err();
        assert!(matches!(err, CryptoError::Authentication));
    }

    #[test]
    fn test_wrong_key_fails() {
        let nonce = Nonce::generate();
        let ciphertext = Aead::new_default(&key(1)).unwrap().encrypt(&nonce, b"data", b"").unwrap();
        let err = Aead::new_default(&key(2))
            .unwrap()
            .decrypt(&nonce, &ciphertext, b"")
            .unwrap_err();
        assert!(matches!(err, CryptoError::Authentication));
    }

    #[test]
    fn test_truncated_ciphertext_fails() {
        let aead = Aead::new_default(&key(1)).unwrap();
        let nonce = Nonce::generate();
        let err = aead.decrypt(&nonce, &[0u8; 5], b"").unwrap_err();
        assert!(matches!(err, CryptoError::Authentication));
    }

    #[test]
    fn test_same_plaintext_different_nonces() {
        let aead = Aead::new_default(&key(3)).unwrap();
        let a = aead.encrypt(&Nonce::generate(), b"same", b"").unwrap();
        let b = aead.encrypt(&Nonce::generate(), b"same", b"").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_wrong_key_length_rejected() {
        let short = DerivedKey::from_bytes(&[0u8; 16]);
        assert!(matches!(
            Aead::new_default(&short),
            Err(CryptoError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_nonce_uniqueness() {
        let nonces: HashSet<Nonce> = (0..10_000).map(|_| Nonce::try_generate().unwrap()).collect();
        assert_eq!(nonces.len(), 10_000);
    }

    #[test]
    fn test_nonce_length_validated() {
        assert!(Nonce::from_bytes(&[0u8; 11]).is_err());
        assert!(Nonce::from_bytes(&[0u8; 12]).is_ok());
    }

    #[test]
    fn test_nonce_serde_base64() {
        let nonce = Nonce::from_bytes(&[1u8; NONCE_SIZE]).unwrap();
        let json = serde_json::to_string(&nonce).unwrap();
        assert_eq!(json, "\"AQEBAQEBAQEBAQEB\"");
        let back: Nonce = serde_json::from_str(&json).unwrap();
        assert_eq!(back, nonce);
    }

    #[test]
    fn test_cipher_ids() {
        assert_eq!(AeadCipher::from_id("aes-256-gcm"), Some(AeadCipher::Aes256Gcm));
        assert_eq!(AeadCipher::from_id("ChaCha20-Poly1305"), Some(AeadCipher::ChaCha20Poly1305));
        assert_eq!(AeadCipher::from_id("AES-128-CBC"), None);
        assert_eq!(
            serde_json::to_string(&AeadCipher::Aes256Gcm).unwrap(),
            "\"AES-256-GCM\""
        );
    }

    proptest! {
        #[test]
        fn prop_single_byte_flip_is_rejected(
            plaintext in proptest::collection::vec(any::<u8>(), 0..256),
            aad in proptest::collection::vec(any::<u8>(), 1..64),
            target in 0usize..3,
            index in any::<usize>(),
            flip in 1u8..=255,
        ) {
            let aead = Aead::new_default(&key(9)).unwrap();
            let nonce = Nonce::generate();
            let mut ciphertext = aead.encrypt(&nonce, &plaintext, &aad).unwrap();
            let mut nonce_bytes = *nonce.as_bytes();
            let mut aad = aad;

            match target {
                0 => { let i = index % ciphertext.len(); ciphertext[i] ^= flip; }
                1 => { let i = index % nonce_bytes.len(); nonce_bytes[i] ^= flip; }
                _ => { let i = index % aad.len(); aad[i] ^= flip; }
            }

            let nonce = Nonce::from_bytes(&nonce_bytes).unwrap();
            let result = aead.decrypt(&nonce, &ciphertext, &aad);
            prop_assert!(matches!(result, Err(CryptoError::Authentication)));
        }
    }
}
