//! Self-describing encrypted package
//!
//! A package carries everything except the credential needed to attempt
//! decryption later: nonce, algorithm, key version, tenant, and (for files)
//! the associated data.

use crate::{EnvelopeConfig, EnvelopeError, Result};
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use wealth_crypto::{AeadCipher, KeyDomain, Nonce};

/// Version of the package serialization format
pub const PACKAGE_FORMAT_VERSION: u8 = 1;

/// Ciphertext plus the non-secret parameters needed to decrypt it
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedPackage {
    /// Serialization format version
    pub version: u8,
    /// Ciphertext with the authentication tag appended
    #[serde(with = "base64_serde")]
    pub ciphertext: Vec<u8>,
    /// Nonce used for encryption
    pub nonce: Nonce,
    /// Associated data bound at encryption time
    #[serde(default, skip_serializing_if = "Option::is_none", with = "base64_opt")]
    pub aad: Option<Vec<u8>>,
    /// Key scheme version
    pub key_version: String,
    /// AEAD identifier
    pub algorithm: AeadCipher,
    /// Tenant the key was derived for
    pub tenant_id: String,
    /// Domain the key was derived for
    pub domain: KeyDomain,
    /// Encryption timestamp
    pub created_at: DateTime<Utc>,
}

impl EncryptedPackage {
    /// Length of the plaintext this package decrypts to
    pub fn plaintext_len(&self) -> usize {
        self.ciphertext
            .len()
            .saturating_sub(self.algorithm.tag_size())
    }

    /// Serialize to JSON string for storage
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| EnvelopeError::InvalidPackage(e.to_string()))
    }

    /// Deserialize from JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| EnvelopeError::InvalidPackage(e.to_string()))
    }

    /// Base64 of the JSON form, for embedding in configuration values
    pub fn to_base64(&self) -> Result<String> {
        Ok(base64::engine::general_purpose::STANDARD.encode(self.to_json()?))
    }

    pub fn from_base64(encoded: &str) -> Result<Self> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| EnvelopeError::InvalidPackage(e.to_string()))?;
        let json =
            String::from_utf8(bytes).map_err(|e| EnvelopeError::InvalidPackage(e.to_string()))?;
        Self::from_json(&json)
    }

    /// Reject packages this configuration must not attempt to open
    pub(crate) fn ensure_openable(&self, domain: KeyDomain, config: &EnvelopeConfig) -> Result<()> {
        if self.version != PACKAGE_FORMAT_VERSION {
            return Err(EnvelopeError::InvalidPackage(format!(
                "unsupported package format version {}",
                self.version
            )));
        }
        if self.domain != domain {
            return Err(EnvelopeError::InvalidPackage(format!(
                "expected a {} package, got {}",
                domain, self.domain
            )));
        }
        if !config.accepts_key_version(&self.key_version) {
            return Err(EnvelopeError::InvalidPackage(format!(
                "key version '{}' is not accepted",
                self.key_version
            )));
        }
        if self.ciphertext.len() < self.algorithm.tag_size() {
            return Err(EnvelopeError::InvalidPackage(format!(
                "ciphertext shorter than the {}-byte tag",
                self.algorithm.tag_size()
            )));
        }
        Ok(())
    }
}

mod base64_serde {
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&base64::engine::general_purpose::STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        base64::engine::general_purpose::STANDARD
            .decode(&s)
            .map_err(serde::de::Error::custom)
    }
}

mod base64_opt {
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &Option<Vec<u8>>, s: S) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(b) => s.serialize_some(&base64::engine::general_purpose::STANDARD.encode(b)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<u8>>, D::Error> {
        Option::<String>::deserialize(d)?
            .map(|s| {
                base64::engine::general_purpose::STANDARD
                    .decode(&s)
                    .map_err(serde::de::Error::custom)
            })
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> EncryptedPackage {
        EncryptedPackage {
            version: PACKAGE_FORMAT_VERSION,
            ciphertext: vec![0xAB; 26],
            nonce: Nonce::from_bytes(&[3u8; 12]).unwrap(),
            aad: Some(b"{\"name\":\"a\"}".to_vec()),
            key_version: "v1".to_string(),
            algorithm: AeadCipher::Aes256Gcm,
            tenant_id: "default".to_string(),
            domain: KeyDomain::File,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_json_shape() {
        let json = sample().to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["algorithm"], "AES-256-GCM");
        assert_eq!(value["keyVersion"], "v1");
        assert_eq!(value["tenantId"], "default");
        assert_eq!(value["domain"], "file");
        assert!(value["nonce"].is_string());
        assert!(value["aad"].is_string());
    }

    #[test]
    fn test_base64_form_restores_package() {
        let package = sample();
        let restored = EncryptedPackage::from_base64(&package.to_base64().unwrap()).unwrap();
        assert_eq!(restored, package);
        assert_eq!(restored.plaintext_len(), 10);
    }

    #[test]
    fn test_missing_aad_deserializes_as_none() {
        let mut package = sample();
        package.aad = None;
        let json = package.to_json().unwrap();
        assert!(!json.contains("\"aad\""));
        assert_eq!(EncryptedPackage::from_json(&json).unwrap().aad, None);
    }

    #[test]
    fn test_unknown_algorithm_is_invalid_package() {
        let json = sample().to_json().unwrap().replace("AES-256-GCM", "ROT13");
        assert!(matches!(
            EncryptedPackage::from_json(&json),
            Err(EnvelopeError::InvalidPackage(_))
        ));
    }

    #[test]
    fn test_ensure_openable() {
        let config = EnvelopeConfig::default();
        let package = sample();
        package.ensure_openable(KeyDomain::File, &config).unwrap();
        assert!(package.ensure_openable(KeyDomain::Json, &config).is_err());

        let mut old = sample();
        old.key_version = "v0".to_string();
        assert!(old.ensure_openable(KeyDomain::File, &config).is_err());
        assert!(old
            .ensure_openable(KeyDomain::File, &config.clone().accept_key_version("v0"))
            .is_ok());
    }
}
