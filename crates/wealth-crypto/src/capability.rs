//! Startup check that the runtime provides the primitives the envelope layer needs
//!
//! The probe moves `Unknown -> Checking -> Supported | Unsupported` once and
//! then reports the cached verdict. Concurrent callers wait for the single
//! in-flight check.

use crate::{
    kdf::{DerivedKey, KdfHash, KdfParams, KeyDerivationService},
    symmetric::{Aead, AeadCipher, Nonce},
    CryptoError, Result, KEY_SIZE, NONCE_SIZE,
};
use secrecy::SecretString;
use std::sync::atomic::{AtomicU8, Ordering};
use tracing::{info, instrument, warn};

/// PBKDF2-HMAC-SHA-256("password", "salt", 1 iteration, 32 bytes)
const PBKDF2_SHA256_VECTOR: [u8; 32] = [
    0x12, 0x0f, 0xb6, 0xcf, 0xfc, 0xf8, 0xb3, 0x2c, 0x43, 0xe7, 0x22, 0x52, 0x56, 0xc4, 0xf8, 0x37,
    0xa8, 0x65, 0x48, 0xc9, 0x2c, 0xcc, 0x35, 0x48, 0x08, 0x05, 0x98, 0x7c, 0xb7, 0x0b, 0xe1, 0x7b,
];

const PROBE_PLAINTEXT: &[u8] = b"wealth-capability-probe";
const PROBE_AAD: &[u8] = b"probe";

/// Probe lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum ProbeState {
    Unknown = 0,
    Checking = 1,
    Supported = 2,
    Unsupported = 3,
}

impl ProbeState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Checking,
            2 => Self::Supported,
            3 => Self::Unsupported,
            _ => Self::Unknown,
        }
    }

    /// Verdict if the probe has finished
    pub fn verdict(&self) -> Option<bool> {
        match self {
            Self::Supported => Some(true),
            Self::Unsupported => Some(false),
            _ => None,
        }
    }
}

pub(crate) enum Outcome {
    Supported,
    Unsupported(String),
}

/// Check sequence run on the blocking pool
pub(crate) type CheckFn = fn(AeadCipher, KdfParams) -> Result<Outcome>;

/// Verifies RNG, key derivation, key import, and AEAD behaviour
pub struct CapabilityProbe {
    cipher: AeadCipher,
    kdf: KdfParams,
    checks: CheckFn,
    state: AtomicU8,
    gate: tokio::sync::Mutex<()>,
}

/// Returns the state to `Unknown` if a check is abandoned mid-flight
struct CheckingGuard<'a> {
    state: &'a AtomicU8,
    armed: bool,
}

impl Drop for CheckingGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            let _ = self.state.compare_exchange(
                ProbeState::Checking as u8,
                ProbeState::Unknown as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            );
        }
    }
}

impl CapabilityProbe {
    pub fn new(cipher: AeadCipher, kdf: KdfParams) -> Self {
        Self::with_checks(cipher, kdf, run_checks)
    }

    pub(crate) fn with_checks(cipher: AeadCipher, kdf: KdfParams, checks: CheckFn) -> Self {
        Self {
            cipher,
            kdf,
            checks,
            state: AtomicU8::new(ProbeState::Unknown as u8),
            gate: tokio::sync::Mutex::new(()),
        }
    }

    /// Current lifecycle state.
    ///
    /// `Checking` is only observed while a `check_support` call is in flight;
    /// dropping that call reverts the state to `Unknown`.
    pub fn state(&self) -> ProbeState {
        ProbeState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: ProbeState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Run the checks once and report whether encrypted uploads can be offered.
    ///
    /// Expected gaps in the environment yield `Ok(false)`. A primitive that
    /// misbehaves (e.g. a round trip that returns different bytes) yields
    /// [`CryptoError::CapabilitySupport`].
    #[instrument(skip(self), fields(cipher = %self.cipher))]
    pub async fn check_support(&self) -> Result<bool> {
        if let Some(verdict) = self.state().verdict() {
            return Ok(verdict);
        }
        let _gate = self.gate.lock().await;
        if let Some(verdict) = self.state().verdict() {
            return Ok(verdict);
        }

        self.set_state(ProbeState::Checking);
        let mut guard = CheckingGuard {
            state: &self.state,
            armed: true,
        };
        let (cipher, kdf, checks) = (self.cipher, self.kdf, self.checks);
        let outcome = tokio::task::spawn_blocking(move || checks(cipher, kdf))
            .await
            .map_err(|e| CryptoError::CapabilitySupport(format!("probe task failed: {}", e)))
            .and_then(|r| r);
        guard.armed = false;

        match outcome {
            Ok(Outcome::Supported) => {
                self.set_state(ProbeState::Supported);
                info!("encryption primitives available");
                Ok(true)
            }
            Ok(Outcome::Unsupported(reason)) => {
                self.set_state(ProbeState::Unsupported);
                warn!(%reason, "encryption primitives unavailable");
                Ok(false)
            }
            Err(e) => {
                self.set_state(ProbeState::Unsupported);
                Err(e)
            }
        }
    }
}

fn run_checks(cipher: AeadCipher, kdf: KdfParams) -> Result<Outcome> {
    let mut random = [0u8; NONCE_SIZE];
    if let Err(e) = getrandom::getrandom(&mut random) {
        return Ok(Outcome::Unsupported(format!("secure random generator: {}", e)));
    }

    let kat = KeyDerivationService::new(KdfParams {
        iterations: 1,
        hash: KdfHash::Sha256,
        key_len: KEY_SIZE,
    });
    match kat.derive_key(&SecretString::from("password"), b"salt") {
        Ok(key) if key.as_bytes() == PBKDF2_SHA256_VECTOR => {}
        Ok(_) => return Ok(Outcome::Unsupported("PBKDF2 known-answer mismatch".to_string())),
        Err(e) => return Ok(Outcome::Unsupported(e.to_string())),
    }

    // The configured hash and key length, at a single iteration
    let configured = KeyDerivationService::new(kdf.with_iterations(1));
    let probe_credential = SecretString::from("probe");
    let key: DerivedKey = match configured.derive_key(&probe_credential, b"wealth-probe") {
        Ok(key) => key,
        Err(e) => return Ok(Outcome::Unsupported(e.to_string())),
    };
    let aead = match Aead::new(&key, cipher) {
        Ok(aead) => aead,
        Err(e) => return Ok(Outcome::Unsupported(format!("key import: {}", e))),
    };

    let nonce = Nonce::from_bytes(&random)?;
    let ciphertext = aead
        .encrypt(&nonce, PROBE_PLAINTEXT, PROBE_AAD)
        .map_err(|e| CryptoError::CapabilitySupport(format!("probe encrypt: {}", e)))?;
    let plaintext = aead
        .decrypt(&nonce, &ciphertext, PROBE_AAD)
        .map_err(|e| CryptoError::CapabilitySupport(format!("probe decrypt: {}", e)))?;
    if plaintext != PROBE_PLAINTEXT {
        return Err(CryptoError::CapabilitySupport(
            "round trip returned different plaintext".to_string(),
        ));
    }

    let mut tampered = ciphertext;
    tampered[0] ^= 0x01;
    if aead.decrypt(&nonce, &tampered, PROBE_AAD).is_ok() {
        return Err(CryptoError::CapabilitySupport(
            "tampered ciphertext was accepted".to_string(),
        ));
    }

    Ok(Outcome::Supported)
}
