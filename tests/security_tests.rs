//! Tamper-resistance tests
//!
//! Every field an attacker controls in a stored package (ciphertext, nonce,
//! associated data) must be covered by authentication.

use proptest::prelude::*;
use serde_json::{json, Value};
use std::sync::OnceLock;
use tokio::runtime::Runtime;
use wealth_client::{
    EncryptedPackage, EncryptionContext, EnvelopeClient, EnvelopeConfig, FileMeta, Nonce,
};

struct Fixture {
    runtime: Runtime,
    client: EnvelopeClient,
    ctx: EncryptionContext,
    file: EncryptedPackage,
    json: EncryptedPackage,
}

fn fixture() -> &'static Fixture {
    static FIXTURE: OnceLock<Fixture> = OnceLock::new();
    FIXTURE.get_or_init(|| {
        let runtime = Runtime::new().unwrap();
        let client = EnvelopeClient::new(EnvelopeConfig::default().with_iterations(1_000)).unwrap();
        let ctx = EncryptionContext::new("tok123", "default");
        let (file, json) = runtime.block_on(async {
            let meta = FileMeta::new("statement.csv", 10, 1_700_000_000_000);
            let file = client.encrypt_file(b"0123456789", &meta, &ctx).await.unwrap();
            let json = client
                .encrypt_json(&json!({"iban": "DE89370400440532013000"}), &ctx)
                .await
                .unwrap();
            (file, json)
        });
        Fixture {
            runtime,
            client,
            ctx,
            file,
            json,
        }
    })
}

fn open_file(package: &EncryptedPackage) -> wealth_client::Result<Vec<u8>> {
    let f = fixture();
    f.runtime.block_on(f.client.decrypt_file(package, &f.ctx))
}

fn open_json(package: &EncryptedPackage) -> wealth_client::Result<Value> {
    let f = fixture();
    f.runtime.block_on(f.client.decrypt_json(package, &f.ctx))
}

#[test]
fn test_untouched_packages_open() {
    assert_eq!(open_file(&fixture().file).unwrap(), b"0123456789");
    assert_eq!(open_json(&fixture().json).unwrap()["iban"], "DE89370400440532013000");
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_file_ciphertext_flip_rejected(index in 0usize..26, bit in 0u8..8) {
        let mut package = fixture().file.clone();
        package.ciphertext[index] ^= 1 << bit;
        let err = open_file(&package).unwrap_err();
        prop_assert!(err.is_authentication_failure());
    }

    #[test]
    fn prop_file_nonce_flip_rejected(index in 0usize..12, bit in 0u8..8) {
        let mut package = fixture().file.clone();
        let mut nonce = *package.nonce.as_bytes();
        nonce[index] ^= 1 << bit;
        package.nonce = Nonce::from_bytes(&nonce).unwrap();
        prop_assert!(open_file(&package).unwrap_err().is_authentication_failure());
    }

    #[test]
    fn prop_file_aad_flip_rejected(seed in any::<usize>(), bit in 0u8..8) {
        let mut package = fixture().file.clone();
        let aad = package.aad.as_mut().unwrap();
        let index = seed % aad.len();
        aad[index] ^= 1 << bit;
        prop_assert!(open_file(&package).unwrap_err().is_authentication_failure());
    }

    #[test]
    fn prop_json_ciphertext_flip_rejected(seed in any::<usize>(), bit in 0u8..8) {
        let mut package = fixture().json.clone();
        let index = seed % package.ciphertext.len();
        package.ciphertext[index] ^= 1 << bit;
        prop_assert!(open_json(&package).unwrap_err().is_authentication_failure());
    }

    #[test]
    fn prop_wrong_credential_rejected(credential in "[a-zA-Z0-9]{1,24}") {
        prop_assume!(credential != "tok123");
        let f = fixture();
        let ctx = EncryptionContext::new(credential, "default");
        let err = f.runtime.block_on(f.client.decrypt_file(&f.file, &ctx)).unwrap_err();
        prop_assert!(err.is_authentication_failure());
    }
}

#[test]
fn test_truncated_ciphertext_rejected() {
    let mut package = fixture().file.clone();
    package.ciphertext.truncate(20);
    assert!(open_file(&package).unwrap_err().is_authentication_failure());

    package.ciphertext.truncate(8);
    assert!(open_file(&package).is_err());
}

#[test]
fn test_tampered_stored_json_rejected() {
    let stored = fixture().file.to_json().unwrap();
    let mut value: Value = serde_json::from_str(&stored).unwrap();

    // Swap in a different claimed size; the encoded AAD must stay authoritative
    let aad = base64_decode(value["aad"].as_str().unwrap());
    let forged = String::from_utf8(aad).unwrap().replace("\"size\":10", "\"size\":11");
    value["aad"] = Value::String(base64_encode(forged.as_bytes()));

    let package = EncryptedPackage::from_json(&value.to_string()).unwrap();
    assert!(open_file(&package).unwrap_err().is_authentication_failure());
}

#[test]
fn test_algorithm_swap_rejected() {
    let mut package = fixture().file.clone();
    package.algorithm = wealth_client::AeadCipher::ChaCha20Poly1305;
    assert!(open_file(&package).unwrap_err().is_authentication_failure());
}

#[test]
fn test_error_does_not_leak_plaintext_or_credential() {
    let mut package = fixture().json.clone();
    package.ciphertext[0] ^= 1;
    let err = open_json(&package).unwrap_err();
    let message = format!("{:?} {}", err, err);
    assert!(!message.contains("DE89"));
    assert!(!message.contains("tok123"));
}

fn base64_encode(bytes: &[u8]) -> String {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

fn base64_decode(s: &str) -> Vec<u8> {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.decode(s).unwrap()
}
