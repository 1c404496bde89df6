//! End-to-end tests across the envelope client

use serde_json::{json, Map, Value};
use std::collections::HashSet;
use std::num::NonZeroUsize;
use wealth_client::{
    AeadCipher, EncryptedPackage, EncryptionContext, EnvelopeClient, EnvelopeConfig, FileInput,
    FileMeta, KdfHash, ProbeState,
};

fn client() -> EnvelopeClient {
    EnvelopeClient::new(EnvelopeConfig::default().with_iterations(1_000)).unwrap()
}

#[tokio::test]
async fn test_file_scenario() {
    let client = client();
    let ctx = EncryptionContext::new("tok123", "default");
    let meta = FileMeta::new("statement.csv", 10, 1_700_000_000_000);

    let package = client.encrypt_file(b"0123456789", &meta, &ctx).await.unwrap();
    assert_eq!(package.ciphertext.len(), 26);
    assert_eq!(package.nonce.as_bytes().len(), 12);
    assert_eq!(package.algorithm, AeadCipher::Aes256Gcm);
    assert_eq!(package.key_version, "v1");

    // Package survives storage as JSON
    let stored = package.to_json().unwrap();
    let restored = EncryptedPackage::from_json(&stored).unwrap();
    assert_eq!(client.decrypt_file(&restored, &ctx).await.unwrap(), b"0123456789");

    let err = client
        .decrypt_file(&restored, &EncryptionContext::new("tokWRONG", "default"))
        .await
        .unwrap_err();
    assert!(err.is_authentication_failure());
}

#[tokio::test]
async fn test_json_scenario() {
    let client = client();
    let ctx = EncryptionContext::with_default_tenant("tok123");

    let package = client.encrypt_json(&json!({"b": "x", "a": 1}), &ctx).await.unwrap();
    let value: Value = client.decrypt_json(&package, &ctx).await.unwrap();
    assert_eq!(value, json!({"a": 1, "b": "x"}));
}

#[tokio::test]
async fn test_empty_payloads() {
    let client = client();
    let ctx = EncryptionContext::with_default_tenant("tok");

    let file = FileInput::new("empty.txt", Vec::new()).with_last_modified(0);
    let package = client.files().encrypt_input(&file, &ctx).await.unwrap();
    assert_eq!(package.ciphertext.len(), 16);
    assert!(client.decrypt_file(&package, &ctx).await.unwrap().is_empty());

    let package = client.encrypt_json(&json!({}), &ctx).await.unwrap();
    let value: Value = client.decrypt_json(&package, &ctx).await.unwrap();
    assert_eq!(value, json!({}));
}

#[tokio::test]
async fn test_cross_tenant_isolation() {
    let client = client();
    let acme = EncryptionContext::new("shared-token", "acme");
    let globex = EncryptionContext::new("shared-token", "globex");
    let meta = FileMeta::new("ledger.csv", 4, 1);

    let package = client.encrypt_file(b"data", &meta, &acme).await.unwrap();
    let err = client.decrypt_file(&package, &globex).await.unwrap_err();
    assert!(err.is_authentication_failure());

    let package = client.encrypt_json(&json!({"k": 1}), &acme).await.unwrap();
    let err = client.decrypt_json::<Value>(&package, &globex).await.unwrap_err();
    assert!(err.is_authentication_failure());
}

#[tokio::test]
async fn test_file_and_json_keys_are_separate() {
    let client = client();
    let ctx = EncryptionContext::with_default_tenant("tok");

    // A JSON package relabelled as a file cannot be opened with the file key
    let mut package = client.encrypt_json(&json!({"k": 1}), &ctx).await.unwrap();
    package.domain = wealth_client::KeyDomain::File;
    package.aad = Some(Vec::new());
    let err = client.decrypt_file(&package, &ctx).await.unwrap_err();
    assert!(err.is_authentication_failure());
}

#[tokio::test]
async fn test_nonces_unique_across_packages() {
    let client = EnvelopeClient::new(
        EnvelopeConfig::default()
            .with_iterations(1_000)
            .with_key_cache(NonZeroUsize::new(4).unwrap()),
    )
    .unwrap();
    let ctx = EncryptionContext::with_default_tenant("tok");

    let mut seen = HashSet::new();
    for i in 0..500u32 {
        let package = client.encrypt_json(&json!(i), &ctx).await.unwrap();
        assert!(seen.insert(*package.nonce.as_bytes()));
    }
}

#[tokio::test]
async fn test_same_plaintext_different_ciphertext() {
    let client = client();
    let ctx = EncryptionContext::with_default_tenant("tok");
    let meta = FileMeta::new("a.txt", 3, 1);

    let a = client.encrypt_file(b"abc", &meta, &ctx).await.unwrap();
    let b = client.encrypt_file(b"abc", &meta, &ctx).await.unwrap();
    assert_ne!(a.nonce, b.nonce);
    assert_ne!(a.ciphertext, b.ciphertext);
}

#[tokio::test]
async fn test_upload_bundle_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("holdings.json");
    tokio::fs::write(&path, br#"{"AAPL":10}"#).await.unwrap();

    let client = client();
    let ctx = EncryptionContext::new("tok123", "default");
    let file = FileInput::from_path(&path).await.unwrap();

    let mut extra = Map::new();
    extra.insert("portfolio".to_string(), json!("retirement"));
    let bundle = client.build_upload(&file, &ctx, Some(extra)).await.unwrap();

    let metadata: Value = serde_json::from_str(&bundle.serialized_metadata).unwrap();
    assert_eq!(metadata["originalName"], "holdings.json");
    assert_eq!(metadata["originalSize"], 11);
    assert_eq!(metadata["originalType"], "application/json");
    assert_eq!(metadata["algorithm"], "AES-256-GCM");
    assert_eq!(metadata["keyVersion"], "v1");
    assert_eq!(metadata["tenantId"], "default");
    assert_eq!(metadata["fileMetadata"]["portfolio"], "retirement");

    // A receiver holding the credential can rebuild the package from the metadata alone
    let nonce: Vec<u8> = serde_json::from_value(metadata["nonce"].clone()).unwrap();
    let aad: Vec<u8> = serde_json::from_value(metadata["additionalData"].clone()).unwrap();
    let claimed: FileMeta = serde_json::from_slice(&aad).unwrap();
    assert_eq!(claimed, file.meta());

    let mut package = bundle.encrypted_package.clone();
    package.aad = None;
    assert_eq!(package.nonce.as_bytes().to_vec(), nonce);
    let plaintext = client
        .files()
        .decrypt_file_with_meta(&package, &claimed, &ctx)
        .await
        .unwrap();
    assert_eq!(plaintext, br#"{"AAPL":10}"#);
}

#[tokio::test]
async fn test_probe_then_encrypt() {
    for (cipher, hash) in [
        (AeadCipher::Aes256Gcm, KdfHash::Sha256),
        (AeadCipher::ChaCha20Poly1305, KdfHash::Sha512),
    ] {
        let client = EnvelopeClient::new(
            EnvelopeConfig::default()
                .with_iterations(1_000)
                .with_cipher(cipher)
                .with_kdf(
                    wealth_client::KdfParams::default()
                        .with_iterations(1_000)
                        .with_hash(hash),
                ),
        )
        .unwrap();
        assert_eq!(client.probe_state(), ProbeState::Unknown);
        assert!(client.check_support().await.unwrap());
        assert_eq!(client.probe_state(), ProbeState::Supported);

        let ctx = EncryptionContext::with_default_tenant("tok");
        let package = client.encrypt_json(&json!([1, 2, 3]), &ctx).await.unwrap();
        assert_eq!(package.algorithm, cipher);
        let value: Vec<u8> = client.decrypt_json(&package, &ctx).await.unwrap();
        assert_eq!(value, vec![1, 2, 3]);
    }
}

#[tokio::test]
async fn test_key_version_rotation() {
    let old = EnvelopeClient::new(EnvelopeConfig::default().with_iterations(1_000)).unwrap();
    let ctx = EncryptionContext::with_default_tenant("tok");
    let package = old.encrypt_json(&json!("legacy"), &ctx).await.unwrap();

    // A v2 client refuses v1 packages unless told to accept them
    let strict = EnvelopeClient::new(
        EnvelopeConfig::default()
            .with_iterations(1_000)
            .with_key_version("v2"),
    )
    .unwrap();
    assert!(strict.decrypt_json::<Value>(&package, &ctx).await.is_err());

    let rotating = EnvelopeClient::new(
        EnvelopeConfig::default()
            .with_iterations(1_000)
            .with_key_version("v2")
            .accept_key_version("v1"),
    )
    .unwrap();
    let value: String = rotating.decrypt_json(&package, &ctx).await.unwrap();
    assert_eq!(value, "legacy");
    assert_eq!(rotating.encrypt_json(&json!(1), &ctx).await.unwrap().key_version, "v2");
}

#[tokio::test]
async fn test_concurrent_operations_share_client() {
    let client = std::sync::Arc::new(client());
    let tasks = (0..8).map(|i| {
        let client = client.clone();
        tokio::spawn(async move {
            let ctx = EncryptionContext::new(format!("tok-{}", i), format!("tenant-{}", i));
            let package = client.encrypt_json(&json!({"i": i}), &ctx).await.unwrap();
            let value: Value = client.decrypt_json(&package, &ctx).await.unwrap();
            assert_eq!(value["i"], i);
        })
    });
    for result in futures::future::join_all(tasks).await {
        result.unwrap();
    }
}
