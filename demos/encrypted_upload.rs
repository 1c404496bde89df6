//! Encrypt a statement and produce an upload bundle
//!
//! Run: cargo run --example encrypted_upload
//!
//! Optional environment:
//! - WEALTH_SESSION_TOKEN: session credential (a demo token is used otherwise)
//! - WEALTH_ENVELOPE_KDF_ITERATIONS: lower it for faster local runs

use serde_json::{json, Map, Value};
use std::env;
use wealth_client::{EncryptionContext, EnvelopeClient, EnvelopeConfig, FileInput};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter("info")
        .init();

    println!("============================================================");
    println!("         Encrypted Statement Upload                         ");
    println!("============================================================\n");

    let client = EnvelopeClient::new(EnvelopeConfig::from_env()?)?;

    // ==================== Part 1: Capability probe ====================

    println!("=== Part 1: Capability probe ===\n");
    if !client.check_support().await? {
        println!("   [WARN] Client-side encryption unavailable, offering plain uploads only");
        return Ok(());
    }
    println!(
        "   [OK] {} + PBKDF2-{} available",
        client.config().cipher,
        client.config().kdf.hash.name()
    );

    // ==================== Part 2: Build the bundle ====================

    println!("\n=== Part 2: Build upload bundle ===\n");
    let token =
        env::var("WEALTH_SESSION_TOKEN").unwrap_or_else(|_| "demo-session-token".to_string());
    let ctx = EncryptionContext::new(token, "default");

    let statement =
        b"date,description,amount\n2024-01-02,Coffee,-3.50\n2024-01-03,Salary,2500.00\n";
    let file = FileInput::new("statement-2024-01.csv", &statement[..]);

    let mut extra = Map::new();
    extra.insert("accountId".to_string(), json!("acct-001"));
    extra.insert("statementMonth".to_string(), json!("2024-01"));

    let bundle = client.build_upload(&file, &ctx, Some(extra)).await?;
    println!(
        "[BUNDLE] {} plaintext bytes -> {} ciphertext bytes",
        statement.len(),
        bundle.ciphertext().len()
    );
    println!("[META] {}", serde_json::to_string_pretty(&bundle.metadata_json()?)?);

    // ==================== Part 3: Verify locally ====================

    println!("\n=== Part 3: Local verification ===\n");
    let restored = client.decrypt_file(&bundle.encrypted_package, &ctx).await?;
    assert_eq!(restored, statement);
    println!("   [OK] Round trip verified");

    let outsider = EncryptionContext::new("someone-else", "default");
    match client.decrypt_file(&bundle.encrypted_package, &outsider).await {
        Ok(_) => println!("   [FAIL] Foreign credential opened the package"),
        Err(e) if e.is_authentication_failure() => println!("   [OK] Foreign credential rejected"),
        Err(e) => println!("   [WARN] Unexpected error: {}", e),
    }

    let (ciphertext, metadata) = bundle.into_parts();
    let metadata: Value = serde_json::from_str(&metadata)?;
    println!(
        "\nReady to send {} bytes with metadata for '{}'",
        ciphertext.len(),
        metadata["originalName"].as_str().unwrap_or_default()
    );

    Ok(())
}
