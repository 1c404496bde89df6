//! Keep sensitive settings encrypted at rest
//!
//! Run: cargo run --example sensitive_settings

use serde::{Deserialize, Serialize};
use wealth_client::{EncryptionContext, EnvelopeClient, EnvelopeConfig};

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct BrokerSettings {
    broker: String,
    api_key: String,
    api_secret: String,
    sync_interval_minutes: u32,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("info")
        .init();

    let client = EnvelopeClient::new(EnvelopeConfig::from_env()?.with_json_context_binding(true))?;
    let ctx = EncryptionContext::new("demo-session-token", "household-42");

    let settings = BrokerSettings {
        broker: "example-broker".to_string(),
        api_key: "ak_live_123".to_string(),
        api_secret: "s3cr3t".to_string(),
        sync_interval_minutes: 30,
    };

    let sealed = client.json().seal_to_string(&settings, &ctx).await?;
    println!("Sealed settings ({} chars):\n{}\n", sealed.len(), sealed);

    let opened: BrokerSettings = client.json().open_from_string(&sealed, &ctx).await?;
    assert_eq!(opened, settings);
    println!("[OK] Settings restored for broker '{}'", opened.broker);

    // Same credential, other tenant: the derived key differs
    let other_tenant = EncryptionContext::new("demo-session-token", "household-7");
    let err = client
        .json()
        .open_from_string::<BrokerSettings>(&sealed, &other_tenant)
        .await
        .unwrap_err();
    println!("[OK] Other tenant rejected: {}", err);

    Ok(())
}
