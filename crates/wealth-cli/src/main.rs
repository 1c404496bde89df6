//! wealth-seal - seal and open Wealth Vault envelopes from the command line

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use wealth_client::{EncryptedPackage, EncryptionContext, EnvelopeClient, FileInput, DEFAULT_TENANT};

#[derive(Parser, Debug)]
#[command(name = "wealth-seal")]
#[command(about = "Client-side envelope encryption for Wealth Vault")]
#[command(version)]
struct Args {
    /// Session credential keys are derived from
    #[arg(long, env = "WEALTH_SESSION_TOKEN", hide_env_values = true, global = true)]
    credential: Option<String>,

    /// Tenant the keys are scoped to
    #[arg(long, default_value = DEFAULT_TENANT, env = "WEALTH_TENANT_ID", global = true)]
    tenant: String,

    /// Enable debug logging
    #[arg(short, long, env = "WEALTH_DEBUG", global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check that the required primitives are available
    Probe,
    /// Encrypt a file into a package
    SealFile {
        input: PathBuf,
        /// Package path (default: <input>.package.json)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Decrypt a file package
    OpenFile {
        package: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Encrypt a file into ciphertext + metadata ready for upload
    Bundle {
        input: PathBuf,
        /// Directory receiving <name>.enc and <name>.meta.json
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,
        /// Extra metadata entries (key=value)
        #[arg(long = "meta", value_parser = parse_meta)]
        meta: Vec<(String, String)>,
    },
    /// Encrypt a JSON value into a sealed string
    SealJson {
        /// JSON text, or @path to read it from a file
        value: String,
    },
    /// Decrypt a sealed string back to JSON
    OpenJson { sealed: String },
}

fn parse_meta(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .filter(|(k, _)| !k.is_empty())
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got '{}'", s))
}

fn context(args: &Args) -> anyhow::Result<EncryptionContext> {
    match &args.credential {
        Some(credential) if !credential.is_empty() => {
            Ok(EncryptionContext::new(credential.clone(), args.tenant.clone()))
        }
        _ => bail!("a session credential is required (--credential or WEALTH_SESSION_TOKEN)"),
    }
}

fn file_name(path: &Path) -> anyhow::Result<String> {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .with_context(|| format!("{} has no file name", path.display()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let log_level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("wealth_cli={0},wealth_client={0},wealth_crypto={0}", log_level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let client = EnvelopeClient::from_env().context("loading envelope configuration")?;
    tracing::debug!(
        algorithm = %client.config().cipher,
        iterations = client.config().kdf.iterations,
        key_version = %client.config().key_version,
        "configuration loaded"
    );

    match &args.command {
        Command::Probe => {
            let supported = client.check_support().await?;
            println!("{}", if supported { "supported" } else { "unsupported" });
            if !supported {
                std::process::exit(1);
            }
        }
        Command::SealFile { input, output } => {
            let ctx = context(&args)?;
            let file = FileInput::from_path(input).await?;
            let package = client.files().encrypt_input(&file, &ctx).await?;
            let output = output
                .clone()
                .unwrap_or_else(|| input.with_file_name(format!("{}.package.json", file.name)));
            tokio::fs::write(&output, package.to_json()?).await?;
            tracing::info!("Sealed {} -> {}", input.display(), output.display());
        }
        Command::OpenFile { package, output } => {
            let ctx = context(&args)?;
            let json = tokio::fs::read_to_string(package).await?;
            let package = EncryptedPackage::from_json(&json)?;
            let plaintext = client.decrypt_file(&package, &ctx).await?;
            tokio::fs::write(output, plaintext).await?;
            tracing::info!("Opened {} bytes -> {}", package.plaintext_len(), output.display());
        }
        Command::Bundle { input, output_dir, meta } => {
            let ctx = context(&args)?;
            let file = FileInput::from_path(input).await?;
            let extra: Map<String, Value> = meta
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect();
            let bundle = client.build_upload(&file, &ctx, Some(extra)).await?;

            let name = file_name(input)?;
            let (ciphertext, metadata) = bundle.into_parts();
            tokio::fs::create_dir_all(output_dir).await?;
            tokio::fs::write(output_dir.join(format!("{}.enc", name)), ciphertext).await?;
            tokio::fs::write(output_dir.join(format!("{}.meta.json", name)), metadata).await?;
            tracing::info!("Bundled {} into {}", input.display(), output_dir.display());
        }
        Command::SealJson { value } => {
            let ctx = context(&args)?;
            let text = match value.strip_prefix('@') {
                Some(path) => tokio::fs::read_to_string(path).await?,
                None => value.clone(),
            };
            let parsed: Value = serde_json::from_str(&text).context("input is not valid JSON")?;
            println!("{}", client.json().seal_to_string(&parsed, &ctx).await?);
        }
        Command::OpenJson { sealed } => {
            let ctx = context(&args)?;
            let value: Value = client.json().open_from_string(sealed, &ctx).await?;
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
    }

    Ok(())
}
