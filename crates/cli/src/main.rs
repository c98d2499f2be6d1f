//! Command-line client for Vellum.

mod api_client;

use anyhow::{Context, Result};
use api_client::{ApiClient, UploadResponse};
use bytes::Bytes;
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;
use vellum_core::{DEFAULT_SEGMENT_SIZE, merkle};
use vellum_pipeline::SealingKey;

#[derive(Parser)]
#[command(name = "vellumctl")]
#[command(about = "Command-line client for Vellum")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct ApiArgs {
    /// Server API URL
    #[arg(long, env = "VELLUM_SERVER", default_value = "http://127.0.0.1:8080")]
    server: String,

    /// Request timeout in seconds
    #[arg(long, env = "VELLUM_TIMEOUT_SECS", default_value_t = 600)]
    timeout_secs: u64,

    /// Network type to use (server default when omitted)
    #[arg(long, env = "VELLUM_NETWORK")]
    network: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload a file
    Upload {
        file: PathBuf,
        /// Owner recorded with the upload
        #[arg(long, env = "VELLUM_OWNER")]
        owner: String,
        /// Seal the file with this key before upload
        #[arg(long, env = "VELLUM_KEY_FILE")]
        key_file: Option<PathBuf>,
        #[command(flatten)]
        api: ApiArgs,
    },
    /// Download and verify a file
    Download {
        root_hash: String,
        /// Output path
        #[arg(short, long)]
        output: PathBuf,
        /// Open a sealed file with this key
        #[arg(long, env = "VELLUM_KEY_FILE")]
        key_file: Option<PathBuf>,
        #[command(flatten)]
        api: ApiArgs,
    },
    /// Check whether a file is stored
    Exists {
        root_hash: String,
        #[command(flatten)]
        api: ApiArgs,
    },
    /// Show stored file metadata
    Info {
        root_hash: String,
        #[command(flatten)]
        api: ApiArgs,
    },
    /// Check server health and version
    Health {
        #[command(flatten)]
        api: ApiArgs,
    },
    /// Compute a file's root hash locally
    Root {
        file: PathBuf,
        #[arg(long, default_value_t = DEFAULT_SEGMENT_SIZE)]
        segment_size: u64,
    },
    /// Sealing key management
    Key {
        #[command(subcommand)]
        command: KeyCommands,
    },
}

#[derive(Subcommand)]
enum KeyCommands {
    /// Generate a new sealing key
    Generate {
        /// Write the key to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let Cli { command } = Cli::parse();

    match command {
        Commands::Upload {
            file,
            owner,
            key_file,
            api,
        } => handle_upload_command(&file, &owner, key_file.as_deref(), &api).await,
        Commands::Download {
            root_hash,
            output,
            key_file,
            api,
        } => handle_download_command(&root_hash, &output, key_file.as_deref(), &api).await,
        Commands::Exists { root_hash, api } => {
            let client = get_api_client(&api)?;
            let response = client.exists(&root_hash, api.network.as_deref()).await?;
            println!(
                "{} {} ({})",
                response.root_hash,
                if response.exists { "exists" } else { "not found" },
                response.network_type
            );
            if !response.exists {
                std::process::exit(1);
            }
            Ok(())
        }
        Commands::Info { root_hash, api } => handle_info_command(&root_hash, &api).await,
        Commands::Health { api } => handle_health_command(&api).await,
        Commands::Root { file, segment_size } => {
            let data = tokio::fs::read(&file)
                .await
                .with_context(|| format!("failed to read {}", file.display()))?;
            let root = merkle::root_hash(&data, segment_size)
                .with_context(|| format!("cannot hash {}", file.display()))?;
            println!("{root}");
            Ok(())
        }
        Commands::Key { command } => handle_key_command(command).await,
    }
}

fn get_api_client(api: &ApiArgs) -> Result<ApiClient> {
    ApiClient::new(&api.server, Duration::from_secs(api.timeout_secs))
}

fn load_key(path: Option<&Path>) -> Result<Option<SealingKey>> {
    path.map(|path| {
        SealingKey::from_file(path)
            .with_context(|| format!("failed to load sealing key from {}", path.display()))
    })
    .transpose()
}

async fn handle_upload_command(
    file: &Path,
    owner: &str,
    key_file: Option<&Path>,
    api: &ApiArgs,
) -> Result<()> {
    let key = load_key(key_file)?;
    let data = tokio::fs::read(file)
        .await
        .with_context(|| format!("failed to read {}", file.display()))?;
    let data = match &key {
        Some(key) => vellum_pipeline::seal(key, &data).context("failed to seal file")?,
        None => Bytes::from(data),
    };
    let file_name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload.bin".to_string());

    let client = get_api_client(api)?;
    let response = client
        .upload(data, &file_name, owner, api.network.as_deref())
        .await?;
    print_upload(&response, key.is_some());
    Ok(())
}

fn print_upload(response: &UploadResponse, sealed: bool) {
    println!("Root hash: {}", response.storage_hash);
    println!("Record: {}", response.record.record_id);
    println!(
        "Stored on: {} ({}, {})",
        response.record.profile, response.network, response.record.network_type
    );
    if sealed {
        println!("Sealed: yes (keep the key file, the root hash covers the ciphertext)");
    }
    match &response.tx_hash {
        Some(tx) => {
            let status = if response.payment_confirmed {
                "confirmed"
            } else {
                "unconfirmed"
            };
            println!("Payment: {tx} ({status})");
        }
        None => println!("Payment: none (already stored)"),
    }
    if let Some(url) = &response.explorer_url {
        println!("Explorer: {url}");
    }
    if let Some(fee) = &response.fee {
        println!(
            "Fee: {} total ({} storage for {} sectors, {} gas{})",
            fee.total_fee,
            fee.storage_fee,
            fee.sectors,
            fee.gas_fee,
            if fee.gas_estimate_degraded {
                ", estimated"
            } else {
                ""
            }
        );
    }
    for attempt in response.attempts.iter().filter(|a| a.error.is_some()) {
        eprintln!(
            "  {} ({}) failed after {}ms: {}",
            attempt.profile,
            attempt.role,
            attempt.elapsed_ms,
            attempt.error.as_deref().unwrap_or_default()
        );
    }
}

async fn handle_download_command(
    root_hash: &str,
    output: &Path,
    key_file: Option<&Path>,
    api: &ApiArgs,
) -> Result<()> {
    let key = load_key(key_file)?;
    let client = get_api_client(api)?;
    let data = client.download(root_hash, api.network.as_deref()).await?;
    let data = match &key {
        Some(key) => vellum_pipeline::open(key, &data).context("failed to open sealed file")?,
        None => data,
    };

    tokio::fs::write(output, &data)
        .await
        .with_context(|| format!("failed to write {}", output.display()))?;
    println!("Wrote {} bytes to {}", data.len(), output.display());
    Ok(())
}

async fn handle_info_command(root_hash: &str, api: &ApiArgs) -> Result<()> {
    let client = get_api_client(api)?;
    let info = client.info(root_hash, api.network.as_deref()).await?;

    println!("Root hash: {}", info.root_hash);
    println!("Size: {} bytes", info.size);
    println!("Segments: {}", info.segments);
    println!("Finalized: {}", info.finalized);
    if let Some(replicas) = info.replicas {
        println!("Replicas: {replicas}");
    }
    println!("Served by: {} ({})", info.profile, info.network_type);
    Ok(())
}

async fn handle_health_command(api: &ApiArgs) -> Result<()> {
    let client = get_api_client(api)?;
    let health = client.health().await?;

    println!("Status: {}", health.status);
    println!("Server version: {}", health.version);
    println!("Client version: {}", env!("CARGO_PKG_VERSION"));
    for (network_type, profiles) in &health.networks {
        let marker = if *network_type == health.default_network_type {
            " (default)"
        } else {
            ""
        };
        println!("Network {network_type}{marker}: {}", profiles.join(" -> "));
    }

    if health.version != env!("CARGO_PKG_VERSION") {
        eprintln!(
            "Warning: version mismatch (server: {}, client: {})",
            health.version,
            env!("CARGO_PKG_VERSION")
        );
    }
    Ok(())
}

async fn handle_key_command(command: KeyCommands) -> Result<()> {
    match command {
        KeyCommands::Generate { output } => {
            let key = SealingKey::generate();
            match output {
                Some(path) => {
                    tokio::fs::write(&path, format!("{}\n", key.to_hex()))
                        .await
                        .with_context(|| format!("failed to write key to {}", path.display()))?;
                    println!("Sealing key written to: {}", path.display());
                }
                None => println!("{}", key.to_hex()),
            }
        }
    }
    Ok(())
}
