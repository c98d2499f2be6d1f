//! Vellum server binary.

use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vellum_server::bootstrap::{build_state, load_config};
use vellum_server::create_router;

/// Vellum - content-addressed storage with ledger payments
#[derive(Parser, Debug)]
#[command(name = "vellumd")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(
        short,
        long,
        env = "VELLUM_CONFIG",
        default_value = "config/server.toml"
    )]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Vellum v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(&args.config, |key| std::env::var(key).ok())?;
    for network_type in config.networks.network_types() {
        if let Some(profiles) = config.networks.profiles(network_type) {
            let names: Vec<_> = profiles.iter().map(|p| p.name.as_str()).collect();
            tracing::info!(%network_type, profiles = ?names, "Network type configured");
        }
    }

    vellum_server::metrics::register_metrics();
    tracing::info!("Prometheus metrics registered");

    let state = build_state(config.clone()).await?;
    let shutdown = state.shutdown.clone();
    let app = create_router(state);

    let addr: SocketAddr = config.server.bind.parse().context("invalid bind address")?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
            }
            tracing::info!("Shutdown requested, cancelling in-flight pipelines");
            shutdown.cancel();
        })
        .await?;

    Ok(())
}
