//! # Content Pipeline Main Entry Point

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use content_pipeline::{
    config::ConfigLoader,
    server::{build_store, run_server},
    telemetry::init_tracing,
};
use tokio_util::sync::CancellationToken;

/// Editorial pipeline service for scraped social content
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Directory holding the `.env` layers (defaults to the working directory)
    #[arg(long)]
    base_dir: Option<PathBuf>,

    /// Validate the configuration, print it redacted, and exit
    #[arg(long)]
    check_config: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config_loader = match cli.base_dir {
        Some(dir) => ConfigLoader::with_base_dir(dir),
        None => ConfigLoader::new(),
    };
    let config = config_loader.load()?;
    config.validate()?;

    if cli.check_config {
        println!("{}", config.redacted_json()?);
        return Ok(());
    }

    init_tracing(&config)?;
    tracing::info!(profile = %config.profile, "Loaded configuration");
    if let Ok(redacted_json) = config.redacted_json() {
        tracing::debug!(config = %redacted_json, "Effective configuration");
    }

    let config = Arc::new(config);
    let store = build_store(&config)?;

    let shutdown = CancellationToken::new();
    tokio::spawn(wait_for_signal(shutdown.clone()));

    run_server(config, store, shutdown).await?;
    Ok(())
}

async fn wait_for_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(%err, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(%err, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
    shutdown.cancel();
}
