#![doc = include_str!("../README.md")]

mod cli;

use std::sync::Arc;

use clap::Parser;
use cli::commands::Session;
use cli::config::{CliArgs, RunConfig};
use cli::telemetry::init_telemetry;
use tokio::signal;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = RunConfig::try_from(args)?;

    init_telemetry()?;
    log_startup_info(&config);

    let session = Arc::new(Session::open(config)?);
    let watcher = Arc::clone(&session);
    tokio::spawn(async move {
        shutdown_signal().await;
        watcher.cancel();
    });

    let output = session.run().await?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn log_startup_info(config: &RunConfig) {
    if cfg!(debug_assertions) {
        tracing::debug!("Running {:?} with full config: {:#?}", config.command, config);
    } else {
        tracing::debug!("Running {:?}", config.command);
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        () = ctrl_c => tracing::warn!("Received Ctrl+C signal"),
        () = terminate => tracing::warn!("Received SIGTERM signal"),
    }
    tracing::warn!("Cancelling before the next attempt...");
}
