//! Metrics Keeper - Entry Point
//!
//! Restores the store from its backup, serves the HTTP API and flushes the
//! store one last time on shutdown.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};

use metrics_keeper::api::{start_api_server, ApiState};
use metrics_keeper::backup::BackupManager;
use metrics_keeper::repository::{MemoryRepository, Repository};
use metrics_keeper::telemetry::{self, ServiceStats};
use metrics_keeper::{Config, VERSION};

/// Time left to blocking tasks once the grace period is over
const RUNTIME_DRAIN: Duration = Duration::from_secs(1);

/// Application entry point
fn main() -> Result<()> {
    // An explicit path must exist; the default one is optional
    let explicit = std::env::args().nth(1).map(PathBuf::from);
    let config_path = explicit.clone().unwrap_or_else(|| PathBuf::from("config.toml"));

    let config = if explicit.is_some() || config_path.exists() {
        Config::load(&config_path)
            .with_context(|| format!("Failed to load config from {:?}", config_path))?
    } else {
        Config::from_env()?
    };

    metrics_keeper::util::init_tracing(&config.logging)?;

    info!(
        version = VERSION,
        config_path = ?config_path,
        "Starting Metrics Keeper"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.server.effective_workers())
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?;

    let result = runtime.block_on(run(config));
    runtime.shutdown_timeout(RUNTIME_DRAIN);

    info!("Server stopped");
    result
}

async fn run(config: Config) -> Result<()> {
    let stats = ServiceStats::new();
    let repository: Arc<dyn Repository> = MemoryRepository::new();

    // Restore strictly before the API accepts writes
    let backup = BackupManager::new(&config.backup, repository.clone(), stats.clone());
    backup.restore();
    backup.start();

    if config.metrics.enabled {
        telemetry::init_metrics(&config.metrics, stats.clone(), repository.clone())?;
        info!(
            bind_addr = %config.metrics.bind_addr,
            "Metrics endpoint started"
        );
    }

    let bind_addr = start_api_server(
        config.server.bind_addr,
        ApiState::new(repository.clone(), stats.clone()),
    )?;
    info!(%bind_addr, "Server listening");

    shutdown_signal().await;
    info!("Shutdown signal received, writing final backup...");

    let grace = config.server.shutdown_grace();
    match tokio::time::timeout(grace, backup.stop()).await {
        Ok(()) => info!(metrics = repository.len(), "Backup stopped"),
        Err(_) => {
            warn!(grace_secs = grace.as_secs(), "Final backup did not finish within grace period");
            error!("Exiting without a complete final backup");
        }
    }

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
