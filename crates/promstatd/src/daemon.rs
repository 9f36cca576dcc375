//! Standalone daemon.
//!
//! Runs the collector outside a host process: configuration comes from the
//! TOML file named by `PROMSTAT_CONFIG` (defaults when unset).
//!
//! # Signal Handling
//!
//! - SIGHUP: re-read the configuration and re-initialize (socket handover)
//! - SIGTERM/SIGINT: close the listener and exit

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::signal::unix::{signal, SignalKind};
use tracing::{info, warn};

use promstat_core::StatusConfig;

use crate::logging::init_logging;
use crate::status::StatusServer;

/// Environment variable naming the configuration file
pub const CONFIG_ENV: &str = "PROMSTAT_CONFIG";

/// Loads the configuration file, or defaults when no path is given.
pub fn load_config(path: Option<&Path>) -> Result<StatusConfig> {
    match path {
        Some(path) => StatusConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(StatusConfig::default()),
    }
}

/// Path from `PROMSTAT_CONFIG`, if set and non-empty.
pub fn config_path_from_env() -> Option<PathBuf> {
    env::var_os(CONFIG_ENV)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

/// Runs the daemon until SIGTERM or SIGINT.
pub async fn run(config_path: Option<PathBuf>) -> Result<()> {
    init_logging(false);

    let config = load_config(config_path.as_deref())?;
    let mut status = StatusServer::new();
    let socket_path = status
        .initialize(&config)
        .await
        .context("Failed to start metrics collector")?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = std::process::id(),
        socket = %socket_path.display(),
        "promstat daemon started"
    );

    let mut sighup = signal(SignalKind::hangup())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    loop {
        tokio::select! {
            _ = sighup.recv() => {
                info!("Received SIGHUP, reloading");
                reload(&mut status, config_path.as_deref()).await;
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
                break;
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
                break;
            }
        }
    }

    status.shutdown().await;
    info!("promstat daemon stopped");
    Ok(())
}

/// Re-initializes from a fresh read of the configuration.
///
/// A config that fails to load leaves the running collector untouched; a
/// failed initialization leaves metrics unavailable until the next reload.
async fn reload(status: &mut StatusServer, config_path: Option<&Path>) {
    let config = match load_config(config_path) {
        Ok(config) => config,
        Err(e) => {
            warn!(error = %format!("{e:#}"), "Keeping previous configuration");
            return;
        }
    };

    match status.initialize(&config).await {
        Ok(path) => info!(socket = %path.display(), "Metrics collector reloaded"),
        Err(e) => warn!(error = %e, "Reload failed, metrics unavailable until next reload"),
    }
}
