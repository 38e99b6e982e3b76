//! twinsync Daemon - Two-directory mirroring service
//!
//! This binary runs in the foreground (or as a systemd user service) and:
//! - Reconciles the left and right roots in both directions at startup
//! - Mirrors live changes under the left root into the right root
//! - Shuts down gracefully on SIGTERM/SIGINT, draining queued events
//!
//! # Architecture
//!
//! Configuration comes from a YAML file overridden by command-line flags.
//! Once validated, a [`SyncEngine`] is built and run until a
//! `CancellationToken` is triggered by the signal handler task.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use twinsync_core::config::{Config, ConfigBuilder};
use twinsync_sync::{SyncEngine, TracingProgress};

// ============================================================================
// Command line
// ============================================================================

#[derive(Debug, Parser)]
#[command(
    name = "twinsyncd",
    version,
    about = "Keep two directory trees mirrored"
)]
struct Cli {
    /// Use alternate config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Watched root (overrides sync.left)
    #[arg(long)]
    left: Option<PathBuf>,

    /// Mirror root (overrides sync.right)
    #[arg(long)]
    right: Option<PathBuf>,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Run the startup reconciliation and exit
    #[arg(long)]
    reconcile_only: bool,

    /// Print the reconciliation summary as JSON (with --reconcile-only)
    #[arg(long, requires = "reconcile_only")]
    json: bool,
}

impl Cli {
    /// Builds the effective configuration: file first, then flags
    ///
    /// An explicit `--config` must exist. The default path is optional.
    fn load_config(&self) -> Result<Config> {
        let base = match &self.config {
            Some(path) => Config::load(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => {
                let path = Config::default_path();
                if path.exists() {
                    Config::load(&path)
                        .with_context(|| format!("Failed to load config {}", path.display()))?
                } else {
                    Config::default()
                }
            }
        };

        let mut builder = ConfigBuilder::from_config(base);
        if let Some(left) = &self.left {
            builder = builder.sync_left(left.clone());
        }
        if let Some(right) = &self.right {
            builder = builder.sync_right(right.clone());
        }

        builder.build_validated().map_err(|errors| {
            let details: Vec<String> = errors.iter().map(ToString::to_string).collect();
            anyhow::anyhow!("Invalid configuration: {}", details.join("; "))
        })
    }

    /// Log filter directive when `RUST_LOG` is not set
    fn filter_directive(&self, config: &Config) -> String {
        match self.verbose {
            0 => config.logging.level.clone(),
            1 => "debug".to_string(),
            _ => "trace".to_string(),
        }
    }
}

// ============================================================================
// Graceful shutdown signal handler
// ============================================================================

/// Waits for SIGTERM or SIGINT and triggers the cancellation token
///
/// If a handler cannot be installed, that signal is ignored and the other
/// one still works.
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C)");
        }
        _ = terminate => {
            info!("Received SIGTERM");
        }
    }

    token.cancel();
}

// ============================================================================
// Main entry point
// ============================================================================

async fn run(cli: Cli, config: Config) -> Result<()> {
    let engine = SyncEngine::from_config(&config, Arc::new(TracingProgress))?;
    info!(left = %engine.left(), right = %engine.right(), "Roots resolved");

    if cli.reconcile_only {
        let summary = engine.reconcile().await?;
        if cli.json {
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        if summary.failures() > 0 {
            bail!("{} file(s) could not be reconciled", summary.failures());
        }
        return Ok(());
    }

    let shutdown_token = CancellationToken::new();

    let signal_token = shutdown_token.clone();
    tokio::spawn(async move {
        shutdown_signal(signal_token).await;
    });

    let stats = engine
        .start(config.sync.event_buffer, shutdown_token)
        .await
        .context("Live mirroring failed")?;

    info!(
        handled = stats.handled,
        failed = stats.failed,
        "Mirroring session ended"
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.load_config()?;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli.filter_directive(&config)));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .init();

    info!("twinsync daemon starting (twinsyncd)");

    let result = run(cli, config).await;

    match &result {
        Ok(()) => info!("twinsync daemon shut down gracefully"),
        Err(e) => error!(error = %e, "twinsync daemon exiting with error"),
    }

    result
}

// ============================================================================
// Tests
// ============================================================================
