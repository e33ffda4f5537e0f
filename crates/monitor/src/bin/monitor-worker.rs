//! monitor-worker — standalone scheduled alarm monitor.
//!
//! Runs only the sweep loop against the alarm store on disk, re-reading it
//! before every sweep so edits made through the API process are picked
//! up. An unexpected failure restarts the monitor after a fixed delay, up
//! to a bounded number of times.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use loggerwatch_core::Config;
use loggerwatch_monitor::supervise;
use loggerwatch_monitor::wiring::{monitor_from_config, notifier_from_config, restart_policy, telemetry_from_config};
use loggerwatch_rules::AlarmRegistry;

// ── CLI ─────────────────────────────────────────────────────────────

/// Scheduled datalogger alarm monitor.
#[derive(Parser, Debug)]
#[command(name = "monitor-worker", version, about)]
struct Cli {
    /// Path to the alarm store (defaults to ALARMS_FILE / DATA_DIR/alarms.json).
    #[arg(long)]
    alarms_file: Option<String>,

    /// Restarts allowed after unexpected failures before giving up
    /// (overrides MONITOR_MAX_RESTARTS).
    #[arg(long)]
    max_restarts: Option<u32>,

    /// Delay before a restart, in seconds (overrides MONITOR_RESTART_DELAY).
    #[arg(long)]
    restart_delay: Option<u64>,

    /// Run a single sweep immediately and exit.
    #[arg(long)]
    once: bool,
}

// ── main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    loggerwatch_core::config::load_dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();
    config.log_summary();

    let alarms_file = cli
        .alarms_file
        .clone()
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|| config.storage.alarms_file.clone());
    let registry = Arc::new(AlarmRegistry::new(alarms_file));
    let telemetry = telemetry_from_config(&config)?;
    let notifier = notifier_from_config(&config);
    let monitor = Arc::new(
        monitor_from_config(&config, registry, telemetry, notifier)?.with_reload_before_sweep(true),
    );

    if cli.once {
        monitor.load()?;
        if let Err(e) = monitor.refresh_logger_names().await {
            warn!(error = %e, "could not resolve logger names, using serials");
        }
        let report = monitor.sweep().await;
        info!(?report, "single sweep complete");
        return Ok(());
    }

    tokio::spawn({
        let monitor = Arc::clone(&monitor);
        async move {
            shutdown_signal().await;
            info!("shutdown signal received");
            monitor.shutdown();
        }
    });

    let mut policy = restart_policy(&config);
    if let Some(max_restarts) = cli.max_restarts {
        policy.max_restarts = max_restarts;
    }
    if let Some(delay) = cli.restart_delay {
        policy.delay = Duration::from_secs(delay);
    }
    supervise(monitor, policy).await?;
    info!("monitor worker stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to register SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => {},
            _ = sigterm.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await.expect("failed to listen for ctrl_c");
    }
}
