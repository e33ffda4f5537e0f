mod api;
mod router;
mod state;

use std::future::IntoFuture;
use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use loggerwatch_monitor::supervise;
use loggerwatch_monitor::wiring::{monitor_from_config, notifier_from_config, restart_policy, telemetry_from_config};
use loggerwatch_rules::AlarmRegistry;

use crate::state::AppState;

fn load_config() -> loggerwatch_core::Config {
    loggerwatch_core::config::load_dotenv();
    loggerwatch_core::Config::from_env()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    config.log_summary();

    // A store that cannot be parsed at all is fatal; bad entries are skipped.
    let (registry, report) = AlarmRegistry::open(config.storage.alarms_file.clone())?;
    info!(
        loaded = report.loaded,
        skipped = report.skipped.len(),
        "alarm store loaded from {}",
        config.storage.alarms_file.display()
    );
    let registry = Arc::new(registry);

    let telemetry = telemetry_from_config(&config)?;
    let notifier = notifier_from_config(&config);
    let monitor = Arc::new(monitor_from_config(&config, Arc::clone(&registry), telemetry, notifier)?);
    monitor.mark_loaded();

    let mut monitor_task = tokio::spawn(supervise(Arc::clone(&monitor), restart_policy(&config)));

    let state = Arc::new(AppState {
        registry: Arc::clone(&registry),
        monitor: Arc::clone(&monitor),
    });
    let app = router::build_router(state, &config.server.cors_origin);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server listening on http://{}", addr);
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .into_future();

    // The monitor only ends on its own once its restart budget is spent,
    // which takes the whole process down.
    tokio::select! {
        served = server => {
            served?;
            info!("HTTP server stopped, stopping monitor");
            monitor.shutdown();
            match monitor_task.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(error = %e, "monitor exited with an error"),
                Err(e) => warn!(error = %e, "monitor task panicked"),
            }
        }
        supervised = &mut monitor_task => {
            let failure = match supervised {
                Ok(Ok(())) => anyhow::anyhow!("monitor stopped unexpectedly"),
                Ok(Err(e)) => e.into(),
                Err(e) => e.into(),
            };
            error!(error = %failure, "monitor is down for good, exiting");
            if let Err(e) = registry.persist_if_dirty() {
                warn!(error = %e, "final alarm flush failed");
            }
            return Err(failure);
        }
    }

    if let Err(e) = registry.persist_if_dirty() {
        warn!(error = %e, "final alarm flush failed");
    }
    info!("shutdown complete");
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

    info!("shutdown signal received");
}
