//! Restart supervision for [`MonitorService::run`].
//!
//! Both the API server and the standalone worker run the monitor through
//! [`supervise`], so a crashed loop comes back after a delay instead of
//! leaving the process up with nothing sweeping.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};

use crate::error::MonitorError;
use crate::service::MonitorService;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartPolicy {
    /// Restarts allowed after the first failure before giving up.
    pub max_restarts: u32,
    pub delay: Duration,
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self {
            max_restarts: 5,
            delay: Duration::from_secs(60),
        }
    }
}

/// Run the monitor, restarting it after an error or a panic until it stops
/// cleanly or the restart budget is spent.
///
/// A shutdown request ends supervision at any point, including while
/// waiting out the restart delay.
pub async fn supervise(monitor: Arc<MonitorService>, policy: RestartPolicy) -> Result<(), MonitorError> {
    let mut restarts = 0;
    loop {
        let run = tokio::spawn({
            let monitor = Arc::clone(&monitor);
            async move { monitor.run().await }
        });

        let failure = match run.await {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(e)) => e.to_string(),
            Err(join_error) => format!("monitor task panicked: {join_error}"),
        };

        if monitor.is_shutting_down() {
            info!(error = %failure, "monitor failed while shutting down, not restarting");
            return Ok(());
        }
        if restarts >= policy.max_restarts {
            error!(restarts, error = %failure, "monitor failed too many times, giving up");
            return Err(MonitorError::RestartsExhausted {
                restarts,
                last_error: failure,
            });
        }
        restarts += 1;
        error!(
            attempt = restarts,
            max_restarts = policy.max_restarts,
            error = %failure,
            "monitor crashed, restarting in {}s",
            policy.delay.as_secs()
        );

        tokio::select! {
            _ = tokio::time::sleep(policy.delay) => {}
            _ = monitor.wait_for_shutdown() => {
                info!("shutdown requested before restart");
                return Ok(());
            }
        }
    }
}
