use loggerwatch_notify::NotifyError;
use loggerwatch_rules::{EvalError, RegistryError, ScheduleError};
use loggerwatch_telemetry::TelemetryError;

/// Failure of one alarm check. Caught at the per-alarm sweep boundary.
#[derive(Debug, thiserror::Error)]
pub enum CheckError {
    #[error("telemetry fetch failed: {0}")]
    Telemetry(#[from] TelemetryError),

    #[error(transparent)]
    Eval(#[from] EvalError),

    #[error("could not render notification: {0}")]
    Render(#[from] NotifyError),
}

#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("alarm '{0}' not found")]
    NotFound(String),

    #[error(transparent)]
    Check(#[from] CheckError),

    #[error("logger names unavailable: {0}")]
    Telemetry(#[from] TelemetryError),

    #[error("monitor failed after {restarts} restarts: {last_error}")]
    RestartsExhausted { restarts: u32, last_error: String },
}
