//! REST endpoints, one module per resource.
//!
//! Handlers return `(StatusCode, String)` on failure; the mapping from
//! domain errors to status codes lives here.

mod alarms;
mod loggers;
mod status;

pub(crate) use alarms::{
    alarm_value, create_alarms, delete_alarm, get_alarm, import_alarms, list_alarms, test_alarm,
    test_all_alarms, update_alarm,
};
pub(crate) use loggers::{logger_name, logger_names, refresh_logger_names};
pub(crate) use status::{check_times, status};

use axum::http::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

use loggerwatch_monitor::{CheckError, MonitorError};
use loggerwatch_rules::RegistryError;

pub(crate) type ApiError = (StatusCode, String);

// ── Error mapping ────────────────────────────────────────────────

/// Bodies are taken as raw JSON and typed here so a well-formed document
/// with the wrong shape is a 400 carrying serde's reason.
pub(crate) fn parse_body<T: DeserializeOwned>(body: Value) -> Result<T, ApiError> {
    serde_json::from_value(body).map_err(|e| (StatusCode::BAD_REQUEST, format!("invalid request body: {e}")))
}

pub(crate) fn registry_error(e: RegistryError) -> ApiError {
    let status = match &e {
        RegistryError::Validation(_) => StatusCode::BAD_REQUEST,
        RegistryError::NotFound(_) => StatusCode::NOT_FOUND,
        RegistryError::Conflict(_) => StatusCode::CONFLICT,
        RegistryError::Persistence { .. } | RegistryError::Load { .. } => {
            warn!(error = %e, "alarm store operation failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, e.to_string())
}

pub(crate) fn monitor_error(e: MonitorError) -> ApiError {
    match e {
        MonitorError::Registry(inner) => registry_error(inner),
        MonitorError::NotFound(_) => (StatusCode::NOT_FOUND, e.to_string()),
        MonitorError::Telemetry(_) | MonitorError::Check(CheckError::Telemetry(_)) => {
            warn!(error = %e, "telemetry request failed");
            (StatusCode::BAD_GATEWAY, e.to_string())
        }
        MonitorError::Check(_) | MonitorError::Schedule(_) | MonitorError::RestartsExhausted { .. } => {
            warn!(error = %e, "monitor operation failed");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}
