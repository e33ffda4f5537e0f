//! Vendor logger display names.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::state::AppState;

use super::{monitor_error, ApiError};

#[derive(Serialize)]
pub struct LoggerNamesResponse {
    pub count: usize,
    pub logger_names: BTreeMap<String, String>,
}

/// Serial to name for every logger that has an alarm. Loggers the vendor
/// did not name fall back to their serial.
pub(crate) async fn logger_names(State(state): State<Arc<AppState>>) -> Json<LoggerNamesResponse> {
    let logger_names = state.monitor.alarmed_logger_names();
    Json(LoggerNamesResponse {
        count: logger_names.len(),
        logger_names,
    })
}

#[derive(Serialize)]
pub struct LoggerNameResponse {
    pub serial_number: String,
    pub name: String,
}

pub(crate) async fn logger_name(
    State(state): State<Arc<AppState>>,
    Path(serial): Path<String>,
) -> Result<Json<LoggerNameResponse>, ApiError> {
    let name = state
        .monitor
        .logger_name(&serial)
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("no name known for logger '{serial}'")))?;
    Ok(Json(LoggerNameResponse {
        serial_number: serial,
        name,
    }))
}

#[derive(Serialize)]
pub struct RefreshResponse {
    pub count: usize,
}

pub(crate) async fn refresh_logger_names(
    State(state): State<Arc<AppState>>,
) -> Result<Json<RefreshResponse>, ApiError> {
    let count = state.monitor.refresh_logger_names().await.map_err(monitor_error)?;
    Ok(Json(RefreshResponse { count }))
}
