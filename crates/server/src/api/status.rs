use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use loggerwatch_monitor::MonitorStatus;

use crate::state::AppState;

#[derive(Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub alarm_count: usize,
    #[serde(flatten)]
    pub monitor: MonitorStatus,
}

pub(crate) async fn status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "running",
        version: env!("CARGO_PKG_VERSION"),
        alarm_count: state.registry.len(),
        monitor: state.monitor.status(),
    })
}

#[derive(Serialize)]
pub struct CheckTimesResponse {
    pub check_times: Vec<String>,
}

pub(crate) async fn check_times(State(state): State<Arc<AppState>>) -> Json<CheckTimesResponse> {
    Json(CheckTimesResponse {
        check_times: state.monitor.check_times(),
    })
}
