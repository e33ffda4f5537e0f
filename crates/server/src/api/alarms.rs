//! Alarm CRUD, bulk import, dry-run tests and current values.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use loggerwatch_monitor::{MonitorService, TestAllReport, TestReport};
use loggerwatch_rules::import::SkippedRow;
use loggerwatch_rules::registry::CreateFailure;
use loggerwatch_rules::{
    rows_to_configs, Alarm, AlarmConfig, AlarmRegistry, AlarmUpdate, CreateReport, ImportDefaults, ThresholdKind,
};

use crate::state::AppState;

use super::{monitor_error, parse_body, registry_error, ApiError};

// ── Views ────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct AlarmView {
    pub id: String,
    pub serial: String,
    pub channel: String,
    #[serde(rename = "type")]
    pub kind: ThresholdKind,
    pub threshold1: f64,
    pub threshold2: Option<f64>,
    pub active: bool,
    pub emails: Vec<String>,
    pub pozo: String,
    pub logger_name: Option<String>,
}

impl AlarmView {
    /// Uses the cached vendor name when the alarm has not been tagged yet
    /// (created after the last refresh).
    fn new(alarm: &Alarm, monitor: &MonitorService) -> Self {
        let record = alarm.to_record();
        let logger_name = alarm
            .logger_name()
            .map(str::to_string)
            .or_else(|| monitor.logger_name(alarm.serial()));
        Self {
            id: alarm.id().to_string(),
            serial: record.serial,
            channel: record.channel,
            kind: record.kind,
            threshold1: record.threshold1,
            threshold2: record.threshold2,
            active: record.enabled,
            emails: record.emails,
            pozo: record.pozo,
            logger_name,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AlarmList {
    pub count: usize,
    pub alarms: IndexMap<String, AlarmView>,
}

pub(crate) async fn list_alarms(State(state): State<Arc<AppState>>) -> Json<AlarmList> {
    let alarms: IndexMap<String, AlarmView> = state
        .registry
        .snapshot()
        .into_iter()
        .map(|(id, alarm)| (id, AlarmView::new(&alarm, &state.monitor)))
        .collect();
    Json(AlarmList {
        count: alarms.len(),
        alarms,
    })
}

// ── Create ───────────────────────────────────────────────────────

/// `POST /alarms` accepts one definition or an array of them. A single
/// definition that is malformed or fails validation is a 400. A batch always
/// answers with the per-record report.
pub(crate) async fn create_alarms(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<CreateReport>), ApiError> {
    let report = match body {
        Value::Array(items) => create_batch(&state.registry, items)?,
        single => {
            let config: AlarmConfig = parse_body(single)?;
            let report = state
                .registry
                .create(std::slice::from_ref(&config))
                .map_err(registry_error)?;
            if let Some(failure) = report.failed.first() {
                return Err((StatusCode::BAD_REQUEST, failure.error.clone()));
            }
            report
        }
    };

    let status = if report.created.is_empty() {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(report)))
}

/// Entries that do not even deserialize are reported alongside the
/// registry's validation failures, at their position in the request.
fn create_batch(registry: &AlarmRegistry, items: Vec<Value>) -> Result<CreateReport, ApiError> {
    let mut positions = Vec::with_capacity(items.len());
    let mut configs = Vec::with_capacity(items.len());
    let mut malformed = Vec::new();
    for (index, item) in items.into_iter().enumerate() {
        match serde_json::from_value::<AlarmConfig>(item) {
            Ok(config) => {
                positions.push(index);
                configs.push(config);
            }
            Err(e) => malformed.push(CreateFailure {
                index,
                error: e.to_string(),
            }),
        }
    }

    let mut report = registry.create(&configs).map_err(registry_error)?;
    for failure in &mut report.failed {
        failure.index = positions[failure.index];
    }
    report.failed.extend(malformed);
    report.failed.sort_by_key(|f| f.index);
    Ok(report)
}

#[derive(Debug, Deserialize)]
pub struct ImportRequest {
    pub rows: Vec<serde_json::Value>,
    #[serde(default)]
    pub defaults: ImportDefaults,
}

#[derive(Debug, Serialize)]
pub struct ImportResponse {
    #[serde(flatten)]
    pub report: CreateReport,
    pub skipped_rows: Vec<SkippedRow>,
}

/// Map spreadsheet rows to alarms and create them.
pub(crate) async fn import_alarms(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> Result<Json<ImportResponse>, ApiError> {
    let body: ImportRequest = parse_body(body)?;
    let plan = rows_to_configs(&body.rows, &body.defaults);
    tracing::info!(
        rows = body.rows.len(),
        mapped = plan.configs.len(),
        skipped = plan.skipped.len(),
        "importing alarm rows"
    );
    let report = state.registry.create(&plan.configs).map_err(registry_error)?;
    Ok(Json(ImportResponse {
        report,
        skipped_rows: plan.skipped,
    }))
}

// ── Read / update / delete ───────────────────────────────────────

pub(crate) async fn get_alarm(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<AlarmView>, ApiError> {
    state
        .registry
        .get(&id)
        .map(|alarm| Json(AlarmView::new(&alarm, &state.monitor)))
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("alarm '{id}' not found")))
}

/// Partial update. Changing serial or channel moves the alarm to a new id.
pub(crate) async fn update_alarm(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(update): Json<Value>,
) -> Result<Json<AlarmView>, ApiError> {
    let update: AlarmUpdate = parse_body(update)?;
    let alarm = state.registry.update(&id, &update).map_err(registry_error)?;
    Ok(Json(AlarmView::new(&alarm, &state.monitor)))
}

pub(crate) async fn delete_alarm(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<AlarmView>, ApiError> {
    let removed = state.registry.delete(&id).map_err(registry_error)?;
    Ok(Json(AlarmView::new(&removed, &state.monitor)))
}

// ── Dry runs ─────────────────────────────────────────────────────

pub(crate) async fn test_alarm(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<TestReport>, ApiError> {
    state.monitor.test_alarm(&id).await.map(Json).map_err(monitor_error)
}

pub(crate) async fn test_all_alarms(State(state): State<Arc<AppState>>) -> Json<TestAllReport> {
    Json(state.monitor.test_all().await)
}

#[derive(Debug, Serialize)]
pub struct ValueResponse {
    pub alarm_id: String,
    pub value: Option<f64>,
    pub timestamp: Option<String>,
}

/// Latest reading of the alarm's channel; `value: null` when the window
/// holds no data.
pub(crate) async fn alarm_value(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ValueResponse>, ApiError> {
    let reading = state.monitor.current_value(&id).await.map_err(monitor_error)?;
    Ok(Json(ValueResponse {
        alarm_id: id,
        value: reading.as_ref().map(|r| r.value),
        timestamp: reading.map(|r| r.timestamp),
    }))
}
