//! Bulk threshold import.
//!
//! Maps already-parsed spreadsheet rows (one JSON object per row, keyed by
//! column header) to [`AlarmConfig`]s. Only the datalogger serial and the
//! threshold column matter; channel and type come from [`ImportDefaults`].

use serde::{Deserialize, Deserializer, Serialize};

use crate::alarm::AlarmConfig;
use crate::de;
use crate::threshold::ThresholdKind;

const SERIAL_PREFIX: &str = "XLG";
/// Spreadsheets mark "no threshold" with -1.
const NO_THRESHOLD: f64 = -1.0;

/// One spreadsheet row. The threshold header exists in two spellings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImportRow {
    #[serde(
        rename = "NUM. DE SERIE DATALOGGER",
        default,
        deserialize_with = "de::opt_string_or_number"
    )]
    pub serial: Option<String>,
    #[serde(
        rename = "Threshold",
        alias = "Treshhold",
        default,
        deserialize_with = "de::opt_lenient_f64"
    )]
    pub threshold: Option<f64>,
    #[serde(default, alias = "Emails", alias = "EMAILS", deserialize_with = "email_list")]
    pub emails: Vec<String>,
    #[serde(default, alias = "Pozo", alias = "POZO", deserialize_with = "de::opt_string_or_number")]
    pub pozo: Option<String>,
}

/// Values applied to every imported row.
#[derive(Debug, Clone, Deserialize)]
pub struct ImportDefaults {
    #[serde(default = "default_channel")]
    pub channel: String,
    #[serde(default = "default_kind", rename = "type")]
    pub kind: ThresholdKind,
}

fn default_channel() -> String {
    "Pressure1".to_string()
}

fn default_kind() -> ThresholdKind {
    ThresholdKind::Below
}

impl Default for ImportDefaults {
    fn default() -> Self {
        Self {
            channel: default_channel(),
            kind: default_kind(),
        }
    }
}

/// Rows that produced a config, plus the ones that did not and why.
#[derive(Debug, Clone, Default)]
pub struct ImportPlan {
    pub configs: Vec<AlarmConfig>,
    pub skipped: Vec<SkippedRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedRow {
    pub row: usize,
    pub reason: String,
}

/// Strip the vendor `XLG` prefix from a serial.
pub fn normalize_serial(raw: &str) -> &str {
    let trimmed = raw.trim();
    trimmed.strip_prefix(SERIAL_PREFIX).unwrap_or(trimmed)
}

/// Map raw rows to alarm configs. Rows without a serial, without a
/// threshold, or with the `-1` sentinel are skipped.
pub fn rows_to_configs(rows: &[serde_json::Value], defaults: &ImportDefaults) -> ImportPlan {
    let mut plan = ImportPlan::default();
    for (index, raw) in rows.iter().enumerate() {
        let skip = |reason: String| SkippedRow { row: index, reason };
        let row = match ImportRow::deserialize(raw) {
            Ok(row) => row,
            Err(e) => {
                plan.skipped.push(skip(e.to_string()));
                continue;
            }
        };
        match row_to_config(row, defaults) {
            Ok(config) => plan.configs.push(config),
            Err(reason) => plan.skipped.push(skip(reason.to_string())),
        }
    }
    plan
}

fn row_to_config(row: ImportRow, defaults: &ImportDefaults) -> Result<AlarmConfig, &'static str> {
    let serial = row
        .serial
        .as_deref()
        .map(normalize_serial)
        .filter(|s| !s.is_empty())
        .ok_or("missing datalogger serial")?;
    let threshold = row
        .threshold
        .filter(|t| *t != NO_THRESHOLD)
        .ok_or("no threshold")?;

    Ok(AlarmConfig {
        serial: Some(serial.to_string()),
        channel: Some(defaults.channel.clone()),
        kind: Some(defaults.kind.as_str().to_string()),
        threshold1: Some(threshold),
        threshold2: None,
        enabled: Some(true),
        emails: Some(row.emails),
        pozo: Some(row.pozo.unwrap_or_default()),
    })
}

/// Accept `["a@x", "b@x"]` or a single `"a@x, b@x; c@x"` cell.
fn email_list<'d, D: Deserializer<'d>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Cell {
        List(Vec<String>),
        Text(String),
    }

    let cell = Option::<Cell>::deserialize(deserializer)?;
    let raw: Vec<String> = match cell {
        None => Vec::new(),
        Some(Cell::List(list)) => list,
        Some(Cell::Text(text)) => text.split([',', ';']).map(str::to_string).collect(),
    };
    Ok(raw
        .into_iter()
        .map(|e| e.trim().to_string())
        .filter(|e| !e.is_empty())
        .collect())
}
