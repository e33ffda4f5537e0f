//! Response shape handling for the vendor API.
//!
//! Channel data arrives as `[{"data": [{"data": [{"timestamp", "value"}, ...]}]}]`
//! and the logger listing as `[{"serial", "name"}, ...]`.

use std::collections::HashMap;

use serde_json::Value;

use crate::error::TelemetryError;
use crate::source::Reading;

/// Pick the entry with the greatest timestamp from a channel data response.
///
/// Timestamps are `YYYY-MM-DD HH:MM[:SS]`, so lexicographic order is
/// chronological. Values may be numbers or numeric strings; entries
/// without a usable timestamp or value are ignored. An empty series is
/// `Ok(None)`.
pub fn extract_latest(response: &Value) -> Result<Option<Reading>, TelemetryError> {
    let Some(top) = response.as_array() else {
        return Err(TelemetryError::Parse("expected a JSON array".to_string()));
    };
    let series = top
        .first()
        .and_then(|first| first.get("data"))
        .and_then(Value::as_array)
        .and_then(|channels| channels.first())
        .and_then(|channel| channel.get("data"))
        .and_then(Value::as_array);
    let Some(points) = series else {
        return Ok(None);
    };

    Ok(points
        .iter()
        .filter_map(|point| {
            let timestamp = point.get("timestamp")?.as_str()?;
            let value = numeric(point.get("value")?)?;
            Some(Reading {
                timestamp: timestamp.to_string(),
                value,
            })
        })
        .max_by(|a, b| a.timestamp.cmp(&b.timestamp)))
}

/// Serial to name from the `/Logger/All/` listing. Numeric serials are
/// keyed by their decimal string.
pub fn extract_logger_names(response: &Value) -> Result<HashMap<String, String>, TelemetryError> {
    let loggers = response
        .as_array()
        .ok_or_else(|| TelemetryError::Parse("expected a JSON array of loggers".to_string()))?;

    Ok(loggers
        .iter()
        .filter_map(|logger| {
            let serial = match logger.get("serial")? {
                Value::String(s) => s.trim().to_string(),
                Value::Number(n) => n.to_string(),
                _ => return None,
            };
            let name = logger.get("name")?.as_str()?.trim();
            (!serial.is_empty() && !name.is_empty()).then(|| (serial, name.to_string()))
        })
        .collect())
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
    .filter(|v: &f64| v.is_finite())
}
