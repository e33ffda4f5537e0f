use std::collections::HashMap;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::TelemetryError;

/// Latest data point of one logger channel, timestamp as reported.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reading {
    pub timestamp: String,
    pub value: f64,
}

/// Where the monitor gets readings and logger names from.
///
/// Implementations apply their own request timeouts.
#[async_trait]
pub trait TelemetrySource: Send + Sync {
    /// Most recent reading for `serial`/`channel`, or `None` when the
    /// source has no data in its lookback window.
    async fn latest_reading(&self, serial: &str, channel: &str) -> Result<Option<Reading>, TelemetryError>;

    /// Serial to display name for every logger the account can see.
    async fn logger_names(&self) -> Result<HashMap<String, String>, TelemetryError>;
}
