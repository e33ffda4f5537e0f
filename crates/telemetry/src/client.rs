//! GET-based client for the datalogger vendor REST API.
//!
//! Every request is `BASE_URL + endpoint + API_KEY`; the key is appended
//! verbatim after the endpoint's trailing slash.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Local, NaiveDateTime, TimeDelta};
use tracing::debug;
use url::Url;

use loggerwatch_core::config::TelemetryConfig;

use crate::error::TelemetryError;
use crate::extract::{extract_latest, extract_logger_names};
use crate::source::{Reading, TelemetrySource};

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M";

pub struct HttpTelemetryClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    lookback: TimeDelta,
}

impl HttpTelemetryClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
        lookback_days: u32,
    ) -> Result<Self, TelemetryError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            lookback: TimeDelta::days(i64::from(lookback_days)),
        })
    }

    pub fn from_config(config: &TelemetryConfig) -> Result<Self, TelemetryError> {
        let base_url = config
            .base_url
            .as_deref()
            .ok_or_else(|| TelemetryError::NotConfigured("BASE_URL is not set".to_string()))?;
        Self::new(
            base_url,
            config.api_key.clone().unwrap_or_default(),
            Duration::from_secs(u64::from(config.timeout_secs)),
            config.lookback_days,
        )
    }

    /// Full request URL for an endpoint. Spaces in the date segments are
    /// percent-encoded by the URL parser.
    pub fn endpoint_url(&self, endpoint: &str) -> Result<Url, TelemetryError> {
        let raw = format!("{}{}{}", self.base_url, endpoint, self.api_key);
        Url::parse(&raw).map_err(|e| TelemetryError::NotConfigured(format!("invalid URL '{}{}': {e}", self.base_url, endpoint)))
    }

    /// Channel data endpoint for the window `[start, end]`.
    pub fn channel_endpoint(serial: &str, channel: &str, start: NaiveDateTime, end: NaiveDateTime) -> String {
        format!(
            "/Data/Channel/{}/{}/{}/{}/",
            serial,
            channel,
            start.format(DATE_FORMAT),
            end.format(DATE_FORMAT)
        )
    }

    async fn get_json(&self, endpoint: &str) -> Result<serde_json::Value, TelemetryError> {
        let url = self.endpoint_url(endpoint)?;
        debug!(endpoint = %endpoint, "telemetry request");

        let response = self.client.get(url).send().await?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TelemetryError::Api { status, body });
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl TelemetrySource for HttpTelemetryClient {
    async fn latest_reading(&self, serial: &str, channel: &str) -> Result<Option<Reading>, TelemetryError> {
        let end = Local::now().naive_local();
        let start = end - self.lookback;
        let response = self
            .get_json(&Self::channel_endpoint(serial, channel, start, end))
            .await?;
        extract_latest(&response)
    }

    async fn logger_names(&self) -> Result<HashMap<String, String>, TelemetryError> {
        let response = self.get_json("/Logger/All/").await?;
        extract_logger_names(&response)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn client() -> HttpTelemetryClient {
        HttpTelemetryClient::new("https://api.example.com/v1/", "KEY123", Duration::from_secs(5), 8).unwrap()
    }

    #[test]
    fn channel_endpoint_formats_dates_to_the_minute() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(6, 30, 59).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 1, 9).unwrap().and_hms_opt(6, 30, 0).unwrap();
        assert_eq!(
            HttpTelemetryClient::channel_endpoint("20419", "Pressure1", start, end),
            "/Data/Channel/20419/Pressure1/2024-01-01 06:30/2024-01-09 06:30/"
        );
    }

    #[test]
    fn url_appends_key_after_endpoint() {
        let url = client().endpoint_url("/Logger/All/").unwrap();
        assert_eq!(url.as_str(), "https://api.example.com/v1/Logger/All/KEY123");
    }

    #[test]
    fn url_encodes_spaces_in_dates() {
        let url = client()
            .endpoint_url("/Data/Channel/1/P1/2024-01-01 06:30/2024-01-09 06:30/")
            .unwrap();
        assert_eq!(
            url.path(),
            "/v1/Data/Channel/1/P1/2024-01-01%2006:30/2024-01-09%2006:30/KEY123"
        );
    }

    #[test]
    fn from_config_requires_base_url() {
        let config = TelemetryConfig {
            base_url: None,
            api_key: Some("k".to_string()),
            timeout_secs: 30,
            lookback_days: 8,
        };
        assert!(matches!(
            HttpTelemetryClient::from_config(&config),
            Err(TelemetryError::NotConfigured(_))
        ));
    }
}
