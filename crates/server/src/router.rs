//! Route table and middleware.

use std::sync::Arc;

use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tracing::warn;

use crate::api;
use crate::state::AppState;

/// Build the complete application router with all routes and middleware.
pub fn build_router(state: Arc<AppState>, cors_origin: &str) -> Router {
    Router::new()
        .route("/", get(api::status))
        .route("/check-times", get(api::check_times))
        .route("/alarms", get(api::list_alarms).post(api::create_alarms))
        .route("/alarms/import", post(api::import_alarms))
        .route("/alarms/test", post(api::test_all_alarms))
        .route(
            "/alarms/{id}",
            get(api::get_alarm).put(api::update_alarm).delete(api::delete_alarm),
        )
        .route("/alarms/{id}/test", post(api::test_alarm))
        .route("/alarm/{id}/value", get(api::alarm_value))
        .route("/logger-names", get(api::logger_names))
        .route("/logger-names/{serial}", get(api::logger_name))
        .route("/refresh-logger-names", post(api::refresh_logger_names))
        .layer(cors_layer(cors_origin))
        .with_state(state)
}

fn cors_layer(origin: &str) -> CorsLayer {
    if origin == "*" {
        return CorsLayer::permissive();
    }
    match HeaderValue::from_str(origin) {
        Ok(value) => CorsLayer::new()
            .allow_origin(value)
            .allow_methods(Any)
            .allow_headers(Any),
        Err(_) => {
            warn!(origin, "invalid CORS_ORIGIN, allowing any origin");
            CorsLayer::permissive()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tempfile::TempDir;
    use tower::ServiceExt;

    use loggerwatch_monitor::{AlarmChecker, CheckSettings, MonitorService};
    use loggerwatch_notify::{Notification, Notifier, NotifyError};
    use loggerwatch_rules::{AlarmRegistry, DailySchedule, ThresholdRule};
    use loggerwatch_telemetry::{Reading, TelemetryError, TelemetrySource};

    use super::*;

    /// Serial "100" reads 3.0 on every channel; everything else has no data.
    struct FixedTelemetry;

    #[async_trait]
    impl TelemetrySource for FixedTelemetry {
        async fn latest_reading(&self, serial: &str, _channel: &str) -> Result<Option<Reading>, TelemetryError> {
            Ok((serial == "100").then(|| Reading {
                timestamp: "2024-01-01 10:00:00".to_string(),
                value: 3.0,
            }))
        }

        async fn logger_names(&self) -> Result<HashMap<String, String>, TelemetryError> {
            Ok(HashMap::from([("100".to_string(), "North Well".to_string())]))
        }
    }

    #[derive(Default)]
    struct CountingNotifier {
        sent: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Notifier for CountingNotifier {
        async fn send(&self, _notification: &Notification) -> Result<(), NotifyError> {
            self.sent.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn channel_name(&self) -> &str {
            "counting"
        }
    }

    struct Harness {
        _dir: TempDir,
        app: Router,
        registry: Arc<AlarmRegistry>,
        sent: Arc<AtomicUsize>,
    }

    fn harness() -> Harness {
        let dir = TempDir::new().unwrap();
        let registry = Arc::new(AlarmRegistry::new(dir.path().join("alarms.json")));
        let notifier = CountingNotifier::default();
        let sent = Arc::clone(&notifier.sent);
        let checker = AlarmChecker::new(Arc::new(FixedTelemetry), Arc::new(notifier), CheckSettings::default());
        let schedule = DailySchedule::from_strings(["18:00", "06:00"]).unwrap();
        let monitor = Arc::new(MonitorService::new(Arc::clone(&registry), checker, schedule));
        monitor.mark_loaded();

        let state = Arc::new(AppState {
            registry: Arc::clone(&registry),
            monitor,
        });
        Harness {
            _dir: dir,
            app: build_router(state, "*"),
            registry,
            sent,
        }
    }

    async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    fn below(serial: &str, channel: &str, threshold: f64) -> Value {
        json!({
            "serial": serial,
            "channel": channel,
            "type": "BELOW",
            "threshold1": threshold,
            "emails": ["ops@example.com"],
            "pozo": "P-7",
        })
    }

    #[tokio::test]
    async fn status_reports_phase_and_sorted_check_times() {
        let h = harness();
        let (status, body) = call(&h.app, "GET", "/", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["phase"], "loaded");
        assert_eq!(body["check_times"], json!(["06:00", "18:00"]));
        assert_eq!(body["alarm_count"], 0);
        assert!(body["next_check"].is_string());

        let (_, body) = call(&h.app, "GET", "/check-times", None).await;
        assert_eq!(body["check_times"], json!(["06:00", "18:00"]));
    }

    #[tokio::test]
    async fn create_single_then_read_back() {
        let h = harness();
        let (status, body) = call(&h.app, "POST", "/alarms", Some(below("100", "P1", 5.0))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["created"], json!(["100_P1"]));

        let (status, body) = call(&h.app, "GET", "/alarms/100_P1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["type"], "BELOW");
        assert_eq!(body["threshold1"], 5.0);
        assert_eq!(body["threshold2"], Value::Null);
        assert_eq!(body["pozo"], "P-7");
        assert_eq!(body["active"], true);
        assert!(body.get("enabled").is_none());

        let (_, body) = call(&h.app, "GET", "/alarms", None).await;
        assert_eq!(body["count"], 1);
        assert!(body["alarms"]["100_P1"].is_object());
    }

    #[tokio::test]
    async fn invalid_single_alarm_is_bad_request() {
        let h = harness();
        let mut definition = below("100", "P1", 5.0);
        definition["type"] = json!("SIDEWAYS");

        let (status, _) = call(&h.app, "POST", "/alarms", Some(definition)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(h.registry.is_empty());
    }

    #[tokio::test]
    async fn non_numeric_threshold_is_bad_request() {
        let h = harness();
        let definition = json!({"serial": "100", "channel": "P1", "type": "BELOW", "threshold1": "abc"});

        let (status, _) = call(&h.app, "POST", "/alarms", Some(definition)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(h.registry.is_empty());

        let (status, _) = call(&h.app, "POST", "/alarms", Some(json!("just a string"))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn malformed_batch_entry_is_reported_at_its_index() {
        let h = harness();
        let batch = json!([below("100", "P1", 5.0), {"serial": "200", "threshold1": "abc"}, below("300", "P2", 1.0)]);

        let (status, body) = call(&h.app, "POST", "/alarms", Some(batch)).await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["created"], json!(["100_P1", "300_P2"]));
        assert_eq!(body["failed"][0]["index"], 1);
    }

    #[tokio::test]
    async fn malformed_update_is_bad_request() {
        let h = harness();
        call(&h.app, "POST", "/alarms", Some(below("100", "P1", 5.0))).await;

        let (status, _) = call(&h.app, "PUT", "/alarms/100_P1", Some(json!({"threshold1": "abc"}))).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(h.registry.get("100_P1").unwrap().rule(), &ThresholdRule::Below(5.0));
    }

    #[tokio::test]
    async fn batch_commits_valid_records_and_reports_failures() {
        let h = harness();
        let batch = json!([below("100", "P1", 5.0), {"serial": "200"}, below("300", "P2", 1.0)]);

        let (status, body) = call(&h.app, "POST", "/alarms", Some(batch)).await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["created"], json!(["100_P1", "300_P2"]));
        assert_eq!(body["failed"][0]["index"], 1);
        assert_eq!(h.registry.len(), 2);
    }

    #[tokio::test]
    async fn update_moves_alarm_and_rejects_collisions() {
        let h = harness();
        call(&h.app, "POST", "/alarms", Some(json!([below("100", "P1", 5.0), below("100", "P2", 5.0)]))).await;

        let (status, _) = call(&h.app, "PUT", "/alarms/100_P1", Some(json!({"channel": "P2"}))).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, body) = call(&h.app, "PUT", "/alarms/100_P1", Some(json!({"channel": "P3", "threshold1": 2.0}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], "100_P3");
        assert_eq!(body["threshold1"], 2.0);
        assert!(h.registry.get("100_P1").is_none());
    }

    #[tokio::test]
    async fn unknown_alarm_is_not_found() {
        let h = harness();
        for (method, uri) in [
            ("GET", "/alarms/nope_P1"),
            ("DELETE", "/alarms/nope_P1"),
            ("POST", "/alarms/nope_P1/test"),
            ("GET", "/alarm/nope_P1/value"),
        ] {
            let (status, _) = call(&h.app, method, uri, None).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "{method} {uri}");
        }
        let (status, _) = call(&h.app, "PUT", "/alarms/nope_P1", Some(json!({"threshold1": 1.0}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn delete_returns_removed_alarm() {
        let h = harness();
        call(&h.app, "POST", "/alarms", Some(below("100", "P1", 5.0))).await;

        let (status, body) = call(&h.app, "DELETE", "/alarms/100_P1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], "100_P1");

        let (status, _) = call(&h.app, "GET", "/alarms/100_P1", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_endpoints_evaluate_without_mailing() {
        let h = harness();
        call(&h.app, "POST", "/alarms", Some(json!([below("100", "P1", 5.0), below("999", "P1", 5.0)]))).await;

        let (status, body) = call(&h.app, "POST", "/alarms/100_P1/test", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outcome"], "triggered");
        assert_eq!(body["triggered"], true);
        assert_eq!(body["alarm_id"], "100_P1");
        assert_eq!(body["value"], 3.0);

        let (status, body) = call(&h.app, "POST", "/alarms/test", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["results"].as_array().unwrap().len(), 2);
        assert_eq!(body["results"][0]["triggered"], true);
        assert_eq!(body["results"][1]["outcome"], "no_data");
        assert_eq!(body["results"][1]["triggered"], false);

        assert_eq!(h.sent.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn value_endpoint_returns_latest_reading() {
        let h = harness();
        call(&h.app, "POST", "/alarms", Some(json!([below("100", "P1", 5.0), below("999", "P1", 5.0)]))).await;

        let (_, body) = call(&h.app, "GET", "/alarm/100_P1/value", None).await;
        assert_eq!(body["value"], 3.0);
        assert_eq!(body["timestamp"], "2024-01-01 10:00:00");

        let (status, body) = call(&h.app, "GET", "/alarm/999_P1/value", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["value"], Value::Null);
    }

    #[tokio::test]
    async fn logger_names_fall_back_to_serial() {
        let h = harness();
        call(&h.app, "POST", "/alarms", Some(json!([below("100", "P1", 5.0), below("200", "P1", 5.0)]))).await;

        let (_, body) = call(&h.app, "GET", "/logger-names", None).await;
        assert_eq!(body, json!({"count": 2, "logger_names": {"100": "100", "200": "200"}}));

        let (status, body) = call(&h.app, "POST", "/refresh-logger-names", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 1);

        let (_, body) = call(&h.app, "GET", "/logger-names", None).await;
        assert_eq!(body["count"], 2);
        assert_eq!(body["logger_names"], json!({"100": "North Well", "200": "200"}));

        let (status, body) = call(&h.app, "GET", "/logger-names/100", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"serial_number": "100", "name": "North Well"}));

        let (status, _) = call(&h.app, "GET", "/logger-names/200", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, body) = call(&h.app, "GET", "/alarms/100_P1", None).await;
        assert_eq!(body["logger_name"], "North Well");
    }

    #[tokio::test]
    async fn import_maps_rows_and_skips_placeholders() {
        let h = harness();
        let rows = json!({
            "rows": [
                {"NUM. DE SERIE DATALOGGER": "XLG20419", "Treshhold": 2.5, "emails": "a@x.com; b@x.com"},
                {"NUM. DE SERIE DATALOGGER": "30000", "Threshold": -1},
            ],
        });

        let (status, body) = call(&h.app, "POST", "/alarms/import", Some(rows)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["created"], json!(["20419_Pressure1"]));
        assert_eq!(body["skipped_rows"][0]["row"], 1);

        let alarm = h.registry.get("20419_Pressure1").unwrap();
        assert_eq!(alarm.emails(), ["a@x.com", "b@x.com"]);
    }
}
