//! Single-alarm checks: the live path (fetch, evaluate, notify) and the
//! dry-run test path (fetch, evaluate the rule only, never notify).

use std::sync::Arc;

use chrono::{NaiveDateTime, TimeDelta};
use serde::Serialize;
use tracing::{debug, info, warn};

use loggerwatch_notify::{AlertContext, AlertKind, Notifier, TemplateRenderer};
use loggerwatch_rules::{parse_timestamp, Alarm, AlarmOutcome, DEFAULT_STALE_AFTER_HOURS};
use loggerwatch_telemetry::{Reading, TelemetrySource};

use crate::error::CheckError;

#[derive(Debug, Clone, Copy)]
pub struct CheckSettings {
    pub stale_after: TimeDelta,
    /// Whether a `NoData` outcome sends mail.
    pub notify_on_no_data: bool,
}

impl Default for CheckSettings {
    fn default() -> Self {
        Self {
            stale_after: TimeDelta::hours(DEFAULT_STALE_AFTER_HOURS),
            notify_on_no_data: false,
        }
    }
}

/// Outcome of one live check.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckResult {
    #[serde(flatten)]
    pub outcome: AlarmOutcome,
    pub notified: bool,
}

/// Outcome of one dry run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestReport {
    pub alarm_id: String,
    pub triggered: bool,
    #[serde(flatten)]
    pub outcome: AlarmOutcome,
    pub reading: Option<Reading>,
}

pub struct AlarmChecker {
    telemetry: Arc<dyn TelemetrySource>,
    notifier: Arc<dyn Notifier>,
    renderer: TemplateRenderer,
    settings: CheckSettings,
}

impl AlarmChecker {
    pub fn new(telemetry: Arc<dyn TelemetrySource>, notifier: Arc<dyn Notifier>, settings: CheckSettings) -> Self {
        Self {
            telemetry,
            notifier,
            renderer: TemplateRenderer::new(),
            settings,
        }
    }

    pub fn telemetry(&self) -> &Arc<dyn TelemetrySource> {
        &self.telemetry
    }

    pub fn settings(&self) -> CheckSettings {
        self.settings
    }

    /// Fetch the latest reading, evaluate it as of `now`, and send at most
    /// one notification. A failed send is logged and reported as
    /// `notified: false`, never as an error.
    pub async fn check(&self, alarm: &Alarm, now: NaiveDateTime) -> Result<CheckResult, CheckError> {
        let reading = self.telemetry.latest_reading(alarm.serial(), alarm.channel()).await?;

        let outcome = match &reading {
            None => AlarmOutcome::NoData,
            Some(r) => {
                let observed_at = parse_timestamp(&r.timestamp)?;
                alarm.evaluate_within(r.value, observed_at, now, self.settings.stale_after)
            }
        };
        debug!(alarm_id = %alarm.id(), outcome = outcome.label(), "alarm evaluated");

        let notified = self.notify(alarm, &outcome, reading.as_ref()).await?;
        Ok(CheckResult { outcome, notified })
    }

    async fn notify(&self, alarm: &Alarm, outcome: &AlarmOutcome, reading: Option<&Reading>) -> Result<bool, CheckError> {
        let kind = match outcome {
            AlarmOutcome::Triggered { .. } => AlertKind::Triggered,
            AlarmOutcome::Stale { .. } => AlertKind::Stale,
            AlarmOutcome::NoData if self.settings.notify_on_no_data => AlertKind::NoData,
            _ => return Ok(false),
        };

        if alarm.emails().is_empty() {
            warn!(alarm_id = %alarm.id(), outcome = outcome.label(), "no recipients configured, notification suppressed");
            return Ok(false);
        }

        let context = AlertContext {
            alarm_id: alarm.id().to_string(),
            serial: alarm.serial().to_string(),
            logger: alarm.display_name().to_string(),
            channel: alarm.channel().to_string(),
            pozo: alarm.pozo().to_string(),
            threshold: alarm.rule().to_string(),
            value: reading.map(|r| r.value),
            last_update: reading.map(|r| r.timestamp.clone()),
        };
        let notification = context.notification(kind, alarm.emails(), &self.renderer)?;

        match self.notifier.send(&notification).await {
            Ok(()) => {
                info!(
                    alarm_id = %alarm.id(),
                    outcome = outcome.label(),
                    channel = self.notifier.channel_name(),
                    recipients = alarm.emails().len(),
                    "notification sent"
                );
                Ok(true)
            }
            Err(e) => {
                warn!(alarm_id = %alarm.id(), error = %e, "notification failed");
                Ok(false)
            }
        }
    }

    /// Would the current reading fire the rule? No staleness check and no
    /// mail.
    pub async fn test(&self, alarm: &Alarm) -> Result<TestReport, CheckError> {
        let reading = self.current_value(alarm).await?;
        let outcome = match &reading {
            None => AlarmOutcome::NoData,
            Some(r) => alarm.test(r.value),
        };
        Ok(TestReport {
            alarm_id: alarm.id().to_string(),
            triggered: matches!(outcome, AlarmOutcome::Triggered { .. }),
            outcome,
            reading,
        })
    }

    pub async fn current_value(&self, alarm: &Alarm) -> Result<Option<Reading>, CheckError> {
        Ok(self.telemetry.latest_reading(alarm.serial(), alarm.channel()).await?)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Local;
    use serde_json::json;

    use super::*;
    use crate::testing::{reading_at, MockNotifier, MockTelemetry};

    fn alarm(emails: &[&str]) -> Alarm {
        let config = serde_json::from_value(json!({
            "serial": "100", "channel": "P1", "type": "BELOW", "threshold1": 5.0, "emails": emails,
        }))
        .unwrap();
        Alarm::from_config(&config).unwrap()
    }

    fn checker(telemetry: MockTelemetry, notifier: &MockNotifier, settings: CheckSettings) -> AlarmChecker {
        AlarmChecker::new(Arc::new(telemetry), Arc::new(notifier.clone()), settings)
    }

    #[tokio::test]
    async fn triggered_reading_sends_one_mail_to_all_recipients() {
        let now = Local::now().naive_local();
        let notifier = MockNotifier::default();
        let telemetry = MockTelemetry::default().with_reading("100", "P1", reading_at(now - TimeDelta::hours(1), 3.0));
        let checker = checker(telemetry, &notifier, CheckSettings::default());

        let result = checker.check(&alarm(&["a@x.com", "b@x.com"]), now).await.unwrap();

        assert_eq!(result.outcome, AlarmOutcome::Triggered { value: 3.0 });
        assert!(result.notified);
        assert_eq!(notifier.count(), 1);
        let sent = notifier.sent();
        assert_eq!(sent[0].recipients, vec!["a@x.com", "b@x.com"]);
        assert!(sent[0].subject.starts_with("Alarm triggered: 100 - P1"));
    }

    #[tokio::test]
    async fn stale_reading_sends_old_data_mail() {
        let now = Local::now().naive_local();
        let notifier = MockNotifier::default();
        let telemetry = MockTelemetry::default().with_reading("100", "P1", reading_at(now - TimeDelta::hours(25), 9.0));
        let checker = checker(telemetry, &notifier, CheckSettings::default());

        let result = checker.check(&alarm(&["a@x.com"]), now).await.unwrap();

        assert!(matches!(result.outcome, AlarmOutcome::Stale { .. }));
        assert_eq!(notifier.count(), 1);
        assert!(notifier.sent()[0].subject.starts_with("Old data:"));
    }

    #[tokio::test]
    async fn normal_reading_sends_nothing() {
        let now = Local::now().naive_local();
        let notifier = MockNotifier::default();
        let telemetry = MockTelemetry::default().with_reading("100", "P1", reading_at(now, 7.0));
        let checker = checker(telemetry, &notifier, CheckSettings::default());

        let result = checker.check(&alarm(&["a@x.com"]), now).await.unwrap();

        assert_eq!(result.outcome, AlarmOutcome::Normal { value: 7.0 });
        assert!(!result.notified);
        assert_eq!(notifier.count(), 0);
    }

    #[tokio::test]
    async fn empty_recipients_suppress_mail() {
        let now = Local::now().naive_local();
        let notifier = MockNotifier::default();
        let telemetry = MockTelemetry::default().with_reading("100", "P1", reading_at(now, 1.0));
        let checker = checker(telemetry, &notifier, CheckSettings::default());

        let result = checker.check(&alarm(&[]), now).await.unwrap();

        assert_eq!(result.outcome, AlarmOutcome::Triggered { value: 1.0 });
        assert!(!result.notified);
        assert_eq!(notifier.count(), 0);
    }

    #[tokio::test]
    async fn no_data_notifies_only_when_enabled() {
        let now = Local::now().naive_local();
        let quiet = MockNotifier::default();
        let result = checker(MockTelemetry::default(), &quiet, CheckSettings::default())
            .check(&alarm(&["a@x.com"]), now)
            .await
            .unwrap();
        assert_eq!(result.outcome, AlarmOutcome::NoData);
        assert_eq!(quiet.count(), 0);

        let loud = MockNotifier::default();
        let settings = CheckSettings {
            notify_on_no_data: true,
            ..CheckSettings::default()
        };
        let result = checker(MockTelemetry::default(), &loud, settings)
            .check(&alarm(&["a@x.com"]), now)
            .await
            .unwrap();
        assert!(result.notified);
        assert!(loud.sent()[0].subject.starts_with("No data:"));
    }

    #[tokio::test]
    async fn failed_send_is_not_an_error() {
        let now = Local::now().naive_local();
        let notifier = MockNotifier::failing();
        let telemetry = MockTelemetry::default().with_reading("100", "P1", reading_at(now, 1.0));
        let checker = checker(telemetry, &notifier, CheckSettings::default());

        let result = checker.check(&alarm(&["a@x.com"]), now).await.unwrap();

        assert!(!result.notified);
        assert_eq!(notifier.count(), 1);
    }

    #[tokio::test]
    async fn bad_timestamp_is_an_eval_error() {
        let notifier = MockNotifier::default();
        let telemetry = MockTelemetry::default().with_reading(
            "100",
            "P1",
            Reading {
                timestamp: "yesterday".to_string(),
                value: 1.0,
            },
        );
        let checker = checker(telemetry, &notifier, CheckSettings::default());

        let err = checker
            .check(&alarm(&["a@x.com"]), Local::now().naive_local())
            .await
            .unwrap_err();

        assert!(matches!(err, CheckError::Eval(_)));
        assert_eq!(notifier.count(), 0);
    }

    #[tokio::test]
    async fn test_path_never_mails_and_ignores_staleness() {
        let now = Local::now().naive_local();
        let notifier = MockNotifier::default();
        let telemetry = MockTelemetry::default().with_reading("100", "P1", reading_at(now - TimeDelta::days(3), 3.0));
        let checker = checker(telemetry, &notifier, CheckSettings::default());

        let report = checker.test(&alarm(&["a@x.com"])).await.unwrap();

        assert_eq!(report.outcome, AlarmOutcome::Triggered { value: 3.0 });
        assert!(report.triggered);
        assert_eq!(report.alarm_id, "100_P1");
        assert_eq!(notifier.count(), 0);
    }
}
