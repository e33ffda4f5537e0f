//! Construction of the monitor and its collaborators from [`Config`].

use std::sync::Arc;
use std::time::Duration;

use chrono::TimeDelta;
use tracing::warn;

use loggerwatch_core::Config;
use loggerwatch_notify::{DisabledNotifier, EmailNotifier, Notifier};
use loggerwatch_rules::{AlarmRegistry, DailySchedule};
use loggerwatch_telemetry::{HttpTelemetryClient, TelemetrySource};

use crate::check::{AlarmChecker, CheckSettings};
use crate::service::MonitorService;
use crate::supervise::RestartPolicy;

/// SMTP notifier when credentials are configured, otherwise a disabled one
/// that fails every send.
pub fn notifier_from_config(config: &Config) -> Arc<dyn Notifier> {
    let smtp = &config.smtp;
    let (Some(sender), Some(password)) = (smtp.sender.as_deref(), smtp.password.as_deref()) else {
        warn!("SENDER_EMAIL / SENDER_PASSWORD not set, email notifications disabled");
        return Arc::new(DisabledNotifier);
    };
    match EmailNotifier::from_config(&smtp.host, Some(smtp.port), smtp.tls, sender, Some(password)) {
        Ok(notifier) => Arc::new(notifier),
        Err(e) => {
            warn!(error = %e, "invalid SMTP configuration, email notifications disabled");
            Arc::new(DisabledNotifier)
        }
    }
}

pub fn telemetry_from_config(config: &Config) -> anyhow::Result<Arc<dyn TelemetrySource>> {
    Ok(Arc::new(HttpTelemetryClient::from_config(&config.telemetry)?))
}

pub fn check_settings(config: &Config) -> CheckSettings {
    CheckSettings {
        stale_after: TimeDelta::hours(i64::from(config.schedule.stale_after_hours)),
        notify_on_no_data: config.schedule.notify_on_no_data,
    }
}

pub fn restart_policy(config: &Config) -> RestartPolicy {
    RestartPolicy {
        max_restarts: config.schedule.max_restarts,
        delay: Duration::from_secs(u64::from(config.schedule.restart_delay_secs)),
    }
}

/// Build a monitor over `registry` with the configured schedule and the
/// given collaborators.
pub fn monitor_from_config(
    config: &Config,
    registry: Arc<AlarmRegistry>,
    telemetry: Arc<dyn TelemetrySource>,
    notifier: Arc<dyn Notifier>,
) -> anyhow::Result<MonitorService> {
    let schedule = DailySchedule::from_strings(&config.schedule.check_times)?;
    let checker = AlarmChecker::new(telemetry, notifier, check_settings(config));
    Ok(MonitorService::new(registry, checker, schedule))
}
