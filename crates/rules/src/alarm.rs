//! Alarm model: one logger channel bound to a threshold rule and a
//! recipient list.

use chrono::{NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};

use crate::de;
use crate::error::ValidationError;
use crate::threshold::{ThresholdKind, ThresholdRule};

/// Readings older than this are reported as stale instead of evaluated.
pub const DEFAULT_STALE_AFTER_HOURS: i64 = 24;

/// Unvalidated alarm definition as received from the API, an import, or
/// the persisted store.
///
/// `serial` and `channel` accept numbers as well as strings (the dashboard
/// sends channels as integers).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AlarmConfig {
    #[serde(default, alias = "serialNumber", deserialize_with = "de::opt_string_or_number")]
    pub serial: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string_or_number")]
    pub channel: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default, deserialize_with = "de::opt_lenient_f64")]
    pub threshold1: Option<f64>,
    #[serde(default, deserialize_with = "de::opt_lenient_f64")]
    pub threshold2: Option<f64>,
    #[serde(default, alias = "active")]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub emails: Option<Vec<String>>,
    #[serde(default)]
    pub pozo: Option<String>,
}

/// Persisted shape of one alarm inside `{"alarms": {id: record}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlarmRecord {
    pub serial: String,
    pub channel: String,
    #[serde(rename = "type")]
    pub kind: ThresholdKind,
    pub threshold1: f64,
    pub threshold2: Option<f64>,
    pub enabled: bool,
    pub emails: Vec<String>,
    pub pozo: String,
}

/// Partial update. Absent fields are left untouched; `threshold2: null`
/// explicitly clears the second bound.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AlarmUpdate {
    #[serde(default, alias = "serialNumber", deserialize_with = "de::opt_string_or_number")]
    pub serial: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string_or_number")]
    pub channel: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default, deserialize_with = "de::opt_lenient_f64")]
    pub threshold1: Option<f64>,
    #[serde(default, deserialize_with = "de::present")]
    pub threshold2: Option<Option<f64>>,
    #[serde(default, alias = "active")]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub emails: Option<Vec<String>>,
    #[serde(default)]
    pub pozo: Option<String>,
}

impl AlarmUpdate {
    /// Whether the update touches the threshold rule at all.
    fn touches_rule(&self) -> bool {
        self.kind.is_some() || self.threshold1.is_some() || self.threshold2.is_some()
    }
}

/// Result of checking one alarm against one reading.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AlarmOutcome {
    /// The rule fired on `value`.
    Triggered { value: f64 },
    /// The rule did not fire.
    Normal { value: f64 },
    /// The latest reading is too old; the rule was not evaluated.
    Stale { observed_at: NaiveDateTime },
    /// The telemetry source returned no reading at all.
    NoData,
}

impl AlarmOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            AlarmOutcome::Triggered { .. } => "triggered",
            AlarmOutcome::Normal { .. } => "normal",
            AlarmOutcome::Stale { .. } => "stale",
            AlarmOutcome::NoData => "no_data",
        }
    }
}

/// A validated alarm.
///
/// `id` is always `serial + "_" + channel`; it is recomputed whenever
/// either part changes and cannot be set independently.
#[derive(Debug, Clone, PartialEq)]
pub struct Alarm {
    id: String,
    serial: String,
    channel: String,
    rule: ThresholdRule,
    pozo: String,
    emails: Vec<String>,
    logger_name: Option<String>,
    active: bool,
}

pub fn alarm_id(serial: &str, channel: &str) -> String {
    format!("{serial}_{channel}")
}

impl Alarm {
    /// Validate a raw definition. `serial`, `channel`, `type` and
    /// `threshold1` are required; `enabled` defaults to true.
    pub fn from_config(config: &AlarmConfig) -> Result<Self, ValidationError> {
        let serial = required_text(config.serial.as_deref(), "serial")?;
        let channel = required_text(config.channel.as_deref(), "channel")?;
        let kind: ThresholdKind = config
            .kind
            .as_deref()
            .ok_or(ValidationError::MissingField("type"))?
            .parse()?;
        let threshold1 = config.threshold1.ok_or(ValidationError::MissingField("threshold1"))?;
        let rule = ThresholdRule::new(kind, threshold1, config.threshold2)?;

        Ok(Self {
            id: alarm_id(&serial, &channel),
            serial,
            channel,
            rule,
            pozo: config.pozo.clone().unwrap_or_default(),
            emails: config.emails.clone().unwrap_or_default(),
            logger_name: None,
            active: config.enabled.unwrap_or(true),
        })
    }

    /// Merge `update` into a copy of this alarm.
    ///
    /// When the rule is touched it is rebuilt and revalidated: a missing
    /// `type` keeps the current mode, a missing `threshold1` keeps the
    /// current first bound, and a missing `threshold2` keeps the stored
    /// second bound only if the resulting mode takes one.
    pub fn apply_update(&self, update: &AlarmUpdate) -> Result<Self, ValidationError> {
        let mut next = self.clone();

        if let Some(serial) = update.serial.as_deref() {
            next.serial = required_text(Some(serial), "serial")?;
        }
        if let Some(channel) = update.channel.as_deref() {
            next.channel = required_text(Some(channel), "channel")?;
        }

        if update.touches_rule() {
            let kind = match update.kind.as_deref() {
                Some(raw) => raw.parse()?,
                None => self.rule.kind(),
            };
            let bound1 = update.threshold1.unwrap_or_else(|| self.rule.bound1());
            let bound2 = match update.threshold2 {
                Some(explicit) => explicit,
                None if kind.requires_two_bounds() => self.rule.bound2(),
                None => None,
            };
            next.rule = ThresholdRule::new(kind, bound1, bound2)?;
        }

        if let Some(enabled) = update.enabled {
            next.active = enabled;
        }
        if let Some(emails) = &update.emails {
            next.emails = emails.clone();
        }
        if let Some(pozo) = &update.pozo {
            next.pozo = pozo.clone();
        }

        if next.serial != self.serial {
            next.logger_name = None;
        }
        next.id = alarm_id(&next.serial, &next.channel);
        Ok(next)
    }

    /// Evaluate a reading with the default 24 hour staleness window.
    pub fn evaluate(&self, value: f64, observed_at: NaiveDateTime, now: NaiveDateTime) -> AlarmOutcome {
        self.evaluate_within(value, observed_at, now, TimeDelta::hours(DEFAULT_STALE_AFTER_HOURS))
    }

    /// Stale wins over the rule: a reading older than `stale_after` is never
    /// compared against the thresholds.
    pub fn evaluate_within(
        &self,
        value: f64,
        observed_at: NaiveDateTime,
        now: NaiveDateTime,
        stale_after: TimeDelta,
    ) -> AlarmOutcome {
        if now - observed_at > stale_after {
            return AlarmOutcome::Stale { observed_at };
        }
        self.test(value)
    }

    /// Dry run: would `value` fire the rule right now. No staleness check.
    pub fn test(&self, value: f64) -> AlarmOutcome {
        if self.rule.evaluate(value) {
            AlarmOutcome::Triggered { value }
        } else {
            AlarmOutcome::Normal { value }
        }
    }

    pub fn to_record(&self) -> AlarmRecord {
        AlarmRecord {
            serial: self.serial.clone(),
            channel: self.channel.clone(),
            kind: self.rule.kind(),
            threshold1: self.rule.bound1(),
            threshold2: self.rule.bound2(),
            enabled: self.active,
            emails: self.emails.clone(),
            pozo: self.pozo.clone(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn serial(&self) -> &str {
        &self.serial
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn rule(&self) -> &ThresholdRule {
        &self.rule
    }

    pub fn pozo(&self) -> &str {
        &self.pozo
    }

    pub fn emails(&self) -> &[String] {
        &self.emails
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn logger_name(&self) -> Option<&str> {
        self.logger_name.as_deref()
    }

    /// Human label for the logger: the resolved name, else the serial.
    pub fn display_name(&self) -> &str {
        self.logger_name.as_deref().unwrap_or(&self.serial)
    }

    pub fn set_logger_name(&mut self, name: Option<String>) {
        self.logger_name = name.filter(|n| !n.trim().is_empty());
    }
}

fn required_text(value: Option<&str>, field: &'static str) -> Result<String, ValidationError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(ValidationError::MissingField(field)),
    }
}
