//! Alarm message templates.

use std::collections::HashMap;

use serde::Serialize;

use crate::templating::TemplateRenderer;
use crate::traits::{Notification, NotifyError};

const HEADLINE: &str = "{{ logger }} - {{ channel }} (Pozo: {{ pozo }})";

const TRIGGERED_SUBJECT: &str = "Alarm triggered: {{ headline }}";
const TRIGGERED_BODY: &str = "The alarm for {{ headline }} has been triggered.\n\
Current value: {{ value }}\n\
Threshold: {{ threshold }}";

const STALE_SUBJECT: &str = "Old data: {{ headline }}";
const STALE_BODY: &str = "The data for {{ headline }} is too old.\n\
Last update: {{ last_update }}";

const NO_DATA_SUBJECT: &str = "No data: {{ headline }}";
const NO_DATA_BODY: &str = "No readings were returned for {{ headline }}.";

/// Which message to send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    Triggered,
    Stale,
    NoData,
}

impl AlertKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AlertKind::Triggered => "triggered",
            AlertKind::Stale => "stale",
            AlertKind::NoData => "no_data",
        }
    }

    fn templates(self) -> (&'static str, &'static str) {
        match self {
            AlertKind::Triggered => (TRIGGERED_SUBJECT, TRIGGERED_BODY),
            AlertKind::Stale => (STALE_SUBJECT, STALE_BODY),
            AlertKind::NoData => (NO_DATA_SUBJECT, NO_DATA_BODY),
        }
    }
}

/// Everything the alarm templates can reference.
#[derive(Debug, Clone, Serialize)]
pub struct AlertContext {
    pub alarm_id: String,
    pub serial: String,
    /// Resolved logger name, or the serial when unknown.
    pub logger: String,
    pub channel: String,
    pub pozo: String,
    /// Human description of the rule, e.g. `below 5`.
    pub threshold: String,
    pub value: Option<f64>,
    pub last_update: Option<String>,
}

#[derive(Serialize)]
struct RenderScope<'a> {
    #[serde(flatten)]
    ctx: &'a AlertContext,
    headline: String,
}

impl AlertContext {
    /// Render the `kind` message addressed to `recipients`.
    pub fn notification(
        &self,
        kind: AlertKind,
        recipients: &[String],
        renderer: &TemplateRenderer,
    ) -> Result<Notification, NotifyError> {
        let scope = RenderScope {
            ctx: self,
            headline: renderer.render(HEADLINE, self)?,
        };
        let (subject_tpl, body_tpl) = kind.templates();

        Ok(Notification {
            subject: renderer.render(subject_tpl, &scope)?,
            body: renderer.render(body_tpl, &scope)?,
            recipients: recipients.to_vec(),
            metadata: HashMap::from([
                ("alarm_id".to_string(), self.alarm_id.clone()),
                ("outcome".to_string(), kind.as_str().to_string()),
            ]),
        })
    }
}
