//! Hand-written collaborators for monitor tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDateTime;

use loggerwatch_notify::{Notification, Notifier, NotifyError};
use loggerwatch_telemetry::{Reading, TelemetryError, TelemetrySource};

pub fn reading_at(at: NaiveDateTime, value: f64) -> Reading {
    Reading {
        timestamp: at.format("%Y-%m-%d %H:%M:%S").to_string(),
        value,
    }
}

#[derive(Clone, Default)]
pub struct MockTelemetry {
    readings: Arc<Mutex<HashMap<(String, String), Reading>>>,
    failing: Arc<Mutex<HashSet<String>>>,
    names: Arc<Mutex<HashMap<String, String>>>,
    calls: Arc<AtomicUsize>,
}

impl MockTelemetry {
    pub fn with_reading(self, serial: &str, channel: &str, reading: Reading) -> Self {
        self.readings
            .lock()
            .unwrap()
            .insert((serial.to_string(), channel.to_string()), reading);
        self
    }

    /// Every fetch for `serial` fails with an API error.
    pub fn with_failure(self, serial: &str) -> Self {
        self.failing.lock().unwrap().insert(serial.to_string());
        self
    }

    pub fn with_name(self, serial: &str, name: &str) -> Self {
        self.names
            .lock()
            .unwrap()
            .insert(serial.to_string(), name.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TelemetrySource for MockTelemetry {
    async fn latest_reading(&self, serial: &str, channel: &str) -> Result<Option<Reading>, TelemetryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.lock().unwrap().contains(serial) {
            return Err(TelemetryError::Api {
                status: 500,
                body: "boom".to_string(),
            });
        }
        Ok(self
            .readings
            .lock()
            .unwrap()
            .get(&(serial.to_string(), channel.to_string()))
            .cloned())
    }

    async fn logger_names(&self) -> Result<HashMap<String, String>, TelemetryError> {
        Ok(self.names.lock().unwrap().clone())
    }
}

#[derive(Clone, Default)]
pub struct MockNotifier {
    sent: Arc<Mutex<Vec<Notification>>>,
    count: Arc<AtomicUsize>,
    fail: bool,
}

impl MockNotifier {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        self.count.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(NotifyError::Smtp("connection refused".to_string()));
        }
        self.sent.lock().unwrap().push(notification.clone());
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "mock"
    }
}
