//! Scheduled alarm monitoring.
//!
//! This crate provides:
//! - `AlarmChecker`, the per-alarm live check (fetch, evaluate, notify) and
//!   the mail-free test path
//! - `MonitorService`, the load / sleep / sweep loop driven by the daily
//!   check times
//! - `supervise`, which restarts a failed monitor loop a bounded number of
//!   times
//! - Wiring from `Config` to concrete telemetry and email collaborators

pub mod check;
pub mod error;
pub mod service;
pub mod supervise;
pub mod wiring;

#[cfg(test)]
mod testing;

pub use check::{AlarmChecker, CheckResult, CheckSettings, TestReport};
pub use error::{CheckError, MonitorError};
pub use service::{MonitorPhase, MonitorService, MonitorStatus, SweepReport, TestAllReport};
pub use supervise::{supervise, RestartPolicy};
