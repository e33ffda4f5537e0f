//! Alarm evaluation core for datalogger threshold monitoring.
//!
//! This crate provides:
//! - `ThresholdRule`, an immutable five-mode comparison over one or two bounds
//! - `Alarm`, binding a logger channel to a rule and a recipient list
//! - `AlarmRegistry`, the lock-guarded alarm map mirrored to a JSON file
//! - Daily check-time scheduling (`next_run_time`)
//! - Mapping of bulk-import rows into alarm configurations

pub mod alarm;
pub(crate) mod de;
pub mod error;
pub mod import;
pub mod registry;
pub mod scheduler;
pub mod threshold;
pub mod timestamp;

pub use alarm::{alarm_id, Alarm, AlarmConfig, AlarmOutcome, AlarmRecord, AlarmUpdate, DEFAULT_STALE_AFTER_HOURS};
pub use error::{EvalError, ValidationError};
pub use import::{rows_to_configs, ImportDefaults, ImportPlan};
pub use registry::{AlarmRegistry, CreateReport, LoadReport, RegistryError};
pub use scheduler::{next_run_time, CheckTime, DailySchedule, ScheduleError};
pub use threshold::{ThresholdKind, ThresholdRule};
pub use timestamp::parse_timestamp;
