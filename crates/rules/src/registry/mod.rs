//! In-memory alarm registry mirrored to a JSON file.
//!
//! One mutex guards every structural mutation and every snapshot read.
//! File writes happen after the lock is released, on a snapshot captured
//! under it.

mod core;
mod error;
mod store;


pub use self::core::AlarmRegistry;
pub use self::error::{CreateFailure, CreateReport, LoadReport, RegistryError, Result, SkippedEntry};
pub use self::store::AlarmStore;
