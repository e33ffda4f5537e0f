//! Datalogger vendor API access.
//!
//! This crate provides:
//! - `TelemetrySource`, the seam the monitor fetches readings through
//! - `HttpTelemetryClient`, the GET-based client for the vendor REST API
//! - Pure extraction of the latest reading and logger names from responses

pub mod client;
pub mod error;
pub mod extract;
pub mod source;

pub use client::HttpTelemetryClient;
pub use error::TelemetryError;
pub use source::{Reading, TelemetrySource};
