//! Registry error type and operation reports.

use std::io;
use std::path::PathBuf;

use serde::Serialize;

use crate::error::ValidationError;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("alarm '{0}' not found")]
    NotFound(String),

    /// An update would move an alarm onto an id that is already taken.
    #[error("alarm '{0}' already exists")]
    Conflict(String),

    #[error("failed to persist alarms to {}: {source}", .path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to load alarms from {}: {reason}", .path.display())]
    Load { path: PathBuf, reason: String },
}

pub type Result<T> = std::result::Result<T, RegistryError>;

/// Outcome of a batch create. Records are validated independently; valid
/// ones commit even when others fail.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CreateReport {
    /// Ids inserted by this call, in input order, without duplicates.
    pub created: Vec<String>,
    /// Ids whose previous definition was overwritten.
    pub replaced: Vec<String>,
    pub failed: Vec<CreateFailure>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateFailure {
    /// Position of the rejected record in the request.
    pub index: usize,
    pub error: String,
}

/// Outcome of loading the persisted store.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadReport {
    pub loaded: usize,
    pub skipped: Vec<SkippedEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedEntry {
    pub id: String,
    pub reason: String,
}
