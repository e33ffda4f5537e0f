//! Validation and evaluation error types shared by the alarm model.

use crate::threshold::ThresholdKind;

/// Rejected alarm or threshold definition. Surfaced to the caller of
/// create/update, never silently defaulted.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    #[error("unknown alarm type '{0}' (expected BELOW, ABOVE, EQUAL, BETWEEN or OUTSIDE)")]
    UnknownType(String),

    #[error("{0} requires threshold2")]
    MissingSecondBound(ThresholdKind),

    #[error("{0} does not take threshold2")]
    UnexpectedSecondBound(ThresholdKind),

    #[error("{kind} requires threshold1 < threshold2, got {low} >= {high}")]
    InvertedBounds { kind: ThresholdKind, low: f64, high: f64 },

    #[error("threshold must be a finite number, got {0}")]
    NonFiniteBound(f64),
}

/// Failure while evaluating a single reading. Caught at the per-alarm
/// sweep boundary; the alarm is skipped for that cycle.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvalError {
    #[error("unparseable timestamp '{0}' (expected YYYY-MM-DD HH:MM[:SS])")]
    UnparseableTimestamp(String),
}
