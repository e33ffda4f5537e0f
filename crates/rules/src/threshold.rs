//! Threshold comparison rules.
//!
//! A [`ThresholdRule`] is an immutable tagged value carried by exactly one
//! alarm. Its bounds are validated on construction; changing them means
//! building a new rule.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// The five comparison modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ThresholdKind {
    Below,
    Above,
    Equal,
    Between,
    Outside,
}

impl ThresholdKind {
    pub const ALL: [ThresholdKind; 5] = [
        ThresholdKind::Below,
        ThresholdKind::Above,
        ThresholdKind::Equal,
        ThresholdKind::Between,
        ThresholdKind::Outside,
    ];

    /// Whether this mode compares against a `(low, high)` pair.
    pub fn requires_two_bounds(self) -> bool {
        matches!(self, ThresholdKind::Between | ThresholdKind::Outside)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ThresholdKind::Below => "BELOW",
            ThresholdKind::Above => "ABOVE",
            ThresholdKind::Equal => "EQUAL",
            ThresholdKind::Between => "BETWEEN",
            ThresholdKind::Outside => "OUTSIDE",
        }
    }
}

impl fmt::Display for ThresholdKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ThresholdKind {
    type Err = ValidationError;

    /// Case-insensitive: the dashboard sends `BELOW`, older exports `below`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        ThresholdKind::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| ValidationError::UnknownType(s.to_string()))
    }
}

/// A validated comparison over one or two bounds.
///
/// `Equal` uses exact float equality. Sensor readings rarely hit a bound
/// exactly, so EQUAL alarms are a known precision hazard; no tolerance is
/// applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ThresholdRule {
    Below(f64),
    Above(f64),
    Equal(f64),
    Between { low: f64, high: f64 },
    Outside { low: f64, high: f64 },
}

impl ThresholdRule {
    /// Build a rule, enforcing the bound arity of `kind`.
    ///
    /// Two-bound modes need `bound2` present and `bound1 < bound2`;
    /// one-bound modes reject a present `bound2`.
    pub fn new(kind: ThresholdKind, bound1: f64, bound2: Option<f64>) -> Result<Self, ValidationError> {
        check_finite(bound1)?;
        if let Some(b2) = bound2 {
            check_finite(b2)?;
        }

        if kind.requires_two_bounds() {
            let high = bound2.ok_or(ValidationError::MissingSecondBound(kind))?;
            if bound1 >= high {
                return Err(ValidationError::InvertedBounds {
                    kind,
                    low: bound1,
                    high,
                });
            }
            return Ok(match kind {
                ThresholdKind::Between => ThresholdRule::Between { low: bound1, high },
                _ => ThresholdRule::Outside { low: bound1, high },
            });
        }

        if bound2.is_some() {
            return Err(ValidationError::UnexpectedSecondBound(kind));
        }

        Ok(match kind {
            ThresholdKind::Below => ThresholdRule::Below(bound1),
            ThresholdKind::Above => ThresholdRule::Above(bound1),
            _ => ThresholdRule::Equal(bound1),
        })
    }

    pub fn kind(&self) -> ThresholdKind {
        match self {
            ThresholdRule::Below(_) => ThresholdKind::Below,
            ThresholdRule::Above(_) => ThresholdKind::Above,
            ThresholdRule::Equal(_) => ThresholdKind::Equal,
            ThresholdRule::Between { .. } => ThresholdKind::Between,
            ThresholdRule::Outside { .. } => ThresholdKind::Outside,
        }
    }

    /// The single bound, or the low bound of a range.
    pub fn bound1(&self) -> f64 {
        match *self {
            ThresholdRule::Below(b) | ThresholdRule::Above(b) | ThresholdRule::Equal(b) => b,
            ThresholdRule::Between { low, .. } | ThresholdRule::Outside { low, .. } => low,
        }
    }

    /// The high bound of a range; `None` for one-bound modes.
    pub fn bound2(&self) -> Option<f64> {
        match *self {
            ThresholdRule::Between { high, .. } | ThresholdRule::Outside { high, .. } => Some(high),
            _ => None,
        }
    }

    /// Whether `value` fires this rule. BETWEEN is the open interval
    /// `(low, high)` and OUTSIDE is its exact complement, so a value sitting
    /// on a bound fires OUTSIDE and never BETWEEN.
    pub fn evaluate(&self, value: f64) -> bool {
        match *self {
            ThresholdRule::Below(b) => value < b,
            ThresholdRule::Above(b) => value > b,
            ThresholdRule::Equal(b) => value == b,
            ThresholdRule::Between { low, high } => low < value && value < high,
            ThresholdRule::Outside { low, high } => value <= low || value >= high,
        }
    }
}

impl fmt::Display for ThresholdRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThresholdRule::Below(b) => write!(f, "below {b}"),
            ThresholdRule::Above(b) => write!(f, "above {b}"),
            ThresholdRule::Equal(b) => write!(f, "equal to {b}"),
            ThresholdRule::Between { low, high } => write!(f, "between {low} and {high}"),
            ThresholdRule::Outside { low, high } => write!(f, "outside {low} and {high}"),
        }
    }
}

fn check_finite(bound: f64) -> Result<(), ValidationError> {
    if bound.is_finite() {
        Ok(())
    } else {
        Err(ValidationError::NonFiniteBound(bound))
    }
}
