use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveTime, TimeZone};
use serde::{Serialize, Serializer};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScheduleError {
    #[error("no check times configured")]
    EmptySchedule,

    #[error("invalid check time '{0}' (expected HH:MM)")]
    InvalidTime(String),

    #[error("next check time is outside the representable date range")]
    OutOfRange,
}

/// One daily wall-clock time, minute precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CheckTime(NaiveTime);

impl CheckTime {
    pub fn new(hour: u32, minute: u32) -> Option<Self> {
        NaiveTime::from_hms_opt(hour, minute, 0).map(Self)
    }

    pub fn time(self) -> NaiveTime {
        self.0
    }
}

impl FromStr for CheckTime {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NaiveTime::parse_from_str(s.trim(), "%H:%M")
            .map(Self)
            .map_err(|_| ScheduleError::InvalidTime(s.to_string()))
    }
}

impl fmt::Display for CheckTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%H:%M"))
    }
}

impl Serialize for CheckTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A validated, sorted, duplicate-free list of daily check times.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailySchedule {
    times: Vec<CheckTime>,
}

impl DailySchedule {
    pub fn new(mut times: Vec<CheckTime>) -> Result<Self, ScheduleError> {
        if times.is_empty() {
            return Err(ScheduleError::EmptySchedule);
        }
        times.sort();
        times.dedup();
        Ok(Self { times })
    }

    /// Parse `"HH:MM"` strings. Any invalid entry rejects the whole list.
    pub fn from_strings<I, S>(raw: I) -> Result<Self, ScheduleError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let times = raw
            .into_iter()
            .map(|s| s.as_ref().parse())
            .collect::<Result<Vec<CheckTime>, _>>()?;
        Self::new(times)
    }

    pub fn times(&self) -> &[CheckTime] {
        &self.times
    }

    /// The first check instant strictly after `now`.
    pub fn next_after<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Result<DateTime<Tz>, ScheduleError> {
        next_candidate(now, &self.times)
    }
}

/// Next wake instant for a list of daily `"HH:MM"` times.
///
/// Builds each time for today and tomorrow in `now`'s time zone, keeps the
/// candidates strictly after `now` and returns the earliest. A local time
/// that does not exist (DST gap) is skipped; an ambiguous one (DST
/// overlap) resolves to its earlier instant.
pub fn next_run_time<Tz, S>(now: &DateTime<Tz>, times: &[S]) -> Result<DateTime<Tz>, ScheduleError>
where
    Tz: TimeZone,
    S: AsRef<str>,
{
    let parsed = times
        .iter()
        .map(|s| s.as_ref().parse())
        .collect::<Result<Vec<CheckTime>, _>>()?;
    next_candidate(now, &parsed)
}

fn next_candidate<Tz: TimeZone>(now: &DateTime<Tz>, times: &[CheckTime]) -> Result<DateTime<Tz>, ScheduleError> {
    if times.is_empty() {
        return Err(ScheduleError::EmptySchedule);
    }
    let tz = now.timezone();
    let today = now.date_naive();
    let tomorrow = today.succ_opt().ok_or(ScheduleError::OutOfRange)?;

    [today, tomorrow]
        .into_iter()
        .flat_map(|day| times.iter().map(move |t| day.and_time(t.time())))
        .filter_map(|local| tz.from_local_datetime(&local).earliest())
        .filter(|candidate| candidate > now)
        .min()
        .ok_or(ScheduleError::OutOfRange)
}
