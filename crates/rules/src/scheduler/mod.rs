//! Daily check-time scheduling.
//!
//! The monitor wakes at a fixed set of wall-clock times every day. This
//! module turns that list into the next wake instant; it holds no state.

mod daily;


pub use self::daily::{next_run_time, CheckTime, DailySchedule, ScheduleError};
