//! Reading timestamps as reported by the datalogger API.

use chrono::NaiveDateTime;

use crate::error::EvalError;

/// Accepted literal formats, tried in order.
const FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M", "%Y-%m-%d %H:%M:%S"];

/// Parse a reading timestamp in the process-local wall clock.
pub fn parse_timestamp(raw: &str) -> Result<NaiveDateTime, EvalError> {
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .ok_or_else(|| EvalError::UnparseableTimestamp(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn parses_minute_precision() {
        let ts = parse_timestamp("2024-03-04 10:15").unwrap();
        assert_eq!(
            ts,
            NaiveDate::from_ymd_opt(2024, 3, 4).unwrap().and_hms_opt(10, 15, 0).unwrap()
        );
    }

    #[test]
    fn parses_second_precision() {
        let ts = parse_timestamp("2024-03-04 10:15:42").unwrap();
        assert_eq!(
            ts,
            NaiveDate::from_ymd_opt(2024, 3, 4).unwrap().and_hms_opt(10, 15, 42).unwrap()
        );
    }

    #[test]
    fn rejects_other_shapes() {
        for raw in ["2024-03-04T10:15:42", "04/03/2024 10:15", "", "2024-03-04"] {
            assert_eq!(
                parse_timestamp(raw),
                Err(EvalError::UnparseableTimestamp(raw.to_string())),
                "input: {raw:?}"
            );
        }
    }
}
