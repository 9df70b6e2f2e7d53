use chrono::{DateTime, FixedOffset, LocalResult, NaiveDateTime, TimeZone};
use chrono_tz::Tz;
use thiserror::Error;

use crate::models::ClassTime;

#[derive(Debug, Error, PartialEq)]
pub enum TimezoneError {
    #[error("Invalid timezone: {0}")]
    Unknown(String),
    #[error("Local time {time} does not exist in {timezone}")]
    NonexistentLocalTime { time: NaiveDateTime, timezone: Tz },
}

pub fn parse_timezone(name: &str) -> Result<Tz, TimezoneError> {
    name.parse::<Tz>()
        .map_err(|_| TimezoneError::Unknown(name.to_string()))
}

/// Re-expresses the same instant in `target`.
pub fn convert<T: TimeZone>(dt: &DateTime<T>, target: Tz) -> DateTime<FixedOffset> {
    dt.with_timezone(&target).fixed_offset()
}

/// Attaches `source` to a wall-clock time. Ambiguous times (DST fold) resolve
/// to the earlier instant; times inside a DST gap are rejected.
pub fn localize(naive: NaiveDateTime, source: Tz) -> Result<DateTime<FixedOffset>, TimezoneError> {
    match source.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Ok(dt.fixed_offset()),
        LocalResult::Ambiguous(earliest, _) => Ok(earliest.fixed_offset()),
        LocalResult::None => Err(TimezoneError::NonexistentLocalTime {
            time: naive,
            timezone: source,
        }),
    }
}

impl ClassTime {
    /// Resolves to an instant expressed in `target`, localizing naive input in
    /// `source` first.
    pub fn resolve(self, source: Tz, target: Tz) -> Result<DateTime<FixedOffset>, TimezoneError> {
        let aware = match self {
            ClassTime::Aware(dt) => dt,
            ClassTime::Naive(naive) => localize(naive, source)?,
        };
        Ok(convert(&aware, target))
    }
}

pub fn format_in(dt: &DateTime<FixedOffset>, tz: Tz) -> String {
    dt.with_timezone(&tz).format("%Y-%m-%d %H:%M:%S %Z").to_string()
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};

    use super::*;

    fn naive(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, 0)
            .unwrap()
    }

    #[test]
    fn test_parse_timezone() {
        assert_eq!(parse_timezone("Asia/Kolkata").unwrap(), chrono_tz::Asia::Kolkata);
        assert_eq!(
            parse_timezone("Nowhere/City").unwrap_err(),
            TimezoneError::Unknown("Nowhere/City".to_string())
        );
    }

    #[test]
    fn test_convert_keeps_instant() {
        let utc = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
        let local = convert(&utc, chrono_tz::Asia::Kolkata);
        assert_eq!(local, utc);
        assert_eq!(local.offset().local_minus_utc(), 5 * 3600 + 30 * 60);
    }

    #[test]
    fn test_localize_naive() {
        let dt = localize(naive(2024, 1, 1, 10, 0), chrono_tz::Europe::Warsaw).unwrap();
        assert_eq!(dt.to_rfc3339(), "2024-01-01T10:00:00+01:00");
    }

    #[test]
    fn test_localize_dst_gap_rejected() {
        let gap = naive(2024, 3, 31, 2, 30);
        assert!(matches!(
            localize(gap, chrono_tz::Europe::Warsaw),
            Err(TimezoneError::NonexistentLocalTime { .. })
        ));
    }

    #[test]
    fn test_resolve_naive_in_source_then_target() {
        let time = ClassTime::Naive(naive(2024, 1, 1, 10, 0));
        let resolved = time.resolve(Tz::UTC, chrono_tz::Asia::Kolkata).unwrap();
        assert_eq!(resolved.to_rfc3339(), "2024-01-01T15:30:00+05:30");
    }

    #[test]
    fn test_format_in() {
        let dt = localize(naive(2024, 6, 1, 8, 0), Tz::UTC).unwrap();
        assert_eq!(
            format_in(&dt, chrono_tz::Europe::Warsaw),
            "2024-06-01 10:00:00 CEST"
        );
    }
}
