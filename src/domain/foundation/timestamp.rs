//! Timestamp value object for immutable points in time.

use chrono::{DateTime, FixedOffset, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use super::ValidationError;

/// Offset-bearing layouts accepted besides strict RFC 3339.
const EXTRA_OFFSET_FORMATS: [&str; 3] = [
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M%:z",
    "%Y-%m-%d %H:%M%:z",
];

/// Immutable point in time, always UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Creates a timestamp for the current moment.
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Creates a timestamp from a DateTime<Utc>.
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Parses an ISO-8601 date-time that carries a UTC offset.
    ///
    /// Strings without an offset are rejected: a naive wall-clock time
    /// cannot be turned into an instant without guessing a zone.
    pub fn parse_iso8601(field: &str, value: &str) -> Result<Self, ValidationError> {
        let trimmed = value.trim();

        if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
            return Ok(Self::from_fixed(dt));
        }
        for format in EXTRA_OFFSET_FORMATS {
            if let Ok(dt) = DateTime::parse_from_str(trimmed, format) {
                return Ok(Self::from_fixed(dt));
            }
        }

        let reason = if NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f").is_ok() {
            format!("'{}' has no UTC offset", value)
        } else {
            format!("'{}' is not an ISO-8601 date-time", value)
        };
        Err(ValidationError::invalid_format(field, reason))
    }

    fn from_fixed(dt: DateTime<FixedOffset>) -> Self {
        Self(dt.with_timezone(&Utc))
    }

    /// Returns the inner DateTime.
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Formats as ISO-8601 with an explicit `+00:00` offset.
    pub fn to_iso8601(&self) -> String {
        self.0.to_rfc3339_opts(SecondsFormat::AutoSi, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};

    #[test]
    fn parses_rfc3339_with_utc_offset() {
        let ts = Timestamp::parse_iso8601("time", "2024-01-01T09:00:00+00:00").unwrap();
        assert_eq!(
            ts.as_datetime(),
            &Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap()
        );
    }

    #[test]
    fn normalizes_foreign_offsets_to_utc() {
        let ts = Timestamp::parse_iso8601("time", "2024-01-01T10:30:00+01:00").unwrap();
        assert_eq!(ts.as_datetime().hour(), 9);
        assert_eq!(ts.as_datetime().minute(), 30);
    }

    #[test]
    fn accepts_space_separator_and_fractional_seconds() {
        let ts = Timestamp::parse_iso8601("time", "2024-01-01 09:00:00.250000+00:00").unwrap();
        assert_eq!(ts.as_datetime().nanosecond(), 250_000_000);
    }

    #[test]
    fn accepts_minute_precision() {
        let ts = Timestamp::parse_iso8601("time", "2024-01-01T09:00+00:00").unwrap();
        assert_eq!(ts.as_datetime().hour(), 9);
    }

    #[test]
    fn rejects_naive_timestamps() {
        let err = Timestamp::parse_iso8601("timestamp", "2024-01-01T09:00:00").unwrap_err();
        assert!(err.to_string().contains("no UTC offset"));
    }

    #[test]
    fn rejects_garbage() {
        let err = Timestamp::parse_iso8601("time", "next tuesday").unwrap_err();
        assert!(err.to_string().contains("not an ISO-8601"));
    }

    #[test]
    fn formats_with_explicit_offset() {
        let ts = Timestamp::from_datetime(Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap());
        assert_eq!(ts.to_iso8601(), "2024-01-01T08:00:00+00:00");
    }

    #[test]
    fn ordering_follows_time() {
        let earlier = Timestamp::parse_iso8601("t", "2024-01-01T08:00:00+00:00").unwrap();
        let later = Timestamp::parse_iso8601("t", "2024-01-01T09:00:00+00:00").unwrap();
        assert!(earlier < later);
    }
}
