use crate::TypesError;
use chrono::{DateTime, NaiveDateTime, Utc};

/// The only timestamp layout accepted or produced on the wire.
///
/// Always UTC, always millisecond precision, e.g. `2024-03-01T07:30:00.000Z`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Render a UTC instant in the wire timestamp format.
///
/// Sub-millisecond precision is truncated.
pub fn format_timestamp(instant: &DateTime<Utc>) -> String {
    instant.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a wire timestamp.
///
/// Only the exact layout written by [`format_timestamp`] is accepted; offsets other than `Z`,
/// missing milliseconds and surrounding whitespace are all rejected.
pub fn parse_timestamp(text: &str) -> Result<DateTime<Utc>, TypesError> {
    let invalid = || TypesError::InvalidTimestamp(text.to_owned());

    // `%.3f` is lenient about digit count, so pin the shape first.
    let bytes = text.as_bytes();
    if bytes.len() != 24 || bytes[19] != b'.' || bytes[23] != b'Z' {
        return Err(invalid());
    }

    NaiveDateTime::parse_from_str(text, TIMESTAMP_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|_| invalid())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};

    #[test]
    fn formats_with_milliseconds() {
        let instant = Utc.with_ymd_and_hms(2024, 3, 1, 7, 30, 0).unwrap();
        assert_eq!(format_timestamp(&instant), "2024-03-01T07:30:00.000Z");
    }

    #[test]
    fn parse_accepts_formatted_output() {
        let instant = Utc
            .with_ymd_and_hms(2023, 12, 31, 23, 59, 59)
            .unwrap()
            .with_nanosecond(250_000_000)
            .unwrap();
        let text = format_timestamp(&instant);
        assert_eq!(parse_timestamp(&text).expect("own output parses"), instant);
    }

    #[test]
    fn parse_rejects_other_layouts() {
        for bad in [
            "2024-03-01T07:30:00Z",
            "2024-03-01T07:30:00.000+00:00",
            "2024-03-01 07:30:00.000Z",
            " 2024-03-01T07:30:00.000Z",
            "2024-13-01T07:30:00.000Z",
            "",
        ] {
            let err = parse_timestamp(bad).expect_err("layout must be rejected");
            assert!(matches!(err, TypesError::InvalidTimestamp(ref t) if t == bad));
        }
    }
}
