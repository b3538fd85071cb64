use chrono::{DateTime, Duration, Local, NaiveDateTime};

pub const DEFAULT_VALIDITY_MINUTES: i64 = 60;
/// One year.
pub const MAX_VALIDITY_MINUTES: i64 = 525_600;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// Validity window in minutes; anything outside `(0, MAX_VALIDITY_MINUTES]` becomes the default.
pub fn normalize_minutes(minutes: Option<i64>) -> i64 {
    match minutes {
        Some(minutes) if minutes > 0 && minutes <= MAX_VALIDITY_MINUTES => minutes,
        _ => DEFAULT_VALIDITY_MINUTES,
    }
}

pub fn generate_expiration_time(now: NaiveDateTime, minutes: Option<i64>) -> NaiveDateTime {
    let expires_at = now + Duration::minutes(normalize_minutes(minutes));
    log::debug!("Expiration time generated: {}", expires_at);
    expires_at
}

/// ISO-8601 local naive timestamp, as stored in key documents.
pub fn format_timestamp(timestamp: NaiveDateTime) -> String {
    timestamp.format(TIMESTAMP_FORMAT).to_string()
}

/// Reads a stored timestamp. Offset-qualified values are converted to local time.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    if let Ok(timestamp) = NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT) {
        return Some(timestamp);
    }
    if let Ok(timestamp) = value.parse::<NaiveDateTime>() {
        return Some(timestamp);
    }
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|timestamp| timestamp.with_timezone(&Local).naive_local())
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn noon() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    #[test]
    fn invalid_windows_default_to_an_hour() {
        for minutes in [None, Some(0), Some(-5), Some(MAX_VALIDITY_MINUTES + 1)] {
            assert_eq!(normalize_minutes(minutes), DEFAULT_VALIDITY_MINUTES, "{minutes:?}");
        }
        assert_eq!(normalize_minutes(Some(1)), 1);
        assert_eq!(normalize_minutes(Some(MAX_VALIDITY_MINUTES)), MAX_VALIDITY_MINUTES);
    }

    #[test]
    fn expiration_is_now_plus_window() {
        assert_eq!(
            generate_expiration_time(noon(), Some(30)),
            noon() + Duration::minutes(30)
        );
        assert_eq!(
            generate_expiration_time(noon(), Some(0)),
            noon() + Duration::minutes(60)
        );
    }

    #[test]
    fn timestamps_parse_back() {
        let timestamp = noon() + Duration::milliseconds(1500);
        let formatted = format_timestamp(timestamp);

        assert_eq!(formatted, "2025-03-01T12:00:01.500");
        assert_eq!(parse_timestamp(&formatted), Some(timestamp));
        assert_eq!(parse_timestamp("2025-03-01T12:00:00"), Some(noon()));
        assert!(parse_timestamp("2025-03-01T12:00:00+00:00").is_some());
    }

    #[test]
    fn garbage_timestamps_do_not_parse() {
        assert_eq!(parse_timestamp("tomorrow"), None);
        assert_eq!(parse_timestamp(""), None);
        assert_eq!(parse_timestamp("2025-13-45T99:00:00"), None);
    }
}
