use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use chrono_tz::Tz;

/// Local timestamp layout used for event times and "now"
pub const LOCAL_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Shorter layout accepted on input
const LOCAL_MINUTE_FORMAT: &str = "%Y-%m-%dT%H:%M";

/// Parse an ISO-8601 local timestamp without offset (`YYYY-MM-DDTHH:MM[:SS]`)
pub fn parse_local_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    NaiveDateTime::parse_from_str(value, LOCAL_TIMESTAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(value, LOCAL_MINUTE_FORMAT))
        .ok()
}

/// Format a local timestamp as `YYYY-MM-DDTHH:MM:SS`
pub fn format_local_timestamp(value: &NaiveDateTime) -> String {
    value.format(LOCAL_TIMESTAMP_FORMAT).to_string()
}

/// End time used when an event is created without one
pub fn default_end_time(start: &NaiveDateTime) -> NaiveDateTime {
    *start + Duration::hours(1)
}

/// Wall-clock time in `timezone` at instant `now`
pub fn local_now(timezone: Tz, now: DateTime<Utc>) -> NaiveDateTime {
    now.with_timezone(&timezone).naive_local()
}

/// Current time in `timezone`, formatted as a local timestamp
pub fn current_datetime(timezone: Tz) -> String {
    format_local_timestamp(&local_now(timezone, Utc::now()))
}

/// RFC 3339 lower bound for "upcoming" event searches
pub fn search_lower_bound(timezone: Tz, now: DateTime<Utc>) -> String {
    now.with_timezone(&timezone).to_rfc3339()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_local_timestamp() {
        // Valid cases
        let parsed = parse_local_timestamp("2025-03-10T14:00:00").unwrap();
        assert_eq!(format_local_timestamp(&parsed), "2025-03-10T14:00:00");

        let parsed = parse_local_timestamp(" 2025-03-10T14:30 ").unwrap();
        assert_eq!(format_local_timestamp(&parsed), "2025-03-10T14:30:00");

        // Invalid cases
        assert_eq!(parse_local_timestamp("2025-03-10T14:00:00+01:00"), None); // Offset
        assert_eq!(parse_local_timestamp("2025-03-10T14:00:00Z"), None);
        assert_eq!(parse_local_timestamp("2025-03-10"), None); // Date only
        assert_eq!(parse_local_timestamp("tomorrow at 3"), None);
        assert_eq!(parse_local_timestamp("2025-02-30T10:00:00"), None); // No such day
    }

    #[test]
    fn test_default_end_time() {
        let start = parse_local_timestamp("2025-03-10T14:00:00").unwrap();
        assert_eq!(
            format_local_timestamp(&default_end_time(&start)),
            "2025-03-10T15:00:00"
        );

        // Crossing midnight and a month boundary
        let start = parse_local_timestamp("2025-03-31T23:30:00").unwrap();
        assert_eq!(
            format_local_timestamp(&default_end_time(&start)),
            "2025-04-01T00:30:00"
        );
    }

    #[test]
    fn test_local_now_applies_timezone() {
        // Summer time in London is UTC+1
        let now = Utc.with_ymd_and_hms(2025, 7, 1, 12, 0, 0).unwrap();
        assert_eq!(
            format_local_timestamp(&local_now(chrono_tz::Europe::London, now)),
            "2025-07-01T13:00:00"
        );

        // Winter time is UTC+0
        let now = Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap();
        assert_eq!(
            format_local_timestamp(&local_now(chrono_tz::Europe::London, now)),
            "2025-01-15T12:00:00"
        );
    }

    #[test]
    fn test_current_datetime_shape() {
        let now = current_datetime(chrono_tz::UTC);
        assert_eq!(now.len(), 19);
        assert!(parse_local_timestamp(&now).is_some());
    }

    #[test]
    fn test_search_lower_bound_has_offset() {
        let now = Utc.with_ymd_and_hms(2025, 7, 1, 12, 0, 0).unwrap();
        assert_eq!(
            search_lower_bound(chrono_tz::Europe::London, now),
            "2025-07-01T13:00:00+01:00"
        );
    }
}
