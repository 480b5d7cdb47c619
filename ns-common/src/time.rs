//! Timestamp utilities

use chrono::{DateTime, SecondsFormat, Timelike, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Current Unix time in milliseconds
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Format a timestamp for storage
///
/// Fixed-width RFC 3339 with microseconds, so stored values sort lexically
/// in chronological order.
pub fn to_storage(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Drop sub-microsecond precision so a value equals its stored round trip
pub fn storage_precision(ts: &DateTime<Utc>) -> DateTime<Utc> {
    ts.with_nanosecond(ts.nanosecond() / 1_000 * 1_000)
        .unwrap_or(*ts)
}

/// Parse a timestamp written by [`to_storage`]
pub fn from_storage(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_now_returns_recent_timestamp() {
        let timestamp = now();
        assert!(timestamp.timestamp() > 946_684_800); // 2000-01-01 00:00:00 UTC
        assert!(timestamp.timestamp() < 4_102_444_800); // 2100-01-01 00:00:00 UTC
    }

    #[test]
    fn test_storage_format_round_trips() {
        let ts = Utc.with_ymd_and_hms(2025, 3, 18, 9, 30, 0).unwrap();
        let stored = to_storage(&ts);
        assert_eq!(stored, "2025-03-18T09:30:00.000000Z");
        assert_eq!(from_storage(&stored), Some(ts));
    }

    #[test]
    fn test_storage_format_sorts_chronologically() {
        let earlier = Utc.with_ymd_and_hms(2025, 2, 28, 23, 59, 59).unwrap();
        let later = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
        assert!(to_storage(&earlier) < to_storage(&later));
    }

    #[test]
    fn test_storage_precision_matches_round_trip() {
        let ts = Utc
            .with_ymd_and_hms(2025, 3, 18, 9, 30, 0)
            .unwrap()
            .with_nanosecond(123_456_789)
            .unwrap();
        let truncated = storage_precision(&ts);
        assert_eq!(truncated.nanosecond(), 123_456_000);
        assert_eq!(from_storage(&to_storage(&ts)), Some(truncated));
    }

    #[test]
    fn test_from_storage_rejects_garbage() {
        assert!(from_storage("yesterday").is_none());
    }
}
