//! Time helpers shared by the storage and auth modules.
//!
//! Timestamps are persisted as RFC 3339 strings in UTC so that records
//! written by one build stay readable by another.

use chrono::{DateTime, SecondsFormat, Utc};

/// Returns the current Unix timestamp in milliseconds.
pub fn now_timestamp_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Returns the current time as an RFC 3339 string (millisecond precision).
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parses an RFC 3339 timestamp, returning `None` for anything malformed.
pub fn parse_rfc3339(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_timestamp_millis_is_reasonable() {
        let ts = now_timestamp_millis();
        // Should be after 2024-01-01 in millis
        assert!(ts > 1_704_067_200_000, "Timestamp {} is too old", ts);
    }

    #[test]
    fn test_rfc3339_round_trip() {
        let now = now_rfc3339();
        assert!(now.ends_with('Z'));
        assert!(parse_rfc3339(&now).is_some());
        assert!(parse_rfc3339("yesterday").is_none());
    }
}
