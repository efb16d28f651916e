/// Reading age and staleness.
///
/// Sensor units uplink every few minutes under normal conditions. A reading
/// that has not been replaced within the freshness window may mean the
/// device or the network path is down, so the resolver goes looking for
/// something newer.
///
/// # Clock injection
/// Every function takes `now` rather than calling `Utc::now()`, so tests are
/// deterministic without mocking time.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::model::ValidationError;

// ---------------------------------------------------------------------------
// Timestamp parsing
// ---------------------------------------------------------------------------

/// Parses an RFC 3339 timestamp (any offset) into UTC.
///
/// TTN sends nanosecond precision with a `Z` suffix; other producers use
/// numeric offsets. Both are accepted.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, ValidationError> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| ValidationError::InvalidTimestamp(format!("{:?}: {}", raw, e)))
}

// ---------------------------------------------------------------------------
// Staleness check
// ---------------------------------------------------------------------------

/// Whole seconds between `recorded_at` and `now`. Negative when the reading
/// claims to be from the future.
pub fn age_seconds(recorded_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - recorded_at).num_seconds()
}

/// Returns `true` if the reading is older than `window` relative to `now`.
///
/// Staleness is strictly greater than the window:
///   age > window  →  stale
///   age == window →  fresh
///
/// Readings timestamped in the future are never stale.
pub fn is_stale_at(recorded_at: DateTime<Utc>, window: Duration, now: DateTime<Utc>) -> bool {
    now - recorded_at > window
}

/// Convenience wrapper that uses the real current time.
/// Use `is_stale_at` in tests to keep them deterministic.
pub fn is_stale(recorded_at: DateTime<Utc>, window: Duration) -> bool {
    is_stale_at(recorded_at, window, Utc::now())
}

// ---------------------------------------------------------------------------
// Freshness badge
// ---------------------------------------------------------------------------

/// Coarse freshness shown next to the current reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Freshness {
    /// Under 5 minutes old.
    VeryFresh,
    /// Under 15 minutes old.
    Recent,
    /// Under an hour old.
    Older,
    Stale,
    /// No timestamp to judge by.
    Unknown,
}

impl Freshness {
    pub fn from_age(age_seconds: Option<i64>) -> Self {
        match age_seconds {
            None => Freshness::Unknown,
            Some(s) if s < 5 * 60 => Freshness::VeryFresh,
            Some(s) if s < 15 * 60 => Freshness::Recent,
            Some(s) if s < 60 * 60 => Freshness::Older,
            Some(_) => Freshness::Stale,
        }
    }

    pub fn text(self) -> &'static str {
        match self {
            Freshness::VeryFresh => "Very Fresh",
            Freshness::Recent => "Recent",
            Freshness::Older => "Older",
            Freshness::Stale => "Stale",
            Freshness::Unknown => "Unknown",
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            Freshness::VeryFresh => "#10B981",
            Freshness::Recent => "#F59E0B",
            Freshness::Older => "#EF4444",
            Freshness::Stale | Freshness::Unknown => "#6B7280",
        }
    }
}

/// Compact age for display: `42s ago`, `7m ago`, `3h ago`, `2d ago`.
/// Zero, negative or missing ages render as `Unknown`.
pub fn format_data_age(age_seconds: Option<i64>) -> String {
    let secs = match age_seconds {
        Some(s) if s > 0 => s,
        _ => return "Unknown".to_string(),
    };
    let rounded = |unit: i64| ((secs as f64) / (unit as f64)).round() as i64;
    if secs < 60 {
        format!("{}s ago", secs)
    } else if secs < 3_600 {
        format!("{}m ago", rounded(60))
    } else if secs < 86_400 {
        format!("{}h ago", rounded(3_600))
    } else {
        format!("{}d ago", rounded(86_400))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(datetime: &str) -> DateTime<Utc> {
        parse_timestamp(datetime).expect("test timestamps are valid")
    }

    /// A fixed "now" used across all tests: 2024-05-01 13:00:00 UTC.
    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 13, 0, 0).unwrap()
    }

    fn window() -> Duration {
        Duration::minutes(15)
    }

    // --- Not stale ----------------------------------------------------------

    #[test]
    fn test_reading_5_minutes_old_is_not_stale() {
        let recorded = at("2024-05-01T12:55:00.000+00:00");
        assert!(!is_stale_at(recorded, window(), fixed_now()));
    }

    #[test]
    fn test_reading_exactly_at_window_is_not_stale() {
        // Age == window is still fresh (strictly greater than).
        let recorded = at("2024-05-01T12:45:00.000+00:00");
        assert!(!is_stale_at(recorded, window(), fixed_now()));
    }

    #[test]
    fn test_reading_with_offset_parsed_correctly() {
        // 08:00-05:00 == 13:00Z, exactly 0 minutes old.
        let recorded = at("2024-05-01T08:00:00.000-05:00");
        assert_eq!(age_seconds(recorded, fixed_now()), 0);
        assert!(!is_stale_at(recorded, window(), fixed_now()));
    }

    #[test]
    fn test_ttn_nanosecond_timestamp_parses() {
        let recorded = at("2024-05-01T12:59:30.123456789Z");
        assert_eq!(age_seconds(recorded, fixed_now()), 29);
    }

    #[test]
    fn test_future_reading_is_not_stale() {
        let recorded = at("2024-05-01T13:10:00Z");
        assert!(age_seconds(recorded, fixed_now()) < 0);
        assert!(!is_stale_at(recorded, window(), fixed_now()));
    }

    // --- Stale --------------------------------------------------------------

    #[test]
    fn test_reading_one_second_past_window_is_stale() {
        let recorded = at("2024-05-01T12:44:59Z");
        assert!(is_stale_at(recorded, window(), fixed_now()));
    }

    #[test]
    fn test_reading_20_minutes_old_is_stale() {
        let recorded = at("2024-05-01T12:40:00Z");
        assert!(is_stale_at(recorded, window(), fixed_now()));
    }

    #[test]
    fn test_same_reading_stale_under_tight_window_not_under_loose() {
        let recorded = at("2024-05-01T12:30:00.000+00:00");
        assert!(is_stale_at(recorded, Duration::minutes(20), fixed_now()));
        assert!(!is_stale_at(recorded, Duration::minutes(60), fixed_now()));
    }

    // --- Error handling -----------------------------------------------------

    #[test]
    fn test_invalid_datetime_returns_error() {
        let result = parse_timestamp("not-a-datetime");
        assert!(
            matches!(result, Err(ValidationError::InvalidTimestamp(_))),
            "unparseable datetime should return Err, got {:?}",
            result
        );
    }

    #[test]
    fn test_empty_datetime_returns_error() {
        assert!(parse_timestamp("").is_err());
    }

    // --- Badge and formatting -----------------------------------------------

    #[test]
    fn test_freshness_badge_steps() {
        assert_eq!(Freshness::from_age(None), Freshness::Unknown);
        assert_eq!(Freshness::from_age(Some(0)), Freshness::VeryFresh);
        assert_eq!(Freshness::from_age(Some(299)), Freshness::VeryFresh);
        assert_eq!(Freshness::from_age(Some(300)), Freshness::Recent);
        assert_eq!(Freshness::from_age(Some(899)), Freshness::Recent);
        assert_eq!(Freshness::from_age(Some(900)), Freshness::Older);
        assert_eq!(Freshness::from_age(Some(3_599)), Freshness::Older);
        assert_eq!(Freshness::from_age(Some(3_600)), Freshness::Stale);
        assert_eq!(Freshness::Stale.text(), "Stale");
    }

    #[test]
    fn test_format_data_age_units() {
        assert_eq!(format_data_age(None), "Unknown");
        assert_eq!(format_data_age(Some(0)), "Unknown");
        assert_eq!(format_data_age(Some(-5)), "Unknown");
        assert_eq!(format_data_age(Some(42)), "42s ago");
        assert_eq!(format_data_age(Some(90)), "2m ago");
        assert_eq!(format_data_age(Some(7_200)), "2h ago");
        assert_eq!(format_data_age(Some(3 * 86_400)), "3d ago");
    }
}
