//! General time utility functions

use chrono::{Duration, Utc};

/// Number of nanoseconds in a second
pub const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// Number of nanoseconds in a millisecond
pub const NANOS_PER_MILLI: u64 = 1_000_000;

/// Convert a duration into a number of seconds, or `None` if overflow
pub fn duration_to_seconds(duration: Duration) -> Option<f64> {
    duration
        .num_nanoseconds()
        .map(|ns| ns as f64 / NANOS_PER_SECOND as f64)
}

/// Current wall clock time as nanoseconds since the unix epoch.
///
/// Times before the epoch, or too far in the future to be represented, are saturated.
pub fn now_nanos() -> u64 {
    match Utc::now().timestamp_nanos_opt() {
        Some(ns) if ns > 0 => ns as u64,
        Some(_) => 0,
        None => u64::MAX,
    }
}

/// Convert milliseconds into nanoseconds.
pub fn millis_to_nanos(millis: u64) -> u64 {
    millis.saturating_mul(NANOS_PER_MILLI)
}

/// Convert a (non-negative) number of seconds into nanoseconds, negative values become zero.
pub fn seconds_to_nanos(seconds: f64) -> u64 {
    if seconds <= 0.0 {
        0
    } else {
        (seconds * NANOS_PER_SECOND as f64) as u64
    }
}

/// Returns true if a timestamp is no more than `window_nanos` older than `now_nanos`.
///
/// Timestamps ahead of `now_nanos` are considered fresh.
pub fn is_fresh(timestamp_nanos: u64, now_nanos: u64, window_nanos: u64) -> bool {
    now_nanos.saturating_sub(timestamp_nanos) <= window_nanos
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_freshness() {
        let now = 10_000_000_000;
        let window = millis_to_nanos(100);

        assert!(is_fresh(now, now, window));
        assert!(is_fresh(now - window, now, window));
        assert!(!is_fresh(now - window - 1, now, window));
        assert!(!is_fresh(now - millis_to_nanos(200), now, window));
        assert!(is_fresh(now + 5, now, window));
        assert!(!is_fresh(0, now, window));
    }

    #[test]
    fn test_conversions() {
        assert_eq!(millis_to_nanos(10), 10_000_000);
        assert_eq!(seconds_to_nanos(0.25), 250_000_000);
        assert_eq!(seconds_to_nanos(-1.0), 0);
        assert_eq!(
            duration_to_seconds(Duration::milliseconds(1500)),
            Some(1.5)
        );
        assert!(now_nanos() > 0);
    }
}
