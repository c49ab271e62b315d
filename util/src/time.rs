//! General time utility functions

use chrono;

/// Number of nanoseconds in a second
pub const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// Convert a duration into a number of seconds, or `None` if overflow
pub fn duration_to_seconds(duration: chrono::Duration) -> Option<f64> {
    duration
        .num_nanoseconds()
        .map(|ns| ns as f64 / NANOS_PER_SECOND as f64)
}

/// Convert a number of seconds into a `std::time::Duration`.
///
/// Negative and NaN values give a zero duration, values too large to
/// represent (including infinity) saturate at `u64::MAX` seconds.
pub fn secs_to_duration(seconds: f64) -> std::time::Duration {
    if !(seconds > 0.0) {
        std::time::Duration::from_secs(0)
    }
    else if seconds >= u64::MAX as f64 {
        std::time::Duration::from_secs(u64::MAX)
    }
    else {
        std::time::Duration::from_secs_f64(seconds)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_duration_to_seconds() {
        let d = chrono::Duration::milliseconds(1500);
        assert_eq!(duration_to_seconds(d), Some(1.5));
    }

    #[test]
    fn test_secs_to_duration() {
        assert!((secs_to_duration(0.022).as_secs_f64() - 0.022).abs() < 1e-9);
        assert_eq!(secs_to_duration(-1.0), std::time::Duration::from_secs(0));
        assert_eq!(secs_to_duration(f64::NAN), std::time::Duration::from_secs(0));
        assert_eq!(secs_to_duration(f64::INFINITY), std::time::Duration::from_secs(u64::MAX));
        assert_eq!(secs_to_duration(1e300), std::time::Duration::from_secs(u64::MAX));
    }
}
