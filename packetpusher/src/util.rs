//! Clock and unit helpers shared by telemetry and reporting.
use std::time::{SystemTime, UNIX_EPOCH};

const BYTES_PER_MEGABYTE: f64 = 1024.0 * 1024.0;

/// Wall-clock seconds since the UNIX epoch.
///
/// Never returns 0.0 on a sane clock, which matters because a zero timestamp
/// means "unset" in [`Telemetry`](crate::Telemetry).
pub fn now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

pub fn to_megabytes(bytes: u64) -> f64 {
    bytes as f64 / BYTES_PER_MEGABYTE
}

/// Rounds to `places` decimal places.
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// `amount / seconds`, or 0 for an empty or negative window.
pub fn per_second(amount: f64, seconds: f64) -> f64 {
    if seconds > 0.0 {
        amount / seconds
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_is_set() {
        assert!(now_secs() > 0.0);
    }

    #[test]
    fn test_to_megabytes() {
        assert_eq!(to_megabytes(0), 0.0);
        assert_eq!(to_megabytes(1024 * 1024), 1.0);
        assert_eq!(to_megabytes(512 * 1024), 0.5);
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(1.23456, 2), 1.23);
        assert_eq!(round_to(1.23456, 4), 1.2346);
        assert_eq!(round_to(2.0, 2), 2.0);
    }

    #[test]
    fn test_per_second_empty_window() {
        assert_eq!(per_second(100.0, 0.0), 0.0);
        assert_eq!(per_second(100.0, -1.0), 0.0);
        assert_eq!(per_second(100.0, 4.0), 25.0);
    }
}
