//! Utility module
//!
//! Small conversions shared by the clock and configuration code.

use std::time::Duration;

/// Converts a duration to whole milliseconds, saturating at `u64::MAX`
pub fn duration_to_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Formats a temperature for the responder status table
pub fn format_temperature(celsius: f32) -> String {
    format!("{celsius:.2}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_conversion() {
        assert_eq!(duration_to_millis(Duration::from_secs_f64(1.5)), 1500);
        assert_eq!(duration_to_millis(Duration::from_micros(999)), 0);
        assert_eq!(duration_to_millis(Duration::MAX), u64::MAX);
    }

    #[test]
    fn test_format_temperature() {
        assert_eq!(format_temperature(24.5), "24.50");
        assert_eq!(format_temperature(-3.0), "-3.00");
    }
}
