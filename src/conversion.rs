//! Unit conversion utilities
//!
//! NMEA reports altitude in meters and speed in km/h (VTG) or knots (RMC/VTG);
//! the fix log stores feet and miles per hour.

use crate::types::Fix;

/// Feet in one meter
pub const FEET_PER_METER: f64 = 3.28084;
/// Divisor applied to km/h ground speed for the stored speed column
pub const KPH_SPEED_DIVISOR: f64 = 1.852;
/// km/h in one knot
pub const KPH_PER_KNOT: f64 = 1.852;

pub const MICROS_PER_SECOND: u64 = 1_000_000;

/// Convert altitude from meters to feet
pub fn convert_meters_to_feet(meters: f64) -> f64 {
    meters * FEET_PER_METER
}

/// Convert VTG ground speed (km/h) to the stored speed unit
///
/// The divisor is the knot factor. Every fix log recorded so far used it, so
/// changing it would make old and new speed columns disagree.
pub fn convert_kph_to_mph(kph: f64) -> f64 {
    kph / KPH_SPEED_DIVISOR
}

/// Convert knots to km/h
pub fn convert_knots_to_kph(knots: f64) -> f64 {
    knots * KPH_PER_KNOT
}

pub fn seconds_to_micros(seconds: f64) -> u64 {
    (seconds * MICROS_PER_SECOND as f64).round() as u64
}

pub fn micros_to_seconds(micros: u64) -> f64 {
    micros as f64 / MICROS_PER_SECOND as f64
}

/// Format a fix the way a small character display shows it
///
/// One value per line: latitude, longitude, speed, altitude, heading, satellites.
pub fn format_fix_summary(fix: &Fix) -> String {
    format!(
        " {:3.6}\n {:3.6}\n  speed {:3.1}\n  alt {:.1}\n  hdg {:.1}\n  sats {}",
        fix.lat, fix.long, fix.speed_mph, fix.altitude_feet, fix.heading_deg, fix.num_satellites
    )
}

/// Render a microsecond unix timestamp as an ISO 8601 UTC string
pub fn format_unix_micros(timestamp_us: u64) -> String {
    let total_seconds = timestamp_us / MICROS_PER_SECOND;
    let microseconds = timestamp_us % MICROS_PER_SECOND;

    let secs_per_day = 86_400u64;
    let days = total_seconds / secs_per_day;
    let time_of_day = total_seconds % secs_per_day;
    let hours = time_of_day / 3600;
    let minutes = (time_of_day % 3600) / 60;
    let seconds = time_of_day % 60;

    let (year, month, day) = days_to_ymd(days);
    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}.{:06}Z",
        year, month, day, hours, minutes, seconds, microseconds
    )
}

/// Convert days since 1970-01-01 to a civil (year, month, day)
fn days_to_ymd(days: u64) -> (i64, u32, u32) {
    // Howard Hinnant's civil_from_days
    let z = days as i64 + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let m = (if mp < 10 { mp + 3 } else { mp - 9 }) as u32;
    let year = if m <= 2 { y + 1 } else { y };
    (year, m, d)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_conversions() {
        assert!((convert_meters_to_feet(100.0) - 328.084).abs() < 1e-9);
        assert!((convert_kph_to_mph(1.852) - 1.0).abs() < 1e-12);
        assert!((convert_knots_to_kph(10.0) - 18.52).abs() < 1e-9);
    }

    #[test]
    fn test_time_helpers() {
        assert_eq!(seconds_to_micros(10.0), 10_000_000);
        assert_eq!(seconds_to_micros(0.25), 250_000);
        assert!((micros_to_seconds(1_500_000) - 1.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_format_unix_micros() {
        assert_eq!(format_unix_micros(0), "1970-01-01T00:00:00.000000Z");
        // 2024-02-29T12:34:56.000789Z
        assert_eq!(
            format_unix_micros(1_709_210_096_000_789),
            "2024-02-29T12:34:56.000789Z"
        );
    }

    #[test]
    fn test_fix_summary_lines() {
        let fix = Fix {
            captured_at_us: 1,
            lat: 37.123456,
            long: -89.654321,
            altitude_feet: 512.34,
            speed_mph: 31.26,
            heading_deg: 270.0,
            num_satellites: 9,
        };
        let summary = format_fix_summary(&fix);
        let lines: Vec<&str> = summary.lines().collect();
        assert_eq!(lines.len(), 6);
        assert_eq!(lines[0], " 37.123456");
        assert_eq!(lines[1], " -89.654321");
        assert_eq!(lines[2], "  speed 31.3");
        assert_eq!(lines[5], "  sats 9");
    }
}
