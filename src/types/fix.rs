#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// One normalized position sample assembled from an NMEA burst
///
/// `captured_at_us` is stamped when the burst is aggregated, not parsed from
/// the sentences (those only carry a time of day). Altitude, speed and heading
/// stay at zero unless the matching sentence was present in the burst.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Fix {
    pub captured_at_us: u64,
    pub lat: f64,
    pub long: f64,
    pub altitude_feet: f64,
    pub speed_mph: f64,
    pub heading_deg: f64,
    pub num_satellites: u32,
}

impl Fix {
    /// Position-only fix, mostly useful for batch input and tests
    pub fn at(captured_at_us: u64, lat: f64, long: f64) -> Self {
        Self {
            captured_at_us,
            lat,
            long,
            ..Self::default()
        }
    }

    /// A fix is usable only if latitude was filled and does not mirror longitude.
    ///
    /// Both fields default to zero, so an unparsed burst trips the first check;
    /// the second catches bursts where both fields got the same garbage value.
    pub fn is_valid(&self) -> bool {
        self.lat != 0.0 && self.lat != self.long
    }

    /// True if both fixes sit on exactly the same coordinates
    pub fn same_position(&self, other: &Fix) -> bool {
        self.lat == other.lat && self.long == other.long
    }
}

/// A retained fix, identified by its index in the ordered input sequence
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Waypoint {
    pub index: usize,
    pub fix: Fix,
}

impl Waypoint {
    pub fn new(index: usize, fix: Fix) -> Self {
        Self { index, fix }
    }

    pub fn captured_at_us(&self) -> u64 {
        self.fix.captured_at_us
    }
}
