//! Single-sentence decoding
//!
//! Framing, checksum and field grammar are delegated to the `nmea` crate. This
//! module only picks out the fields a [`Fix`](crate::types::Fix) carries from
//! the three sentence types the tracker consumes.

use crate::conversion::{convert_knots_to_kph, convert_kph_to_mph, convert_meters_to_feet};
use crate::error::{Result, TrakError};
use crate::types::Fix;
use nmea::ParseResult;

/// Field update extracted from one sentence
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldUpdate {
    /// GLL: authoritative position for the burst
    Position { lat: f64, long: f64 },
    /// GGA: altitude (already in feet) and satellites in use
    AltitudeSatellites { altitude_feet: f64, num_satellites: u32 },
    /// VTG: ground speed and true track
    Velocity { speed_mph: f64, heading_deg: f64 },
}

impl FieldUpdate {
    /// Fold this update into `fix`, overwriting whatever the fields held
    pub fn apply(&self, fix: &mut Fix) {
        match *self {
            FieldUpdate::Position { lat, long } => {
                fix.lat = lat;
                fix.long = long;
            }
            FieldUpdate::AltitudeSatellites {
                altitude_feet,
                num_satellites,
            } => {
                fix.altitude_feet = altitude_feet;
                fix.num_satellites = num_satellites;
            }
            FieldUpdate::Velocity {
                speed_mph,
                heading_deg,
            } => {
                fix.speed_mph = speed_mph;
                fix.heading_deg = heading_deg;
            }
        }
    }
}

/// Decode one `$`-prefixed sentence
///
/// Returns `Ok(None)` for well-formed sentences of other types, and for GLL
/// sentences whose position fields are empty (receiver has no fix yet).
pub fn decode_sentence(sentence: &str) -> Result<Option<FieldUpdate>> {
    let parsed = nmea::parse_str(sentence.trim())
        .map_err(|e| TrakError::Decode(format!("{}: {}", e, sentence.trim())))?;

    let update = match parsed {
        ParseResult::GLL(gll) => match (gll.latitude, gll.longitude) {
            (Some(lat), Some(long)) => Some(FieldUpdate::Position { lat, long }),
            _ => None,
        },
        ParseResult::GGA(gga) => Some(FieldUpdate::AltitudeSatellites {
            altitude_feet: convert_meters_to_feet(gga.altitude.unwrap_or(0.0) as f64),
            num_satellites: gga.fix_satellites.unwrap_or(0),
        }),
        ParseResult::VTG(vtg) => {
            let kph = convert_knots_to_kph(vtg.speed_over_ground.unwrap_or(0.0) as f64);
            Some(FieldUpdate::Velocity {
                speed_mph: convert_kph_to_mph(kph),
                heading_deg: vtg.true_course.unwrap_or(0.0) as f64,
            })
        }
        _ => None,
    };

    Ok(update)
}

/// Wrap a sentence body in `$...*hh` framing with a correct checksum
pub fn frame_sentence(body: &str) -> String {
    let checksum = body.bytes().fold(0u8, |acc, b| acc ^ b);
    format!("${}*{:02X}", body, checksum)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_gll_position() {
        let sentence = frame_sentence("GPGLL,3723.2475,N,12158.3416,W,161229.487,A,A");
        match decode_sentence(&sentence).unwrap() {
            Some(FieldUpdate::Position { lat, long }) => {
                assert!((lat - 37.387458).abs() < 1e-5);
                assert!((long + 121.972360).abs() < 1e-5);
            }
            other => panic!("unexpected update {:?}", other),
        }
    }

    #[test]
    fn test_decode_gga_converts_to_feet() {
        let sentence =
            frame_sentence("GPGGA,092750.000,5321.6802,N,00630.3372,W,1,8,1.03,61.7,M,55.2,M,,");
        match decode_sentence(&sentence).unwrap() {
            Some(FieldUpdate::AltitudeSatellites {
                altitude_feet,
                num_satellites,
            }) => {
                assert!((altitude_feet - 61.7 * 3.28084).abs() < 1e-3);
                assert_eq!(num_satellites, 8);
            }
            other => panic!("unexpected update {:?}", other),
        }
    }

    #[test]
    fn test_decode_vtg_speed_and_heading() {
        let sentence = frame_sentence("GPVTG,309.62,T,,M,13.00,N,24.08,K,A");
        match decode_sentence(&sentence).unwrap() {
            Some(FieldUpdate::Velocity {
                speed_mph,
                heading_deg,
            }) => {
                assert!((speed_mph - 13.0).abs() < 1e-3);
                assert!((heading_deg - 309.62).abs() < 1e-3);
            }
            other => panic!("unexpected update {:?}", other),
        }
    }

    #[test]
    fn test_other_sentence_types_are_ignored() {
        let sentence = frame_sentence("GPRMC,225446,A,4916.45,N,12311.12,W,000.5,054.7,191194,020.3,E");
        assert_eq!(decode_sentence(&sentence).unwrap(), None);
    }

    #[test]
    fn test_bad_checksum_is_decode_error() {
        let good = frame_sentence("GPGLL,3723.2475,N,12158.3416,W,161229.487,A,A");
        assert!(good.ends_with("*41"));
        let err = decode_sentence("$GPGLL,3723.2475,N,12158.3416,W,161229.487,A,A*42").unwrap_err();
        assert!(matches!(err, TrakError::Decode(_)));
    }

    #[test]
    fn test_truncated_sentence_is_decode_error() {
        assert!(decode_sentence("$GPGLL,3723.24").is_err());
    }

    #[test]
    fn test_apply_overwrites_fields() {
        let mut fix = Fix::default();
        FieldUpdate::Position {
            lat: 37.0,
            long: -89.0,
        }
        .apply(&mut fix);
        FieldUpdate::Position {
            lat: 38.0,
            long: -88.0,
        }
        .apply(&mut fix);
        assert_eq!((fix.lat, fix.long), (38.0, -88.0));
    }
}
