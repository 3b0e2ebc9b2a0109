//! Local heading convention used by the trajectory simplifier
//!
//! The bearing is measured on a unit circle laid over the (longitude, latitude)
//! plane: 0° points east, 90° north, 180° west and 270° south. Rotate by 90°
//! counterclockwise to get a compass heading. Only differences between two
//! bearings are ever consumed, so the offset from true north does not matter.
//!
//! The quadrant is picked by branching on the sign of each delta, and each
//! branch takes a plain `atan` of a slope it has already signed. Do not fold
//! this into `atan2`: the branch arithmetic is what the recorded test vectors
//! were produced with.

use crate::types::Fix;
use std::f64::consts::PI;

/// Bearing of a straight line due north
pub const NORTH_DEG: f64 = 90.0;
/// Bearing of a straight line due south
pub const SOUTH_DEG: f64 = 270.0;

/// Bearing in degrees, in `[0, 360)`, of the segment going from `from` to `to`
pub fn bearing(from: &Fix, to: &Fix) -> f64 {
    bearing_between(from.lat, from.long, to.lat, to.long)
}

/// Coordinate-level variant of [`bearing`]
pub fn bearing_between(from_lat: f64, from_long: f64, to_lat: f64, to_long: f64) -> f64 {
    if to_long == from_long {
        if to_lat == from_lat {
            return 0.0;
        } else if to_lat > from_lat {
            return NORTH_DEG;
        } else {
            return SOUTH_DEG;
        }
    }

    let angle = if to_long > from_long {
        // heading east
        if to_lat > from_lat {
            let slope = (to_lat - from_lat) / (from_long - to_long);
            -atan_degrees(slope)
        } else {
            let slope = (from_lat - to_lat) / (from_long - to_long);
            atan_degrees(slope) + 360.0
        }
    } else {
        // heading west
        if to_lat > from_lat {
            let slope = (to_lat - from_lat) / (to_long - from_long);
            180.0 + atan_degrees(slope)
        } else {
            let slope = (from_lat - to_lat) / (to_long - from_long);
            180.0 - atan_degrees(slope)
        }
    };

    // due east comes out of the south-east branch as 360
    if angle >= 360.0 {
        angle - 360.0
    } else {
        angle
    }
}

/// Absolute difference between two bearings, no wrap-around
///
/// A swing from 359° to 1° counts as 358°.
pub fn heading_change(old_bearing: f64, new_bearing: f64) -> f64 {
    (old_bearing - new_bearing).abs()
}

/// True when the path `previous -> from -> to` bends by more than `threshold_deg`
pub fn turned(previous: &Fix, from: &Fix, to: &Fix, threshold_deg: f64) -> bool {
    let old_bearing = bearing(previous, from);
    let new_bearing = bearing(from, to);
    heading_change(old_bearing, new_bearing) > threshold_deg
}

fn atan_degrees(slope: f64) -> f64 {
    (slope.atan() / (PI * 2.0)) * 360.0
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-9;

    fn at(lat: f64, long: f64) -> Fix {
        Fix::at(0, lat, long)
    }

    fn assert_bearing(to: Fix, expected: f64) {
        let from = at(37.0, -89.0);
        let got = bearing(&from, &to);
        assert!(
            (got - expected).abs() < EPSILON,
            "bearing to ({}, {}) = {got}, expected {expected}",
            to.lat,
            to.long
        );
    }

    #[test]
    fn test_reference_vectors() {
        assert_bearing(at(39.0, -87.0), 45.0); // northeast
        assert_bearing(at(38.0, -87.0), 26.565051177077986); // more east than north
        assert_bearing(at(35.0, -87.0), 315.0); // southeast
        assert_bearing(at(36.0, -87.0), 333.434948822922); // more east than south
        assert_bearing(at(39.0, -91.0), 135.0); // northwest
        assert_bearing(at(38.0, -91.0), 153.43494882292202); // more west than north
        assert_bearing(at(35.0, -91.0), 225.0); // southwest
        assert_bearing(at(36.0, -91.0), 206.56505117707798); // more west than south
    }

    #[test]
    fn test_axis_cases() {
        let p = at(37.0, -89.0);
        assert_eq!(bearing(&p, &p), 0.0);
        assert_eq!(bearing(&p, &at(38.0, -89.0)), NORTH_DEG);
        assert_eq!(bearing(&p, &at(36.0, -89.0)), SOUTH_DEG);
        assert_eq!(bearing(&p, &at(37.0, -88.0)), 0.0);
        assert_eq!(bearing(&p, &at(37.0, -90.0)), 180.0);
    }

    #[test]
    fn test_range_is_half_open() {
        let from = at(37.0, -89.0);
        for (dlat, dlong) in [(1.0, 1.0), (-1e-9, 1.0), (0.0, 1.0), (-3.0, -0.5), (2.0, -7.0)] {
            let b = bearing(&from, &at(37.0 + dlat, -89.0 + dlong));
            assert!((0.0..360.0).contains(&b), "{b} out of range");
        }
    }

    #[test]
    fn test_reverse_differs_by_half_turn() {
        let a = at(37.0, -89.0);
        for b in [
            at(39.0, -87.0),
            at(38.0, -87.0),
            at(36.0, -87.0),
            at(38.0, -91.0),
            at(36.0, -91.0),
            at(40.0, -89.0),
            at(37.0, -85.0),
        ] {
            let forward = bearing(&a, &b);
            let reverse = bearing(&b, &a);
            let diff = (reverse - forward).rem_euclid(360.0);
            assert!((diff - 180.0).abs() < EPSILON, "forward {forward} reverse {reverse}");
        }
    }

    #[test]
    fn test_turned_is_strict() {
        let previous = at(37.0, -89.0);
        let from = at(38.0, -89.0); // 90
        let straight = at(39.0, -89.0);
        let left = at(39.0, -90.0); // 135
        assert!(!turned(&previous, &from, &straight, 5.0));
        assert!(turned(&previous, &from, &left, 5.0));
        assert!(!turned(&previous, &from, &left, 45.0));
    }

    #[test]
    fn test_heading_change_does_not_wrap() {
        assert_eq!(heading_change(359.0, 1.0), 358.0);
        assert_eq!(heading_change(10.0, 15.0), 5.0);
    }
}
