//! Input filtering for stored and live fixes
//!
//! The simplifier expects fixes that already passed the validity rule and are
//! sorted by capture time. Batch loaders run their rows through these helpers
//! before simplifying; the aggregator applies the same validity rule itself.

use crate::types::{Fix, Track};

/// A fix is kept only if latitude is set and does not equal longitude
///
/// See [`Fix::is_valid`].
pub fn is_valid_fix(fix: &Fix) -> bool {
    fix.is_valid()
}

/// Drop invalid fixes, returning the survivors and how many were dropped
pub fn filter_valid_fixes(fixes: Vec<Fix>) -> (Vec<Fix>, u32) {
    let before = fixes.len();
    let valid: Vec<Fix> = fixes.into_iter().filter(is_valid_fix).collect();
    let dropped = (before - valid.len()) as u32;
    (valid, dropped)
}

/// True if capture times never go backwards
pub fn is_time_ordered(fixes: &[Fix]) -> bool {
    fixes
        .windows(2)
        .all(|pair| pair[0].captured_at_us <= pair[1].captured_at_us)
}

/// Sort by capture time, keeping the recorded order of equal timestamps
pub fn sort_by_capture_time(fixes: &mut [Fix]) {
    if !is_time_ordered(fixes) {
        fixes.sort_by_key(|fix| fix.captured_at_us);
    }
}

/// Decide whether a track is worth exporting
///
/// A track needs at least two fixes to describe a path. `force_export`
/// overrides the check.
///
/// # Returns
/// Tuple of (should_skip, reason_description)
pub fn should_skip_export(track: &Track, force_export: bool) -> (bool, String) {
    if force_export {
        return (false, String::new());
    }

    match track.fixes.len() {
        0 => (true, "no valid fixes".to_string()),
        1 => (true, "single fix, no path to draw".to_string()),
        _ => (false, String::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_valid_fixes_counts_dropped() {
        let fixes = vec![
            Fix::at(1, 37.0, -89.0),
            Fix::at(2, 0.0, -89.0),
            Fix::at(3, 5.5, 5.5),
            Fix::at(4, 37.1, -89.1),
        ];
        let (valid, dropped) = filter_valid_fixes(fixes);
        assert_eq!(dropped, 2);
        assert_eq!(
            valid.iter().map(|f| f.captured_at_us).collect::<Vec<_>>(),
            vec![1, 4]
        );
    }

    #[test]
    fn test_sort_is_stable() {
        let mut fixes = vec![
            Fix::at(3, 37.3, -89.0),
            Fix::at(1, 37.1, -89.0),
            Fix::at(1, 37.2, -89.0),
        ];
        assert!(!is_time_ordered(&fixes));
        sort_by_capture_time(&mut fixes);
        assert!(is_time_ordered(&fixes));
        assert_eq!(fixes[0].lat, 37.1);
        assert_eq!(fixes[1].lat, 37.2);
    }

    #[test]
    fn test_should_skip_export() {
        let mut track = Track::new("t");
        assert!(should_skip_export(&track, false).0);
        assert!(!should_skip_export(&track, true).0);

        track.push_fix(Fix::at(1, 37.0, -89.0));
        let (skip, reason) = should_skip_export(&track, false);
        assert!(skip);
        assert!(reason.contains("single fix"));

        track.push_fix(Fix::at(2, 37.1, -89.0));
        assert!(!should_skip_export(&track, false).0);
    }
}
