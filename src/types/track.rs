use crate::types::{Fix, Waypoint};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Counters collected while loading or recording a track
#[derive(Debug, Default, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TrackStats {
    pub total_records: u32,
    pub invalid_records: u32,
    pub failed_bursts: u32,
    pub start_time_us: u64,
    pub end_time_us: u64,
}

/// An ordered trajectory and the waypoints retained from it
#[derive(Debug, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Track {
    pub name: String,
    pub fixes: Vec<Fix>,
    pub waypoints: Vec<Waypoint>,
    pub stats: TrackStats,
}

impl Track {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Build a track from fixes already sorted and validity-filtered
    pub fn from_fixes(name: impl Into<String>, fixes: Vec<Fix>) -> Self {
        let mut track = Self::new(name);
        track.stats.total_records = fixes.len() as u32;
        track.fixes = fixes;
        track.refresh_time_span();
        track
    }

    /// Append a fix recorded live
    pub fn push_fix(&mut self, fix: Fix) {
        if self.fixes.is_empty() {
            self.stats.start_time_us = fix.captured_at_us;
        }
        self.stats.end_time_us = fix.captured_at_us;
        self.stats.total_records += 1;
        self.fixes.push(fix);
    }

    pub fn refresh_time_span(&mut self) {
        if let (Some(first), Some(last)) = (self.fixes.first(), self.fixes.last()) {
            self.stats.start_time_us = first.captured_at_us;
            self.stats.end_time_us = last.captured_at_us;
        }
    }

    /// Get the duration of the track in microseconds
    pub fn duration_us(&self) -> u64 {
        self.stats
            .end_time_us
            .saturating_sub(self.stats.start_time_us)
    }

    /// Get the duration of the track in seconds
    pub fn duration_seconds(&self) -> f64 {
        self.duration_us() as f64 / 1_000_000.0
    }

    /// Fraction of fixes that survived simplification
    pub fn retention_ratio(&self) -> f64 {
        if self.fixes.is_empty() {
            return 0.0;
        }
        self.waypoints.len() as f64 / self.fixes.len() as f64
    }
}
