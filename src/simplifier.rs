//! Trajectory simplifier
//!
//! Reduces an ordered stream of fixes to the waypoints needed to redraw the
//! path. A fix is retained when more than `interval_us` passed since the last
//! waypoint (time rule), or when the bearing from the last waypoint to the fix
//! differs by more than `turn_threshold_deg` from the bearing of the last
//! retained segment (turn rule). The first fix is always retained.
//!
//! Fixes must already be validity-filtered and sorted by capture time. Out of
//! order input does not panic but the retained set is meaningless.

use crate::bearing::{bearing, turned};
use crate::types::{Fix, Track, Waypoint};
use log::{debug, info};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// What to compare against while only the first waypoint exists
///
/// With a single waypoint there is no retained segment to measure a turn
/// against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum FirstSegment {
    /// The first fix away from waypoint 0 is held back and stands in for the
    /// last waypoint. A later fix that turns against the held segment retains
    /// both of them; a straight run retains neither.
    #[default]
    Provisional,
    /// The first fix away from waypoint 0 is retained right away, opening the
    /// first segment.
    Anchor,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SimplifierConfig {
    /// Longest gap between waypoints, microseconds
    pub interval_us: u64,
    /// Bearing change that counts as a turn, degrees
    pub turn_threshold_deg: f64,
    pub first_segment: FirstSegment,
}

impl Default for SimplifierConfig {
    fn default() -> Self {
        Self {
            interval_us: 10_000_000,
            turn_threshold_deg: 5.0,
            first_segment: FirstSegment::Provisional,
        }
    }
}

/// Running memory of the simplifier
///
/// Indices refer to positions in the input sequence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimplifierState {
    pub last_waypoint_time_us: u64,
    pub last_waypoint_idx: usize,
    pub previous_waypoint_idx: usize,
    /// Fix held by [`FirstSegment::Provisional`] before the second waypoint exists
    pub provisional_idx: Option<usize>,
}

impl SimplifierState {
    fn starting_at(fix: &Fix) -> Self {
        Self {
            last_waypoint_time_us: fix.captured_at_us,
            last_waypoint_idx: 0,
            previous_waypoint_idx: 0,
            provisional_idx: None,
        }
    }
}

/// Streaming simplifier over one trajectory
///
/// Retained waypoints form an append-only log; the last two entries are the
/// "previous" and "last" waypoints the turn rule measures against.
#[derive(Debug, Default)]
pub struct Simplifier {
    config: SimplifierConfig,
    state: Option<SimplifierState>,
    waypoints: Vec<Waypoint>,
    provisional: Option<Waypoint>,
    seen: usize,
}

impl Simplifier {
    pub fn new(config: SimplifierConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &SimplifierConfig {
        &self.config
    }

    /// `None` until the first fix arrives
    pub fn state(&self) -> Option<&SimplifierState> {
        self.state.as_ref()
    }

    pub fn waypoints(&self) -> &[Waypoint] {
        &self.waypoints
    }

    pub fn into_waypoints(self) -> Vec<Waypoint> {
        self.waypoints
    }

    /// Number of fixes pushed so far
    pub fn fixes_seen(&self) -> usize {
        self.seen
    }

    /// Feed the next fix, returning the waypoints it caused to be retained
    ///
    /// Usually empty or just the fix itself. A turn out of a held first
    /// segment retains the held fix too, so two waypoints come back in index
    /// order.
    pub fn push(&mut self, fix: Fix) -> &[Waypoint] {
        let index = self.seen;
        self.seen += 1;
        let before = self.waypoints.len();

        let state = match self.state {
            Some(state) => state,
            None => {
                self.state = Some(SimplifierState::starting_at(&fix));
                self.retain(index, fix);
                return &self.waypoints[before..];
            }
        };

        let elapsed = fix.captured_at_us.saturating_sub(state.last_waypoint_time_us);
        if elapsed > self.config.interval_us {
            debug!("fix {} retained by time rule, {} us since last waypoint", index, elapsed);
            self.release_provisional();
            self.retain(index, fix);
        } else if self.turn_detected(index, &fix) {
            self.retain(index, fix);
        }
        &self.waypoints[before..]
    }

    fn turn_detected(&mut self, index: usize, fix: &Fix) -> bool {
        let threshold = self.config.turn_threshold_deg;

        let origin = match self.waypoints.as_slice() {
            [.., previous, last] => {
                let turn = turned(&previous.fix, &last.fix, fix, threshold);
                if turn {
                    debug!(
                        "turned: old bearing {:.3}, new bearing {:.3}",
                        bearing(&previous.fix, &last.fix),
                        bearing(&last.fix, fix)
                    );
                }
                return turn;
            }
            [origin] => origin.fix,
            [] => return false,
        };

        if origin.same_position(fix) {
            return false;
        }

        match self.config.first_segment {
            FirstSegment::Anchor => true,
            FirstSegment::Provisional => match self.provisional {
                None => {
                    debug!("fix {} holds the first segment", index);
                    self.hold_provisional(Waypoint::new(index, *fix));
                    false
                }
                Some(held) if held.fix.same_position(fix) => false,
                Some(held) => {
                    if !turned(&origin, &held.fix, fix, threshold) {
                        return false;
                    }
                    debug!("turn after held fix {}", held.index);
                    self.release_provisional();
                    self.retain(held.index, held.fix);
                    true
                }
            },
        }
    }

    fn hold_provisional(&mut self, waypoint: Waypoint) {
        if let Some(state) = self.state.as_mut() {
            state.provisional_idx = Some(waypoint.index);
        }
        self.provisional = Some(waypoint);
    }

    fn release_provisional(&mut self) {
        if let Some(state) = self.state.as_mut() {
            state.provisional_idx = None;
        }
        self.provisional = None;
    }

    fn retain(&mut self, index: usize, fix: Fix) {
        if let Some(state) = self.state.as_mut() {
            state.previous_waypoint_idx = state.last_waypoint_idx;
            state.last_waypoint_idx = index;
            state.last_waypoint_time_us = fix.captured_at_us;
        }
        info!(
            "waypoint {} at {:.6},{:.6} (fix {})",
            self.waypoints.len(),
            fix.lat,
            fix.long,
            index
        );
        self.waypoints.push(Waypoint::new(index, fix));
    }
}

/// Simplify a stored, ordered trajectory in one pass
pub fn simplify(fixes: &[Fix], config: &SimplifierConfig) -> Vec<Waypoint> {
    let mut simplifier = Simplifier::new(config.clone());
    for fix in fixes {
        simplifier.push(*fix);
    }
    simplifier.into_waypoints()
}

/// Replace the waypoints of `track` with a fresh simplification of its fixes
pub fn simplify_track(track: &mut Track, config: &SimplifierConfig) {
    track.waypoints = simplify(&track.fixes, config);
    info!(
        "{}: kept {} of {} fixes",
        track.name,
        track.waypoints.len(),
        track.fixes.len()
    );
}
