//! Time sources for stamping fixes
//!
//! The aggregator never reads the wall clock directly. It asks a [`Clock`] for
//! the current time and for its pauses, so replays and tests can drive time
//! by hand.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub trait Clock: Send {
    /// Current time in microseconds
    fn now_us(&self) -> u64;

    /// Block for `duration` as measured by this clock
    fn sleep(&self, duration: Duration);
}

/// Wall clock, microseconds since the unix epoch
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_us(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros() as u64)
            .unwrap_or(0)
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Hand-driven clock; `sleep` advances it instead of blocking
///
/// Clones share the same time, so a test can keep one handle while the
/// aggregator thread owns another.
#[derive(Debug, Default, Clone)]
pub struct ManualClock {
    now_us: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn starting_at(now_us: u64) -> Self {
        Self {
            now_us: Arc::new(AtomicU64::new(now_us)),
        }
    }

    pub fn advance(&self, duration: Duration) {
        self.now_us
            .fetch_add(duration.as_micros() as u64, Ordering::SeqCst);
    }

    pub fn set(&self, now_us: u64) {
        self.now_us.store(now_us, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_us(&self) -> u64 {
        self.now_us.load(Ordering::SeqCst)
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_sleep_advances() {
        let clock = ManualClock::starting_at(1_000);
        let shared = clock.clone();
        clock.sleep(Duration::from_millis(100));
        assert_eq!(shared.now_us(), 101_000);
        shared.set(5);
        assert_eq!(clock.now_us(), 5);
    }

    #[test]
    fn test_system_clock_is_after_2020() {
        assert!(SystemClock.now_us() > 1_577_836_800_000_000);
    }
}
