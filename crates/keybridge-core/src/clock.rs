#![forbid(unsafe_code)]

//! Timestamp sources.
//!
//! Canonical events carry whole milliseconds relative to the instant the
//! session was opened. The source only has to be monotonic; its epoch is
//! irrelevant.

use std::cell::Cell;
use std::rc::Rc;

use web_time::Instant;

pub trait TimestampSource {
    /// Monotonic time in milliseconds.
    fn now_ms(&self) -> f64;
}

/// Wall clock backed by `web_time::Instant` (`performance.now()` on wasm).
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TimestampSource for MonotonicClock {
    fn now_ms(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }
}

/// Host-driven clock for tests and replay.
///
/// Clones share the same reading, so a test can keep a handle while the
/// machine owns another.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<f64>>,
}

impl ManualClock {
    #[must_use]
    pub fn starting_at(now_ms: f64) -> Self {
        Self {
            now: Rc::new(Cell::new(now_ms)),
        }
    }

    pub fn set(&self, now_ms: f64) {
        self.now.set(now_ms);
    }

    pub fn advance(&self, delta_ms: f64) {
        self.now.set(self.now.get() + delta_ms);
    }
}

impl TimestampSource for ManualClock {
    fn now_ms(&self) -> f64 {
        self.now.get()
    }
}

/// Whole milliseconds elapsed since `reference`, rounded, saturating at zero.
#[must_use]
pub fn relative_ms(now_ms: f64, reference_ms: f64) -> u32 {
    let delta = (now_ms - reference_ms).round();
    if delta.is_nan() || delta <= 0.0 {
        0
    } else if delta >= f64::from(u32::MAX) {
        u32::MAX
    } else {
        delta as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_ms_rounds_and_saturates() {
        assert_eq!(relative_ms(7060.4, 7000.0), 60);
        assert_eq!(relative_ms(7060.6, 7000.0), 61);
        assert_eq!(relative_ms(10.0, 20.0), 0);
        assert_eq!(relative_ms(f64::NAN, 0.0), 0);
        assert_eq!(relative_ms(1e12, 0.0), u32::MAX);
    }

    #[test]
    fn manual_clock_handles_share_time() {
        let clock = ManualClock::starting_at(100.0);
        let handle = clock.clone();
        handle.advance(25.0);
        assert_eq!(clock.now_ms(), 125.0);
        handle.set(5.0);
        assert_eq!(clock.now_ms(), 5.0);
    }

    #[test]
    fn monotonic_clock_never_goes_backwards() {
        let clock = MonotonicClock::new();
        let a = clock.now_ms();
        let b = clock.now_ms();
        assert!(b >= a);
        assert!(a >= 0.0);
    }
}
