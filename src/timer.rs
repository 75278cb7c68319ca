//! Interval gate over the 32-bit millisecond uptime counter.
//!
//! The counter wraps after ~49.7 days.  Elapsed time is always computed
//! with `wrapping_sub`, which yields the correct duration across the wrap
//! as long as the real gap is shorter than one full counter period.

/// Decides whether a periodic action is due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntervalTimer {
    interval_ms: u32,
    last_fired_ms: u32,
}

impl IntervalTimer {
    /// A timer that last fired at uptime 0.
    pub const fn new(interval_ms: u32) -> Self {
        Self {
            interval_ms,
            last_fired_ms: 0,
        }
    }

    pub fn interval_ms(&self) -> u32 {
        self.interval_ms
    }

    pub fn last_fired_ms(&self) -> u32 {
        self.last_fired_ms
    }

    /// `true` once at least `interval_ms` has elapsed since the last fire.
    pub fn is_due(&self, now_ms: u32) -> bool {
        now_ms.wrapping_sub(self.last_fired_ms) >= self.interval_ms
    }

    /// Record that the action ran at `now_ms`.
    pub fn fire(&mut self, now_ms: u32) {
        self.last_fired_ms = now_ms;
    }

    /// `is_due` + `fire` in one step.
    pub fn poll(&mut self, now_ms: u32) -> bool {
        if self.is_due(now_ms) {
            self.fire(now_ms);
            true
        } else {
            false
        }
    }

    /// Milliseconds until the next fire (0 when already due).
    pub fn remaining_ms(&self, now_ms: u32) -> u32 {
        self.interval_ms
            .saturating_sub(now_ms.wrapping_sub(self.last_fired_ms))
    }
}
