//! PIR motion monitor: the only state shared with interrupt context.
//!
//! The GPIO ISR calls [`MotionMonitor::on_edge`] on every level change.
//! The current level and the rising-edge counter live together in one
//! `AtomicU32` so a reader never sees a level from one edge paired with
//! the counter from another:
//!
//! ```text
//!   bit 31      bits 30..0
//!  ┌───────┬────────────────────┐
//!  │ level │  motion counter    │
//!  └───────┴────────────────────┘
//! ```
//!
//! Each edge is also posted to a bounded queue that the main loop drains,
//! so every edge produces its own record even when several land between
//! two loop iterations.  A full queue drops the edge and counts the drop.
//! The ISR path never logs, allocates, or touches the batch buffer.

use core::sync::atomic::{AtomicU32, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embedded_hal::digital::InputPin;

/// Edges the main loop can fall behind by before edges are dropped.
pub const EDGE_QUEUE_DEPTH: usize = 16;

const LEVEL_BIT: u32 = 1 << 31;
const COUNTER_MASK: u32 = !LEVEL_BIT;

const fn pack(motion: bool, counter: u32) -> u32 {
    (if motion { LEVEL_BIT } else { 0 }) | (counter & COUNTER_MASK)
}

/// Level and counter read together.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotionState {
    pub motion: bool,
    /// Rising edges since boot, wrapping at 2^31.
    pub counter: u32,
}

impl MotionState {
    const fn unpack(word: u32) -> Self {
        Self {
            motion: word & LEVEL_BIT != 0,
            counter: word & COUNTER_MASK,
        }
    }
}

/// One observed edge, as captured in the ISR.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotionEdge {
    pub motion: bool,
    /// Counter value right after this edge was applied.
    pub counter: u32,
    pub uptime_ms: u32,
}

pub struct MotionMonitor {
    word: AtomicU32,
    edges: Channel<CriticalSectionRawMutex, MotionEdge, EDGE_QUEUE_DEPTH>,
    dropped: AtomicU32,
}

impl Default for MotionMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl MotionMonitor {
    pub const fn new() -> Self {
        Self {
            word: AtomicU32::new(0),
            edges: Channel::new(),
            dropped: AtomicU32::new(0),
        }
    }

    /// ISR entry point.  `level` is the pin level read inside the ISR.
    ///
    /// Lock-free on the state word; the queue push takes a short critical
    /// section.
    pub fn on_edge(&self, level: bool, uptime_ms: u32) {
        let prev = self
            .word
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |w| {
                let counter = w & COUNTER_MASK;
                let counter = if level { counter.wrapping_add(1) } else { counter };
                Some(pack(level, counter))
            })
            .unwrap_or_else(|w| w);
        let counter = prev & COUNTER_MASK;
        let counter = if level {
            counter.wrapping_add(1) & COUNTER_MASK
        } else {
            counter
        };

        let edge = MotionEdge {
            motion: level,
            counter,
            uptime_ms,
        };
        if self.edges.try_send(edge).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Current level and counter.
    pub fn snapshot(&self) -> MotionState {
        MotionState::unpack(self.word.load(Ordering::Acquire))
    }

    /// Oldest edge not yet handled by the main loop.
    pub fn try_next_edge(&self) -> Option<MotionEdge> {
        self.edges.try_receive().ok()
    }

    /// Edges lost because the queue was full.
    pub fn dropped_edges(&self) -> u32 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Read the pin once at boot so the first record carries the real
    /// level.  Does not count as an edge.
    pub fn seed_from_pin<P: InputPin>(&self, pin: &mut P) -> Result<bool, P::Error> {
        let level = pin.is_high()?;
        let _ = self
            .word
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |w| {
                Some(pack(level, w & COUNTER_MASK))
            });
        Ok(level)
    }
}
