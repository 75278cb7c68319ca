//! Cooperative timer dispatcher.
//!
//! The main loop calls [`Scheduler::due`] once per iteration.  Every
//! registered schedule is checked in slot order (slot 0 = highest
//! priority); each one that is due fires and its task is returned.  The
//! caller runs the tasks in the returned order.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     Node::poll(now_ms)                       │
//! │                                                              │
//! │  ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌──────────┐   │
//! │  │ Status    │  │ Temp      │  │ Batch     │  │ Time     │   │
//! │  │ report    │  │ refresh   │  │ flush     │  │ resync   │   │
//! │  └─────┬─────┘  └─────┬─────┘  └─────┬─────┘  └─────┬────┘   │
//! │        │              │              │              │        │
//! │        ▼              ▼              ▼              ▼        │
//! │  ┌────────────────────────────────────────────────────────┐  │
//! │  │        Scheduler::due() → DueTasks (priority order)    │  │
//! │  └───────────────────────┬────────────────────────────────┘  │
//! │                          ▼                                   │
//! │                    Node::dispatch(task)                      │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The scheduler knows nothing about what a task does, which keeps it
//! testable without any ports.

use log::{debug, info};

use crate::timer::IntervalTimer;

// ═══════════════════════════════════════════════════════════════
//  Schedule types
// ═══════════════════════════════════════════════════════════════

/// The periodic actions of the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    /// Render and emit a `status` record.
    StatusReport,
    /// Read the temperature probe.
    TemperatureRefresh,
    /// Upload the batch buffer.
    BatchFlush,
    /// Re-anchor the wall clock from the epoch source.
    TimeResync,
}

/// A single schedule entry.
#[derive(Debug, Clone)]
pub struct Schedule {
    /// Human-readable label used in logs.
    pub label: &'static str,
    pub task: Task,
    pub timer: IntervalTimer,
    pub enabled: bool,
}

impl Schedule {
    pub fn every(label: &'static str, task: Task, interval_ms: u32) -> Self {
        Self {
            label,
            task,
            timer: IntervalTimer::new(interval_ms),
            enabled: true,
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Scheduler engine
// ═══════════════════════════════════════════════════════════════

/// Maximum number of schedules (stack-allocated).
pub const MAX_SCHEDULES: usize = 4;

/// Tasks that fired in one pass, highest priority first.
pub type DueTasks = heapless::Vec<Task, MAX_SCHEDULES>;

pub struct Scheduler {
    schedules: [Option<Schedule>; MAX_SCHEDULES],
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            schedules: [None, None, None, None],
        }
    }

    /// Add a schedule in the next free slot.  Earlier slots have
    /// priority.  Returns the slot index, or `None` if full.
    pub fn add(&mut self, schedule: Schedule) -> Option<usize> {
        for (i, slot) in self.schedules.iter_mut().enumerate() {
            if slot.is_none() {
                info!(
                    "Scheduler: '{}' every {}ms at slot {}",
                    schedule.label,
                    schedule.timer.interval_ms(),
                    i
                );
                *slot = Some(schedule);
                return Some(i);
            }
        }
        None
    }

    /// Enable or disable every schedule bound to `task`.
    pub fn set_enabled(&mut self, task: Task, enabled: bool) {
        for entry in self.schedules.iter_mut().flatten() {
            if entry.task == task {
                entry.enabled = enabled;
            }
        }
    }

    /// Fire every due schedule and return their tasks in slot order.
    pub fn due(&mut self, now_ms: u32) -> DueTasks {
        let mut due = DueTasks::new();
        for entry in self.schedules.iter_mut().flatten() {
            if entry.enabled && entry.timer.poll(now_ms) {
                debug!("Scheduler: '{}' due at {}ms", entry.label, now_ms);
                // Capacity equals the slot count, so this never fails.
                let _ = due.push(entry.task);
            }
        }
        due
    }

    /// Milliseconds until the earliest enabled schedule is due.
    pub fn next_due_in(&self, now_ms: u32) -> Option<u32> {
        self.schedules
            .iter()
            .flatten()
            .filter(|e| e.enabled)
            .map(|e| e.timer.remaining_ms(now_ms))
            .min()
    }

    /// Number of enabled schedules.
    pub fn active_count(&self) -> usize {
        self.schedules
            .iter()
            .filter(|s| s.as_ref().is_some_and(|e| e.enabled))
            .count()
    }
}

// ═══════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════
