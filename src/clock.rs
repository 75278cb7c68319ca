//! Wall clock derived from uptime between time syncs.
//!
//! A sync stores `(epoch, uptime)`; later epochs are computed from the
//! uptime elapsed since that anchor.  Until the first sync the epoch is 0,
//! which is what records carry in their `time` field.
//!
//! The offset from the anchor is read as signed, so an uptime captured
//! before the sync (an edge queued during boot) is dated backwards.  Derived
//! times are valid within about 24 days either side of the anchor.

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WallClock {
    anchor: Option<Anchor>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Anchor {
    epoch_secs: u32,
    uptime_ms: u32,
}

impl WallClock {
    pub const fn new() -> Self {
        Self { anchor: None }
    }

    /// Anchor the clock: `epoch_secs` was current at `uptime_ms`.
    pub fn sync(&mut self, epoch_secs: u32, uptime_ms: u32) {
        self.anchor = Some(Anchor {
            epoch_secs,
            uptime_ms,
        });
    }

    pub fn is_synced(&self) -> bool {
        self.anchor.is_some()
    }

    /// Epoch seconds at `uptime_ms`, or 0 before the first sync.
    pub fn epoch_at(&self, uptime_ms: u32) -> u32 {
        self.anchor.map_or(0, |a| {
            let offset_ms = uptime_ms.wrapping_sub(a.uptime_ms) as i32;
            a.epoch_secs.wrapping_add_signed(offset_ms.div_euclid(1_000))
        })
    }
}
