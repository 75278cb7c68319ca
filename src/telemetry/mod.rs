//! Telemetry records: the snapshot that is rendered, and its rendered form.
//!
//! A record is rendered exactly once into an immutable JSON string.  The
//! string, not the struct, is what reaches the UDP publisher and the batch
//! buffer.

pub mod format;

pub use format::{render, FormatError, TelemetryRecord, MAX_RECORD_LEN};

/// Temperature value reported when the probe failed or was never read.
pub const TEMPERATURE_SENTINEL_C: f32 = -127.0;

/// What caused a record to be emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    /// Sent once after boot.
    Hello,
    /// Periodic status report.
    Status,
    /// PIR level change.
    Motion,
}

impl EventType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hello => "hello",
            Self::Status => "status",
            Self::Motion => "motion",
        }
    }
}

/// Point-in-time values captured once before rendering.
///
/// Captured from the live shared state in a single read so that an
/// interrupt landing mid-render cannot produce a torn record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetrySnapshot {
    /// Node identifier, when the deployment numbers its sensors.
    pub sensor_id: Option<u32>,
    /// Seconds since the Unix epoch; 0 before the first time sync.
    pub epoch_secs: u32,
    /// Milliseconds since boot (wraps).
    pub uptime_ms: u32,
    /// PIR level, when the record should carry it.
    pub motion: Option<bool>,
    pub motion_counter: u32,
    /// Degrees Celsius, or [`TEMPERATURE_SENTINEL_C`].
    pub temperature_c: f32,
}
