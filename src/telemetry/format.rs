//! Compact JSON rendering of telemetry snapshots.
//!
//! Written straight into a fixed-capacity string with `core::fmt::Write`;
//! rendering never touches the heap.  Field order is fixed so downstream
//! spreadsheet columns line up.

use core::fmt::{self, Write};

use super::{EventType, TelemetrySnapshot, TEMPERATURE_SENTINEL_C};

/// Upper bound on a rendered record.  The widest possible record (every
/// optional field present, every integer at `u32::MAX`, clamped
/// temperature) is 135 bytes.
pub const MAX_RECORD_LEN: usize = 192;

/// Rendered temperatures are clamped into this range.
const TEMP_RENDER_MIN: f32 = -999.99;
const TEMP_RENDER_MAX: f32 = 9999.99;

/// One rendered JSON object.
pub type TelemetryRecord = heapless::String<MAX_RECORD_LEN>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatError {
    /// The record did not fit in [`MAX_RECORD_LEN`].
    TooLong,
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooLong => write!(f, "record exceeds {MAX_RECORD_LEN}B"),
        }
    }
}

/// Render `snapshot` as a single-line JSON object.
///
/// Motion records always carry the `motion` field; hello and status
/// records carry it only when `snapshot.motion` is set.
pub fn render(event: EventType, snapshot: &TelemetrySnapshot) -> Result<TelemetryRecord, FormatError> {
    let mut out = TelemetryRecord::new();
    write_record(&mut out, event, snapshot).map_err(|_| FormatError::TooLong)?;
    Ok(out)
}

fn write_record(out: &mut impl Write, event: EventType, s: &TelemetrySnapshot) -> fmt::Result {
    out.write_char('{')?;
    if let Some(id) = s.sensor_id {
        write!(out, "\"sensor_id\":{id},")?;
    }
    write!(
        out,
        "\"time\":\"{}\",\"type\":\"{}\",\"uptime\":{},",
        s.epoch_secs,
        event.as_str(),
        s.uptime_ms
    )?;
    let motion = match event {
        EventType::Motion => Some(s.motion.unwrap_or(false)),
        EventType::Hello | EventType::Status => s.motion,
    };
    if let Some(m) = motion {
        write!(out, "\"motion\":{},", u8::from(m))?;
    }
    write!(
        out,
        "\"motion_counter\":{},\"temp0\":{:.2}}}",
        s.motion_counter,
        renderable_temperature(s.temperature_c)
    )
}

fn renderable_temperature(c: f32) -> f32 {
    if c.is_finite() {
        c.clamp(TEMP_RENDER_MIN, TEMP_RENDER_MAX)
    } else {
        TEMPERATURE_SENTINEL_C
    }
}
