//! Sensor subsystem: the PIR monitor, the thermistor probe, and the
//! [`TemperatureSampler`] that caches the latest reading between timer
//! ticks.

pub mod motion;
pub mod thermistor;

use log::{debug, warn};

use crate::app::ports::TemperatureProbe;
use crate::error::SensorError;
use crate::telemetry::TEMPERATURE_SENTINEL_C;

/// Plausible probe range.  Anything outside is a wiring or bus fault.
const PLAUSIBLE_MIN_C: f32 = -55.0;
const PLAUSIBLE_MAX_C: f32 = 125.0;

/// The most recent temperature sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TemperatureReading {
    /// No sample taken since boot.
    Unsampled,
    Valid { celsius: f32, at_ms: u32 },
    /// The last sample failed; the previous value is not kept.
    Failed { error: SensorError, at_ms: u32 },
}

impl TemperatureReading {
    /// Value to report: the reading, or the sentinel when there is none.
    pub fn celsius_or_sentinel(&self) -> f32 {
        match *self {
            Self::Valid { celsius, .. } => celsius,
            Self::Unsampled | Self::Failed { .. } => TEMPERATURE_SENTINEL_C,
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid { .. })
    }
}

/// Reads one probe on demand and holds the result.
pub struct TemperatureSampler {
    probe_index: u8,
    reading: TemperatureReading,
    failures: u32,
}

impl TemperatureSampler {
    pub fn new(probe_index: u8) -> Self {
        Self {
            probe_index,
            reading: TemperatureReading::Unsampled,
            failures: 0,
        }
    }

    /// Read the probe and replace the stored reading.
    ///
    /// Failures, including the probe's own "disconnected" value and
    /// non-finite results, are stored as [`TemperatureReading::Failed`].
    pub fn sample(&mut self, probe: &mut impl TemperatureProbe, now_ms: u32) -> TemperatureReading {
        self.reading = match probe.read_celsius(self.probe_index).and_then(check_plausible) {
            Ok(celsius) => {
                debug!("Temperature: {:.2}C", celsius);
                TemperatureReading::Valid { celsius, at_ms: now_ms }
            }
            Err(error) => {
                self.failures = self.failures.wrapping_add(1);
                warn!("Temperature: probe {} failed: {}", self.probe_index, error);
                TemperatureReading::Failed { error, at_ms: now_ms }
            }
        };
        self.reading
    }

    pub fn reading(&self) -> TemperatureReading {
        self.reading
    }

    /// Failed samples since boot.
    pub fn failures(&self) -> u32 {
        self.failures
    }
}

fn check_plausible(c: f32) -> Result<f32, SensorError> {
    if !c.is_finite() {
        return Err(SensorError::ReadFailed);
    }
    if (c - TEMPERATURE_SENTINEL_C).abs() < 0.01 {
        return Err(SensorError::Disconnected);
    }
    if !(PLAUSIBLE_MIN_C..=PLAUSIBLE_MAX_C).contains(&c) {
        return Err(SensorError::OutOfRange);
    }
    Ok(c)
}
