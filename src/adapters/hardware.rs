//! Hardware adapter: bridges the board's peripherals to domain port traits.
//!
//! Owns the WiFi link, the thermistor and the epoch source, exposing them
//! through [`ConnectivityPort`], [`TemperatureProbe`] and [`EpochSource`]
//! so the node can take all three as one call-site argument.  On
//! non-espidf targets the underlying adapters use cfg-gated simulation.

use crate::adapters::time::SystemEpoch;
use crate::adapters::wifi::WifiLink;
use crate::app::ports::{ConnectivityPort, EpochSource, TemperatureProbe};
use crate::error::SensorError;
use crate::sensors::thermistor::NtcThermistor;

/// Concrete adapter that combines the board's I/O behind port traits.
pub struct HardwareAdapter {
    wifi: WifiLink,
    thermistor: NtcThermistor,
    epoch: SystemEpoch,
}

impl HardwareAdapter {
    pub fn new(wifi: WifiLink, thermistor: NtcThermistor, epoch: SystemEpoch) -> Self {
        Self {
            wifi,
            thermistor,
            epoch,
        }
    }

    pub fn wifi_mut(&mut self) -> &mut WifiLink {
        &mut self.wifi
    }
}

// ── ConnectivityPort implementation ───────────────────────────

impl ConnectivityPort for HardwareAdapter {
    fn is_connected(&self) -> bool {
        self.wifi.is_connected()
    }
}

// ── TemperatureProbe implementation ───────────────────────────

impl TemperatureProbe for HardwareAdapter {
    fn read_celsius(&mut self, index: u8) -> Result<f32, SensorError> {
        self.thermistor.read_celsius(index)
    }
}

// ── EpochSource implementation ────────────────────────────────

impl EpochSource for HardwareAdapter {
    fn current_epoch(&mut self) -> Option<u32> {
        self.epoch.current_epoch()
    }
}
