//! NTC thermistor probe (10 kOhm @ 25 C, B = 3950).
//!
//! The board carries a single NTC probe on ADC1 rather than a one-wire
//! probe bus, so [`TemperatureProbe`] index 0 is the only valid index.
//!
//! Wired in a voltage-divider with a fixed 10 kOhm resistor, read via
//! ADC1. The simplified Beta (Steinhart-Hart) equation converts
//! resistance to temperature.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: reads the ADC1 oneshot channel initialised by hw_init.
//! On host/test: reads from a static AtomicU16 for injection.

#[cfg(not(target_os = "espidf"))]
use core::sync::atomic::{AtomicU16, Ordering};

use crate::app::ports::TemperatureProbe;
#[cfg(target_os = "espidf")]
use crate::drivers::hw_init;
use crate::error::SensorError;

#[cfg(not(target_os = "espidf"))]
static SIM_TEMP_ADC: AtomicU16 = AtomicU16::new(2048);

#[cfg(not(target_os = "espidf"))]
pub fn sim_set_temp_adc(raw: u16) {
    SIM_TEMP_ADC.store(raw, Ordering::Relaxed);
}

const R25: f32 = 10_000.0;
const BETA: f32 = 3950.0;
const T25_K: f32 = 298.15;
const R_DIVIDER: f32 = 10_000.0;
const ADC_MAX: f32 = 4095.0;
const V_REF: f32 = 3.3;
/// Divider voltages this close to a rail mean an open or shorted probe.
const RAIL_MARGIN_V: f32 = 0.01;

/// A single thermistor on the board; only probe index 0 exists.
pub struct NtcThermistor {
    adc_channel: u32,
}

impl NtcThermistor {
    pub fn new(adc_channel: u32) -> Self {
        Self { adc_channel }
    }

    pub fn adc_channel(&self) -> u32 {
        self.adc_channel
    }

    #[cfg(target_os = "espidf")]
    fn read_adc(&self) -> Option<u16> {
        hw_init::adc1_read(self.adc_channel)
    }

    #[cfg(not(target_os = "espidf"))]
    fn read_adc(&self) -> Option<u16> {
        Some(SIM_TEMP_ADC.load(Ordering::Relaxed))
    }
}

/// Convert a raw 12-bit ADC sample to Celsius.
pub fn adc_to_celsius(raw: u16) -> Result<f32, SensorError> {
    let voltage = (raw as f32 / ADC_MAX) * V_REF;
    if voltage <= RAIL_MARGIN_V || voltage >= (V_REF - RAIL_MARGIN_V) {
        return Err(SensorError::Disconnected);
    }
    let r_ntc = R_DIVIDER * voltage / (V_REF - voltage);
    let inv_t = (1.0 / T25_K) + (1.0 / BETA) * (r_ntc / R25).ln();
    if inv_t <= 0.0 {
        return Err(SensorError::OutOfRange);
    }
    Ok((1.0 / inv_t) - 273.15)
}

impl TemperatureProbe for NtcThermistor {
    fn read_celsius(&mut self, index: u8) -> Result<f32, SensorError> {
        if index != 0 {
            return Err(SensorError::ReadFailed);
        }
        let raw = self.read_adc().ok_or(SensorError::ReadFailed)?;
        adc_to_celsius(raw)
    }
}
