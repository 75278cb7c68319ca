//! GPIO / peripheral pin assignments for the sensor node board.
//!
//! Single source of truth: every driver references this module rather than
//! hard-coding pin numbers.  Change a pin here and it propagates everywhere.

// ---------------------------------------------------------------------------
// Motion
// ---------------------------------------------------------------------------

/// HC-SR501 PIR output.  HIGH while motion is detected.
/// Both edges raise an interrupt.
pub const PIR_GPIO: i32 = 14;

// ---------------------------------------------------------------------------
// Temperature: Analog (ADC1)
// ---------------------------------------------------------------------------

/// NTC thermistor: 10 kΩ @ 25 °C, voltage-divider to ADC.
/// ADC1 channel 8 (GPIO 9 on ESP32-S3).
pub const TEMP_ADC_GPIO: i32 = 9;
