//! One-shot hardware peripheral initialization.
//!
//! Configures the thermistor ADC channel and the PIR input using raw
//! ESP-IDF sys calls, and registers the PIR interrupt.  Called once from
//! `main()` before the event loop starts.
//!
//! Each peripheral is reported separately so one failing part does not
//! take the others down: a dead ADC leaves the thermistor reading
//! `ReadFailed`, a dead PIR input only disables motion events.

use core::convert::Infallible;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;
#[cfg(target_os = "espidf")]
use log::info;

use crate::pins;
use crate::sensors::motion::MotionMonitor;

// ── Error type ────────────────────────────────────────────────

/// Errors during one-shot peripheral initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwInitError {
    AdcInitFailed(i32),
    GpioConfigFailed(i32),
    IsrInstallFailed(i32),
}

impl core::fmt::Display for HwInitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::AdcInitFailed(rc)    => write!(f, "ADC1 init failed (rc={})", rc),
            Self::GpioConfigFailed(rc) => write!(f, "GPIO config failed (rc={})", rc),
            Self::IsrInstallFailed(rc) => write!(f, "GPIO ISR service install failed (rc={})", rc),
        }
    }
}

impl std::error::Error for HwInitError {}

pub const ADC1_CH_TEMP: u32 = 8;

/// Outcome of [`init_peripherals`], one entry per peripheral.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitReport {
    pub adc: Result<(), HwInitError>,
    pub pir: Result<(), HwInitError>,
}

impl InitReport {
    pub fn all_ok(&self) -> bool {
        self.adc.is_ok() && self.pir.is_ok()
    }
}

#[cfg(target_os = "espidf")]
pub fn init_peripherals() -> InitReport {
    // SAFETY: Called once from main() before event loop; single-threaded.
    let report = unsafe {
        InitReport {
            adc: init_adc(),
            pir: init_pir_input(),
        }
    };
    if report.all_ok() {
        info!("hw_init: all peripherals configured");
    }
    report
}

#[cfg(not(target_os = "espidf"))]
pub fn init_peripherals() -> InitReport {
    log::info!("hw_init(sim): peripheral init skipped");
    InitReport { adc: Ok(()), pir: Ok(()) }
}

// ── ADC (oneshot) ─────────────────────────────────────────────

#[cfg(target_os = "espidf")]
static mut ADC1_HANDLE: adc_oneshot_unit_handle_t = core::ptr::null_mut();

/// SAFETY: Must be called only from the single-threaded init path or the
/// main-loop ADC read path.  No concurrent access is possible because
/// `init_adc()` completes before the event loop starts.
#[cfg(target_os = "espidf")]
unsafe fn adc1_handle() -> adc_oneshot_unit_handle_t {
    unsafe { ADC1_HANDLE }
}

#[cfg(target_os = "espidf")]
unsafe fn init_adc() -> Result<(), HwInitError> {
    let init_cfg = adc_oneshot_unit_init_cfg_t {
        unit_id: adc_unit_t_ADC_UNIT_1,
        ulp_mode: adc_ulp_mode_t_ADC_ULP_MODE_DISABLE,
        ..Default::default()
    };
    // SAFETY: ADC1_HANDLE is only written here, once at boot.
    let ret = unsafe { adc_oneshot_new_unit(&init_cfg, &raw mut ADC1_HANDLE) };
    if ret != ESP_OK as i32 { return Err(HwInitError::AdcInitFailed(ret)); }

    let chan_cfg = adc_oneshot_chan_cfg_t {
        atten: adc_atten_t_ADC_ATTEN_DB_12,
        bitwidth: adc_bitwidth_t_ADC_BITWIDTH_12,
    };
    let ret = unsafe { adc_oneshot_config_channel(adc1_handle(), ADC1_CH_TEMP, &chan_cfg) };
    if ret != ESP_OK as i32 { return Err(HwInitError::AdcInitFailed(ret)); }

    info!("hw_init: ADC1 configured (CH{}=temp on GPIO{})", ADC1_CH_TEMP, pins::TEMP_ADC_GPIO);
    Ok(())
}

/// One oneshot conversion; `None` if the unit never came up or the driver
/// reports an error.
#[cfg(target_os = "espidf")]
pub fn adc1_read(channel: u32) -> Option<u16> {
    // SAFETY: see adc1_handle(); single-threaded main-loop access only.
    let handle = unsafe { adc1_handle() };
    if handle.is_null() {
        return None;
    }
    let mut raw: i32 = 0;
    // SAFETY: `handle` is the unit created by init_adc().
    let ret = unsafe { adc_oneshot_read(handle, channel, &mut raw) };
    if ret != ESP_OK as i32 {
        return None;
    }
    Some(raw.max(0) as u16)
}

// ── PIR input ─────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe fn init_pir_input() -> Result<(), HwInitError> {
    let cfg = gpio_config_t {
        pin_bit_mask: 1u64 << pins::PIR_GPIO,
        mode: gpio_mode_t_GPIO_MODE_INPUT,
        pull_up_en: gpio_pullup_t_GPIO_PULLUP_DISABLE,
        pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_ENABLE,
        intr_type: gpio_int_type_t_GPIO_INTR_ANYEDGE,
    };
    let ret = unsafe { gpio_config(&cfg) };
    if ret != ESP_OK as i32 { return Err(HwInitError::GpioConfigFailed(ret)); }

    info!("hw_init: PIR input configured on GPIO{}", pins::PIR_GPIO);
    Ok(())
}

#[cfg(target_os = "espidf")]
pub fn gpio_read(pin: i32) -> bool {
    // SAFETY: gpio_get_level is a read-only register access on an
    // already-configured input pin; safe to call from main context.
    (unsafe { gpio_get_level(pin) }) != 0
}

#[cfg(not(target_os = "espidf"))]
static SIM_PIR_LEVEL: core::sync::atomic::AtomicBool = core::sync::atomic::AtomicBool::new(false);

/// Simulation: set the level `gpio_read` reports for the PIR pin.
#[cfg(not(target_os = "espidf"))]
pub fn sim_set_pir_level(high: bool) {
    SIM_PIR_LEVEL.store(high, core::sync::atomic::Ordering::Relaxed);
}

#[cfg(not(target_os = "espidf"))]
pub fn gpio_read(pin: i32) -> bool {
    pin == pins::PIR_GPIO && SIM_PIR_LEVEL.load(core::sync::atomic::Ordering::Relaxed)
}

/// An already-configured GPIO input, read through `gpio_read`.
#[derive(Debug, Clone, Copy)]
pub struct GpioInput {
    pin: i32,
}

impl GpioInput {
    pub const fn new(pin: i32) -> Self {
        Self { pin }
    }
}

impl embedded_hal::digital::ErrorType for GpioInput {
    type Error = Infallible;
}

impl embedded_hal::digital::InputPin for GpioInput {
    fn is_high(&mut self) -> Result<bool, Infallible> {
        Ok(gpio_read(self.pin))
    }

    fn is_low(&mut self) -> Result<bool, Infallible> {
        Ok(!gpio_read(self.pin))
    }
}

// ── GPIO ISR Service ──────────────────────────────────────────

/// PIR any-edge handler.
///
/// Reads the level and the uptime and hands both to the monitor.  No
/// logging or allocation here.
#[cfg(target_os = "espidf")]
unsafe extern "C" fn pir_gpio_isr(arg: *mut core::ffi::c_void) {
    // SAFETY: `arg` is the `&'static MotionMonitor` registered in
    // `init_isr_service`; it is never freed.
    let monitor = unsafe { &*(arg as *const MotionMonitor) };
    // SAFETY: gpio_get_level and esp_timer_get_time are register reads;
    // safe in ISR context.
    let level = unsafe { gpio_get_level(pins::PIR_GPIO) } != 0;
    let now_ms = unsafe { crate::adapters::time::isr_uptime_ms() };
    monitor.on_edge(level, now_ms);
}

/// Install the per-pin GPIO ISR service and register the PIR handler.
/// Call after init_peripherals() and before the event loop.
#[cfg(target_os = "espidf")]
pub fn init_isr_service(monitor: &'static MotionMonitor) -> Result<(), HwInitError> {
    // SAFETY: gpio_install_isr_service is idempotent; ESP_ERR_INVALID_STATE
    // means it was already installed (acceptable).  The handler argument
    // points at a 'static monitor.
    unsafe {
        let ret = gpio_install_isr_service(0);
        if ret != ESP_OK as i32 && ret != ESP_ERR_INVALID_STATE as i32 {
            return Err(HwInitError::IsrInstallFailed(ret));
        }

        gpio_set_intr_type(pins::PIR_GPIO, gpio_int_type_t_GPIO_INTR_ANYEDGE);
        let ret = gpio_isr_handler_add(
            pins::PIR_GPIO,
            Some(pir_gpio_isr),
            monitor as *const MotionMonitor as *mut core::ffi::c_void,
        );
        if ret != ESP_OK as i32 {
            return Err(HwInitError::IsrInstallFailed(ret));
        }
        gpio_intr_enable(pins::PIR_GPIO);
    }
    info!("hw_init: ISR service installed (PIR any-edge)");
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_isr_service(_monitor: &'static MotionMonitor) -> Result<(), HwInitError> {
    log::info!("hw_init(sim): ISR service skipped");
    Ok(())
}
