//! ESP32 time adapter.
//!
//! Provides the uptime counter and wall-clock epoch for the node.
//!
//! - **`target_os = "espidf"`**: wraps `esp_timer_get_time()` from the
//!   ESP-IDF high-resolution timer, and keeps the system clock synced with
//!   `EspSntp`.
//! - **`not(target_os = "espidf")`**: uses `std::time::Instant` and the
//!   host's system clock for testing and simulation.

use core::time::Duration;

use crate::app::ports::EpochSource;

/// Anything earlier than 2020-01-01 means the clock was never set.
const EPOCH_2020: u64 = 1_577_836_800;

/// Monotonic time since boot.
#[cfg(target_os = "espidf")]
pub fn monotonic_now() -> Duration {
    // SAFETY: esp_timer_get_time is a read of the RTC-backed timer.
    let us = unsafe { esp_idf_svc::sys::esp_timer_get_time() };
    Duration::from_micros(us as u64)
}

/// Monotonic time since the first call.
#[cfg(not(target_os = "espidf"))]
pub fn monotonic_now() -> Duration {
    use std::time::Instant;
    static START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();
    START.get_or_init(Instant::now).elapsed()
}

/// Milliseconds since boot, truncated to the wrapping 32-bit counter.
pub fn uptime_ms() -> u32 {
    monotonic_now().as_millis() as u32
}

/// Uptime for interrupt handlers.
///
/// # Safety
///
/// Must only be called where `esp_timer_get_time` is callable, which
/// includes ISR context.
#[cfg(target_os = "espidf")]
pub unsafe fn isr_uptime_ms() -> u32 {
    (unsafe { esp_idf_svc::sys::esp_timer_get_time() } / 1_000) as u32
}

/// Epoch source over the system clock.
///
/// On the device the clock is set by SNTP; [`SystemEpoch::start_sntp`]
/// starts the service and the instance keeps it alive.
pub struct SystemEpoch {
    #[cfg(target_os = "espidf")]
    sntp: Option<esp_idf_svc::sntp::EspSntp<'static>>,
}

impl Default for SystemEpoch {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemEpoch {
    pub fn new() -> Self {
        Self {
            #[cfg(target_os = "espidf")]
            sntp: None,
        }
    }

    /// Start background SNTP sync with the default pool servers.
    #[cfg(target_os = "espidf")]
    pub fn start_sntp(&mut self) -> Result<(), esp_idf_svc::sys::EspError> {
        let sntp = esp_idf_svc::sntp::EspSntp::new_default()?;
        log::info!("Time(espidf): SNTP started");
        self.sntp = Some(sntp);
        Ok(())
    }

    /// Whether SNTP has completed at least one sync.
    #[cfg(target_os = "espidf")]
    pub fn sntp_completed(&self) -> bool {
        self.sntp
            .as_ref()
            .is_some_and(|s| s.get_sync_status() == esp_idf_svc::sntp::SyncStatus::Completed)
    }
}

/// Seconds since the Unix epoch, if the clock looks set.
fn system_epoch() -> Option<u32> {
    let secs = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .ok()?
        .as_secs();
    if secs < EPOCH_2020 {
        return None;
    }
    u32::try_from(secs).ok()
}

impl EpochSource for SystemEpoch {
    fn current_epoch(&mut self) -> Option<u32> {
        system_epoch()
    }
}
