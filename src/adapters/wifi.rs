//! WiFi station-mode adapter.
//!
//! Implements [`ConnectivityPort`], the hexagonal boundary for network
//! connectivity, and keeps the station associated.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: real ESP-IDF WiFi driver via
//!   `esp_idf_svc::wifi::BlockingWifi`.
//! - **all other targets**: simulation with injectable link loss and
//!   connect failures for host-side tests.
//!
//! ## Reconnection policy
//!
//! On disconnect the adapter waits an exponential backoff (2 s → 4 s →
//! 8 s … capped at 60 s) before retrying.  Retries happen from
//! [`WifiLink::poll`], so the main loop keeps running between attempts.

use core::fmt;
use log::{error, info, warn};

use crate::app::ports::ConnectivityPort;

#[cfg(target_os = "espidf")]
use esp_idf_svc::wifi::{AuthMethod, BlockingWifi, ClientConfiguration, Configuration, EspWifi};

// ───────────────────────────────────────────────────────────────
// Errors
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WifiError {
    NoCredentials,
    InvalidSsid,
    InvalidPassword,
    ConnectionFailed,
}

impl fmt::Display for WifiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoCredentials => write!(f, "no WiFi credentials configured"),
            Self::InvalidSsid => write!(f, "SSID invalid (must be 1-32 printable ASCII bytes)"),
            Self::InvalidPassword => write!(f, "password invalid (must be 8-64 bytes for WPA2, or empty for open)"),
            Self::ConnectionFailed => write!(f, "WiFi connection failed"),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Connection state
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WifiState {
    Disconnected,
    Connected,
    Reconnecting { attempt: u32 },
}

const INITIAL_BACKOFF_MS: u32 = 2_000;
const MAX_BACKOFF_MS: u32 = 60_000;

// ───────────────────────────────────────────────────────────────
// Validation
// ───────────────────────────────────────────────────────────────

/// SSIDs are limited to printable ASCII (space through tilde).
fn is_printable_ascii(s: &str) -> bool {
    s.bytes().all(|b| (0x20..=0x7E).contains(&b))
}

fn validate_ssid(ssid: &str) -> Result<(), WifiError> {
    if ssid.is_empty() || ssid.len() > 32 || !is_printable_ascii(ssid) {
        return Err(WifiError::InvalidSsid);
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), WifiError> {
    if password.is_empty() {
        return Ok(());
    }
    if password.len() < 8 || password.len() > 64 {
        return Err(WifiError::InvalidPassword);
    }
    Ok(())
}

// ───────────────────────────────────────────────────────────────
// WiFi adapter
// ───────────────────────────────────────────────────────────────

pub struct WifiLink {
    state: WifiState,
    ssid: heapless::String<32>,
    password: heapless::String<64>,
    backoff_ms: u32,
    last_attempt_ms: u32,

    #[cfg(target_os = "espidf")]
    wifi: BlockingWifi<EspWifi<'static>>,

    #[cfg(not(target_os = "espidf"))]
    sim_link_up: bool,
    /// Simulation: remaining connect attempts that will fail.
    #[cfg(not(target_os = "espidf"))]
    sim_failures: u32,
}

impl WifiLink {
    #[cfg(target_os = "espidf")]
    pub fn new(wifi: BlockingWifi<EspWifi<'static>>) -> Self {
        Self {
            state: WifiState::Disconnected,
            ssid: heapless::String::new(),
            password: heapless::String::new(),
            backoff_ms: INITIAL_BACKOFF_MS,
            last_attempt_ms: 0,
            wifi,
        }
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn new() -> Self {
        Self {
            state: WifiState::Disconnected,
            ssid: heapless::String::new(),
            password: heapless::String::new(),
            backoff_ms: INITIAL_BACKOFF_MS,
            last_attempt_ms: 0,
            sim_link_up: false,
            sim_failures: 0,
        }
    }

    pub fn state(&self) -> WifiState {
        self.state
    }

    pub fn backoff_ms(&self) -> u32 {
        self.backoff_ms
    }

    pub fn set_credentials(&mut self, ssid: &str, password: &str) -> Result<(), WifiError> {
        validate_ssid(ssid)?;
        validate_password(password)?;
        self.ssid.clear();
        self.ssid.push_str(ssid).map_err(|_| WifiError::InvalidSsid)?;
        self.password.clear();
        self.password.push_str(password).map_err(|_| WifiError::InvalidPassword)?;
        info!("WiFi: credentials updated (SSID='{}')", self.ssid);
        Ok(())
    }

    /// First association.  On failure the link enters the reconnect
    /// cycle driven by [`poll`](Self::poll).
    pub fn connect(&mut self, now_ms: u32) -> Result<(), WifiError> {
        if self.ssid.is_empty() {
            return Err(WifiError::NoCredentials);
        }
        info!("WiFi: connecting to '{}'", self.ssid);
        self.last_attempt_ms = now_ms;
        match self.platform_connect() {
            Ok(()) => {
                self.on_connected();
                Ok(())
            }
            Err(e) => {
                error!("WiFi: connection failed: {}", e);
                self.state = WifiState::Reconnecting { attempt: 0 };
                Err(e)
            }
        }
    }

    /// Detect link loss and retry once the backoff has elapsed.
    pub fn poll(&mut self, now_ms: u32) {
        match self.state {
            WifiState::Connected => {
                if !self.platform_is_connected() {
                    warn!("WiFi: connection lost, entering reconnect");
                    self.state = WifiState::Reconnecting { attempt: 0 };
                    self.last_attempt_ms = now_ms;
                }
            }
            WifiState::Reconnecting { attempt } => {
                if now_ms.wrapping_sub(self.last_attempt_ms) < self.backoff_ms {
                    return;
                }
                info!("WiFi: reconnect attempt {} (backoff {}ms)", attempt, self.backoff_ms);
                self.last_attempt_ms = now_ms;
                match self.platform_connect() {
                    Ok(()) => self.on_connected(),
                    Err(_) => {
                        self.backoff_ms = self.backoff_ms.saturating_mul(2).min(MAX_BACKOFF_MS);
                        self.state = WifiState::Reconnecting { attempt: attempt + 1 };
                    }
                }
            }
            WifiState::Disconnected => {}
        }
    }

    fn on_connected(&mut self) {
        self.state = WifiState::Connected;
        self.backoff_ms = INITIAL_BACKOFF_MS;
        info!("WiFi: connected to '{}'", self.ssid);
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_connect(&mut self) -> Result<(), WifiError> {
        let auth_method = if self.password.is_empty() {
            AuthMethod::None
        } else {
            AuthMethod::WPA2Personal
        };
        let config = Configuration::Client(ClientConfiguration {
            ssid: self.ssid.as_str().try_into().map_err(|_| WifiError::InvalidSsid)?,
            password: self
                .password
                .as_str()
                .try_into()
                .map_err(|_| WifiError::InvalidPassword)?,
            auth_method,
            ..Default::default()
        });
        let step = |r: Result<(), esp_idf_svc::sys::EspError>, what: &str| {
            r.map_err(|e| {
                warn!("WiFi(espidf): {} failed: {}", what, e);
                WifiError::ConnectionFailed
            })
        };
        step(self.wifi.set_configuration(&config), "set_configuration")?;
        if !self.wifi.is_started().unwrap_or(false) {
            step(self.wifi.start(), "start")?;
        }
        step(self.wifi.connect(), "connect")?;
        step(self.wifi.wait_netif_up(), "wait_netif_up")?;
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_connect(&mut self) -> Result<(), WifiError> {
        if self.sim_failures > 0 {
            self.sim_failures -= 1;
            warn!("WiFi(sim): simulated connect failure");
            self.sim_link_up = false;
            return Err(WifiError::ConnectionFailed);
        }
        self.sim_link_up = true;
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_is_connected(&self) -> bool {
        self.wifi.is_connected().unwrap_or(false)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_is_connected(&self) -> bool {
        self.sim_link_up
    }

    // ── Simulation controls ───────────────────────────────────

    /// Simulation: drop the link as if the AP went away.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_drop_link(&mut self) {
        self.sim_link_up = false;
    }

    /// Simulation: make the next `n` connect attempts fail.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_fail_next(&mut self, n: u32) {
        self.sim_failures = n;
    }
}

#[cfg(not(target_os = "espidf"))]
impl Default for WifiLink {
    fn default() -> Self {
        Self::new()
    }
}

// ───────────────────────────────────────────────────────────────
// ConnectivityPort
// ───────────────────────────────────────────────────────────────

impl ConnectivityPort for WifiLink {
    fn is_connected(&self) -> bool {
        self.state == WifiState::Connected && self.platform_is_connected()
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
