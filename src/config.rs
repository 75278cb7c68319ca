//! Node configuration parameters
//!
//! All tunable parameters for the telemetry node.  Defaults reproduce the
//! deployed behaviour; a JSON override can be baked in at build time.
//! Configuration is fixed once the node starts.

use serde::{Deserialize, Serialize};

use crate::batch::fingerprint::Fingerprint;
use crate::error::ConfigError;
use crate::telemetry::MAX_RECORD_LEN;

/// Upper bound on the batch arena (`buffer_slots × slot_size`), sized for
/// the heap left over once WiFi and mbedTLS are up.
pub const MAX_BUFFER_BYTES: usize = 64 * 1024;

/// What the uploader does when the server's certificate fingerprint does
/// not match the pinned value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FingerprintPolicy {
    /// Abort the upload and keep the buffer.
    #[default]
    Enforce,
    /// Log a warning and upload anyway.
    WarnOnly,
}

/// Whether the uploader waits for the HTTP status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseMode {
    /// Read the status line; only 2xx/3xx clears the buffer.
    #[default]
    ConfirmStatus,
    /// Treat a completed write as success.
    FireAndForget,
}

/// What happens when a record arrives and the batch buffer is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Drop the new record.
    DropNewest,
    /// Flush immediately, then retry once; drop if still full.
    #[default]
    FlushThenDropNewest,
}

/// Core node configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    // --- Wi-Fi ---
    pub wifi_ssid: heapless::String<32>,
    pub wifi_password: heapless::String<64>,

    // --- UDP broadcast ---
    /// Dotted IPv4 destination.
    pub udp_destination: heapless::String<15>,
    pub udp_port: u16,
    /// Sustained datagrams per second.
    pub udp_rate_per_sec: u32,
    /// Datagrams allowed in a burst above the sustained rate.
    pub udp_burst: u32,

    // --- HTTPS upload ---
    pub upload_host: heapless::String<64>,
    pub upload_port: u16,
    /// Apps Script deployment id placed in `/macros/s/<id>/exec`.
    pub endpoint_id: heapless::String<96>,
    pub user_agent: heapless::String<32>,
    /// SHA-256 of the server's leaf certificate DER, as 32 hex bytes
    /// (`:` or space separated, any case).  20-byte SHA-1 fingerprints are
    /// not accepted.
    pub fingerprint: heapless::String<96>,
    pub fingerprint_policy: FingerprintPolicy,
    pub response_mode: ResponseMode,
    pub overflow_policy: OverflowPolicy,
    pub connect_timeout_ms: u32,
    pub response_timeout_ms: u32,

    // --- Timing ---
    pub status_interval_ms: u32,
    pub temperature_interval_ms: u32,
    pub upload_interval_ms: u32,
    pub time_sync_interval_ms: u32,

    // --- Buffer ---
    pub buffer_slots: usize,
    pub slot_size: usize,

    // --- Records ---
    /// Included as the first field of every record when set.
    pub sensor_id: Option<u32>,
    /// Index of the probe passed to the temperature port.
    pub temperature_probe_index: u8,
    /// Include the PIR level in hello/status records too.
    pub report_motion_state: bool,
}

fn bounded<const N: usize>(s: &str) -> heapless::String<N> {
    let mut out = heapless::String::new();
    for c in s.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            wifi_ssid: heapless::String::new(),
            wifi_password: heapless::String::new(),

            udp_destination: bounded("255.255.255.255"),
            udp_port: 6969,
            udp_rate_per_sec: 10,
            udp_burst: 20,

            upload_host: bounded("script.google.com"),
            upload_port: 443,
            endpoint_id: heapless::String::new(),
            user_agent: bounded("HMD-Sensor"),
            fingerprint: heapless::String::new(),
            fingerprint_policy: FingerprintPolicy::Enforce,
            response_mode: ResponseMode::ConfirmStatus,
            overflow_policy: OverflowPolicy::FlushThenDropNewest,
            connect_timeout_ms: 10_000,
            response_timeout_ms: 5_000,

            status_interval_ms: 30_000,        // 30 s
            temperature_interval_ms: 60_000,   // 1/min
            upload_interval_ms: 180_000,       // 3 min
            time_sync_interval_ms: 3_600_000,  // 1 h

            buffer_slots: 128,
            slot_size: 160,

            sensor_id: None,
            temperature_probe_index: 0,
            report_motion_state: false,
        }
    }
}

impl NodeConfig {
    /// Parse a JSON override.  Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let cfg: Self = serde_json::from_str(json).map_err(|_| ConfigError::Malformed)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Range-check every field the node depends on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let nonzero = [
            (self.status_interval_ms, "status_interval_ms"),
            (self.temperature_interval_ms, "temperature_interval_ms"),
            (self.upload_interval_ms, "upload_interval_ms"),
            (self.time_sync_interval_ms, "time_sync_interval_ms"),
            (self.connect_timeout_ms, "connect_timeout_ms"),
            (self.response_timeout_ms, "response_timeout_ms"),
            (self.udp_rate_per_sec, "udp_rate_per_sec"),
        ];
        if let Some((_, name)) = nonzero.iter().find(|(v, _)| *v == 0) {
            return Err(ConfigError::ValidationFailed(name));
        }
        if self.udp_burst == 0 {
            return Err(ConfigError::ValidationFailed("udp_burst"));
        }
        if self.buffer_slots == 0 {
            return Err(ConfigError::ValidationFailed("buffer_slots"));
        }
        if self.slot_size == 0 || self.slot_size > MAX_RECORD_LEN || self.slot_size > usize::from(u16::MAX) {
            return Err(ConfigError::ValidationFailed("slot_size"));
        }
        match self.buffer_slots.checked_mul(self.slot_size) {
            Some(bytes) if bytes <= MAX_BUFFER_BYTES => {}
            _ => return Err(ConfigError::ValidationFailed("buffer_slots")),
        }
        if self.udp_destination.parse::<core::net::Ipv4Addr>().is_err() {
            return Err(ConfigError::ValidationFailed("udp_destination"));
        }
        if self.upload_host.is_empty() {
            return Err(ConfigError::ValidationFailed("upload_host"));
        }
        if self.endpoint_id.is_empty() || !self.endpoint_id.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_') {
            return Err(ConfigError::ValidationFailed("endpoint_id"));
        }
        if self.pinned_fingerprint().is_none() {
            return Err(ConfigError::ValidationFailed("fingerprint"));
        }
        Ok(())
    }

    /// The parsed pinned fingerprint, if the configured text is valid hex.
    pub fn pinned_fingerprint(&self) -> Option<Fingerprint> {
        Fingerprint::parse(&self.fingerprint)
    }
}
