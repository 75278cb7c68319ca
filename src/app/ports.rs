//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ Node (domain)
//! ```
//!
//! Driven adapters (network, probe, clock) implement these traits.  The
//! [`Node`](super::service::Node) consumes them via generics, so the
//! domain core never touches the radio or the ADC directly.
//!
//! All port errors are typed; none of them are fatal to the main loop.

use crate::batch::fingerprint::Fingerprint;
use crate::error::{Error, SensorError, UploadError};

// ───────────────────────────────────────────────────────────────
// Connectivity port (driven adapter: station state → domain)
// ───────────────────────────────────────────────────────────────

/// Whether the station currently has an IP link.
pub trait ConnectivityPort {
    fn is_connected(&self) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Datagram port (driven adapter: domain → UDP)
// ───────────────────────────────────────────────────────────────

/// Sends one unreliable datagram to a fixed destination.
pub trait DatagramSink {
    fn send(&mut self, payload: &[u8]) -> Result<(), Error>;
}

// ───────────────────────────────────────────────────────────────
// Secure transport port (driven adapter: domain ↔ TLS server)
// ───────────────────────────────────────────────────────────────

/// Opens authenticated-encryption sessions to the upload server.
///
/// A session is created per flush and dropped afterwards; implementations
/// must close the socket on drop.
pub trait SecureConnector {
    type Session: SecureSession;

    /// Connect and complete the handshake.
    ///
    /// `connect_timeout_ms` bounds TCP connect plus handshake;
    /// `io_timeout_ms` becomes the read/write timeout of the session.
    fn connect(
        &mut self,
        host: &str,
        port: u16,
        connect_timeout_ms: u32,
        io_timeout_ms: u32,
    ) -> Result<Self::Session, UploadError>;
}

/// An established session.
pub trait SecureSession {
    /// SHA-256 of the peer's leaf certificate, when the session has one.
    fn peer_fingerprint(&self) -> Option<Fingerprint>;

    fn write_all(&mut self, data: &[u8]) -> Result<(), UploadError>;

    /// Read whatever is available.  `Ok(0)` means the peer closed.
    /// A read that exceeds the session timeout is [`UploadError::Timeout`].
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, UploadError>;
}

// ───────────────────────────────────────────────────────────────
// Temperature port (driven adapter: probe → domain)
// ───────────────────────────────────────────────────────────────

/// Reads a temperature probe by index.
pub trait TemperatureProbe {
    fn read_celsius(&mut self, index: u8) -> Result<f32, SensorError>;
}

// ───────────────────────────────────────────────────────────────
// Epoch port (driven adapter: SNTP → domain)
// ───────────────────────────────────────────────────────────────

/// Current wall-clock time.
pub trait EpochSource {
    /// Seconds since the Unix epoch, or `None` while the clock is unsynced.
    fn current_epoch(&mut self) -> Option<u32>;
}
