//! TLS client adapter for the batch upload.
//!
//! Implements [`SecureConnector`] / [`SecureSession`]: one TCP connection
//! per flush, wrapped in TLS, exposing the server's leaf certificate
//! fingerprint so the uploader can apply its pinning policy.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: `std::net::TcpStream` (lwIP) wrapped in an
//!   mbedTLS client session with SNI.  Chain validation is left to the
//!   fingerprint pin.
//! - **all other targets**: plaintext `TcpStream` for host-side testing.
//!   The "presented certificate" is configured on the connector, so the
//!   pinning paths can be exercised against a local listener.

use std::io;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

#[cfg(not(target_os = "espidf"))]
use std::io::{Read, Write};

use log::{info, warn};

use crate::app::ports::{SecureConnector, SecureSession};
use crate::batch::Fingerprint;
use crate::error::UploadError;

// ───────────────────────────────────────────────────────────────
// ESP-IDF platform helpers (mbedTLS)
// ───────────────────────────────────────────────────────────────
#[cfg(target_os = "espidf")]
mod esp_impl;

// ───────────────────────────────────────────────────────────────
// Connector
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct TlsConnector {
    #[cfg(not(target_os = "espidf"))]
    presented_certificate: Option<Vec<u8>>,
}

impl TlsConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Host only: sessions report the fingerprint of `der` as the peer
    /// certificate.
    #[cfg(not(target_os = "espidf"))]
    pub fn presenting(der: &[u8]) -> Self {
        Self {
            presented_certificate: Some(der.to_vec()),
        }
    }
}

/// Resolve `host` and open a TCP connection within `connect_timeout_ms`,
/// trying each resolved address in turn.
fn open_tcp(
    host: &str,
    port: u16,
    connect_timeout_ms: u32,
    io_timeout_ms: u32,
) -> Result<TcpStream, UploadError> {
    let addrs = (host, port).to_socket_addrs().map_err(|e| {
        warn!("TLS: resolving {} failed: {}", host, e);
        UploadError::ConnectFailed
    })?;

    let connect_timeout = Duration::from_millis(u64::from(connect_timeout_ms.max(1)));
    let io_timeout = Duration::from_millis(u64::from(io_timeout_ms.max(1)));

    let mut last = UploadError::ConnectFailed;
    for addr in addrs {
        match TcpStream::connect_timeout(&addr, connect_timeout) {
            Ok(stream) => {
                stream
                    .set_read_timeout(Some(io_timeout))
                    .and_then(|()| stream.set_write_timeout(Some(io_timeout)))
                    .map_err(|_| UploadError::ConnectFailed)?;
                info!("TLS: TCP connected to {}", addr);
                return Ok(stream);
            }
            Err(e) => {
                warn!("TLS: connect to {} failed: {}", addr, e);
                last = map_io(&e, UploadError::ConnectFailed);
            }
        }
    }
    Err(last)
}

/// Timeouts keep their identity; anything else becomes `otherwise`.
fn map_io(e: &io::Error, otherwise: UploadError) -> UploadError {
    match e.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => UploadError::Timeout,
        _ => otherwise,
    }
}

impl SecureConnector for TlsConnector {
    type Session = TlsSession;

    #[cfg(target_os = "espidf")]
    fn connect(
        &mut self,
        host: &str,
        port: u16,
        connect_timeout_ms: u32,
        io_timeout_ms: u32,
    ) -> Result<TlsSession, UploadError> {
        let stream = open_tcp(host, port, connect_timeout_ms, io_timeout_ms)?;
        let client = esp_impl::esp_connect(stream, host)?;
        Ok(TlsSession { client })
    }

    #[cfg(not(target_os = "espidf"))]
    fn connect(
        &mut self,
        host: &str,
        port: u16,
        connect_timeout_ms: u32,
        io_timeout_ms: u32,
    ) -> Result<TlsSession, UploadError> {
        let stream = open_tcp(host, port, connect_timeout_ms, io_timeout_ms)?;
        info!("TLS(sim): plaintext session to {}:{}", host, port);
        Ok(TlsSession {
            stream,
            peer: self
                .presented_certificate
                .as_deref()
                .map(Fingerprint::of_certificate),
        })
    }
}

// ───────────────────────────────────────────────────────────────
// Session
// ───────────────────────────────────────────────────────────────

/// One upload's connection.  Dropping it closes the socket.
pub struct TlsSession {
    #[cfg(target_os = "espidf")]
    client: esp_impl::EspTlsClient,

    #[cfg(not(target_os = "espidf"))]
    stream: TcpStream,
    #[cfg(not(target_os = "espidf"))]
    peer: Option<Fingerprint>,
}

impl SecureSession for TlsSession {
    #[cfg(target_os = "espidf")]
    fn peer_fingerprint(&self) -> Option<Fingerprint> {
        self.client.peer_fingerprint()
    }

    #[cfg(target_os = "espidf")]
    fn write_all(&mut self, data: &[u8]) -> Result<(), UploadError> {
        esp_impl::esp_write_all(&mut self.client, data)
    }

    #[cfg(target_os = "espidf")]
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, UploadError> {
        esp_impl::esp_read(&mut self.client, buf)
    }

    #[cfg(not(target_os = "espidf"))]
    fn peer_fingerprint(&self) -> Option<Fingerprint> {
        self.peer
    }

    #[cfg(not(target_os = "espidf"))]
    fn write_all(&mut self, data: &[u8]) -> Result<(), UploadError> {
        self.stream
            .write_all(data)
            .map_err(|e| map_io(&e, UploadError::WriteFailed))
    }

    #[cfg(not(target_os = "espidf"))]
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, UploadError> {
        self.stream
            .read(buf)
            .map_err(|e| map_io(&e, UploadError::ConnectFailed))
    }
}

// ───────────────────────────────────────────────────────────────
// Tests (host simulation)
// ───────────────────────────────────────────────────────────────
