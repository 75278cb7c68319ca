//! Mock network and board adapters for integration tests.
//!
//! Every datagram and every upload request is recorded so tests can assert
//! on exactly what left the node, without sockets or TLS.

use std::cell::RefCell;
use std::rc::Rc;

use hmd_sensor::app::ports::{
    ConnectivityPort, DatagramSink, EpochSource, SecureConnector, SecureSession, TemperatureProbe,
};
use hmd_sensor::batch::{BatchBuffer, BatchUploader, Fingerprint, UploadSettings};
use hmd_sensor::config::{FingerprintPolicy, NodeConfig, ResponseMode};
use hmd_sensor::error::{Error, SensorError, UploadError};
use hmd_sensor::publish::UdpPublisher;

/// DER bytes the mock server presents unless a test says otherwise.
pub const SERVER_CERT: &[u8] = b"0\x82mock-upload-server-leaf-certificate";

pub const SUCCESS: &[u8] = b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\n\r\n{}";

// ── Board environment ─────────────────────────────────────────

/// Connectivity, temperature probe and epoch source in one value, the way
/// the hardware adapter presents them.
pub struct MockEnv {
    pub connected: bool,
    pub celsius: Result<f32, SensorError>,
    pub epoch: Option<u32>,
    pub probe_reads: u32,
    pub epoch_reads: u32,
}

#[allow(dead_code)]
impl MockEnv {
    pub fn online() -> Self {
        Self {
            connected: true,
            celsius: Ok(21.5),
            epoch: Some(1_700_000_000),
            probe_reads: 0,
            epoch_reads: 0,
        }
    }

    pub fn offline() -> Self {
        Self {
            connected: false,
            ..Self::online()
        }
    }
}

impl ConnectivityPort for MockEnv {
    fn is_connected(&self) -> bool {
        self.connected
    }
}

impl TemperatureProbe for MockEnv {
    fn read_celsius(&mut self, _index: u8) -> Result<f32, SensorError> {
        self.probe_reads += 1;
        self.celsius
    }
}

impl EpochSource for MockEnv {
    fn current_epoch(&mut self) -> Option<u32> {
        self.epoch_reads += 1;
        self.epoch
    }
}

// ── Datagram sink ─────────────────────────────────────────────

#[derive(Default)]
pub struct CapturedSink {
    pub datagrams: Vec<Vec<u8>>,
    pub fail: bool,
}

#[allow(dead_code)]
impl CapturedSink {
    pub fn texts(&self) -> Vec<String> {
        self.datagrams
            .iter()
            .map(|d| String::from_utf8_lossy(d).into_owned())
            .collect()
    }
}

impl DatagramSink for CapturedSink {
    fn send(&mut self, payload: &[u8]) -> Result<(), Error> {
        if self.fail {
            return Err(Error::Connectivity);
        }
        self.datagrams.push(payload.to_vec());
        Ok(())
    }
}

// ── Secure connector ──────────────────────────────────────────

/// Scripted upload server.
pub struct MockConnector {
    /// Certificate presented by the next sessions, `None` for no certificate.
    pub certificate: Option<Vec<u8>>,
    /// Error returned by `connect` instead of a session.
    pub refuse: Option<UploadError>,
    /// Bytes the server answers with.
    pub response: Vec<u8>,
    /// Error returned by the first read instead of the response.
    pub read_error: Option<UploadError>,
    /// One entry per session: everything the client wrote.
    pub requests: Rc<RefCell<Vec<Vec<u8>>>>,
    pub connects: u32,
}

#[allow(dead_code)]
impl MockConnector {
    pub fn new() -> Self {
        Self {
            certificate: Some(SERVER_CERT.to_vec()),
            refuse: None,
            response: SUCCESS.to_vec(),
            read_error: None,
            requests: Rc::new(RefCell::new(Vec::new())),
            connects: 0,
        }
    }

    pub fn request_count(&self) -> usize {
        self.requests.borrow().len()
    }

    pub fn last_request(&self) -> Option<String> {
        self.requests
            .borrow()
            .last()
            .map(|r| String::from_utf8_lossy(r).into_owned())
    }

    /// The JSON body of the most recent request.
    pub fn last_body(&self) -> Option<String> {
        let request = self.last_request()?;
        let (_, body) = request.split_once("\r\n\r\n")?;
        Some(body.to_owned())
    }
}

impl Default for MockConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl SecureConnector for MockConnector {
    type Session = MockSession;

    fn connect(
        &mut self,
        _host: &str,
        _port: u16,
        _connect_timeout_ms: u32,
        _io_timeout_ms: u32,
    ) -> Result<MockSession, UploadError> {
        self.connects += 1;
        if let Some(e) = self.refuse {
            return Err(e);
        }
        let index = {
            let mut requests = self.requests.borrow_mut();
            requests.push(Vec::new());
            requests.len() - 1
        };
        Ok(MockSession {
            peer: self.certificate.as_deref().map(Fingerprint::of_certificate),
            requests: Rc::clone(&self.requests),
            index,
            response: self.response.clone(),
            read_error: self.read_error,
            read_pos: 0,
        })
    }
}

pub struct MockSession {
    peer: Option<Fingerprint>,
    requests: Rc<RefCell<Vec<Vec<u8>>>>,
    index: usize,
    response: Vec<u8>,
    read_error: Option<UploadError>,
    read_pos: usize,
}

impl SecureSession for MockSession {
    fn peer_fingerprint(&self) -> Option<Fingerprint> {
        self.peer
    }

    fn write_all(&mut self, data: &[u8]) -> Result<(), UploadError> {
        self.requests.borrow_mut()[self.index].extend_from_slice(data);
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, UploadError> {
        if let Some(e) = self.read_error.take() {
            return Err(e);
        }
        // Dribble the response a few bytes at a time.
        let rest = &self.response[self.read_pos..];
        let n = rest.len().min(buf.len()).min(7);
        buf[..n].copy_from_slice(&rest[..n]);
        self.read_pos += n;
        Ok(n)
    }
}

// ── Fixtures ──────────────────────────────────────────────────

/// A configuration that passes validation and pins [`SERVER_CERT`].
pub fn test_config() -> NodeConfig {
    let fingerprint = Fingerprint::of_certificate(SERVER_CERT).to_string();
    let json = format!(
        r#"{{
            "wifi_ssid": "TestNet",
            "wifi_password": "password1",
            "endpoint_id": "AKfycbx-integration_test",
            "fingerprint": "{fingerprint}",
            "udp_rate_per_sec": 1000,
            "udp_burst": 1000
        }}"#
    );
    NodeConfig::from_json(&json).expect("test config must validate")
}

pub fn settings(policy: FingerprintPolicy, mode: ResponseMode) -> UploadSettings {
    let mut cfg = test_config();
    cfg.fingerprint_policy = policy;
    cfg.response_mode = mode;
    UploadSettings::from_config(&cfg).expect("settings")
}

pub fn uploader(slots: usize, settings: UploadSettings) -> BatchUploader<MockConnector> {
    BatchUploader::new(MockConnector::new(), BatchBuffer::new(slots, 160), settings)
}

/// Monotonic clock frozen at zero; the bucket never refills.
pub fn frozen_clock() -> std::time::Duration {
    std::time::Duration::ZERO
}

pub fn publisher() -> UdpPublisher<CapturedSink> {
    UdpPublisher::new(CapturedSink::default(), 1000, 1000, frozen_clock)
}
