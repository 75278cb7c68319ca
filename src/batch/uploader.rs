//! Batch uploader: one HTTPS POST per flush, pinned to a certificate
//! fingerprint.
//!
//! ```text
//!  Idle ──▶ Connecting ──▶ Verifying ──▶ Sending ──▶ AwaitingResponse ──▶ Done
//!               │              │            │               │
//!               └──────────────┴────────────┴───────────────┴──────────▶ Failed
//! ```
//!
//! `Done` clears the buffer; `Failed` keeps it for the next trigger.  Both
//! terminal states hold until the next [`BatchUploader::flush`], which
//! restarts at `Idle`.  There is no immediate retry or backoff; the next
//! attempt is the next timer tick.

use log::{info, warn};

use super::buffer::BatchBuffer;
use super::fingerprint::{Fingerprint, TrustCheck};
use super::http;
use crate::app::ports::{ConnectivityPort, SecureConnector, SecureSession};
use crate::config::{FingerprintPolicy, NodeConfig, ResponseMode};
use crate::error::{BufferError, ConfigError, UploadError};

/// Longest status line we bother to read.
const STATUS_LINE_MAX: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadState {
    Idle,
    Connecting,
    Verifying,
    Sending,
    AwaitingResponse,
    Done,
    Failed(UploadError),
}

/// Where and how to upload.
#[derive(Debug, Clone)]
pub struct UploadSettings {
    pub host: heapless::String<64>,
    pub port: u16,
    pub endpoint_id: heapless::String<96>,
    pub user_agent: heapless::String<32>,
    pub pinned: Fingerprint,
    pub fingerprint_policy: FingerprintPolicy,
    pub response_mode: ResponseMode,
    pub connect_timeout_ms: u32,
    pub response_timeout_ms: u32,
}

impl UploadSettings {
    pub fn from_config(cfg: &NodeConfig) -> Result<Self, ConfigError> {
        let pinned = cfg
            .pinned_fingerprint()
            .ok_or(ConfigError::ValidationFailed("fingerprint"))?;
        Ok(Self {
            host: cfg.upload_host.clone(),
            port: cfg.upload_port,
            endpoint_id: cfg.endpoint_id.clone(),
            user_agent: cfg.user_agent.clone(),
            pinned,
            fingerprint_policy: cfg.fingerprint_policy,
            response_mode: cfg.response_mode,
            connect_timeout_ms: cfg.connect_timeout_ms,
            response_timeout_ms: cfg.response_timeout_ms,
        })
    }
}

/// What a successful flush delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadOutcome {
    pub records: usize,
    /// Body bytes (the JSON array).
    pub bytes: usize,
    /// Status code, when the response was awaited.
    pub status: Option<u16>,
    pub trust: TrustCheck,
}

pub struct BatchUploader<C: SecureConnector> {
    connector: C,
    buffer: BatchBuffer,
    settings: UploadSettings,
    state: UploadState,
}

impl<C: SecureConnector> BatchUploader<C> {
    pub fn new(connector: C, buffer: BatchBuffer, settings: UploadSettings) -> Self {
        Self {
            connector,
            buffer,
            settings,
            state: UploadState::Idle,
        }
    }

    pub fn state(&self) -> UploadState {
        self.state
    }

    pub fn buffer(&self) -> &BatchBuffer {
        &self.buffer
    }

    pub fn settings(&self) -> &UploadSettings {
        &self.settings
    }

    pub fn connector_mut(&mut self) -> &mut C {
        &mut self.connector
    }

    /// Queue a rendered record for the next upload.
    pub fn append(&mut self, record: &[u8]) -> Result<(), BufferError> {
        self.buffer.append(record)
    }

    /// Drop every buffered record without uploading.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.state = UploadState::Idle;
    }

    /// Run one upload cycle.  An empty buffer still posts `[]`.
    pub fn flush(&mut self, network: &impl ConnectivityPort) -> Result<UploadOutcome, UploadError> {
        self.state = UploadState::Idle;
        match self.run(network) {
            Ok(outcome) => {
                self.buffer.clear();
                self.state = UploadState::Done;
                info!(
                    "Uploader: delivered {} records ({}B, status {:?})",
                    outcome.records, outcome.bytes, outcome.status
                );
                Ok(outcome)
            }
            Err(e) => {
                self.state = UploadState::Failed(e);
                warn!(
                    "Uploader: flush failed: {} ({} records retained)",
                    e,
                    self.buffer.len()
                );
                Err(e)
            }
        }
    }

    fn run(&mut self, network: &impl ConnectivityPort) -> Result<UploadOutcome, UploadError> {
        if !network.is_connected() {
            return Err(UploadError::NotConnected);
        }

        self.state = UploadState::Connecting;
        let s = &self.settings;
        let mut session = self.connector.connect(
            &s.host,
            s.port,
            s.connect_timeout_ms,
            s.response_timeout_ms,
        )?;

        self.state = UploadState::Verifying;
        let trust = TrustCheck::evaluate(&s.pinned, session.peer_fingerprint().as_ref());
        if !trust.is_trusted() {
            match s.fingerprint_policy {
                FingerprintPolicy::Enforce => return Err(UploadError::FingerprintMismatch),
                FingerprintPolicy::WarnOnly => {
                    warn!("Uploader: server certificate {:?}, continuing (warn-only)", trust);
                }
            }
        }

        self.state = UploadState::Sending;
        let body_len = self.buffer.json_array_len();
        let header = http::request_header(&s.host, &s.endpoint_id, &s.user_agent, body_len)
            .ok_or(UploadError::WriteFailed)?;
        session.write_all(header.as_bytes())?;
        self.buffer.write_json_array(|chunk| session.write_all(chunk))?;

        let status = match s.response_mode {
            ResponseMode::FireAndForget => None,
            ResponseMode::ConfirmStatus => {
                self.state = UploadState::AwaitingResponse;
                let code = read_status(&mut session)?;
                if !http::is_success(code) {
                    return Err(UploadError::HttpStatus(code));
                }
                Some(code)
            }
        };

        Ok(UploadOutcome {
            records: self.buffer.len(),
            bytes: body_len,
            status,
            trust,
        })
    }
}

/// Read up to the first line feed and parse it as a status line.
fn read_status(session: &mut impl SecureSession) -> Result<u16, UploadError> {
    let mut line = [0u8; STATUS_LINE_MAX];
    let mut filled = 0;
    while filled < line.len() {
        let n = session.read(&mut line[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
        if line[..filled].contains(&b'\n') {
            break;
        }
    }
    let end = line[..filled]
        .iter()
        .position(|&b| b == b'\n')
        .unwrap_or(filled);
    http::parse_status_line(&line[..end]).ok_or(UploadError::MalformedResponse)
}
