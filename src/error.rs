//! Unified error types for the telemetry node.
//!
//! A single `Error` enum that every subsystem converts into, keeping the
//! cooperative loop's failure handling uniform.  All variants are `Copy` so
//! they can be logged and counted without allocation.  None of them are
//! fatal: the loop logs, counts, and carries on.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The station is not associated, or a TCP/TLS connect failed.
    Connectivity,
    /// The upload server presented an unexpected certificate.
    Trust,
    /// The batch buffer cannot take another record.
    Capacity(BufferError),
    /// The temperature probe could not be read.
    Sensor(SensorError),
    /// Wall-clock time is not available yet.
    TimeSync,
    /// The batch upload failed after connecting.
    Upload(UploadError),
    /// Configuration is invalid.
    Config(ConfigError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connectivity => write!(f, "connectivity: network unavailable"),
            Self::Trust => write!(f, "trust: certificate fingerprint mismatch"),
            Self::Capacity(e) => write!(f, "capacity: {e}"),
            Self::Sensor(e) => write!(f, "sensor: {e}"),
            Self::TimeSync => write!(f, "time sync: epoch not available"),
            Self::Upload(e) => write!(f, "upload: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Buffer errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferError {
    /// Every slot is occupied.
    Full,
    /// The record is longer than one slot.
    RecordTooLarge { len: usize, slot_size: usize },
}

impl fmt::Display for BufferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full => write!(f, "batch buffer full"),
            Self::RecordTooLarge { len, slot_size } => {
                write!(f, "record of {len}B exceeds {slot_size}B slot")
            }
        }
    }
}

impl From<BufferError> for Error {
    fn from(e: BufferError) -> Self {
        Self::Capacity(e)
    }
}

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// The probe did not answer (bus error, missing device).
    ReadFailed,
    /// The probe answered with its "disconnected" marker value.
    Disconnected,
    /// Reading is outside the physically plausible range.
    OutOfRange,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadFailed => write!(f, "probe read failed"),
            Self::Disconnected => write!(f, "probe disconnected"),
            Self::OutOfRange => write!(f, "reading out of range"),
        }
    }
}

impl From<SensorError> for Error {
    fn from(e: SensorError) -> Self {
        Self::Sensor(e)
    }
}

// ---------------------------------------------------------------------------
// Upload errors
// ---------------------------------------------------------------------------

/// Why a flush cycle ended in `Failed`.  The buffer is retained for all of
/// these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadError {
    /// Network down at trigger time; no connection was attempted.
    NotConnected,
    /// TCP connect or TLS handshake failed.
    ConnectFailed,
    /// Connect or response wait exceeded its deadline.
    Timeout,
    /// Pinned fingerprint did not match and the policy is `Enforce`.
    FingerprintMismatch,
    /// Writing the request failed part-way.
    WriteFailed,
    /// The server answered with a non-success status line.
    HttpStatus(u16),
    /// The response was not a parseable HTTP status line.
    MalformedResponse,
}

impl fmt::Display for UploadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotConnected => write!(f, "network not connected"),
            Self::ConnectFailed => write!(f, "connection failed"),
            Self::Timeout => write!(f, "timed out"),
            Self::FingerprintMismatch => write!(f, "certificate fingerprint mismatch"),
            Self::WriteFailed => write!(f, "request write failed"),
            Self::HttpStatus(code) => write!(f, "server answered HTTP {code}"),
            Self::MalformedResponse => write!(f, "malformed HTTP response"),
        }
    }
}

impl From<UploadError> for Error {
    fn from(e: UploadError) -> Self {
        match e {
            UploadError::NotConnected | UploadError::ConnectFailed => Self::Connectivity,
            UploadError::FingerprintMismatch => Self::Trust,
            other => Self::Upload(other),
        }
    }
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// The JSON override could not be parsed.
    Malformed,
    /// A field failed range validation.  The string names the field.
    ValidationFailed(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed => write!(f, "config JSON malformed"),
            Self::ValidationFailed(field) => write!(f, "validation failed: {field}"),
        }
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl std::error::Error for Error {}
impl std::error::Error for BufferError {}
impl std::error::Error for SensorError {}
impl std::error::Error for UploadError {}
impl std::error::Error for ConfigError {}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
