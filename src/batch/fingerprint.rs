//! SHA-256 certificate fingerprints for server pinning.

use core::fmt;

/// SHA-256 digest of a DER-encoded certificate.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Fingerprint(pub [u8; 32]);

impl Fingerprint {
    /// Fingerprint of a DER-encoded certificate.
    pub fn of_certificate(der: &[u8]) -> Self {
        Self(hmac_sha256::Hash::hash(der))
    }

    /// Parse 64 hex digits.  Byte pairs may be separated by `:` or spaces
    /// (the form browsers and `openssl x509 -fingerprint` print).
    pub fn parse(text: &str) -> Option<Self> {
        let mut out = [0u8; 32];
        let mut nibbles = 0usize;
        for b in text.bytes() {
            if b == b':' || b == b' ' {
                continue;
            }
            let v = hex_value(b)?;
            let i = nibbles / 2;
            if i >= out.len() {
                return None;
            }
            out[i] = (out[i] << 4) | v;
            nibbles += 1;
        }
        (nibbles == 64).then_some(Self(out))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, b) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(":")?;
            }
            write!(f, "{b:02X}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({self})")
    }
}

/// Result of comparing the presented certificate with the pinned one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustCheck {
    Matched,
    Mismatched,
    /// The session exposed no peer certificate.
    Unavailable,
}

impl TrustCheck {
    pub fn evaluate(pinned: &Fingerprint, presented: Option<&Fingerprint>) -> Self {
        match presented {
            Some(fp) if fp == pinned => Self::Matched,
            Some(_) => Self::Mismatched,
            None => Self::Unavailable,
        }
    }

    pub fn is_trusted(self) -> bool {
        self == Self::Matched
    }
}
