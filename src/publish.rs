//! Low-latency UDP broadcast of every rendered record.
//!
//! Fire-and-forget: one datagram per record, no retry, no buffering.  The
//! batch upload is the durable path; a lost datagram is only counted.

use core::time::Duration;

use burster::Limiter;
use log::{debug, warn};

use crate::app::ports::{ConnectivityPort, DatagramSink};

/// Hook applied to each payload before it leaves the node.
pub trait PayloadCipher {
    /// Transform `plain` and hand the result to `send`.
    fn seal(&mut self, plain: &[u8], send: &mut dyn FnMut(&[u8]) -> bool) -> bool;
}

/// Sends payloads unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct Passthrough;

impl PayloadCipher for Passthrough {
    fn seal(&mut self, plain: &[u8], send: &mut dyn FnMut(&[u8]) -> bool) -> bool {
        send(plain)
    }
}

/// Counters for the broadcast path.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PublishStats {
    pub sent: u32,
    /// Skipped because the network was down.
    pub offline: u32,
    /// Skipped by the rate limiter.
    pub throttled: u32,
    /// The socket rejected the datagram.
    pub failed: u32,
}

pub struct UdpPublisher<S: DatagramSink, C: PayloadCipher = Passthrough> {
    sink: S,
    cipher: C,
    limiter: burster::TokenBucket<fn() -> Duration>,
    stats: PublishStats,
}

impl<S: DatagramSink> UdpPublisher<S, Passthrough> {
    /// `rate_per_sec` sustained datagrams with bursts of `burst`, measured
    /// against the monotonic clock `now`.
    pub fn new(sink: S, rate_per_sec: u32, burst: u32, now: fn() -> Duration) -> Self {
        Self::with_cipher(sink, Passthrough, rate_per_sec, burst, now)
    }
}

impl<S: DatagramSink, C: PayloadCipher> UdpPublisher<S, C> {
    pub fn with_cipher(sink: S, cipher: C, rate_per_sec: u32, burst: u32, now: fn() -> Duration) -> Self {
        Self {
            sink,
            cipher,
            limiter: burster::TokenBucket::new_with_time_provider(
                rate_per_sec.into(),
                burst.into(),
                now,
            ),
            stats: PublishStats::default(),
        }
    }

    /// Broadcast one record.  Never fails from the caller's point of view.
    pub fn publish(&mut self, record: &[u8], network: &impl ConnectivityPort) {
        if !network.is_connected() {
            self.stats.offline = self.stats.offline.wrapping_add(1);
            debug!("Publish: offline, datagram skipped");
            return;
        }
        if self.limiter.try_consume(1).is_err() {
            self.stats.throttled = self.stats.throttled.wrapping_add(1);
            warn!("Publish: rate limit hit ({} throttled)", self.stats.throttled);
            return;
        }

        let sink = &mut self.sink;
        let sent = self.cipher.seal(record, &mut |payload| match sink.send(payload) {
            Ok(()) => true,
            Err(e) => {
                warn!("Publish: send failed: {}", e);
                false
            }
        });
        if sent {
            self.stats.sent = self.stats.sent.wrapping_add(1);
        } else {
            self.stats.failed = self.stats.failed.wrapping_add(1);
        }
    }

    pub fn stats(&self) -> PublishStats {
        self.stats
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }
}
