//! Application service: the hexagonal core.
//!
//! [`Node`] owns the scheduler, wall clock, temperature sampler, UDP
//! publisher and batch uploader.  It exposes a hardware-agnostic API; the
//! network link, the probe and the epoch source are injected at call
//! sites, making the whole service testable with mock adapters.
//!
//! ```text
//!  MotionMonitor ──▶ ┌────────────────────────────┐ ──▶ DatagramSink
//!   (ISR queue)      │            Node            │
//!  TemperatureProbe ▶│ Scheduler · Clock · Buffer │ ──▶ SecureConnector
//!  EpochSource ────▶ └────────────────────────────┘
//! ```

use log::{debug, info, warn};

use crate::batch::{BatchUploader, UploadOutcome, UploadState};
use crate::clock::WallClock;
use crate::config::{NodeConfig, OverflowPolicy};
use crate::error::{BufferError, Error, UploadError};
use crate::publish::UdpPublisher;
use crate::scheduler::{Schedule, Scheduler, Task};
use crate::sensors::motion::{MotionEdge, MotionMonitor};
use crate::sensors::TemperatureSampler;
use crate::telemetry::{self, EventType, TelemetrySnapshot};

use super::ports::{ConnectivityPort, DatagramSink, EpochSource, SecureConnector, TemperatureProbe};

// ───────────────────────────────────────────────────────────────
// Statistics
// ───────────────────────────────────────────────────────────────

/// Counters kept for the lifetime of the node.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct NodeStats {
    /// Records rendered.
    pub records: u32,
    pub format_errors: u32,
    /// Records lost to a full or undersized buffer.
    pub dropped_records: u32,
    /// Flushes triggered by a full buffer rather than the timer.
    pub forced_flushes: u32,
    pub uploads_ok: u32,
    pub uploads_failed: u32,
    pub time_syncs: u32,
    pub time_sync_failures: u32,
}

/// Per-record options taken from the configuration.
#[derive(Debug, Clone, Copy)]
struct RecordOptions {
    sensor_id: Option<u32>,
    report_motion_state: bool,
    overflow_policy: OverflowPolicy,
}

// ───────────────────────────────────────────────────────────────
// Node
// ───────────────────────────────────────────────────────────────

pub struct Node<'m, S: DatagramSink, C: SecureConnector> {
    options: RecordOptions,
    motion: &'m MotionMonitor,
    scheduler: Scheduler,
    clock: WallClock,
    sampler: TemperatureSampler,
    publisher: UdpPublisher<S>,
    uploader: BatchUploader<C>,
    stats: NodeStats,
    last_upload: Option<Result<UploadOutcome, UploadError>>,
    /// Read at the moment of a time sync; `None` anchors to the pass's `now_ms`.
    uptime: Option<fn() -> u32>,
}

impl<'m, S: DatagramSink, C: SecureConnector> Node<'m, S, C> {
    /// Wire the node.  Schedules are registered in priority order:
    /// status, temperature, flush, time resync.
    pub fn new(
        config: &NodeConfig,
        motion: &'m MotionMonitor,
        publisher: UdpPublisher<S>,
        uploader: BatchUploader<C>,
    ) -> Self {
        let mut scheduler = Scheduler::new();
        scheduler.add(Schedule::every("status", Task::StatusReport, config.status_interval_ms));
        scheduler.add(Schedule::every(
            "temperature",
            Task::TemperatureRefresh,
            config.temperature_interval_ms,
        ));
        scheduler.add(Schedule::every("flush", Task::BatchFlush, config.upload_interval_ms));
        scheduler.add(Schedule::every("ntp", Task::TimeResync, config.time_sync_interval_ms));

        Self {
            options: RecordOptions {
                sensor_id: config.sensor_id,
                report_motion_state: config.report_motion_state,
                overflow_policy: config.overflow_policy,
            },
            motion,
            scheduler,
            clock: WallClock::new(),
            sampler: TemperatureSampler::new(config.temperature_probe_index),
            publisher,
            uploader,
            stats: NodeStats::default(),
            last_upload: None,
            uptime: None,
        }
    }

    /// Anchor time syncs to a fresh uptime reading instead of the start of
    /// the loop pass, so a slow flush earlier in the pass does not skew the
    /// wall clock.
    pub fn with_uptime_source(mut self, uptime: fn() -> u32) -> Self {
        self.uptime = Some(uptime);
        self
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Boot sequence: first time sync, first temperature sample, then the
    /// `hello` record.
    pub fn start(
        &mut self,
        now_ms: u32,
        env: &mut (impl ConnectivityPort + TemperatureProbe + EpochSource),
    ) {
        if let Err(e) = self.sync_time(now_ms, env) {
            warn!("Node: starting without wall-clock time ({})", e);
        }
        self.sampler.sample(env, now_ms);
        let snap = self.status_snapshot(now_ms);
        self.emit(EventType::Hello, &snap, &*env);
        info!("Node started at {}ms", now_ms);
    }

    // ── Per-iteration orchestration ───────────────────────────

    /// One pass of the cooperative loop: pick up the first time sync if
    /// boot ran without one, handle queued motion edges, then run every due
    /// task.
    pub fn poll(
        &mut self,
        now_ms: u32,
        env: &mut (impl ConnectivityPort + TemperatureProbe + EpochSource),
    ) {
        if !self.clock.is_synced() {
            self.try_first_sync(now_ms, env);
        }
        while let Some(edge) = self.motion.try_next_edge() {
            self.on_motion_edge(edge, &*env);
        }
        for task in self.scheduler.due(now_ms) {
            self.dispatch(task, now_ms, env);
        }
    }

    fn dispatch(
        &mut self,
        task: Task,
        now_ms: u32,
        env: &mut (impl ConnectivityPort + TemperatureProbe + EpochSource),
    ) {
        match task {
            Task::StatusReport => {
                let snap = self.status_snapshot(now_ms);
                self.emit(EventType::Status, &snap, &*env);
            }
            Task::TemperatureRefresh => {
                self.sampler.sample(env, now_ms);
            }
            Task::BatchFlush => {
                let _ = self.flush(&*env);
            }
            Task::TimeResync => {
                let _ = self.sync_time(now_ms, env);
            }
        }
    }

    fn on_motion_edge(&mut self, edge: MotionEdge, network: &impl ConnectivityPort) {
        debug!("Node: motion edge {:?}", edge);
        let snap = TelemetrySnapshot {
            sensor_id: self.options.sensor_id,
            epoch_secs: self.clock.epoch_at(edge.uptime_ms),
            uptime_ms: edge.uptime_ms,
            motion: Some(edge.motion),
            motion_counter: edge.counter,
            temperature_c: self.sampler.reading().celsius_or_sentinel(),
        };
        self.emit(EventType::Motion, &snap, network);
    }

    fn status_snapshot(&self, now_ms: u32) -> TelemetrySnapshot {
        let motion = self.motion.snapshot();
        TelemetrySnapshot {
            sensor_id: self.options.sensor_id,
            epoch_secs: self.clock.epoch_at(now_ms),
            uptime_ms: now_ms,
            motion: self.options.report_motion_state.then_some(motion.motion),
            motion_counter: motion.counter,
            temperature_c: self.sampler.reading().celsius_or_sentinel(),
        }
    }

    // ── Record pipeline ───────────────────────────────────────

    /// Render once, broadcast, then buffer for upload.
    fn emit(&mut self, event: EventType, snap: &TelemetrySnapshot, network: &impl ConnectivityPort) {
        let record = match telemetry::render(event, snap) {
            Ok(r) => r,
            Err(e) => {
                self.stats.format_errors = self.stats.format_errors.wrapping_add(1);
                warn!("Node: {} record not rendered: {}", event.as_str(), e);
                return;
            }
        };
        self.stats.records = self.stats.records.wrapping_add(1);
        debug!("Node: {}", record);

        self.publisher.publish(record.as_bytes(), network);
        if let Err(e) = self.buffer_record(record.as_bytes(), network) {
            self.stats.dropped_records = self.stats.dropped_records.wrapping_add(1);
            warn!("Node: {} record dropped: {}", event.as_str(), Error::from(e));
        }
    }

    /// Append to the batch.  A full buffer is flushed early at most once
    /// per failed cycle: after a failure the next attempt waits for the
    /// scheduled flush.
    fn buffer_record(&mut self, record: &[u8], network: &impl ConnectivityPort) -> Result<(), BufferError> {
        match self.uploader.append(record) {
            Err(BufferError::Full)
                if self.options.overflow_policy == OverflowPolicy::FlushThenDropNewest
                    && !matches!(self.uploader.state(), UploadState::Failed(_)) =>
            {
                self.stats.forced_flushes = self.stats.forced_flushes.wrapping_add(1);
                info!("Node: buffer full, flushing early");
                let _ = self.flush(network);
                self.uploader.append(record)
            }
            other => other,
        }
    }

    // ── Actions ───────────────────────────────────────────────

    /// Upload the buffer now.
    pub fn flush(&mut self, network: &impl ConnectivityPort) -> Result<UploadOutcome, UploadError> {
        let result = self.uploader.flush(network);
        match result {
            Ok(_) => self.stats.uploads_ok = self.stats.uploads_ok.wrapping_add(1),
            Err(_) => self.stats.uploads_failed = self.stats.uploads_failed.wrapping_add(1),
        }
        self.last_upload = Some(result);
        result
    }

    /// Re-anchor the wall clock from the epoch source.
    pub fn sync_time(&mut self, now_ms: u32, epoch: &mut impl EpochSource) -> Result<u32, Error> {
        match epoch.current_epoch() {
            Some(secs) => {
                self.anchor(secs, now_ms);
                info!("Node: time synced, epoch {}", secs);
                Ok(secs)
            }
            None => {
                self.stats.time_sync_failures = self.stats.time_sync_failures.wrapping_add(1);
                warn!("Node: time sync failed, keeping previous anchor");
                Err(Error::TimeSync)
            }
        }
    }

    /// Quiet retry used every pass until the clock has its first anchor.
    fn try_first_sync(&mut self, now_ms: u32, epoch: &mut impl EpochSource) {
        if let Some(secs) = epoch.current_epoch() {
            self.anchor(secs, now_ms);
            info!("Node: first time sync, epoch {}", secs);
        }
    }

    fn anchor(&mut self, secs: u32, now_ms: u32) {
        let uptime = self.uptime.map_or(now_ms, |f| f());
        self.clock.sync(secs, uptime);
        self.stats.time_syncs = self.stats.time_syncs.wrapping_add(1);
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn stats(&self) -> NodeStats {
        self.stats
    }

    pub fn uploader(&self) -> &BatchUploader<C> {
        &self.uploader
    }

    pub fn uploader_mut(&mut self) -> &mut BatchUploader<C> {
        &mut self.uploader
    }

    pub fn publisher(&self) -> &UdpPublisher<S> {
        &self.publisher
    }

    pub fn clock(&self) -> &WallClock {
        &self.clock
    }

    pub fn sampler(&self) -> &TemperatureSampler {
        &self.sampler
    }

    pub fn last_upload(&self) -> Option<Result<UploadOutcome, UploadError>> {
        self.last_upload
    }

    /// Milliseconds the main loop may sleep before the next timer is due.
    pub fn idle_budget_ms(&self, now_ms: u32) -> u32 {
        self.scheduler.next_due_in(now_ms).unwrap_or(0)
    }
}
