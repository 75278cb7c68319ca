//! Integration tests for the Node → publisher / uploader pipeline.
//!
//! These run on the host and drive the cooperative loop by hand with
//! explicit uptimes, so every schedule boundary is deterministic.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::mock_net::{
    publisher, settings, test_config, uploader, CapturedSink, MockConnector, MockEnv,
};

use hmd_sensor::app::service::Node;
use hmd_sensor::config::{FingerprintPolicy, NodeConfig, OverflowPolicy, ResponseMode};
use hmd_sensor::error::{Error, SensorError, UploadError};
use hmd_sensor::sensors::motion::MotionMonitor;

type TestNode<'m> = Node<'m, CapturedSink, MockConnector>;

fn make_node<'m>(config: &NodeConfig, motion: &'m MotionMonitor, slots: usize) -> TestNode<'m> {
    let up = uploader(
        slots,
        settings(FingerprintPolicy::Enforce, ResponseMode::ConfirmStatus),
    );
    Node::new(config, motion, publisher(), up)
}

fn sent(node: &TestNode<'_>) -> Vec<String> {
    node.publisher().sink().texts()
}

// ── Boot ──────────────────────────────────────────────────────

#[test]
fn start_syncs_time_and_says_hello() {
    let motion = MotionMonitor::new();
    let mut node = make_node(&test_config(), &motion, 16);
    let mut env = MockEnv::online();

    node.start(0, &mut env);

    assert_eq!(
        sent(&node),
        vec![r#"{"time":"1700000000","type":"hello","uptime":0,"motion_counter":0,"temp0":21.50}"#]
    );
    assert_eq!(node.uploader().buffer().len(), 1);
    assert_eq!(env.probe_reads, 1);
    assert!(node.clock().is_synced());
    assert_eq!(node.stats().time_syncs, 1);
}

#[test]
fn records_carry_zero_time_until_first_sync() {
    let motion = MotionMonitor::new();
    let mut node = make_node(&test_config(), &motion, 16);
    let mut env = MockEnv {
        epoch: None,
        ..MockEnv::online()
    };

    node.start(0, &mut env);

    assert!(sent(&node)[0].contains(r#""time":"0""#));
    assert_eq!(node.stats().time_sync_failures, 1);
    assert_eq!(node.sync_time(500, &mut env), Err(Error::TimeSync));

    env.epoch = Some(1_700_000_100);
    assert_eq!(node.sync_time(1_000, &mut env), Ok(1_700_000_100));
    assert_eq!(node.clock().epoch_at(3_000), 1_700_000_102);
}

#[test]
fn failed_probe_reports_sentinel_temperature() {
    let motion = MotionMonitor::new();
    let mut node = make_node(&test_config(), &motion, 16);
    let mut env = MockEnv {
        celsius: Err(SensorError::ReadFailed),
        ..MockEnv::online()
    };

    node.start(0, &mut env);

    assert!(sent(&node)[0].ends_with(r#""temp0":-127.00}"#));
    assert_eq!(node.sampler().failures(), 1);
}

#[test]
fn sensor_id_and_motion_state_are_optional_fields() {
    let motion = MotionMonitor::new();
    let mut config = test_config();
    config.sensor_id = Some(7);
    config.report_motion_state = true;
    let mut node = make_node(&config, &motion, 16);

    node.start(0, &mut MockEnv::online());

    assert_eq!(
        sent(&node)[0],
        r#"{"sensor_id":7,"time":"1700000000","type":"hello","uptime":0,"motion":0,"motion_counter":0,"temp0":21.50}"#
    );
}

#[test]
fn first_sync_is_picked_up_as_soon_as_time_arrives() {
    let motion = MotionMonitor::new();
    let mut node = make_node(&test_config(), &motion, 16);
    let mut env = MockEnv {
        epoch: None,
        ..MockEnv::online()
    };
    node.start(0, &mut env);

    node.poll(2_000, &mut env);
    assert!(!node.clock().is_synced());

    env.epoch = Some(1_700_000_100);
    node.poll(5_000, &mut env);
    assert!(node.clock().is_synced());
    let reads = env.epoch_reads;

    node.poll(30_000, &mut env);
    assert_eq!(env.epoch_reads, reads, "no further reads once synced");
    assert_eq!(
        sent(&node)[1],
        r#"{"time":"1700000125","type":"status","uptime":30000,"motion_counter":0,"temp0":21.50}"#
    );
    assert_eq!(node.stats().time_syncs, 1);
}

static STALLED_UPTIME: AtomicU32 = AtomicU32::new(0);

fn stalled_uptime() -> u32 {
    STALLED_UPTIME.load(Ordering::Relaxed)
}

#[test]
fn resync_anchors_to_uptime_at_the_moment_of_sync() {
    let motion = MotionMonitor::new();
    let mut node = make_node(&test_config(), &motion, 16).with_uptime_source(stalled_uptime);
    let mut env = MockEnv::online();
    node.start(0, &mut env);

    // Work earlier in the pass took four seconds before the resync ran.
    STALLED_UPTIME.store(3_604_000, Ordering::Relaxed);
    env.epoch = Some(1_700_003_604);
    node.poll(3_600_000, &mut env);

    assert_eq!(node.clock().epoch_at(3_604_000), 1_700_003_604);
    assert_eq!(node.clock().epoch_at(3_610_000), 1_700_003_610);
}

// ── Motion ────────────────────────────────────────────────────

#[test]
fn edge_queued_before_boot_sync_is_dated_backwards() {
    let motion = MotionMonitor::new();
    let mut node = make_node(&test_config(), &motion, 16);
    let mut env = MockEnv::online();

    motion.on_edge(true, 3_000);
    node.start(8_000, &mut env);
    node.poll(8_010, &mut env);

    assert_eq!(
        sent(&node)[1],
        r#"{"time":"1699999995","type":"motion","uptime":3000,"motion":1,"motion_counter":1,"temp0":21.50}"#
    );
}

#[test]
fn motion_records_upload_as_one_array_in_order() {
    let motion = MotionMonitor::new();
    let mut config = test_config();
    config.overflow_policy = OverflowPolicy::DropNewest;
    let mut node = make_node(&config, &motion, 16);
    let mut env = MockEnv::online();
    node.start(0, &mut env);
    node.uploader_mut().reset();

    motion.on_edge(true, 1_000);
    motion.on_edge(false, 1_500);
    motion.on_edge(true, 2_400);
    node.poll(2_500, &mut env);
    let outcome = node.flush(&env).expect("flush succeeded");

    let expected = concat!(
        r#"[{"time":"1700000001","type":"motion","uptime":1000,"motion":1,"motion_counter":1,"temp0":21.50},"#,
        r#"{"time":"1700000001","type":"motion","uptime":1500,"motion":0,"motion_counter":1,"temp0":21.50},"#,
        r#"{"time":"1700000002","type":"motion","uptime":2400,"motion":1,"motion_counter":2,"temp0":21.50}]"#,
    );
    assert_eq!(outcome.records, 3);
    assert_eq!(outcome.bytes, expected.len());
    let connector = node.uploader_mut().connector_mut();
    assert_eq!(connector.last_body().unwrap(), expected);
    assert!(connector
        .last_request()
        .unwrap()
        .contains(&format!("Content-Length: {}\r\n", expected.len())));
    assert!(node.uploader().buffer().is_empty());
}

#[test]
fn motion_edges_become_records_in_order() {
    let motion = MotionMonitor::new();
    let mut node = make_node(&test_config(), &motion, 16);
    let mut env = MockEnv::online();
    node.start(0, &mut env);

    // Three edges arrive before the loop gets to run.
    motion.on_edge(true, 1_000);
    motion.on_edge(false, 1_500);
    motion.on_edge(true, 2_400);
    node.poll(2_500, &mut env);

    let records = sent(&node);
    assert_eq!(records.len(), 4);
    assert_eq!(
        records[1],
        r#"{"time":"1700000001","type":"motion","uptime":1000,"motion":1,"motion_counter":1,"temp0":21.50}"#
    );
    assert_eq!(
        records[2],
        r#"{"time":"1700000001","type":"motion","uptime":1500,"motion":0,"motion_counter":1,"temp0":21.50}"#
    );
    assert_eq!(
        records[3],
        r#"{"time":"1700000002","type":"motion","uptime":2400,"motion":1,"motion_counter":2,"temp0":21.50}"#
    );
    assert_eq!(node.uploader().buffer().len(), 4);
}

#[test]
fn poll_without_edges_or_due_tasks_is_silent() {
    let motion = MotionMonitor::new();
    let mut node = make_node(&test_config(), &motion, 16);
    let mut env = MockEnv::online();
    node.start(0, &mut env);

    node.poll(10, &mut env);
    node.poll(29_999, &mut env);

    assert_eq!(sent(&node).len(), 1);
    assert_eq!(node.idle_budget_ms(29_999), 1);
}

// ── Schedules ─────────────────────────────────────────────────

#[test]
fn status_record_every_thirty_seconds() {
    let motion = MotionMonitor::new();
    let mut node = make_node(&test_config(), &motion, 16);
    let mut env = MockEnv::online();
    node.start(0, &mut env);
    motion.on_edge(true, 100);
    motion.on_edge(false, 200);
    node.poll(300, &mut env);

    node.poll(30_000, &mut env);
    node.poll(45_000, &mut env);
    node.poll(60_000, &mut env);

    let status: Vec<_> = sent(&node)
        .into_iter()
        .filter(|r| r.contains(r#""type":"status""#))
        .collect();
    assert_eq!(
        status,
        vec![
            r#"{"time":"1700000030","type":"status","uptime":30000,"motion_counter":1,"temp0":21.50}"#,
            r#"{"time":"1700000060","type":"status","uptime":60000,"motion_counter":1,"temp0":21.50}"#,
        ]
    );
}

#[test]
fn temperature_is_resampled_on_its_own_interval() {
    let motion = MotionMonitor::new();
    let mut node = make_node(&test_config(), &motion, 16);
    let mut env = MockEnv::online();
    node.start(0, &mut env);

    env.celsius = Ok(23.0);
    node.poll(30_000, &mut env);
    assert_eq!(env.probe_reads, 1, "status alone must not touch the probe");
    assert!(sent(&node)[1].ends_with(r#""temp0":21.50}"#));

    node.poll(60_000, &mut env);
    assert_eq!(env.probe_reads, 2);
}

#[test]
fn upload_interval_flushes_buffer() {
    let motion = MotionMonitor::new();
    let mut node = make_node(&test_config(), &motion, 16);
    let mut env = MockEnv::online();
    node.start(0, &mut env);

    node.poll(180_000, &mut env);

    let outcome = node.last_upload().expect("flush ran").expect("flush succeeded");
    assert_eq!(outcome.records, 2, "hello plus the status due at the same tick");
    assert_eq!(outcome.status, Some(200));
    assert!(node.uploader().buffer().is_empty());
    assert_eq!(node.stats().uploads_ok, 1);

    let body = node.uploader_mut().connector_mut().last_body().unwrap();
    assert!(body.starts_with(r#"[{"time":"1700000000","type":"hello""#));
    assert!(body.ends_with(r#""type":"status","uptime":180000,"motion_counter":0,"temp0":21.50}]"#));
}

#[test]
fn time_is_resynced_hourly() {
    let motion = MotionMonitor::new();
    let mut node = make_node(&test_config(), &motion, 16);
    let mut env = MockEnv::online();
    node.start(0, &mut env);
    assert_eq!(env.epoch_reads, 1);

    node.poll(3_599_999, &mut env);
    assert_eq!(env.epoch_reads, 1);
    node.poll(3_600_000, &mut env);
    assert_eq!(env.epoch_reads, 2);
    assert_eq!(node.stats().time_syncs, 2);
}

// ── Offline and overflow ──────────────────────────────────────

#[test]
fn offline_records_are_buffered_but_not_broadcast() {
    let motion = MotionMonitor::new();
    let mut node = make_node(&test_config(), &motion, 16);
    let mut env = MockEnv::offline();
    node.start(0, &mut env);

    node.poll(180_000, &mut env);

    assert!(sent(&node).is_empty());
    assert_eq!(node.publisher().stats().offline, 2);
    assert_eq!(node.last_upload(), Some(Err(UploadError::NotConnected)));
    assert_eq!(node.uploader().buffer().len(), 2);
    assert_eq!(node.stats().uploads_failed, 1);
}

#[test]
fn full_buffer_drops_newest_under_drop_policy() {
    let motion = MotionMonitor::new();
    let mut config = test_config();
    config.overflow_policy = OverflowPolicy::DropNewest;
    let mut node = make_node(&config, &motion, 2);
    let mut env = MockEnv::online();
    node.start(0, &mut env);

    motion.on_edge(true, 1_000);
    motion.on_edge(false, 2_000);
    node.poll(2_100, &mut env);

    assert_eq!(node.uploader().buffer().len(), 2);
    assert_eq!(node.stats().dropped_records, 1);
    assert_eq!(node.stats().forced_flushes, 0);
    // Broadcast is unaffected by the upload buffer.
    assert_eq!(sent(&node).len(), 3);
    assert!(node.uploader().buffer().render_as_json_array().contains(r#""uptime":1000"#));
}

#[test]
fn full_buffer_flushes_early_under_flush_policy() {
    let motion = MotionMonitor::new();
    let mut config = test_config();
    config.overflow_policy = OverflowPolicy::FlushThenDropNewest;
    let mut node = make_node(&config, &motion, 2);
    let mut env = MockEnv::online();
    node.start(0, &mut env);

    motion.on_edge(true, 1_000);
    motion.on_edge(false, 2_000);
    node.poll(2_100, &mut env);

    assert_eq!(node.stats().forced_flushes, 1);
    assert_eq!(node.stats().dropped_records, 0);
    assert_eq!(node.stats().uploads_ok, 1);
    let buffered = node.uploader().buffer().render_as_json_array();
    assert!(buffered.contains(r#""uptime":2000"#), "{buffered}");
    assert_eq!(node.uploader().buffer().len(), 1);
}

#[test]
fn forced_flush_that_fails_drops_the_record() {
    let motion = MotionMonitor::new();
    let mut node = make_node(&test_config(), &motion, 1);
    let mut env = MockEnv::online();
    node.uploader_mut().connector_mut().refuse = Some(UploadError::ConnectFailed);
    node.start(0, &mut env);

    motion.on_edge(true, 1_000);
    node.poll(1_100, &mut env);

    assert_eq!(node.stats().forced_flushes, 1);
    assert_eq!(node.stats().dropped_records, 1);
    assert_eq!(node.uploader().buffer().len(), 1);
}

#[test]
fn failed_forced_flush_waits_for_the_schedule() {
    let motion = MotionMonitor::new();
    let mut node = make_node(&test_config(), &motion, 1);
    let mut env = MockEnv::online();
    node.uploader_mut().connector_mut().refuse = Some(UploadError::ConnectFailed);
    node.start(0, &mut env);

    for i in 0..5u32 {
        motion.on_edge(i % 2 == 0, 1_000 + i * 50);
    }
    node.poll(1_500, &mut env);

    assert_eq!(node.uploader_mut().connector_mut().connects, 1);
    assert_eq!(node.stats().forced_flushes, 1);
    assert_eq!(node.stats().dropped_records, 5);

    // The scheduled flush is the next attempt.
    node.uploader_mut().connector_mut().refuse = None;
    node.poll(180_000, &mut env);
    assert_eq!(node.uploader_mut().connector_mut().connects, 2);
    assert_eq!(node.stats().uploads_ok, 1);
    assert!(node.uploader().buffer().is_empty());
}
