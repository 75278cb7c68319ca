//! Integration tests for the batch uploader state machine against a
//! scripted upload server.

use crate::mock_net::{settings, uploader, MockEnv, SERVER_CERT};

use hmd_sensor::batch::{Fingerprint, TrustCheck, UploadState};
use hmd_sensor::config::{FingerprintPolicy, ResponseMode};
use hmd_sensor::error::UploadError;

const R1: &[u8] = br#"{"time":"1700000000","type":"hello","uptime":0,"motion_counter":0,"temp0":21.50}"#;
const R2: &[u8] = br#"{"time":"1700000030","type":"status","uptime":30000,"motion_counter":2,"temp0":21.50}"#;

fn enforced() -> hmd_sensor::batch::UploadSettings {
    settings(FingerprintPolicy::Enforce, ResponseMode::ConfirmStatus)
}

// ── Happy path ────────────────────────────────────────────────

#[test]
fn flush_posts_records_as_one_json_array() {
    let mut up = uploader(8, enforced());
    up.append(R1).unwrap();
    up.append(R2).unwrap();

    let outcome = up.flush(&MockEnv::online()).expect("upload should succeed");

    assert_eq!(outcome.records, 2);
    assert_eq!(outcome.status, Some(200));
    assert_eq!(outcome.trust, TrustCheck::Matched);
    assert_eq!(up.state(), UploadState::Done);
    assert!(up.buffer().is_empty(), "delivered records must be cleared");

    let expected_body = format!(
        "[{},{}]",
        core::str::from_utf8(R1).unwrap(),
        core::str::from_utf8(R2).unwrap()
    );
    assert_eq!(outcome.bytes, expected_body.len());

    let connector = up.connector_mut();
    let request = connector.last_request().unwrap();
    assert!(request.starts_with("POST /macros/s/AKfycbx-integration_test/exec HTTP/1.1\r\n"));
    assert!(request.contains("Host: script.google.com\r\n"));
    assert!(request.contains("User-Agent: HMD-Sensor\r\n"));
    assert!(request.contains(&format!("Content-Length: {}\r\n", expected_body.len())));
    assert_eq!(connector.last_body().unwrap(), expected_body);
}

#[test]
fn empty_buffer_still_posts_an_empty_array() {
    let mut up = uploader(8, enforced());

    let outcome = up.flush(&MockEnv::online()).unwrap();

    assert_eq!(outcome.records, 0);
    assert_eq!(outcome.bytes, 2);
    let connector = up.connector_mut();
    assert!(connector.last_request().unwrap().contains("Content-Length: 2\r\n"));
    assert_eq!(connector.last_body().unwrap(), "[]");
}

#[test]
fn redirect_counts_as_delivered() {
    let mut up = uploader(8, enforced());
    up.connector_mut().response = b"HTTP/1.1 302 Moved Temporarily\r\nLocation: x\r\n\r\n".to_vec();
    up.append(R1).unwrap();

    let outcome = up.flush(&MockEnv::online()).unwrap();

    assert_eq!(outcome.status, Some(302));
    assert!(up.buffer().is_empty());
}

#[test]
fn fire_and_forget_skips_the_response() {
    let mut up = uploader(8, settings(FingerprintPolicy::Enforce, ResponseMode::FireAndForget));
    up.connector_mut().read_error = Some(UploadError::Timeout);
    up.append(R1).unwrap();

    let outcome = up.flush(&MockEnv::online()).unwrap();

    assert_eq!(outcome.status, None);
    assert_eq!(up.state(), UploadState::Done);
    assert!(up.buffer().is_empty());
}

// ── Failures keep the buffer ──────────────────────────────────

#[test]
fn offline_flush_never_connects() {
    let mut up = uploader(8, enforced());
    up.append(R1).unwrap();

    assert_eq!(up.flush(&MockEnv::offline()), Err(UploadError::NotConnected));
    assert_eq!(up.state(), UploadState::Failed(UploadError::NotConnected));
    assert_eq!(up.connector_mut().connects, 0);
    assert_eq!(up.buffer().len(), 1);
}

#[test]
fn connect_failure_keeps_records_for_next_attempt() {
    let mut up = uploader(8, enforced());
    up.append(R1).unwrap();
    up.connector_mut().refuse = Some(UploadError::ConnectFailed);

    assert_eq!(up.flush(&MockEnv::online()), Err(UploadError::ConnectFailed));
    assert_eq!(up.buffer().len(), 1);

    // Next trigger succeeds and delivers the retained record.
    up.connector_mut().refuse = None;
    let outcome = up.flush(&MockEnv::online()).unwrap();
    assert_eq!(outcome.records, 1);
    assert_eq!(
        up.connector_mut().last_body().unwrap(),
        format!("[{}]", core::str::from_utf8(R1).unwrap())
    );
}

#[test]
fn server_error_is_reported_and_buffer_kept() {
    let mut up = uploader(8, enforced());
    up.connector_mut().response = b"HTTP/1.1 500 Internal Server Error\r\n\r\n".to_vec();
    up.append(R1).unwrap();

    assert_eq!(up.flush(&MockEnv::online()), Err(UploadError::HttpStatus(500)));
    assert_eq!(up.state(), UploadState::Failed(UploadError::HttpStatus(500)));
    assert_eq!(up.buffer().len(), 1);
}

#[test]
fn garbage_response_is_malformed() {
    let mut up = uploader(8, enforced());
    up.connector_mut().response = b"SSH-2.0-OpenSSH_9.6\r\n".to_vec();

    assert_eq!(up.flush(&MockEnv::online()), Err(UploadError::MalformedResponse));
}

#[test]
fn response_timeout_fails_the_cycle() {
    let mut up = uploader(8, enforced());
    up.connector_mut().read_error = Some(UploadError::Timeout);
    up.append(R1).unwrap();

    assert_eq!(up.flush(&MockEnv::online()), Err(UploadError::Timeout));
    assert_eq!(up.buffer().len(), 1);
}

// ── Certificate pinning ───────────────────────────────────────

#[test]
fn enforced_pin_blocks_unexpected_certificate() {
    let mut up = uploader(8, enforced());
    up.connector_mut().certificate = Some(b"some-other-certificate".to_vec());
    up.append(R1).unwrap();

    assert_eq!(up.flush(&MockEnv::online()), Err(UploadError::FingerprintMismatch));
    assert_eq!(up.buffer().len(), 1);
    assert!(
        up.connector_mut().last_request().unwrap().is_empty(),
        "nothing may be written to an untrusted server"
    );
}

#[test]
fn enforced_pin_blocks_session_without_certificate() {
    let mut up = uploader(8, enforced());
    up.connector_mut().certificate = None;

    assert_eq!(up.flush(&MockEnv::online()), Err(UploadError::FingerprintMismatch));
}

#[test]
fn warn_only_policy_uploads_anyway() {
    let mut up = uploader(8, settings(FingerprintPolicy::WarnOnly, ResponseMode::ConfirmStatus));
    up.connector_mut().certificate = Some(b"some-other-certificate".to_vec());
    up.append(R1).unwrap();

    let outcome = up.flush(&MockEnv::online()).unwrap();

    assert_eq!(outcome.trust, TrustCheck::Mismatched);
    assert!(up.buffer().is_empty());
}

#[test]
fn settings_pin_the_configured_certificate() {
    let up = uploader(8, enforced());
    assert_eq!(up.settings().pinned, Fingerprint::of_certificate(SERVER_CERT));
}

#[test]
fn reset_discards_without_uploading() {
    let mut up = uploader(8, enforced());
    up.append(R1).unwrap();
    up.reset();

    assert!(up.buffer().is_empty());
    assert_eq!(up.state(), UploadState::Idle);
    assert_eq!(up.connector_mut().connects, 0);
}
