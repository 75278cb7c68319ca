//! ESP-IDF platform helpers for `TlsConnector`.
//!
//! Compiled only for `target_os = "espidf"`: an mbedTLS client session
//! running over an already-connected lwIP socket.
//!
//! All public items are `pub(super)` to keep them private to the adapter.

use std::ffi::CString;
use std::net::TcpStream;
use std::os::fd::AsRawFd;

use log::{info, warn};

use esp_idf_svc::sys::{
    EAGAIN, MBEDTLS_ERR_SSL_PEER_CLOSE_NOTIFY, MBEDTLS_ERR_SSL_WANT_READ,
    MBEDTLS_ERR_SSL_WANT_WRITE, MBEDTLS_SSL_IS_CLIENT, MBEDTLS_SSL_PRESET_DEFAULT,
    MBEDTLS_SSL_TRANSPORT_STREAM, MBEDTLS_SSL_VERIFY_NONE, lwip_recv, lwip_send,
    mbedtls_ctr_drbg_context, mbedtls_ctr_drbg_free, mbedtls_ctr_drbg_init,
    mbedtls_ctr_drbg_random, mbedtls_ctr_drbg_seed, mbedtls_entropy_context, mbedtls_entropy_free,
    mbedtls_entropy_func, mbedtls_entropy_init, mbedtls_ssl_close_notify,
    mbedtls_ssl_conf_authmode, mbedtls_ssl_conf_rng, mbedtls_ssl_config,
    mbedtls_ssl_config_defaults, mbedtls_ssl_config_free, mbedtls_ssl_config_init,
    mbedtls_ssl_context, mbedtls_ssl_free, mbedtls_ssl_get_peer_cert, mbedtls_ssl_handshake,
    mbedtls_ssl_init, mbedtls_ssl_read, mbedtls_ssl_set_bio, mbedtls_ssl_set_hostname,
    mbedtls_ssl_setup, mbedtls_ssl_write, vTaskDelay,
};

use crate::batch::Fingerprint;
use crate::error::UploadError;

/// Handshake rounds that may end in WANT_READ/WANT_WRITE.  Each round is
/// bounded by the socket timeout, so this also caps the handshake time.
const HANDSHAKE_MAX_RETRIES: u32 = 20;

/// Consecutive WANT_WRITE results tolerated while writing.
const WRITE_MAX_STALLS: u32 = 50;

// ── BIO callbacks ─────────────────────────────────────────────────────────────
//
// mbedTLS calls these to send/receive raw bytes over the socket.  The fd is
// passed as the `p_bio` context pointer.

/// # Safety
///
/// `ctx` must be a raw file descriptor cast to `*mut c_void`, valid for the
/// lifetime of the session (owned by `EspTlsClient::stream`).
unsafe extern "C" fn bio_send(
    ctx: *mut core::ffi::c_void,
    buf: *const u8,
    len: usize,
) -> core::ffi::c_int {
    let fd = ctx as core::ffi::c_int;
    let ret = unsafe { lwip_send(fd, buf as *const core::ffi::c_void, len, 0) } as core::ffi::c_int;
    if ret < 0 && errno_is_again() {
        return MBEDTLS_ERR_SSL_WANT_WRITE;
    }
    ret
}

/// # Safety
///
/// Same invariants as `bio_send`.  A socket timeout (EAGAIN) is reported as
/// `MBEDTLS_ERR_SSL_WANT_READ`.
unsafe extern "C" fn bio_recv(
    ctx: *mut core::ffi::c_void,
    buf: *mut u8,
    len: usize,
) -> core::ffi::c_int {
    let fd = ctx as core::ffi::c_int;
    let ret = unsafe { lwip_recv(fd, buf as *mut core::ffi::c_void, len, 0) } as core::ffi::c_int;
    if ret < 0 && errno_is_again() {
        return MBEDTLS_ERR_SSL_WANT_READ;
    }
    ret
}

fn errno_is_again() -> bool {
    // SAFETY: __errno() returns the pointer to the current task errno,
    // which is valid to read in any task context.
    let err = unsafe { *esp_idf_svc::sys::__errno() };
    err == EAGAIN as i32
}

// ── Session state ─────────────────────────────────────────────────────────────

/// Per-connection TLS state.  mbedTLS structs are boxed to keep them off
/// the main task stack and at stable addresses.
pub(super) struct EspTlsClient {
    ssl: Box<mbedtls_ssl_context>,
    conf: Box<mbedtls_ssl_config>,
    entropy: Box<mbedtls_entropy_context>,
    drbg: Box<mbedtls_ctr_drbg_context>,
    peer: Option<Fingerprint>,
    // Dropped last: closes the socket after the TLS teardown.
    stream: TcpStream,
}

unsafe impl Send for EspTlsClient {}

impl EspTlsClient {
    pub(super) fn peer_fingerprint(&self) -> Option<Fingerprint> {
        self.peer
    }
}

impl Drop for EspTlsClient {
    fn drop(&mut self) {
        // SAFETY: every context was initialised in `esp_connect` and is
        // freed exactly once here; the socket is still open.
        unsafe {
            mbedtls_ssl_close_notify(self.ssl.as_mut());
            mbedtls_ssl_free(self.ssl.as_mut());
            mbedtls_ssl_config_free(self.conf.as_mut());
            mbedtls_ctr_drbg_free(self.drbg.as_mut());
            mbedtls_entropy_free(self.entropy.as_mut());
        }
        let _ = self.stream.shutdown(std::net::Shutdown::Both);
    }
}

// ── Public helpers ────────────────────────────────────────────────────────────

/// Run the client handshake over `stream` with SNI `host`, then capture
/// the peer certificate fingerprint.
pub(super) fn esp_connect(stream: TcpStream, host: &str) -> Result<EspTlsClient, UploadError> {
    let fd = stream.as_raw_fd();
    let sni = CString::new(host).map_err(|_| UploadError::ConnectFailed)?;

    let mut client = EspTlsClient {
        ssl: Box::new(mbedtls_ssl_context::default()),
        conf: Box::new(mbedtls_ssl_config::default()),
        entropy: Box::new(mbedtls_entropy_context::default()),
        drbg: Box::new(mbedtls_ctr_drbg_context::default()),
        peer: None,
        stream,
    };

    // SAFETY: All pointers come from Box::as_mut() and are valid, aligned
    // and exclusively owned.  The init calls run before anything can fail,
    // so Drop always frees initialised contexts.
    unsafe {
        mbedtls_entropy_init(client.entropy.as_mut());
        mbedtls_ctr_drbg_init(client.drbg.as_mut());
        mbedtls_ssl_config_init(client.conf.as_mut());
        mbedtls_ssl_init(client.ssl.as_mut());

        let seed_label = b"hmd-sensor-upload";
        let rc = mbedtls_ctr_drbg_seed(
            client.drbg.as_mut(),
            Some(mbedtls_entropy_func),
            client.entropy.as_mut() as *mut _ as *mut core::ffi::c_void,
            seed_label.as_ptr(),
            seed_label.len(),
        );
        if rc != 0 {
            warn!("TLS(espidf): ctr_drbg_seed failed (rc={})", rc);
            return Err(UploadError::ConnectFailed);
        }

        let rc = mbedtls_ssl_config_defaults(
            client.conf.as_mut(),
            MBEDTLS_SSL_IS_CLIENT as _,
            MBEDTLS_SSL_TRANSPORT_STREAM as _,
            MBEDTLS_SSL_PRESET_DEFAULT as _,
        );
        if rc != 0 {
            warn!("TLS(espidf): ssl_config_defaults failed (rc={})", rc);
            return Err(UploadError::ConnectFailed);
        }

        // Trust is decided by the fingerprint pin after the handshake.
        mbedtls_ssl_conf_authmode(client.conf.as_mut(), MBEDTLS_SSL_VERIFY_NONE as _);
        mbedtls_ssl_conf_rng(
            client.conf.as_mut(),
            Some(mbedtls_ctr_drbg_random),
            client.drbg.as_mut() as *mut _ as *mut core::ffi::c_void,
        );

        let rc = mbedtls_ssl_setup(client.ssl.as_mut(), client.conf.as_ref());
        if rc != 0 {
            warn!("TLS(espidf): ssl_setup failed (rc={})", rc);
            return Err(UploadError::ConnectFailed);
        }

        let rc = mbedtls_ssl_set_hostname(client.ssl.as_mut(), sni.as_ptr());
        if rc != 0 {
            warn!("TLS(espidf): ssl_set_hostname failed (rc={})", rc);
            return Err(UploadError::ConnectFailed);
        }

        mbedtls_ssl_set_bio(
            client.ssl.as_mut(),
            fd as usize as *mut core::ffi::c_void,
            Some(bio_send),
            Some(bio_recv),
            None,
        );
    }

    let mut retries = 0u32;
    loop {
        // SAFETY: ssl is set up, BIO callbacks set, conf outlives ssl.
        let rc = unsafe { mbedtls_ssl_handshake(client.ssl.as_mut()) };
        if rc == 0 {
            break;
        }
        if rc == MBEDTLS_ERR_SSL_WANT_READ || rc == MBEDTLS_ERR_SSL_WANT_WRITE {
            retries += 1;
            if retries >= HANDSHAKE_MAX_RETRIES {
                warn!("TLS(espidf): handshake timed out after {} rounds", retries);
                return Err(UploadError::Timeout);
            }
            // SAFETY: vTaskDelay is safe to call from any task context.
            unsafe { vTaskDelay(1) };
            continue;
        }
        warn!("TLS(espidf): handshake failed (rc={})", rc);
        return Err(UploadError::ConnectFailed);
    }

    client.peer = peer_certificate_fingerprint(client.ssl.as_ref());
    info!("TLS(espidf): handshake complete with {} (fd={})", host, fd);
    Ok(client)
}

/// SHA-256 over the DER bytes of the peer's leaf certificate.
fn peer_certificate_fingerprint(ssl: &mbedtls_ssl_context) -> Option<Fingerprint> {
    // SAFETY: the returned pointer, when non-null, borrows from `ssl` and
    // stays valid while the session is alive; `raw.p`/`raw.len` describe
    // the DER buffer owned by the certificate.
    unsafe {
        let crt = mbedtls_ssl_get_peer_cert(ssl);
        if crt.is_null() {
            return None;
        }
        let raw = &(*crt).raw;
        if raw.p.is_null() || raw.len == 0 {
            return None;
        }
        let der = core::slice::from_raw_parts(raw.p, raw.len);
        Some(Fingerprint::of_certificate(der))
    }
}

/// Write all of `data`, retrying partial writes.
pub(super) fn esp_write_all(client: &mut EspTlsClient, mut data: &[u8]) -> Result<(), UploadError> {
    let mut stalls = 0u32;
    while !data.is_empty() {
        // SAFETY: ssl is valid and connected; data is a valid slice.
        let rc = unsafe { mbedtls_ssl_write(client.ssl.as_mut(), data.as_ptr(), data.len()) };
        if rc > 0 {
            data = &data[rc as usize..];
            stalls = 0;
            continue;
        }
        if rc == MBEDTLS_ERR_SSL_WANT_WRITE || rc == MBEDTLS_ERR_SSL_WANT_READ {
            stalls += 1;
            if stalls >= WRITE_MAX_STALLS {
                return Err(UploadError::Timeout);
            }
            // SAFETY: vTaskDelay is safe to call from any task context.
            unsafe { vTaskDelay(1) };
            continue;
        }
        warn!("TLS(espidf): ssl_write error (rc={})", rc);
        return Err(UploadError::WriteFailed);
    }
    Ok(())
}

/// Blocking read bounded by the socket timeout.
///
/// `Ok(0)` means the peer closed; a timeout is `UploadError::Timeout`.
pub(super) fn esp_read(client: &mut EspTlsClient, buf: &mut [u8]) -> Result<usize, UploadError> {
    // SAFETY: ssl is valid and connected; buf is a valid mutable slice.
    let rc = unsafe { mbedtls_ssl_read(client.ssl.as_mut(), buf.as_mut_ptr(), buf.len()) };
    if rc > 0 {
        return Ok(rc as usize);
    }
    if rc == 0 || rc == MBEDTLS_ERR_SSL_PEER_CLOSE_NOTIFY {
        return Ok(0);
    }
    if rc == MBEDTLS_ERR_SSL_WANT_READ {
        return Err(UploadError::Timeout);
    }
    warn!("TLS(espidf): ssl_read error (rc={})", rc);
    Err(UploadError::ConnectFailed)
}
