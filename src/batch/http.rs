//! Minimal HTTP/1.1 framing for the batch POST.

use core::fmt::Write;

/// Room for the request line and headers.
pub const MAX_HEADER_LEN: usize = 384;

pub type RequestHeader = heapless::String<MAX_HEADER_LEN>;

/// Build the request head for a `body_len`-byte JSON body.  Ends with the
/// blank line; the body follows immediately.
pub fn request_header(
    host: &str,
    endpoint_id: &str,
    user_agent: &str,
    body_len: usize,
) -> Option<RequestHeader> {
    let mut h = RequestHeader::new();
    write!(
        h,
        "POST /macros/s/{endpoint_id}/exec HTTP/1.1\r\n\
         Host: {host}\r\n\
         User-Agent: {user_agent}\r\n\
         Content-Type: application/json\r\n\
         Content-Length: {body_len}\r\n\
         Connection: close\r\n\
         \r\n"
    )
    .ok()?;
    Some(h)
}

/// Extract the status code from an `HTTP/1.x NNN reason` line.
pub fn parse_status_line(line: &[u8]) -> Option<u16> {
    let line = core::str::from_utf8(line).ok()?;
    let line = line.trim_end_matches(['\r', '\n']);
    let mut parts = line.splitn(3, ' ');
    let version = parts.next()?;
    if !version.starts_with("HTTP/1.") {
        return None;
    }
    let code = parts.next()?;
    if code.len() != 3 || !code.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let code: u16 = code.parse().ok()?;
    (100..=599).contains(&code).then_some(code)
}

/// 2xx, or 3xx (Apps Script redirects to the result page after running).
pub fn is_success(status: u16) -> bool {
    (200..400).contains(&status)
}
