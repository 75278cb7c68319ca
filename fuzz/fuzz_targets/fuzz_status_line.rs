//! Fuzz target: `parse_status_line`
//!
//! Whatever the upload server sends back, the parser must either reject it
//! or yield a code in the HTTP range.
//!
//! cargo fuzz run fuzz_status_line

#![no_main]

use hmd_sensor::batch::http::parse_status_line;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Some(code) = parse_status_line(data) {
        assert!((100..=599).contains(&code), "status {code} out of range");
    }
});
