//! Fuzz target: `NodeConfig::from_json`
//!
//! Arbitrary build-time config text must be rejected with a typed error or
//! produce a configuration that passes its own validation.
//!
//! cargo fuzz run fuzz_node_config

#![no_main]

use hmd_sensor::config::NodeConfig;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = core::str::from_utf8(data) else {
        return;
    };
    if let Ok(config) = NodeConfig::from_json(text) {
        assert!(config.validate().is_ok());
        assert!(config.pinned_fingerprint().is_some());
    }
});
