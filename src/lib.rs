//! HMD sensor node firmware library.
//!
//! A PIR motion sensor and an NTC thermistor feed JSON telemetry records
//! that are broadcast over UDP and batched for HTTPS upload.  Exposes the
//! pure-logic modules for integration testing.  All ESP-IDF-specific code
//! is guarded by `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod app;
pub mod batch;
pub mod clock;
pub mod config;
pub mod error;
pub mod pins;
pub mod publish;
pub mod scheduler;
pub mod telemetry;
pub mod timer;

// Platform modules; the ESP-IDF implementations are guarded by cfg
// attributes inside, with host simulations otherwise.
pub mod adapters;
pub mod drivers;
pub mod sensors;
