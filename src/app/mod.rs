//! Application core: pure domain logic, zero I/O.
//!
//! This module contains the business rules of the telemetry node: what
//! record to emit when, where it goes, and when the batch is uploaded.
//! All interaction with the network and peripherals happens through
//! **port traits** defined in [`ports`], keeping this layer fully testable
//! on the host.

pub mod ports;
pub mod service;
