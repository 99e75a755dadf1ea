//! End-to-end tests for modem-bridge.
//!
//! These tests run the whole engine without real hardware: scripted mock
//! modems stand in for the devices, and everything above the port layer is
//! the production code path from discovery through SMS and event delivery.

pub mod discovery_tests;
pub mod event_tests;
pub mod workflow_tests;
