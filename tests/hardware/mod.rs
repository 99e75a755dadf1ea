//! Hardware-specific tests requiring a real modem.
//!
//! These tests are ignored by default and require actual hardware to run.
//! They should be run manually with the `--ignored` flag and the
//! `MODEM_BRIDGE_TESTING_PORT` environment variable set.

pub mod modem_tests;
pub mod utils;
