//! Port abstraction layer for serial communication.
//!
//! Traits and implementations for the blocking serial link, plus the
//! discovery seams the connection pool is built on.

pub mod error;
pub mod mock;
pub mod scan;
pub mod sync_port;
pub mod traits;

pub use error::PortError;
pub use mock::{FixedScanner, MockPortOpener, MockSerialPort};
pub use scan::GlobScanner;
pub use sync_port::{SyncSerialPort, SystemPortOpener};
pub use traits::*;
