//! Modem Bridge Library
//!
//! Drives GSM/LTE modems attached as serial devices through AT commands and
//! exposes identity, signal and SMS state to callers.
//!
//! # Modules
//!
//! - `pdu`: SMS PDU codec, UCS2/GSM-7 text, concatenated-message reassembly
//! - `port`: Port abstraction layer for serial communication
//! - `modem`: Command channel and device session over one port
//! - `pool`: Discovery and registry of device sessions
//! - `events`: Broadcast of raw device chatter to subscribers
//! - `service`: Async facade for request layers
//! - `config`: Configuration management with TOML support
//! - `logging`: `tracing` subscriber setup
//! - `error`: Unified error handling

pub mod config;
pub mod error;
pub mod events;
pub mod logging;
pub mod modem;
pub mod pdu;
pub mod pool;
pub mod port;
pub mod service;

// Re-export commonly used types for convenience
pub use error::{AppError, AppResult};
pub use events::{EventBus, Unsubscribe};
pub use modem::{
    ChannelSettings, CommandChannel, CommandExchange, DeviceSession, LinkState, ModemError,
    ModemIdentity, Outcome, SignalReading, SmsMode,
};
pub use pdu::{CodecError, LogicalSms, SmsFragment};
pub use pool::{ConnectionPool, PortListing};
pub use port::{
    DeviceScanner, GlobScanner, MockSerialPort, PortConfiguration, PortError, PortOpener,
    SerialPortAdapter, SyncSerialPort, SystemPortOpener,
};
pub use service::{ModemService, RawCommandResult, ScanResult, SendSmsRequest, SendSmsResult};

// Re-export config types
pub use config::{Config, ConfigError, ConfigLoader, ConfigResult};
