//! AT command engine: command channel, device session and reply parsing.

pub mod channel;
pub mod error;
pub mod parse;
pub mod session;
pub mod types;

pub use channel::{ChannelSettings, CommandChannel, CommandExchange, LinkState, Outcome, CTRL_Z};
pub use error::ModemError;
pub use session::DeviceSession;
pub use types::{DeleteOutcome, ModemIdentity, SignalReading, SmsMode};
