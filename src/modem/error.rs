//! Engine error taxonomy.

use crate::pdu::CodecError;
use crate::port::PortError;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModemError {
    /// Opening, reading or writing the link failed. The channel is left `Failed`.
    #[error("transport failure on {identifier}: {source}")]
    Transport {
        identifier: String,
        #[source]
        source: PortError,
    },

    /// No terminal token arrived before the deadline.
    #[error("command {command:?} timed out after {elapsed:?}")]
    Timeout { command: String, elapsed: Duration },

    /// The device answered with an error token.
    #[error("command {command:?} failed: {response}")]
    Protocol { command: String, response: String },

    /// The reply could not be interpreted.
    #[error("could not parse {what} from {response:?}")]
    Parse { what: &'static str, response: String },

    #[error("{what} not reported by the device")]
    NotFound { what: &'static str },

    #[error("device not connected: {0}")]
    NotConnected(String),

    #[error("channel closed: {0}")]
    Closed(String),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

impl ModemError {
    pub fn transport(identifier: impl Into<String>, source: PortError) -> Self {
        Self::Transport {
            identifier: identifier.into(),
            source,
        }
    }

    /// Short machine-readable tag, used in CLI and service output.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport { .. } => "transport",
            Self::Timeout { .. } => "timeout",
            Self::Protocol { .. } => "protocol",
            Self::Parse { .. } => "parse",
            Self::NotFound { .. } => "not_found",
            Self::NotConnected(_) => "not_connected",
            Self::Closed(_) => "closed",
            Self::Codec(_) => "codec",
        }
    }
}
