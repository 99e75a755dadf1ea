//! Port-level error types.
//!
//! Kept separate from `ModemError` so the link layer knows nothing about AT
//! semantics.

use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PortError {
    /// No device node answers to this path.
    #[error("no serial device at {0}")]
    NotFound(String),

    /// The driver rejected the requested line settings.
    #[error("unsupported line settings: {0}")]
    Config(String),

    #[error("serial I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("serial driver error: {0}")]
    Serial(#[from] serialport::Error),
}

impl PortError {
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// The link is healthy but had nothing to read.
    pub fn is_idle(&self) -> bool {
        match self {
            Self::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
            ),
            _ => false,
        }
    }

    /// Non-blocking "nothing yet": pause before polling again.
    pub fn is_would_block(&self) -> bool {
        matches!(self, Self::Io(e) if e.kind() == io::ErrorKind::WouldBlock)
    }
}
