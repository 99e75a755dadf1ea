//! Codec error types.

use thiserror::Error;

/// Errors raised while encoding or decoding SMS payloads.
///
/// Decoding errors never escape a listing: the session degrades the affected
/// record to literal text instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// The payload is not valid hexadecimal.
    #[error("invalid hex payload: {0}")]
    InvalidHex(String),

    /// The payload ended before the named field.
    #[error("payload truncated while reading {0}")]
    Truncated(&'static str),

    /// The first octet names a message type we do not decode.
    #[error("unsupported message type indicator {0:#04x}")]
    UnsupportedMessageType(u8),

    /// A character cannot be represented in the GSM 7-bit alphabet.
    #[error("character {0:?} is not in the GSM 7-bit alphabet")]
    NotGsm7(char),

    /// The text does not fit the user data of one PDU.
    #[error("message needs {needed} {unit} but one PDU holds {limit}")]
    MessageTooLong {
        needed: usize,
        limit: usize,
        unit: &'static str,
    },

    /// The destination number is empty or contains non-dialable characters.
    #[error("invalid destination address: {0:?}")]
    InvalidAddress(String),

    /// A concatenated message cannot have more than 255 parts.
    #[error("message would need {0} parts, the limit is 255")]
    TooManyParts(usize),
}
