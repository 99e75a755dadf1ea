//! SMS payload codec.
//!
//! Pure functions only: encode SMS-SUBMIT PDUs (single or concatenated),
//! decode list responses in PDU and text mode, and merge concatenated parts
//! into logical messages.

pub mod error;
pub mod fragment;
pub mod gsm7;
pub mod tpdu;
pub mod ucs2;

pub use error::CodecError;
pub use fragment::{decode_fragment, reassemble, Fragment};
pub use tpdu::{decode_pdu, encode_submit, encode_submit_parts};
pub use ucs2::{decode_ucs2_hex, encode_ucs2_hex};

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// Timestamp layout used for every SMS the engine reports.
pub const TIME_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

/// Character set of the user data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alphabet {
    Gsm7,
    EightBit,
    Ucs2,
}

impl Alphabet {
    /// Interpret a data coding scheme octet (3GPP TS 23.038 section 4).
    pub fn from_dcs(dcs: u8) -> Self {
        match dcs >> 4 {
            // General data coding, with or without the "marked for deletion" bit.
            0x0..=0x7 => match (dcs >> 2) & 0x03 {
                0x01 => Alphabet::EightBit,
                0x02 => Alphabet::Ucs2,
                _ => Alphabet::Gsm7,
            },
            0xE => Alphabet::Ucs2,
            0xF if dcs & 0x04 != 0 => Alphabet::EightBit,
            _ => Alphabet::Gsm7,
        }
    }
}

/// Concatenation information element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Concatenation {
    pub reference: u16,
    pub total: u8,
    pub sequence: u8,
}

/// An encoded SMS-SUBMIT ready for `AT+CMGS`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitPdu {
    /// Upper-case hex, SMSC field included.
    pub hex: String,
    /// Octets after the SMSC field; the `AT+CMGS=<len>` argument.
    pub tpdu_length: usize,
    pub alphabet: Alphabet,
    pub concatenation: Option<Concatenation>,
}

/// Text-mode submission: number and body as UCS2 hex.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSubmission {
    pub number_hex: String,
    pub body_hex: String,
}

/// Encode a submission for text mode with `AT+CSCS="UCS2"`.
pub fn encode_text_submission(number: &str, text: &str) -> TextSubmission {
    TextSubmission {
        number_hex: encode_ucs2_hex(number),
        body_hex: encode_ucs2_hex(text),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Deliver,
    Submit,
}

/// A fully decoded PDU from a list response.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedPdu {
    pub kind: MessageKind,
    /// Originating address for deliveries, destination for stored submissions.
    pub address: String,
    pub timestamp: Option<DateTime<FixedOffset>>,
    pub dcs: u8,
    pub alphabet: Alphabet,
    pub text: String,
    pub concatenation: Option<Concatenation>,
}

impl DecodedPdu {
    /// Service centre timestamp in the sender's offset, or empty.
    pub fn time_string(&self) -> String {
        self.timestamp
            .map(|ts| ts.format(TIME_FORMAT).to_string())
            .unwrap_or_default()
    }
}

/// One physical SMS as stored on the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmsFragment {
    pub index: u32,
    pub status: String,
    pub sender: String,
    pub timestamp: String,
    pub text: String,
    pub reference: u16,
    pub total: u8,
    pub sequence: u8,
}

impl SmsFragment {
    /// A record that carries no concatenation metadata.
    pub fn single(
        index: u32,
        status: String,
        sender: String,
        timestamp: String,
        text: String,
    ) -> Self {
        Self {
            index,
            status,
            sender,
            timestamp,
            text,
            reference: 0,
            total: 1,
            sequence: 1,
        }
    }

    pub fn from_pdu(index: u32, status: String, pdu: DecodedPdu) -> Self {
        let timestamp = pdu.time_string();
        let concat = pdu.concatenation.unwrap_or(Concatenation {
            reference: 0,
            total: 1,
            sequence: 1,
        });
        Self {
            index,
            status,
            sender: pdu.address,
            timestamp,
            text: pdu.text,
            reference: concat.reference,
            total: concat.total,
            sequence: concat.sequence,
        }
    }
}

/// A user-facing message, possibly merged from several fragments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogicalSms {
    pub index: u32,
    pub status: String,
    pub number: String,
    pub time: String,
    pub message: String,
}

impl From<SmsFragment> for LogicalSms {
    fn from(f: SmsFragment) -> Self {
        Self {
            index: f.index,
            status: f.status,
            number: f.sender,
            time: f.timestamp,
            message: f.text,
        }
    }
}

/// Name of a `<stat>` value from `AT+CMGL` in PDU mode.
pub fn status_name(stat: u8) -> &'static str {
    match stat {
        0 => "REC UNREAD",
        1 => "REC READ",
        2 => "STO UNSENT",
        3 => "STO SENT",
        4 => "ALL",
        _ => "UNKNOWN",
    }
}
