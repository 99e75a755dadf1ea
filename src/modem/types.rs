//! Values the device session reports.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How SMS are exchanged with the device (`AT+CMGF`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SmsMode {
    /// Binary PDUs as hex (`AT+CMGF=0`).
    #[default]
    Pdu,
    /// Text mode with the UCS2 character set (`AT+CMGF=1`, `AT+CSCS="UCS2"`).
    Text,
}

impl fmt::Display for SmsMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SmsMode::Pdu => f.write_str("pdu"),
            SmsMode::Text => f.write_str("text"),
        }
    }
}

impl FromStr for SmsMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pdu" => Ok(SmsMode::Pdu),
            "text" => Ok(SmsMode::Text),
            other => Err(format!("unknown sms mode {other:?}, expected pdu or text")),
        }
    }
}

/// Parsed `+CSQ` reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalReading {
    pub rssi: i32,
    /// Bit error rate class; 99 when unknown.
    pub quality: i32,
    /// `"-73 dBm"`, or `"unknown"` outside the 0..=31 range.
    pub dbm: String,
    /// 0 to 5 bars.
    pub level: u8,
}

impl SignalReading {
    pub fn new(rssi: i32, quality: i32) -> Self {
        let dbm = if (0..=31).contains(&rssi) {
            format!("{} dBm", -113 + rssi * 2)
        } else {
            "unknown".to_string()
        };
        let level = match rssi {
            20..=31 => 5,
            15..=19 => 4,
            10..=14 => 3,
            5..=9 => 2,
            1..=4 => 1,
            _ => 0,
        };
        Self {
            rssi,
            quality,
            dbm,
            level,
        }
    }
}

/// Identity fields, each queried independently.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModemIdentity {
    pub port: String,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub imei: Option<String>,
    pub imsi: Option<String>,
    pub operator: Option<String>,
    pub access_technology: Option<String>,
    pub phone_number: Option<String>,
}

/// Result of one index in a batch delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteOutcome {
    pub index: u32,
    pub deleted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
