//! Modem-facing API over a command channel.

use super::channel::{ChannelSettings, CommandChannel, LinkState, Outcome, CTRL_Z};
use super::error::ModemError;
use super::parse::{self, ListRecord};
use super::types::{DeleteOutcome, ModemIdentity, SignalReading, SmsMode};
use crate::events::EventBus;
use crate::pdu::{self, LogicalSms, SmsFragment};
use crate::port::PortOpener;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A verified, active device. Created and closed only by the connection pool.
#[derive(Debug)]
pub struct DeviceSession {
    channel: CommandChannel,
    /// Concatenation reference for the next multi-part message.
    next_reference: AtomicU8,
}

impl DeviceSession {
    pub(crate) fn open(
        identifier: &str,
        opener: &dyn PortOpener,
        settings: ChannelSettings,
        events: Arc<EventBus>,
    ) -> Result<Self, ModemError> {
        let channel = CommandChannel::open(identifier, opener, settings, events)?;
        let seed = chrono::Utc::now().timestamp_subsec_nanos() as u8;
        Ok(Self {
            channel,
            next_reference: AtomicU8::new(seed),
        })
    }

    pub(crate) fn close(&self) {
        self.channel.close();
    }

    pub fn identifier(&self) -> &str {
        self.channel.identifier()
    }

    pub fn state(&self) -> LinkState {
        self.channel.state()
    }

    pub fn sms_mode(&self) -> SmsMode {
        self.channel.settings().sms_mode
    }

    /// Response text of a command that must not end in an error token.
    fn query(&self, command: &str) -> Result<String, ModemError> {
        Ok(self.channel.send_command(command)?.into_result()?.response)
    }

    fn optional_field<F>(&self, command: &str, extract: F) -> Option<String>
    where
        F: FnOnce(&str) -> Option<String>,
    {
        match self.query(command) {
            Ok(response) => extract(&response),
            Err(e) => {
                debug!(
                    identifier = %self.identifier(),
                    command,
                    error = %e,
                    "identity field unavailable"
                );
                None
            }
        }
    }

    /// Query every identity field; failures leave that field empty.
    pub fn identity(&self) -> ModemIdentity {
        let operator_reply = self.optional_field("AT+COPS?", |r| Some(r.to_string()));
        ModemIdentity {
            port: self.identifier().to_string(),
            manufacturer: self.optional_field("AT+CGMI", parse::extract_value),
            model: self.optional_field("AT+CGMM", parse::extract_value),
            imei: self.optional_field("AT+CGSN", parse::extract_value),
            imsi: self.optional_field("AT+CIMI", parse::extract_value),
            operator: operator_reply.as_deref().and_then(parse::parse_operator),
            access_technology: operator_reply
                .as_deref()
                .and_then(parse::parse_access_technology),
            phone_number: self.phone_number().ok(),
        }
    }

    pub fn signal(&self) -> Result<SignalReading, ModemError> {
        let response = self.query("AT+CSQ")?;
        let (rssi, quality) = parse::parse_csq(&response).ok_or_else(|| ModemError::Parse {
            what: "signal quality",
            response: response.clone(),
        })?;
        Ok(SignalReading::new(rssi, quality))
    }

    /// Own number from `AT+CNUM`, decoded from UCS2 hex when that yields a
    /// dialable string.
    pub fn phone_number(&self) -> Result<String, ModemError> {
        let response = self.query("AT+CNUM")?;
        let raw = parse::parse_cnum(&response).ok_or(ModemError::NotFound {
            what: "phone number",
        })?;
        Ok(readable_number(&raw))
    }

    /// Every stored message, concatenated parts merged, ordered by index.
    pub fn list_sms(&self) -> Result<Vec<LogicalSms>, ModemError> {
        let mode = self.sms_mode();
        let command = match mode {
            SmsMode::Pdu => "AT+CMGL=4",
            SmsMode::Text => "AT+CMGL=\"ALL\"",
        };
        let response = self.query(command)?;

        let fragments: Vec<SmsFragment> = parse::split_list_records(&response)
            .into_iter()
            .filter_map(|record| {
                let fragment = match mode {
                    SmsMode::Pdu => pdu_fragment(&record),
                    SmsMode::Text => text_fragment(&record),
                };
                if fragment.is_none() {
                    warn!(
                        identifier = %self.identifier(),
                        header = record.header,
                        "skipping unreadable list header"
                    );
                }
                fragment
            })
            .collect();
        debug!(identifier = %self.identifier(), fragments = fragments.len(), "listed messages");
        Ok(pdu::reassemble(fragments))
    }

    /// Send `text` to `number`, as several concatenated parts when needed.
    pub fn send_sms(&self, number: &str, text: &str) -> Result<(), ModemError> {
        match self.sms_mode() {
            SmsMode::Pdu => {
                let reference = self.next_reference.fetch_add(1, Ordering::Relaxed);
                let parts = pdu::encode_submit_parts(number, text, reference)?;
                let total = parts.len();
                for (i, part) in parts.iter().enumerate() {
                    debug!(identifier = %self.identifier(), part = i + 1, total, "submitting");
                    self.submit(&format!("AT+CMGS={}", part.tpdu_length), &part.hex)?;
                }
                info!(identifier = %self.identifier(), parts = total, "sms sent");
            }
            SmsMode::Text => {
                let submission = pdu::encode_text_submission(number, text);
                self.submit(
                    &format!("AT+CMGS=\"{}\"", submission.number_hex),
                    &submission.body_hex,
                )?;
                info!(identifier = %self.identifier(), "sms sent");
            }
        }
        Ok(())
    }

    /// `AT+CMGS` up to the prompt, then the body with Ctrl-Z, as one exchange.
    fn submit(&self, command: &str, body: &str) -> Result<(), ModemError> {
        let timeout = self.channel.settings().sms_submit_timeout;
        let (prompt, reply) = self
            .channel
            .send_with_body(command, body, CTRL_Z, timeout)?;
        let Some(reply) = reply else {
            return Err(ModemError::Protocol {
                command: prompt.command,
                response: prompt.response,
            });
        };
        if !reply.is_ok() {
            return Err(ModemError::Protocol {
                command: command.to_string(),
                response: reply.response,
            });
        }
        Ok(())
    }

    /// Delete one stored message; succeeds only when the device answers `OK`.
    pub fn delete_sms(&self, index: u32) -> Result<(), ModemError> {
        let command = format!("AT+CMGD={index}");
        let exchange = self.channel.send_command(&command)?;
        if exchange.outcome != Outcome::Error && exchange.response.contains("OK") {
            Ok(())
        } else {
            Err(ModemError::Protocol {
                command,
                response: exchange.response,
            })
        }
    }

    /// Delete each index in turn, continuing past failures.
    pub fn delete_many(&self, indices: &[u32]) -> Vec<DeleteOutcome> {
        indices
            .iter()
            .map(|&index| match self.delete_sms(index) {
                Ok(()) => DeleteOutcome {
                    index,
                    deleted: true,
                    error: None,
                },
                Err(e) => DeleteOutcome {
                    index,
                    deleted: false,
                    error: Some(e.to_string()),
                },
            })
            .collect()
    }

    /// Pass a command through and return whatever the device answered.
    pub fn send_raw_command(&self, command: &str) -> Result<String, ModemError> {
        Ok(self.channel.send_command(command)?.response)
    }
}

/// Numbers arrive as UCS2 hex when the character set is UCS2.
fn readable_number(raw: &str) -> String {
    let decoded = pdu::decode_ucs2_hex(raw);
    if parse::is_dialable(&decoded) {
        decoded
    } else {
        raw.to_string()
    }
}

fn pdu_fragment(record: &ListRecord<'_>) -> Option<SmsFragment> {
    let (index, stat) = parse::parse_pdu_header(record.header)?;
    let status = pdu::status_name(stat).to_string();
    let hex = record.body.lines().next().unwrap_or_default().trim();
    Some(match pdu::decode_pdu(hex) {
        Ok(decoded) => SmsFragment::from_pdu(index, status, decoded),
        Err(e) => SmsFragment::single(
            index,
            status,
            String::new(),
            String::new(),
            format!("PDU decode error: {e} raw: {hex}"),
        ),
    })
}

fn text_fragment(record: &ListRecord<'_>) -> Option<SmsFragment> {
    let header = parse::parse_text_header(record.header)?;
    let fragment = pdu::decode_fragment(record.body);
    Some(SmsFragment {
        index: header.index,
        status: header.status,
        sender: readable_number(&header.sender),
        timestamp: header.time,
        text: fragment.text,
        reference: fragment.reference,
        total: fragment.total,
        sequence: fragment.sequence,
    })
}
