//! Shared test utilities for modem-bridge integration tests.
//!
//! This module provides common test infrastructure including:
//! - Scripted mock modems with realistic AT replies
//! - `+CMGL` listing builders for PDU and text mode
//! - Pool and service construction over mock ports
//! - JSON assertion helpers

#![allow(dead_code)]

use modem_bridge::events::EventBus;
use modem_bridge::modem::{ChannelSettings, SmsMode};
use modem_bridge::pool::ConnectionPool;
use modem_bridge::port::{FixedScanner, MockPortOpener, MockSerialPort, SerialPortAdapter};
use modem_bridge::{Config, ModemService};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Deliver PDU: "How are you?" from +31641600986, 2002/08/26 19:37:41.
pub const DELIVER_PDU: &str =
    "07911326040000F0040B911346610089F60000208062917314800CC8F71D14969741F977FD07";

/// Channel settings short enough for tests that expect a timeout.
pub fn fast_settings(mode: SmsMode) -> ChannelSettings {
    ChannelSettings {
        read_timeout: Duration::from_millis(20),
        command_timeout: Duration::from_millis(300),
        verify_timeout: Duration::from_millis(300),
        sms_submit_timeout: Duration::from_millis(500),
        error_backoff: Duration::from_millis(20),
        sms_mode: mode,
        ..ChannelSettings::default()
    }
}

/// Config matching [`fast_settings`].
pub fn fast_config(mode: SmsMode) -> Config {
    let mut config = Config::default();
    config.serial.read_timeout_ms = 20;
    config.serial.scan_interval_ms = 50;
    config.modem.command_timeout_ms = 300;
    config.modem.verify_timeout_ms = 300;
    config.modem.sms_submit_timeout_ms = 500;
    config.modem.error_backoff_ms = 20;
    config.modem.sms_mode = mode;
    config
}

/// A modem that answers the identity queries like a Quectel EC25.
pub fn quectel_modem(name: &str) -> MockSerialPort {
    let port = MockSerialPort::modem(name);
    port.respond_to("AT+CGMI", "\r\nQuectel\r\n\r\nOK\r\n");
    port.respond_to("AT+CGMM", "\r\nEC25\r\n\r\nOK\r\n");
    port.respond_to("AT+CGSN", "\r\n867123456789012\r\n\r\nOK\r\n");
    port.respond_to("AT+CIMI", "\r\n460001234567890\r\n\r\nOK\r\n");
    port.respond_to("AT+COPS?", "\r\n+COPS: 0,0,\"CHINA MOBILE\",7\r\n\r\nOK\r\n");
    port.respond_to("AT+CNUM", "\r\n+CNUM: \"\",\"+8613800138000\",145\r\n\r\nOK\r\n");
    port.respond_to("AT+CSQ", "\r\n+CSQ: 18,99\r\n\r\nOK\r\n");
    port
}

/// Accept `AT+CMGS` with a prompt and acknowledge every body.
pub fn accept_submissions(port: &MockSerialPort) {
    port.respond_to("AT+CMGS=", "\r\n> ");
    port.respond_when(|cmd| !cmd.starts_with("AT"), "\r\n+CMGS: 1\r\n\r\nOK\r\n");
}

/// `AT+CMGL=4` reply for `(index, stat, pdu_hex)` records.
pub fn cmgl_pdu_listing(records: &[(u32, u8, &str)]) -> String {
    let mut reply = String::from("\r\n");
    for (index, stat, hex) in records {
        // Length is informational only; the decoder reads the PDU itself.
        reply.push_str(&format!("+CMGL: {index},{stat},,{}\r\n{hex}\r\n", hex.len() / 2));
    }
    reply.push_str("\r\nOK\r\n");
    reply
}

/// `AT+CMGL="ALL"` reply for `(index, status, sender_hex, body_hex)` records.
pub fn cmgl_text_listing(records: &[(u32, &str, &str, &str)]) -> String {
    let mut reply = String::from("\r\n");
    for (index, status, sender, body) in records {
        reply.push_str(&format!(
            "+CMGL: {index},\"{status}\",\"{sender}\",,\"24/05/01,10:00:00+32\"\r\n{body}\r\n"
        ));
    }
    reply.push_str("\r\nOK\r\n");
    reply
}

/// Mock-backed pool plus the handles that control it.
pub struct MockRig {
    pub opener: MockPortOpener,
    pub scanner: FixedScanner,
    pub pool: Arc<ConnectionPool>,
}

impl MockRig {
    /// Every port is openable and offered by the scanner.
    pub fn new(ports: Vec<MockSerialPort>, mode: SmsMode) -> Self {
        let opener = MockPortOpener::new();
        let scanner = FixedScanner::default();
        let names: Vec<String> = ports.iter().map(|p| p.name().to_string()).collect();
        for port in ports {
            opener.add(port);
        }
        scanner.set(&names.iter().map(String::as_str).collect::<Vec<_>>());

        let pool = Arc::new(ConnectionPool::new(
            Arc::new(opener.clone()),
            Arc::new(scanner.clone()),
            fast_settings(mode),
            EventBus::new(),
        ));
        Self {
            opener,
            scanner,
            pool,
        }
    }

    pub fn service(&self, config: Config) -> ModemService {
        ModemService::new(Arc::clone(&self.pool), config)
    }
}

/// Assert that a JSON value contains specific fields with expected values.
pub fn assert_json_contains(actual: &Value, expected: &Value) {
    assert_json_diff::assert_json_include!(actual: actual, expected: expected);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cmgl_pdu_listing_shape() {
        let reply = cmgl_pdu_listing(&[(3, 1, "0011")]);
        assert_eq!(reply, "\r\n+CMGL: 3,1,,2\r\n0011\r\n\r\nOK\r\n");
    }

    #[test]
    fn test_assert_json_contains_object() {
        let actual = serde_json::json!({
            "identifier": "/dev/ttyUSB0",
            "connected": true,
            "extra": "data"
        });
        let expected = serde_json::json!({ "connected": true });

        assert_json_contains(&actual, &expected);
    }
}
