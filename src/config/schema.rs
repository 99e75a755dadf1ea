//! Configuration schema definitions.
//!
//! Every section has defaults, so a partial file (or none) is valid.

use super::error::{ConfigError, ConfigResult};
use crate::modem::SmsMode;
use crate::port::scan::DEFAULT_PATTERNS;
use crate::port::FlowControl;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub serial: SerialConfig,
    pub modem: ModemConfig,
    pub events: EventsConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Reject values that would make every exchange fail or spin.
    pub fn validate(&self) -> ConfigResult<()> {
        let checks = [
            ("serial.baud_rate", u64::from(self.serial.baud_rate)),
            ("serial.read_timeout_ms", self.serial.read_timeout_ms),
            ("serial.scan_interval_ms", self.serial.scan_interval_ms),
            ("modem.command_timeout_ms", self.modem.command_timeout_ms),
            ("modem.verify_timeout_ms", self.modem.verify_timeout_ms),
            ("modem.sms_submit_timeout_ms", self.modem.sms_submit_timeout_ms),
            ("modem.read_buffer_size", self.modem.read_buffer_size as u64),
        ];
        for (key, value) in checks {
            if value == 0 {
                return Err(ConfigError::validation(key, "must be greater than zero"));
            }
        }
        if self.serial.scan_patterns.is_empty() {
            return Err(ConfigError::validation(
                "serial.scan_patterns",
                "at least one pattern is required",
            ));
        }
        Ok(())
    }
}

/// Serial link and discovery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    pub baud_rate: u32,
    #[serde(default)]
    pub flow_control: FlowControl,
    /// Per-read timeout; bounds how long the listener holds the link.
    pub read_timeout_ms: u64,
    /// Globs for candidate device paths.
    pub scan_patterns: Vec<String>,
    /// Rescan periodically while serving.
    pub auto_scan: bool,
    pub scan_interval_ms: u64,
    /// Friendly names for device paths, e.g. `sim1 = "/dev/ttyUSB2"`.
    #[serde(default)]
    pub port_aliases: HashMap<String, String>,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            baud_rate: 115_200,
            flow_control: FlowControl::None,
            read_timeout_ms: 100,
            scan_patterns: DEFAULT_PATTERNS.iter().map(|p| p.to_string()).collect(),
            auto_scan: true,
            scan_interval_ms: 10_000,
            port_aliases: HashMap::new(),
        }
    }
}

impl SerialConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_millis(self.scan_interval_ms)
    }

    /// Resolve a port name through aliases
    pub fn resolve_port(&self, name: &str) -> String {
        self.port_aliases
            .get(name)
            .cloned()
            .unwrap_or_else(|| name.to_string())
    }
}

/// AT exchange timing and SMS mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModemConfig {
    pub command_timeout_ms: u64,
    pub verify_timeout_ms: u64,
    /// Carrier acknowledgement of a submitted SMS can take tens of seconds.
    pub sms_submit_timeout_ms: u64,
    pub error_backoff_ms: u64,
    pub read_buffer_size: usize,
    pub sms_mode: SmsMode,
}

impl Default for ModemConfig {
    fn default() -> Self {
        Self {
            command_timeout_ms: 1_000,
            verify_timeout_ms: 1_000,
            sms_submit_timeout_ms: 60_000,
            error_backoff_ms: 100,
            read_buffer_size: 256,
            sms_mode: SmsMode::Pdu,
        }
    }
}

impl ModemConfig {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    pub fn verify_timeout(&self) -> Duration {
        Duration::from_millis(self.verify_timeout_ms)
    }

    pub fn sms_submit_timeout(&self) -> Duration {
        Duration::from_millis(self.sms_submit_timeout_ms)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_millis(self.error_backoff_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    /// Queue depth per subscriber.
    pub subscriber_buffer: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            subscriber_buffer: crate::events::DEFAULT_SUBSCRIBER_BUFFER,
        }
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset.
    pub level: String,
    /// Log format: "json", "pretty", "compact"
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
    Compact,
}
