//! Utility functions for hardware testing.
//!
//! Provides the modem fixture, environment lookup and a timing helper.

use modem_bridge::events::EventBus;
use modem_bridge::modem::{ChannelSettings, SmsMode};
use modem_bridge::pool::ConnectionPool;
use modem_bridge::port::{FixedScanner, SystemPortOpener};
use serialport::{available_ports, SerialPortType};
use std::env;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Test modem configuration from environment.
pub struct TestModemConfig {
    pub port_name: String,
    pub baud_rate: u32,
    pub sms_mode: SmsMode,
    /// Destination for the send test; the test is skipped without it.
    pub sms_target: Option<String>,
}

impl TestModemConfig {
    /// Get test configuration from environment variables.
    ///
    /// - `MODEM_BRIDGE_TESTING_PORT` (required), e.g. `/dev/ttyUSB2`
    /// - `MODEM_BRIDGE_TESTING_BAUD` (default 115200)
    /// - `MODEM_BRIDGE_TESTING_SMS_MODE` (`pdu` or `text`, default `pdu`)
    /// - `MODEM_BRIDGE_TESTING_SMS_TARGET` (optional)
    pub fn from_env() -> Option<Self> {
        let port_name = env::var("MODEM_BRIDGE_TESTING_PORT").ok()?;
        let baud_rate = env::var("MODEM_BRIDGE_TESTING_BAUD")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(115_200);
        let sms_mode = env::var("MODEM_BRIDGE_TESTING_SMS_MODE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or_default();
        let sms_target = env::var("MODEM_BRIDGE_TESTING_SMS_TARGET").ok();

        Some(TestModemConfig {
            port_name,
            baud_rate,
            sms_mode,
            sms_target,
        })
    }

    pub fn settings(&self) -> ChannelSettings {
        ChannelSettings {
            baud_rate: self.baud_rate,
            command_timeout: Duration::from_secs(3),
            verify_timeout: Duration::from_secs(2),
            sms_mode: self.sms_mode,
            ..ChannelSettings::default()
        }
    }
}

/// A pool over the real port named by the environment.
pub struct ModemFixture {
    pub config: TestModemConfig,
    pub pool: Arc<ConnectionPool>,
}

impl ModemFixture {
    /// `None` (after a note on stdout) when no modem is configured or it
    /// does not verify.
    pub fn setup() -> Option<Self> {
        let Some(config) = TestModemConfig::from_env() else {
            println!("Skipping hardware test: MODEM_BRIDGE_TESTING_PORT not set");
            return None;
        };
        print_usb_details(&config.port_name);

        let pool = Arc::new(ConnectionPool::new(
            Arc::new(SystemPortOpener),
            Arc::new(FixedScanner::new([config.port_name.clone()])),
            config.settings(),
            EventBus::new(),
        ));
        match pool.scan() {
            Ok(added) if !added.is_empty() => Some(Self { config, pool }),
            Ok(_) => {
                println!("Modem on {} did not answer AT", config.port_name);
                None
            }
            Err(e) => {
                println!("Scan failed: {e}");
                None
            }
        }
    }
}

/// Print USB metadata for `port_name` when the system reports any.
pub fn print_usb_details(port_name: &str) {
    let Ok(ports) = available_ports() else { return };
    if let Some(info) = ports.into_iter().find(|p| p.port_name == port_name) {
        if let SerialPortType::UsbPort(usb) = info.port_type {
            println!("{port_name}: VID:PID = {:04x}:{:04x}", usb.vid, usb.pid);
            if let Some(product) = usb.product {
                println!("  Product: {product}");
            }
        }
    }
}

/// Timing helper for measuring operation duration.
pub struct TimingHelper {
    start: Instant,
    name: String,
}

impl TimingHelper {
    pub fn new(name: &str) -> Self {
        TimingHelper {
            start: Instant::now(),
            name: name.to_string(),
        }
    }

    pub fn finish(self) -> Duration {
        let elapsed = self.start.elapsed();
        println!("Completed: {} in {:?}", self.name, elapsed);
        elapsed
    }
}
