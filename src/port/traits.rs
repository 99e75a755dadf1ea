//! Core traits for serial port abstraction.
//!
//! `SerialPortAdapter` is the byte-level link a command channel drives.
//! `PortOpener` and `DeviceScanner` are the seams the connection pool uses to
//! find and open devices, so tests can substitute scripted modems.

use super::error::PortError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Line settings for opening a modem port.
///
/// Frames are always 8N1; modems differ only in speed and flow control.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortConfiguration {
    pub baud_rate: u32,
    pub flow_control: FlowControl,
    /// Per-read timeout. Kept short so the listener releases the link often.
    pub timeout: Duration,
}

impl PortConfiguration {
    pub fn modem(baud_rate: u32, timeout: Duration) -> Self {
        Self {
            baud_rate,
            timeout,
            ..Self::default()
        }
    }

    pub fn with_flow_control(mut self, flow_control: FlowControl) -> Self {
        self.flow_control = flow_control;
        self
    }
}

impl Default for PortConfiguration {
    fn default() -> Self {
        Self {
            baud_rate: 115_200,
            flow_control: FlowControl::None,
            timeout: Duration::from_millis(100),
        }
    }
}

/// Flow control modes. Some modules need RTS/CTS at high baud rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowControl {
    #[default]
    None,
    Software,
    Hardware,
}

impl FromStr for FlowControl {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "software" | "xonxoff" => Ok(Self::Software),
            "hardware" | "rtscts" => Ok(Self::Hardware),
            other => Err(format!("unknown flow control '{other}'")),
        }
    }
}

impl From<FlowControl> for serialport::FlowControl {
    fn from(flow: FlowControl) -> Self {
        match flow {
            FlowControl::None => serialport::FlowControl::None,
            FlowControl::Software => serialport::FlowControl::Software,
            FlowControl::Hardware => serialport::FlowControl::Hardware,
        }
    }
}

/// Byte-level serial link.
///
/// Implemented by the real OS port and by `MockSerialPort`.
pub trait SerialPortAdapter: Send + std::fmt::Debug {
    /// Write bytes to the serial port.
    ///
    /// Returns the number of bytes actually written.
    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, PortError>;

    /// Read bytes from the serial port into the provided buffer.
    ///
    /// Returns the number of bytes actually read.
    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, PortError>;

    /// Get the name/path of this serial port.
    fn name(&self) -> &str;

    /// Set the read/write timeout for this port.
    fn set_timeout(&mut self, timeout: Duration) -> Result<(), PortError>;

    /// Discard unread input and unsent output.
    ///
    /// Called before every command so stale chatter cannot be mistaken for
    /// the reply.
    fn clear_buffers(&mut self) -> Result<(), PortError>;

    /// Write all of `data`, failing if the link stops accepting bytes.
    fn write_all_bytes(&mut self, data: &[u8]) -> Result<(), PortError> {
        let mut written = 0;
        while written < data.len() {
            match self.write_bytes(&data[written..])? {
                0 => {
                    return Err(PortError::Io(std::io::Error::new(
                        std::io::ErrorKind::WriteZero,
                        "port accepted no bytes",
                    )))
                }
                n => written += n,
            }
        }
        Ok(())
    }
}

/// Opens the OS handle for a device path.
pub trait PortOpener: Send + Sync {
    fn open(
        &self,
        path: &str,
        config: &PortConfiguration,
    ) -> Result<Box<dyn SerialPortAdapter>, PortError>;
}

/// Enumerates candidate device paths.
pub trait DeviceScanner: Send + Sync {
    fn candidates(&self) -> Result<Vec<String>, PortError>;
}
