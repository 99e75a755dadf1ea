//! Scripted modem doubles for tests.
//!
//! `MockSerialPort` answers commands from a list of rules instead of a fixed
//! byte queue, so a background reader cannot steal a reply before the command
//! is written. `MockPortOpener` and `FixedScanner` stand in for the OS.

use super::error::PortError;
use super::traits::{DeviceScanner, PortConfiguration, PortOpener, SerialPortAdapter};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

type Matcher = Arc<dyn Fn(&str) -> bool + Send + Sync>;

struct Rule {
    matcher: Matcher,
    reply: Vec<u8>,
    /// `None` answers forever.
    remaining: Option<usize>,
}

#[derive(Default)]
struct MockPortState {
    read_queue: VecDeque<u8>,
    /// Bytes written since the last command terminator.
    pending_line: Vec<u8>,
    write_log: Vec<Vec<u8>>,
    commands: Vec<String>,
    rules: Vec<Rule>,
    echo: bool,
    fail_writes: bool,
    fail_reads: bool,
    /// Report end-of-data (`Ok(0)`) instead of `WouldBlock` when empty.
    eof_when_empty: bool,
    timeout: Duration,
    clear_count: usize,
}

/// In-memory modem.
///
/// Every write is logged; each `\r` or Ctrl-Z terminated line is matched
/// against the rules, newest first, and the first match queues its reply.
///
/// # Example
/// ```
/// use modem_bridge::port::{MockSerialPort, SerialPortAdapter};
///
/// let mut port = MockSerialPort::new("MOCK0");
/// port.respond_to("AT+CSQ", "\r\n+CSQ: 20,99\r\n\r\nOK\r\n");
///
/// port.write_bytes(b"AT+CSQ\r").unwrap();
/// let mut buffer = [0u8; 64];
/// let n = port.read_bytes(&mut buffer).unwrap();
/// assert!(String::from_utf8_lossy(&buffer[..n]).contains("+CSQ: 20,99"));
/// ```
#[derive(Clone)]
pub struct MockSerialPort {
    name: String,
    state: Arc<Mutex<MockPortState>>,
}

impl MockSerialPort {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Arc::new(Mutex::new(MockPortState {
                timeout: Duration::from_millis(100),
                ..Default::default()
            })),
        }
    }

    /// A port that passes verification and accepts setup commands.
    pub fn modem(name: impl Into<String>) -> Self {
        let port = Self::new(name);
        port.respond_to("AT", "\r\nOK\r\n");
        port
    }

    /// Queue unsolicited bytes, as if the device sent them on its own.
    pub fn enqueue_read(&self, data: &[u8]) {
        self.state.lock().unwrap().read_queue.extend(data);
    }

    /// Answer every command starting with `prefix`.
    ///
    /// The most recently registered matching rule answers, so a specific
    /// prefix added after [`MockSerialPort::modem`] overrides its bare `"AT"`.
    pub fn respond_to(&self, prefix: &str, reply: &str) {
        let prefix = prefix.to_string();
        self.insert_rule(
            Arc::new(move |cmd: &str| cmd.starts_with(&prefix)),
            reply.as_bytes().to_vec(),
            None,
        );
    }

    /// Answer the next `times` commands starting with `prefix`.
    pub fn respond_times(&self, prefix: &str, reply: &str, times: usize) {
        let prefix = prefix.to_string();
        self.insert_rule(
            Arc::new(move |cmd: &str| cmd.starts_with(&prefix)),
            reply.as_bytes().to_vec(),
            Some(times),
        );
    }

    /// Answer every command for which `predicate` holds.
    pub fn respond_when<F>(&self, predicate: F, reply: &str)
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.insert_rule(Arc::new(predicate), reply.as_bytes().to_vec(), None);
    }

    fn insert_rule(&self, matcher: Matcher, reply: Vec<u8>, remaining: Option<usize>) {
        let mut state = self.state.lock().unwrap();
        state.rules.insert(
            0,
            Rule {
                matcher,
                reply,
                remaining,
            },
        );
    }

    /// Echo each command back before its reply, like a modem before `ATE0`.
    pub fn set_echo(&self, echo: bool) {
        self.state.lock().unwrap().echo = echo;
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.state.lock().unwrap().fail_writes = fail;
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.state.lock().unwrap().fail_reads = fail;
    }

    pub fn set_eof_when_empty(&self, eof: bool) {
        self.state.lock().unwrap().eof_when_empty = eof;
    }

    /// Every command line received, terminator stripped.
    pub fn commands(&self) -> Vec<String> {
        self.state.lock().unwrap().commands.clone()
    }

    pub fn get_write_log(&self) -> Vec<Vec<u8>> {
        self.state.lock().unwrap().write_log.clone()
    }

    /// How many times the input buffer was flushed.
    pub fn clear_count(&self) -> usize {
        self.state.lock().unwrap().clear_count
    }

    pub fn available_bytes(&self) -> usize {
        self.state.lock().unwrap().read_queue.len()
    }
}

impl MockPortState {
    fn dispatch(&mut self, command: String) {
        if self.echo {
            self.read_queue.extend(command.as_bytes());
            self.read_queue.push_back(b'\r');
        }
        let trimmed = command.trim();
        if let Some(pos) = self
            .rules
            .iter()
            .position(|r| r.remaining != Some(0) && (r.matcher)(trimmed))
        {
            let rule = &mut self.rules[pos];
            if let Some(n) = rule.remaining.as_mut() {
                *n -= 1;
            }
            let reply = rule.reply.clone();
            self.read_queue.extend(reply);
        }
        self.commands.push(command);
    }
}

impl SerialPortAdapter for MockSerialPort {
    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, PortError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_writes {
            return Err(PortError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "mock write failure",
            )));
        }
        state.write_log.push(data.to_vec());

        for &byte in data {
            if byte == b'\r' || byte == 0x1A {
                let line = std::mem::take(&mut state.pending_line);
                let command = String::from_utf8_lossy(&line).into_owned();
                state.dispatch(command);
            } else if byte != b'\n' {
                state.pending_line.push(byte);
            }
        }
        Ok(data.len())
    }

    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, PortError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_reads {
            return Err(PortError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "mock read failure",
            )));
        }

        let mut bytes_read = 0;
        for byte in buffer.iter_mut() {
            match state.read_queue.pop_front() {
                Some(b) => {
                    *byte = b;
                    bytes_read += 1;
                }
                None => break,
            }
        }

        if bytes_read == 0 && !state.eof_when_empty {
            Err(PortError::Io(std::io::Error::new(
                std::io::ErrorKind::WouldBlock,
                "No data available",
            )))
        } else {
            Ok(bytes_read)
        }
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn set_timeout(&mut self, timeout: Duration) -> Result<(), PortError> {
        self.state.lock().unwrap().timeout = timeout;
        Ok(())
    }

    fn clear_buffers(&mut self) -> Result<(), PortError> {
        let mut state = self.state.lock().unwrap();
        state.read_queue.clear();
        state.clear_count += 1;
        Ok(())
    }
}

impl std::fmt::Debug for MockSerialPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockSerialPort")
            .field("name", &self.name)
            .field("available_bytes", &self.available_bytes())
            .finish()
    }
}

/// Hands out clones of registered mock ports and counts open attempts.
#[derive(Clone, Default)]
pub struct MockPortOpener {
    ports: Arc<Mutex<HashMap<String, MockSerialPort>>>,
    opens: Arc<Mutex<HashMap<String, usize>>>,
}

impl MockPortOpener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `port` openable under its own name.
    pub fn add(&self, port: MockSerialPort) {
        self.ports.lock().unwrap().insert(port.name.clone(), port);
    }

    /// Open attempts for `path`, successful or not.
    pub fn open_count(&self, path: &str) -> usize {
        self.opens.lock().unwrap().get(path).copied().unwrap_or(0)
    }
}

impl PortOpener for MockPortOpener {
    fn open(
        &self,
        path: &str,
        config: &PortConfiguration,
    ) -> Result<Box<dyn SerialPortAdapter>, PortError> {
        *self.opens.lock().unwrap().entry(path.to_string()).or_default() += 1;
        let mut port = self
            .ports
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| PortError::not_found(path))?;
        port.set_timeout(config.timeout)?;
        Ok(Box::new(port))
    }
}

/// Scanner returning a caller-controlled list of paths.
#[derive(Clone, Default)]
pub struct FixedScanner {
    paths: Arc<Mutex<Vec<String>>>,
}

impl FixedScanner {
    pub fn new<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            paths: Arc::new(Mutex::new(paths.into_iter().map(Into::into).collect())),
        }
    }

    pub fn set(&self, paths: &[&str]) {
        *self.paths.lock().unwrap() = paths.iter().map(|p| p.to_string()).collect();
    }
}

impl DeviceScanner for FixedScanner {
    fn candidates(&self) -> Result<Vec<String>, PortError> {
        Ok(self.paths.lock().unwrap().clone())
    }
}
