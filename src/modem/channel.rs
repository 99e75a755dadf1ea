//! One physical link to a modem.
//!
//! AT has no framing: an exchange writes a command and reads until a line
//! holds a terminal token or the deadline passes. A listener thread owns the
//! link between exchanges and forwards whatever it reads to the event bus.
//! Both sides take the same lock, so only one read is ever outstanding.

use super::error::ModemError;
use super::types::SmsMode;
use crate::config::Config;
use crate::events::EventBus;
use crate::port::{FlowControl, PortConfiguration, PortOpener, SerialPortAdapter};
use parking_lot::{Mutex, MutexGuard};
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

/// End-of-message marker for SMS bodies.
pub const CTRL_Z: u8 = 0x1A;
const COMMAND_TERMINATOR: u8 = b'\r';
/// Pause between polls of a non-blocking link.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Timing and mode knobs for one channel.
#[derive(Debug, Clone)]
pub struct ChannelSettings {
    pub baud_rate: u32,
    pub flow_control: FlowControl,
    pub read_timeout: Duration,
    pub command_timeout: Duration,
    pub verify_timeout: Duration,
    pub sms_submit_timeout: Duration,
    pub error_backoff: Duration,
    pub read_buffer_size: usize,
    pub sms_mode: SmsMode,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            baud_rate: 115_200,
            flow_control: FlowControl::None,
            read_timeout: Duration::from_millis(100),
            command_timeout: Duration::from_secs(1),
            verify_timeout: Duration::from_secs(1),
            sms_submit_timeout: Duration::from_secs(60),
            error_backoff: Duration::from_millis(100),
            read_buffer_size: 256,
            sms_mode: SmsMode::Pdu,
        }
    }
}

impl ChannelSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            baud_rate: config.serial.baud_rate,
            flow_control: config.serial.flow_control,
            read_timeout: config.serial.read_timeout(),
            command_timeout: config.modem.command_timeout(),
            verify_timeout: config.modem.verify_timeout(),
            sms_submit_timeout: config.modem.sms_submit_timeout(),
            error_backoff: config.modem.error_backoff(),
            read_buffer_size: config.modem.read_buffer_size,
            sms_mode: config.modem.sms_mode,
        }
    }
}

/// Lifecycle of a channel.
///
/// `Closed` is terminal. `Failed` marks a transport error on the last
/// exchange; the link still accepts commands and returns to `Active` after
/// the next exchange that completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkState {
    Opening,
    Verifying,
    Initialized,
    Active,
    Closed,
    Failed,
}

/// How an exchange ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// A line read `OK`.
    Ok,
    /// `ERROR`, `+CME ERROR`, `+CMS ERROR` or `NO CARRIER`.
    Error,
    /// The `>` prompt for a message body.
    Prompt,
    /// The link reported end of data before any terminal token.
    EndOfData,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandExchange {
    pub command: String,
    /// Everything read, trimmed.
    pub response: String,
    pub elapsed: Duration,
    pub outcome: Outcome,
}

impl CommandExchange {
    pub fn is_ok(&self) -> bool {
        self.outcome == Outcome::Ok
    }

    /// Turn an error-token reply into `ModemError::Protocol`.
    pub fn into_result(self) -> Result<Self, ModemError> {
        if self.outcome == Outcome::Error {
            return Err(ModemError::Protocol {
                command: self.command,
                response: self.response,
            });
        }
        Ok(self)
    }
}

/// Find the first terminal token in what has been read so far.
///
/// Only complete lines count for `OK` and error tokens; the prompt may be the
/// unterminated tail because the modem does not end it with a newline.
fn classify(buffer: &[u8]) -> Option<Outcome> {
    let text = String::from_utf8_lossy(buffer);
    let mut lines: Vec<&str> = text.split(['\r', '\n']).collect();
    let tail = lines.pop().unwrap_or_default();

    for line in lines.into_iter().map(str::trim) {
        match line {
            "OK" => return Some(Outcome::Ok),
            "ERROR" | "NO CARRIER" => return Some(Outcome::Error),
            ">" => return Some(Outcome::Prompt),
            l if l.starts_with("+CME ERROR") || l.starts_with("+CMS ERROR") => {
                return Some(Outcome::Error)
            }
            _ => {}
        }
    }
    (tail.trim() == ">").then_some(Outcome::Prompt)
}

type PortGuard<'a> = MutexGuard<'a, Option<Box<dyn SerialPortAdapter>>>;

struct Link {
    identifier: String,
    port: Mutex<Option<Box<dyn SerialPortAdapter>>>,
    state: Mutex<LinkState>,
    /// Exchanges waiting for the port lock; the listener stands aside while non-zero.
    pending: AtomicUsize,
    settings: ChannelSettings,
    events: Arc<EventBus>,
}

impl Link {
    fn state(&self) -> LinkState {
        *self.state.lock()
    }

    fn set_state(&self, next: LinkState) {
        let mut state = self.state.lock();
        if *state != LinkState::Closed && *state != next {
            debug!(identifier = %self.identifier, from = ?*state, to = ?next, "link state");
            *state = next;
        }
    }

    /// Wait for the port, ahead of the listener.
    fn acquire(&self) -> Result<PortGuard<'_>, ModemError> {
        if self.state() == LinkState::Closed {
            return Err(ModemError::Closed(self.identifier.clone()));
        }
        self.pending.fetch_add(1, Ordering::AcqRel);
        let guard = self.port.lock();
        self.pending.fetch_sub(1, Ordering::AcqRel);
        if guard.is_none() {
            return Err(ModemError::Closed(self.identifier.clone()));
        }
        Ok(guard)
    }

    fn exchange(
        &self,
        label: &str,
        payload: &[u8],
        terminator: u8,
        timeout: Duration,
        flush: bool,
    ) -> Result<CommandExchange, ModemError> {
        let mut guard = self.acquire()?;
        self.exchange_locked(&mut guard, label, payload, terminator, timeout, flush)
    }

    /// One write-then-read cycle on a port the caller already holds.
    fn exchange_locked(
        &self,
        guard: &mut PortGuard<'_>,
        label: &str,
        payload: &[u8],
        terminator: u8,
        timeout: Duration,
        flush: bool,
    ) -> Result<CommandExchange, ModemError> {
        let port = guard
            .as_deref_mut()
            .ok_or_else(|| ModemError::Closed(self.identifier.clone()))?;

        let started = Instant::now();
        let deadline = started + timeout;
        if flush {
            if let Err(e) = port.clear_buffers() {
                debug!(identifier = %self.identifier, error = %e, "flush failed");
            }
        }

        let mut frame = Vec::with_capacity(payload.len() + 1);
        frame.extend_from_slice(payload);
        frame.push(terminator);
        if let Err(e) = port.write_all_bytes(&frame) {
            self.set_state(LinkState::Failed);
            return Err(ModemError::transport(&self.identifier, e));
        }

        let mut buf = vec![0u8; self.settings.read_buffer_size.max(1)];
        let mut acc = Vec::new();
        loop {
            match port.read_bytes(&mut buf) {
                Ok(0) if !acc.is_empty() => {
                    return Ok(self.finish(label, &acc, started, Outcome::EndOfData));
                }
                Ok(0) => thread::sleep(POLL_INTERVAL.min(remaining(deadline))),
                Ok(n) => {
                    acc.extend_from_slice(&buf[..n]);
                    if let Some(outcome) = classify(&acc) {
                        return Ok(self.finish(label, &acc, started, outcome));
                    }
                }
                Err(e) if e.is_idle() => {
                    if e.is_would_block() {
                        thread::sleep(POLL_INTERVAL.min(remaining(deadline)));
                    }
                }
                Err(e) => {
                    if acc.is_empty() {
                        self.set_state(LinkState::Failed);
                        return Err(ModemError::transport(&self.identifier, e));
                    }
                    warn!(
                        identifier = %self.identifier,
                        error = %e,
                        "read failed mid-reply, returning partial response"
                    );
                    let exchange = self.finish(label, &acc, started, Outcome::EndOfData);
                    self.set_state(LinkState::Failed);
                    return Ok(exchange);
                }
            }

            if Instant::now() >= deadline {
                let elapsed = started.elapsed();
                debug!(
                    identifier = %self.identifier,
                    command = label,
                    ?elapsed,
                    partial = %String::from_utf8_lossy(&acc).trim(),
                    "exchange timed out"
                );
                return Err(ModemError::Timeout {
                    command: label.to_string(),
                    elapsed,
                });
            }
        }
    }

    /// A clean exchange brings a `Failed` link back to `Active`.
    fn finish(
        &self,
        label: &str,
        acc: &[u8],
        started: Instant,
        outcome: Outcome,
    ) -> CommandExchange {
        let exchange = CommandExchange {
            command: label.to_string(),
            response: String::from_utf8_lossy(acc).trim().to_string(),
            elapsed: started.elapsed(),
            outcome,
        };
        debug!(
            identifier = %self.identifier,
            command = label,
            outcome = ?outcome,
            elapsed_ms = exchange.elapsed.as_millis() as u64,
            "exchange complete"
        );
        let mut state = self.state.lock();
        if *state == LinkState::Failed {
            info!(identifier = %self.identifier, "link recovered");
            *state = LinkState::Active;
        }
        exchange
    }
}

fn remaining(deadline: Instant) -> Duration {
    deadline.saturating_duration_since(Instant::now())
}

/// Background reader. Holds only a weak reference so dropping the channel
/// stops it.
fn listen(link: Weak<Link>) {
    let mut buf = Vec::new();
    loop {
        let Some(link) = link.upgrade() else { break };
        if link.state() == LinkState::Closed {
            break;
        }
        if link.pending.load(Ordering::Acquire) > 0 {
            drop(link);
            thread::sleep(POLL_INTERVAL);
            continue;
        }
        buf.resize(link.settings.read_buffer_size.max(1), 0);

        let mut guard = link.port.lock();
        let Some(port) = guard.as_deref_mut() else { break };
        let result = port.read_bytes(&mut buf);
        MutexGuard::unlock_fair(guard);

        let pause = match result {
            Ok(0) => Some(POLL_INTERVAL),
            Ok(n) => {
                trace!(identifier = %link.identifier, bytes = n, "unsolicited data");
                link.events.publish_raw(&link.identifier, &buf[..n]);
                None
            }
            Err(e) if e.is_idle() => e.is_would_block().then_some(POLL_INTERVAL),
            Err(e) => {
                warn!(
                    identifier = %link.identifier,
                    error = %e,
                    "listener read failed, backing off"
                );
                Some(link.settings.error_backoff)
            }
        };
        let identifier = link.identifier.clone();
        drop(link);
        if let Some(pause) = pause {
            trace!(identifier = %identifier, ?pause, "listener idle");
            thread::sleep(pause);
        }
    }
    debug!("listener stopped");
}

/// An open, verified link with its listener.
pub struct CommandChannel {
    link: Arc<Link>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl CommandChannel {
    /// Open, verify with `AT`, initialize, then start the listener.
    pub fn open(
        identifier: &str,
        opener: &dyn PortOpener,
        settings: ChannelSettings,
        events: Arc<EventBus>,
    ) -> Result<Self, ModemError> {
        debug!(identifier, state = ?LinkState::Opening, "opening link");
        let config = PortConfiguration::modem(settings.baud_rate, settings.read_timeout)
            .with_flow_control(settings.flow_control);
        let port = opener
            .open(identifier, &config)
            .map_err(|e| ModemError::transport(identifier, e))?;

        let channel = Self {
            link: Arc::new(Link {
                identifier: identifier.to_string(),
                port: Mutex::new(Some(port)),
                state: Mutex::new(LinkState::Verifying),
                pending: AtomicUsize::new(0),
                settings,
                events,
            }),
            listener: Mutex::new(None),
        };
        channel.verify()?;
        channel.initialize();
        channel.start_listener()?;
        info!(identifier, "link active");
        Ok(channel)
    }

    fn verify(&self) -> Result<(), ModemError> {
        let timeout = self.link.settings.verify_timeout;
        let failure = match self.link.exchange("AT", b"AT", COMMAND_TERMINATOR, timeout, true) {
            Ok(exchange) if exchange.response.contains("OK") => {
                self.link.set_state(LinkState::Initialized);
                return Ok(());
            }
            Ok(exchange) => ModemError::Protocol {
                command: exchange.command,
                response: exchange.response,
            },
            Err(e) => e,
        };
        self.link.port.lock().take();
        self.link.set_state(LinkState::Failed);
        Err(failure)
    }

    /// Best-effort setup; failures are logged only.
    fn initialize(&self) {
        let mut commands = vec!["ATE0"];
        match self.link.settings.sms_mode {
            SmsMode::Pdu => commands.push("AT+CMGF=0"),
            SmsMode::Text => commands.extend(["AT+CMGF=1", "AT+CSCS=\"UCS2\""]),
        }
        for command in commands {
            match self.send_command(command) {
                Ok(exchange) if exchange.is_ok() => {}
                Ok(exchange) => {
                    warn!(
                        identifier = %self.link.identifier,
                        command,
                        response = %exchange.response,
                        "setup command rejected"
                    )
                }
                Err(e) => {
                    warn!(
                        identifier = %self.link.identifier,
                        command,
                        error = %e,
                        "setup command failed"
                    )
                }
            }
        }
    }

    fn start_listener(&self) -> Result<(), ModemError> {
        self.link.set_state(LinkState::Active);
        let weak = Arc::downgrade(&self.link);
        let handle = thread::Builder::new()
            .name(format!("listen {}", self.link.identifier))
            .spawn(move || listen(weak))
            .map_err(|e| {
                self.link.port.lock().take();
                self.link.set_state(LinkState::Failed);
                ModemError::transport(&self.link.identifier, e.into())
            })?;
        *self.listener.lock() = Some(handle);
        Ok(())
    }

    pub fn identifier(&self) -> &str {
        &self.link.identifier
    }

    pub fn state(&self) -> LinkState {
        self.link.state()
    }

    pub fn settings(&self) -> &ChannelSettings {
        &self.link.settings
    }

    /// Send `command` + CR and wait for a terminal token.
    pub fn send_command(&self, command: &str) -> Result<CommandExchange, ModemError> {
        self.link.exchange(
            command,
            command.as_bytes(),
            COMMAND_TERMINATOR,
            self.link.settings.command_timeout,
            true,
        )
    }

    /// Write a body after a `>` prompt. Input is not flushed first.
    pub fn send_payload(
        &self,
        payload: &str,
        terminator: u8,
        timeout: Duration,
    ) -> Result<CommandExchange, ModemError> {
        let label = format!("<payload {} bytes>", payload.len());
        self.link
            .exchange(&label, payload.as_bytes(), terminator, timeout, false)
    }

    /// `command` up to the `>` prompt, then `body` + `terminator`, without
    /// releasing the port in between. Anything written while the modem sits
    /// at the prompt would become part of the message.
    ///
    /// Returns the prompt exchange, and the body exchange when the prompt
    /// arrived.
    pub fn send_with_body(
        &self,
        command: &str,
        body: &str,
        terminator: u8,
        timeout: Duration,
    ) -> Result<(CommandExchange, Option<CommandExchange>), ModemError> {
        let mut guard = self.link.acquire()?;
        let prompt = self.link.exchange_locked(
            &mut guard,
            command,
            command.as_bytes(),
            COMMAND_TERMINATOR,
            self.link.settings.command_timeout,
            true,
        )?;
        if prompt.outcome != Outcome::Prompt {
            return Ok((prompt, None));
        }
        let label = format!("<payload {} bytes>", body.len());
        let reply = self.link.exchange_locked(
            &mut guard,
            &label,
            body.as_bytes(),
            terminator,
            timeout,
            false,
        )?;
        Ok((prompt, Some(reply)))
    }

    /// Release the handle and stop the listener. Idempotent.
    pub fn close(&self) {
        {
            let mut state = self.link.state.lock();
            if *state == LinkState::Closed {
                return;
            }
            *state = LinkState::Closed;
        }
        self.link.port.lock().take();
        if let Some(handle) = self.listener.lock().take() {
            if handle.join().is_err() {
                warn!(identifier = %self.link.identifier, "listener thread panicked");
            }
        }
        info!(identifier = %self.link.identifier, "link closed");
    }
}

impl Drop for CommandChannel {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for CommandChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandChannel")
            .field("identifier", &self.link.identifier)
            .field("state", &self.state())
            .finish()
    }
}
