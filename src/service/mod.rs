//! Service layer for modem operations.
//!
//! The engine below is blocking (one exclusive link per device). Request
//! layers are async, so every call here runs on the blocking pool and the
//! caller only awaits the result.
//!
//! # Architecture
//!
//! ```text
//! CLI / HTTP ──> ModemService ──> ConnectionPool ──> DeviceSession ──> CommandChannel
//!                     │
//!                     └── subscribe() ──> EventBus
//! ```

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::events::Unsubscribe;
use crate::modem::{
    ChannelSettings, DeleteOutcome, DeviceSession, ModemError, ModemIdentity, SignalReading,
};
use crate::pdu::LogicalSms;
use crate::pool::{ConnectionPool, PortListing};
use crate::port::{GlobScanner, SystemPortOpener};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

// ========== Request/Response DTOs ==========

/// Outcome of a discovery pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResult {
    /// Devices registered by this pass.
    pub added: Vec<String>,
    /// Devices registered in total afterwards.
    pub total: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendSmsRequest {
    pub number: String,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendSmsResult {
    pub port: String,
    pub number: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawCommandResult {
    pub port: String,
    pub command: String,
    pub response: String,
}

// ========== Service Implementation ==========

/// Async facade over the connection pool.
///
/// Cheap to clone; clones share the pool.
#[derive(Clone)]
pub struct ModemService {
    pool: Arc<ConnectionPool>,
    config: Arc<Config>,
}

impl ModemService {
    pub fn new(pool: Arc<ConnectionPool>, config: Config) -> Self {
        Self {
            pool,
            config: Arc::new(config),
        }
    }

    /// Build a service over the real serial ports named by the config.
    pub fn from_config(config: Config) -> AppResult<Self> {
        let scanner = GlobScanner::new(&config.serial.scan_patterns)
            .map_err(|e| AppError::InvalidInput(e.to_string()))?;
        let pool = ConnectionPool::new(
            Arc::new(SystemPortOpener),
            Arc::new(scanner),
            ChannelSettings::from_config(&config),
            crate::events::EventBus::new(),
        );
        Ok(Self::new(Arc::new(pool), config))
    }

    pub fn pool(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run one discovery pass.
    pub async fn scan(&self) -> AppResult<ScanResult> {
        let pool = Arc::clone(&self.pool);
        let added = tokio::task::spawn_blocking(move || pool.scan()).await??;
        Ok(ScanResult {
            added,
            total: self.pool.len(),
        })
    }

    pub fn list(&self) -> Vec<PortListing> {
        self.pool.list()
    }

    pub async fn info(&self, port: &str) -> AppResult<ModemIdentity> {
        self.with_session(port, |session| Ok(session.identity())).await
    }

    pub async fn signal(&self, port: &str) -> AppResult<SignalReading> {
        self.with_session(port, |session| session.signal()).await
    }

    pub async fn phone_number(&self, port: &str) -> AppResult<String> {
        self.with_session(port, |session| session.phone_number()).await
    }

    pub async fn list_sms(&self, port: &str) -> AppResult<Vec<LogicalSms>> {
        self.with_session(port, |session| session.list_sms()).await
    }

    pub async fn send_sms(&self, port: &str, request: SendSmsRequest) -> AppResult<SendSmsResult> {
        if request.number.trim().is_empty() {
            return Err(AppError::InvalidInput("number is required".to_string()));
        }
        if request.text.is_empty() {
            return Err(AppError::InvalidInput("text is required".to_string()));
        }

        let SendSmsRequest { number, text } = request;
        let to = number.clone();
        let port_name = self.config.serial.resolve_port(port);
        self.with_session(port, move |session| session.send_sms(&to, &text))
            .await?;
        Ok(SendSmsResult {
            port: port_name,
            number,
            message: "sent".to_string(),
        })
    }

    /// Delete each index; one failure does not stop the rest.
    pub async fn delete_sms(&self, port: &str, indices: Vec<u32>) -> AppResult<Vec<DeleteOutcome>> {
        if indices.is_empty() {
            return Err(AppError::InvalidInput("at least one index is required".to_string()));
        }
        self.with_session(port, move |session| Ok(session.delete_many(&indices)))
            .await
    }

    pub async fn raw_command(&self, port: &str, command: &str) -> AppResult<RawCommandResult> {
        let command = command.trim().to_string();
        if command.is_empty() {
            return Err(AppError::InvalidInput("command is required".to_string()));
        }
        let sent = command.clone();
        let response = self
            .with_session(port, move |session| session.send_raw_command(&sent))
            .await?;
        Ok(RawCommandResult {
            port: self.config.serial.resolve_port(port),
            command,
            response,
        })
    }

    /// Subscribe to raw device chatter with the configured queue depth.
    pub fn subscribe(&self) -> (mpsc::Receiver<String>, Unsubscribe) {
        self.pool
            .events()
            .subscribe(self.config.events.subscriber_buffer)
    }

    /// Rescan on the configured interval until the handle is aborted.
    pub fn spawn_auto_scan(&self) -> JoinHandle<()> {
        let service = self.clone();
        let period = self.config.serial.scan_interval();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match service.scan().await {
                    Ok(result) if !result.added.is_empty() => {
                        debug!(added = ?result.added, total = result.total, "periodic scan")
                    }
                    Ok(_) => {}
                    Err(e) => warn!(error = %e, "periodic scan failed"),
                }
            }
        })
    }

    /// Close every session.
    pub async fn shutdown(&self) -> AppResult<()> {
        let pool = Arc::clone(&self.pool);
        tokio::task::spawn_blocking(move || pool.close_all()).await?;
        Ok(())
    }

    /// Resolve `port` through aliases and run `f` on its session off the runtime.
    async fn with_session<T, F>(&self, port: &str, f: F) -> AppResult<T>
    where
        F: FnOnce(&DeviceSession) -> Result<T, ModemError> + Send + 'static,
        T: Send + 'static,
    {
        let identifier = self.config.serial.resolve_port(port);
        let session = self.pool.get(&identifier)?;
        let value = tokio::task::spawn_blocking(move || f(session.as_ref())).await??;
        Ok(value)
    }
}
