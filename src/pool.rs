//! Discovery and ownership of device sessions.
//!
//! The registry is only locked to read its key set and to insert or remove;
//! opening and verifying a device happens outside it, so lookups never wait
//! on device I/O. Scans themselves are serialized by a separate guard.

use crate::events::EventBus;
use crate::modem::{ChannelSettings, DeviceSession, LinkState, ModemError};
use crate::port::{DeviceScanner, PortOpener};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// One registered device as seen by callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortListing {
    pub identifier: String,
    /// True while the session's link is `Active`.
    pub connected: bool,
}

pub struct ConnectionPool {
    opener: Arc<dyn PortOpener>,
    scanner: Arc<dyn DeviceScanner>,
    settings: ChannelSettings,
    events: Arc<EventBus>,
    sessions: RwLock<BTreeMap<String, Arc<DeviceSession>>>,
    scan_guard: Mutex<()>,
}

impl ConnectionPool {
    pub fn new(
        opener: Arc<dyn PortOpener>,
        scanner: Arc<dyn DeviceScanner>,
        settings: ChannelSettings,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            opener,
            scanner,
            settings,
            events,
            sessions: RwLock::new(BTreeMap::new()),
            scan_guard: Mutex::new(()),
        }
    }

    /// The bus every session of this pool publishes to.
    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// Open every candidate that is not registered yet.
    ///
    /// Returns the identifiers registered by this call. Candidates that fail
    /// to open or verify are logged and skipped; the next scan tries them again.
    pub fn scan(&self) -> Result<Vec<String>, ModemError> {
        let _guard = self.scan_guard.lock();

        let candidates = self
            .scanner
            .candidates()
            .map_err(|e| ModemError::transport("scan", e))?;
        let known: BTreeSet<String> = self.sessions.read().keys().cloned().collect();

        let mut added = Vec::new();
        for path in candidates.into_iter().filter(|p| !known.contains(p)) {
            match DeviceSession::open(
                &path,
                self.opener.as_ref(),
                self.settings.clone(),
                Arc::clone(&self.events),
            ) {
                Ok(session) => {
                    self.sessions.write().insert(path.clone(), Arc::new(session));
                    info!(identifier = %path, "modem registered");
                    added.push(path);
                }
                Err(e) => warn!(identifier = %path, error = %e, "skipping candidate"),
            }
        }
        debug!(added = added.len(), total = self.len(), "scan finished");
        Ok(added)
    }

    pub fn get(&self, identifier: &str) -> Result<Arc<DeviceSession>, ModemError> {
        self.sessions
            .read()
            .get(identifier)
            .cloned()
            .ok_or_else(|| ModemError::NotConnected(identifier.to_string()))
    }

    /// Registered devices, sorted by identifier.
    pub fn list(&self) -> Vec<PortListing> {
        self.sessions
            .read()
            .iter()
            .map(|(identifier, session)| PortListing {
                identifier: identifier.clone(),
                connected: session.state() == LinkState::Active,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    /// Unregister and shut down one session.
    pub fn close(&self, identifier: &str) -> Result<(), ModemError> {
        let session = self
            .sessions
            .write()
            .remove(identifier)
            .ok_or_else(|| ModemError::NotConnected(identifier.to_string()))?;
        session.close();
        Ok(())
    }

    pub fn close_all(&self) {
        let sessions = std::mem::take(&mut *self.sessions.write());
        for session in sessions.into_values() {
            session.close();
        }
    }
}

impl Drop for ConnectionPool {
    fn drop(&mut self) {
        self.close_all();
    }
}

impl std::fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("sessions", &self.sessions.read().keys().collect::<Vec<_>>())
            .finish()
    }
}
