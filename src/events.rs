//! Lossy fan-out of raw device chatter.
//!
//! Each subscriber owns a bounded queue. `broadcast` never waits: a full or
//! closed queue simply misses that message.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::trace;

/// Queue depth used when a subscriber asks for zero.
pub const DEFAULT_SUBSCRIBER_BUFFER: usize = 100;

#[derive(Debug, Default)]
pub struct EventBus {
    subscribers: RwLock<HashMap<u64, mpsc::Sender<String>>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register a queue of `buffer` messages (0 means the default).
    pub fn subscribe(self: &Arc<Self>, buffer: usize) -> (mpsc::Receiver<String>, Unsubscribe) {
        let buffer = if buffer == 0 {
            DEFAULT_SUBSCRIBER_BUFFER
        } else {
            buffer
        };
        let (tx, rx) = mpsc::channel(buffer);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers.write().insert(id, tx);
        trace!(subscriber = id, buffer, "subscribed");

        let handle = Unsubscribe {
            bus: Arc::downgrade(self),
            id,
            cancelled: AtomicBool::new(false),
        };
        (rx, handle)
    }

    /// Offer `message` to every subscriber; returns how many accepted it.
    ///
    /// Subscribers whose receiver has been dropped are removed.
    pub fn broadcast(&self, message: &str) -> usize {
        let mut delivered = 0;
        let mut closed = Vec::new();
        for (&id, tx) in self.subscribers.read().iter() {
            match tx.try_send(message.to_string()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {}
                Err(TrySendError::Closed(_)) => closed.push(id),
            }
        }

        if !closed.is_empty() {
            let mut subscribers = self.subscribers.write();
            for id in closed {
                subscribers.remove(&id);
                trace!(subscriber = id, "receiver gone, pruned");
            }
        }
        delivered
    }

    /// Publish a chunk read from `identifier` as `"[identifier] <text>"`.
    pub fn publish_raw(&self, identifier: &str, bytes: &[u8]) -> usize {
        let line = format!("[{}] {}", identifier, String::from_utf8_lossy(bytes));
        self.broadcast(&line)
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    fn remove(&self, id: u64) {
        // Dropping the sender closes the receiver once buffered messages drain.
        if self.subscribers.write().remove(&id).is_some() {
            trace!(subscriber = id, "unsubscribed");
        }
    }
}

/// Cancellation handle returned by [`EventBus::subscribe`].
///
/// Dropping it does not unsubscribe; call [`Unsubscribe::cancel`].
#[derive(Debug)]
pub struct Unsubscribe {
    bus: Weak<EventBus>,
    id: u64,
    cancelled: AtomicBool,
}

impl Unsubscribe {
    /// Remove the subscription. Repeat calls, and calls after the bus is
    /// gone, do nothing.
    pub fn cancel(&self) {
        if self.cancelled.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(bus) = self.bus.upgrade() {
            bus.remove(self.id);
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_buffer_uses_default() {
        let bus = EventBus::new();
        let (_rx, _handle) = bus.subscribe(0);
        for i in 0..DEFAULT_SUBSCRIBER_BUFFER {
            assert_eq!(bus.broadcast(&i.to_string()), 1);
        }
        assert_eq!(bus.broadcast("overflow"), 0);
    }

    #[test]
    fn test_full_queue_drops_without_blocking() {
        let bus = EventBus::new();
        let (mut slow, _h1) = bus.subscribe(1);
        let (mut fast, _h2) = bus.subscribe(4);

        assert_eq!(bus.broadcast("first"), 2);
        assert_eq!(bus.broadcast("second"), 1);

        assert_eq!(slow.try_recv().unwrap(), "first");
        assert!(slow.try_recv().is_err());
        assert_eq!(fast.try_recv().unwrap(), "first");
        assert_eq!(fast.try_recv().unwrap(), "second");
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let bus = EventBus::new();
        let (mut rx, handle) = bus.subscribe(4);
        bus.broadcast("before");

        handle.cancel();
        handle.cancel();
        assert!(handle.is_cancelled());
        assert_eq!(bus.subscriber_count(), 0);

        assert_eq!(rx.try_recv().unwrap(), "before");
        assert!(matches!(
            rx.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
    }

    #[test]
    fn test_cancel_after_bus_dropped() {
        let bus = EventBus::new();
        let (_rx, handle) = bus.subscribe(1);
        drop(bus);
        handle.cancel();
    }

    #[test]
    fn test_publish_raw_tags_identifier() {
        let bus = EventBus::new();
        let (mut rx, _h) = bus.subscribe(2);
        bus.publish_raw("/dev/ttyUSB2", b"\r\n+CMTI: \"SM\",1\r\n");
        assert_eq!(rx.try_recv().unwrap(), "[/dev/ttyUSB2] \r\n+CMTI: \"SM\",1\r\n");
    }

    #[test]
    fn test_dropped_receivers_are_pruned() {
        let bus = EventBus::new();
        let (mut live, _live_handle) = bus.subscribe(2);
        let handles: Vec<Unsubscribe> = (0..1000)
            .map(|_| {
                let (rx, handle) = bus.subscribe(1);
                drop(rx);
                handle
            })
            .collect();
        assert_eq!(bus.subscriber_count(), 1001);

        assert_eq!(bus.broadcast("x"), 1);
        assert_eq!(bus.subscriber_count(), 1);
        assert_eq!(live.try_recv().unwrap(), "x");

        // Cancelling an already pruned subscription is harmless.
        handles[0].cancel();
        assert_eq!(bus.subscriber_count(), 1);
    }
}
