//! # Connection Registry
//!
//! Owns the set of live subscriber connections and the sending half of each one's
//! bounded outbound queue.
//!
//! ## Backpressure
//!
//! Broadcasting never waits. Each payload is offered to every queue with `try_send`;
//! a connection whose queue is full (or whose pump has already gone away) is removed
//! on the spot. Dropping the sender closes the queue, so the connection's pump drains
//! what is left, sees the close, and shuts its transport down.
//!
//! A full queue means the pump is stuck writing, so it would never get to see the
//! close. Each connection therefore also carries an eviction token that is cancelled
//! when it is dropped for overflow; the pump races that token against its writes.
//!
//! Payloads are `Bytes`, so the fan-out clones a reference count rather than the
//! encoded JSON.

use std::collections::HashMap;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;

/// Process-unique subscriber connection id.
pub type ConnectionId = u64;

/// Sending half of a connection's outbound queue.
pub type OutboundSender = mpsc::Sender<Bytes>;

/// Outcome of one [`ConnectionRegistry::broadcast_all`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Queues that accepted the payload.
    pub delivered: usize,
    /// Connections removed because their queue was full or closed.
    pub dropped: usize,
}

/// Live subscriber connections.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    // Outbound queue plus the token cancelled when the connection is evicted
    connections: HashMap<ConnectionId, (OutboundSender, CancellationToken)>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a connection. Re-registering an id replaces, and thereby closes, the
    /// previous queue.
    pub fn register(&mut self, id: ConnectionId, outbound: OutboundSender, evicted: CancellationToken) {
        if self.connections.insert(id, (outbound, evicted)).is_some() {
            log::warn!("Connection {} registered twice; previous queue closed", id);
        }
        log::info!("Registering websocket {} ({} active)", id, self.connections.len());
    }

    /// Removes a connection and closes its queue.
    ///
    /// Returns `false` when the id was not registered; that case is a no-op.
    pub fn unregister(&mut self, id: ConnectionId) -> bool {
        match self.connections.remove(&id) {
            Some(_) => {
                log::info!("Unregistering websocket {} ({} active)", id, self.connections.len());
                true
            }
            None => {
                log::debug!("Connection {} already unregistered", id);
                false
            }
        }
    }

    /// Offers `payload` to every connection without blocking, dropping any whose
    /// queue cannot take it.
    pub fn broadcast_all(&mut self, payload: &Bytes) -> BroadcastReport {
        let mut report = BroadcastReport::default();

        self.connections.retain(|id, (outbound, evicted)| match outbound.try_send(payload.clone()) {
            Ok(()) => {
                report.delivered += 1;
                true
            }
            Err(TrySendError::Full(_)) => {
                log::warn!("Outbound queue full for connection {}. Dropping connection.", id);
                evicted.cancel();
                report.dropped += 1;
                false
            }
            Err(TrySendError::Closed(_)) => {
                log::debug!("Connection {} pump already gone. Removing.", id);
                report.dropped += 1;
                false
            }
        });

        report
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.connections.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
