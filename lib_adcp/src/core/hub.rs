//! # Broadcast Hub
//!
//! The single serialized coordinator of the pipeline. One tokio task owns the
//! [`DeviceStateStore`], the [`ConnectionRegistry`] and the shared
//! [`AttitudeWindows`], and consumes [`HubEvent`]s in arrival order. Nothing else
//! touches that state: transport tasks and ingest sources talk to the hub through a
//! cloneable [`HubHandle`], which only ever sends events.
//!
//! ## Event handling
//!
//! - **Ensemble arrival**: upsert the device; if it is new, broadcast the device list;
//!   then build and broadcast the Ensemble, Profile, Rickshaw, C3, Epoch and HPR
//!   projections in that order.
//! - **Connection registered**: add it, then broadcast the device list to everyone,
//!   the newcomer included.
//! - **Connection unregistered**: remove it if present and, only then, broadcast the
//!   device list to the remaining subscribers.
//!
//! A projection that fails to build or encode is logged and skipped; the remaining
//! projections for that ensemble still go out.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::core::builders::{self, BeamColumns, EpochZone};
use crate::core::device_store::DeviceStateStore;
use crate::core::ensemble::Ensemble;
use crate::core::projection::Projection;
use crate::core::registry::{BroadcastReport, ConnectionId, ConnectionRegistry, OutboundSender};
use crate::core::rolling_series::AttitudeWindows;
use crate::errors::{IngestError, ProjectionError};

/// Default outbound queue depth per subscriber.
pub const DEFAULT_OUTBOUND_CAPACITY: usize = 256 * 10;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Hub tuning.
#[derive(Debug, Clone, Copy)]
pub struct HubConfig {
    /// Payloads a subscriber may have queued before it is dropped.
    pub outbound_capacity: usize,
    /// Zone used to stamp heatmap columns.
    pub epoch_zone: EpochZone,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            outbound_capacity: DEFAULT_OUTBOUND_CAPACITY,
            epoch_zone: EpochZone::Local,
        }
    }
}

/// Counters reported by [`HubHandle::stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HubStats {
    pub devices: usize,
    pub connections: usize,
}

/// Read-only questions answered by the hub task.
#[derive(Debug)]
pub enum HubQuery {
    Devices(oneshot::Sender<Vec<String>>),
    Snapshot(oneshot::Sender<HashMap<String, Arc<Ensemble>>>),
    Stats(oneshot::Sender<HubStats>),
}

/// Everything the hub reacts to.
#[derive(Debug)]
pub enum HubEvent {
    Register {
        id: ConnectionId,
        outbound: OutboundSender,
        evicted: CancellationToken,
    },
    Unregister(ConnectionId),
    Ensemble(Arc<Ensemble>),
    Query(HubQuery),
}

/// State owned by the hub task.
#[derive(Debug)]
pub struct BroadcastHub {
    devices: DeviceStateStore,
    registry: ConnectionRegistry,
    attitude: AttitudeWindows,
    epoch_zone: EpochZone,
}

impl BroadcastHub {
    pub fn new(config: &HubConfig) -> Self {
        Self {
            devices: DeviceStateStore::new(),
            registry: ConnectionRegistry::new(),
            attitude: AttitudeWindows::new(),
            epoch_zone: config.epoch_zone,
        }
    }

    /// Starts the hub on the current tokio runtime and returns a handle to it.
    ///
    /// The task runs until every handle has been dropped.
    pub fn spawn(config: HubConfig) -> HubHandle {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let hub = BroadcastHub::new(&config);
        tokio::spawn(hub.run(events_rx));
        HubHandle {
            events: events_tx,
            outbound_capacity: config.outbound_capacity.max(1),
        }
    }

    /// Event loop. Processes events strictly one at a time.
    pub async fn run(mut self, mut events: mpsc::UnboundedReceiver<HubEvent>) {
        log::info!("ADCP hub running");
        while let Some(event) = events.recv().await {
            self.handle_event(event);
        }
        log::info!("ADCP hub stopped: all handles dropped");
    }

    pub fn handle_event(&mut self, event: HubEvent) {
        match event {
            HubEvent::Register { id, outbound, evicted } => {
                self.registry.register(id, outbound, evicted);
                self.broadcast_device_list();
            }
            HubEvent::Unregister(id) => {
                if self.registry.unregister(id) {
                    self.broadcast_device_list();
                }
            }
            HubEvent::Ensemble(ensemble) => self.on_ensemble(ensemble),
            HubEvent::Query(query) => self.answer(query),
        }
    }

    fn on_ensemble(&mut self, ensemble: Arc<Ensemble>) {
        log::debug!(
            "Ensemble {} from {} (cepo {})",
            ensemble.ensemble_number,
            ensemble.serial_number,
            ensemble.cepo_index
        );

        if self.devices.upsert(Arc::clone(&ensemble)) {
            self.broadcast_device_list();
        }

        let columns = BeamColumns::from_ensemble(&ensemble);
        self.broadcast(Ok(builders::build_ensemble(&ensemble)));
        self.broadcast(Ok(builders::build_profile(&ensemble, &columns)));
        self.broadcast(Ok(builders::build_rickshaw(&ensemble, &columns)));
        self.broadcast(Ok(builders::build_c3(&ensemble, &columns)));
        self.broadcast(builders::build_epoch(&ensemble, &self.epoch_zone));
        let hpr = builders::build_hpr(&ensemble, &mut self.attitude);
        self.broadcast(Ok(hpr));
    }

    fn broadcast_device_list(&mut self) {
        let list = builders::build_device_list(self.devices.list_serial_numbers());
        self.broadcast(Ok(list));
    }

    fn broadcast(&mut self, projection: Result<Projection, ProjectionError>) {
        let encoded = projection.and_then(|p| p.to_payload().map(|payload| (p.kind(), payload)));
        let (kind, payload): (&str, Bytes) = match encoded {
            Ok(encoded) => encoded,
            Err(e) => {
                log::error!("Skipping projection: {}", e);
                return;
            }
        };

        let BroadcastReport { delivered, dropped } = self.registry.broadcast_all(&payload);
        if dropped > 0 {
            log::warn!("{} broadcast dropped {} slow subscriber(s)", kind, dropped);
        }
        log::trace!("{} delivered to {} subscriber(s)", kind, delivered);
    }

    fn answer(&self, query: HubQuery) {
        // A requester that gave up waiting is not an error.
        match query {
            HubQuery::Devices(reply) => {
                let _ = reply.send(self.devices.list_serial_numbers());
            }
            HubQuery::Snapshot(reply) => {
                let _ = reply.send(self.devices.snapshot());
            }
            HubQuery::Stats(reply) => {
                let _ = reply.send(self.stats());
            }
        }
    }

    pub fn stats(&self) -> HubStats {
        HubStats {
            devices: self.devices.len(),
            connections: self.registry.len(),
        }
    }

    pub fn devices(&self) -> &DeviceStateStore {
        &self.devices
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }
}

/// A registered subscriber: its id and the receiving half of its outbound queue.
#[derive(Debug)]
pub struct Subscription {
    pub id: ConnectionId,
    pub outbound: mpsc::Receiver<Bytes>,
    /// Cancelled when the hub drops this subscriber for falling behind.
    pub evicted: CancellationToken,
}

/// Cloneable entry point to a running hub.
#[derive(Debug, Clone)]
pub struct HubHandle {
    events: mpsc::UnboundedSender<HubEvent>,
    outbound_capacity: usize,
}

impl HubHandle {
    /// Registers a new subscriber and returns its queue.
    ///
    /// If the hub has stopped, the returned queue is already closed.
    pub fn subscribe(&self) -> Subscription {
        let id = NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed);
        let (outbound_tx, outbound_rx) = mpsc::channel(self.outbound_capacity);
        let evicted = CancellationToken::new();
        self.send(HubEvent::Register {
            id,
            outbound: outbound_tx,
            evicted: evicted.clone(),
        });
        Subscription {
            id,
            outbound: outbound_rx,
            evicted,
        }
    }

    /// Reports a subscriber gone. Unknown ids are ignored by the hub.
    pub fn unregister(&self, id: ConnectionId) {
        self.send(HubEvent::Unregister(id));
    }

    /// Validates an already-decoded ensemble and hands it to the hub.
    ///
    /// Ensembles with an inconsistent shape are logged and rejected without reaching
    /// the hub.
    pub fn ingest(&self, ensemble: Ensemble) -> Result<(), IngestError> {
        if let Err(e) = ensemble.validate() {
            log::warn!("Discarding ensemble {} from '{}': {}", ensemble.ensemble_number, ensemble.serial_number, e);
            return Err(e);
        }
        self.send(HubEvent::Ensemble(Arc::new(ensemble)));
        Ok(())
    }

    /// Decodes one JSON ensemble and hands it to the hub.
    pub fn ingest_bytes(&self, bytes: &[u8]) -> Result<(), IngestError> {
        let ensemble: Ensemble = serde_json::from_slice(bytes).map_err(|e| {
            log::warn!("Discarding ingest payload of {} bytes: {}", bytes.len(), e);
            IngestError::from(e)
        })?;
        self.ingest(ensemble)
    }

    /// Known serial numbers, or `None` if the hub has stopped.
    pub async fn devices(&self) -> Option<Vec<String>> {
        let (reply, answer) = oneshot::channel();
        self.send(HubEvent::Query(HubQuery::Devices(reply)));
        answer.await.ok()
    }

    /// Latest ensemble per device, or `None` if the hub has stopped.
    pub async fn snapshot(&self) -> Option<HashMap<String, Arc<Ensemble>>> {
        let (reply, answer) = oneshot::channel();
        self.send(HubEvent::Query(HubQuery::Snapshot(reply)));
        answer.await.ok()
    }

    /// Device and connection counts, or `None` if the hub has stopped.
    pub async fn stats(&self) -> Option<HubStats> {
        let (reply, answer) = oneshot::channel();
        self.send(HubEvent::Query(HubQuery::Stats(reply)));
        answer.await.ok()
    }

    fn send(&self, event: HubEvent) {
        if self.events.send(event).is_err() {
            log::warn!("ADCP hub is not running; event dropped");
        }
    }
}
