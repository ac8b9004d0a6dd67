//! # Shared Test Fixtures
//!
//! Sample ensembles and an in-memory subscriber transport for the integration tests in
//! `tests/`. The transport implements the hub's pump traits over unbounded channels, so
//! a test can play the remote display: read what the pump wrote, hang up, or make
//! writes fail.

use bytes::Bytes;
use lib_adcp::core::ensemble::{AncillaryData, Ensemble, EnsembleTime, VelocityVector};
use lib_adcp::core::pump::{InboundSource, OutboundSink};
use lib_adcp::errors::PumpError;
use tokio::sync::mpsc;

/// A 3-bin, 2-beam ensemble stamped 2024-06-01 12:00:00.
pub fn sample_ensemble(serial_number: &str, ensemble_number: u32) -> Ensemble {
    Ensemble {
        serial_number: serial_number.to_string(),
        cepo_index: 1,
        ensemble_number,
        time: EnsembleTime { year: 24, month: 6, day: 1, hour: 12, minute: 0, second: 0, hsec: 42 },
        amplitude: vec![vec![40.0, 41.0], vec![30.0, 31.0], vec![20.0, 21.0]],
        correlation: vec![vec![0.9, 0.8], vec![0.7, 0.6], vec![0.5, 0.4]],
        earth_velocity: Some(vec![
            VelocityVector { magnitude: 0.25, direction_x_north: 90.0, direction_y_north: 0.0 },
            VelocityVector { magnitude: 0.5, direction_x_north: 180.0, direction_y_north: 90.0 },
            VelocityVector { magnitude: 0.75, direction_x_north: 270.0, direction_y_north: 180.0 },
        ]),
        ancillary: AncillaryData {
            heading: ensemble_number as f32,
            pitch: 1.5,
            roll: -0.5,
            first_bin_range: 2.0,
            bin_size: 0.5,
        },
    }
}

/// JSON form of [`sample_ensemble`], as an instrument would send it.
pub fn sample_ensemble_json(serial_number: &str, ensemble_number: u32) -> String {
    serde_json::to_string(&sample_ensemble(serial_number, ensemble_number)).unwrap()
}

/// Write half of the in-memory transport.
pub struct MemorySink {
    delivered: mpsc::UnboundedSender<Bytes>,
    mode: SinkMode,
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum SinkMode {
    /// Forward every payload to the peer.
    Deliver,
    /// Fail every write.
    Fail,
    /// Never complete a write, like a display that stopped reading.
    Stall,
}

/// Read half of the in-memory transport.
pub struct MemorySource {
    inbound: mpsc::UnboundedReceiver<Result<Bytes, PumpError>>,
}

/// The remote end of the in-memory transport.
pub struct MemoryPeer {
    pub received: mpsc::UnboundedReceiver<Bytes>,
    inbound: mpsc::UnboundedSender<Result<Bytes, PumpError>>,
}

pub fn memory_transport(mode: SinkMode) -> (MemorySink, MemorySource, MemoryPeer) {
    let (delivered_tx, delivered_rx) = mpsc::unbounded_channel();
    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
    (
        MemorySink { delivered: delivered_tx, mode },
        MemorySource { inbound: inbound_rx },
        MemoryPeer { received: delivered_rx, inbound: inbound_tx },
    )
}

impl OutboundSink for MemorySink {
    async fn send(&mut self, payload: Bytes) -> Result<(), PumpError> {
        match self.mode {
            SinkMode::Deliver => self
                .delivered
                .send(payload)
                .map_err(|_| PumpError::Write("peer gone".to_string())),
            SinkMode::Fail => Err(PumpError::Write("connection reset".to_string())),
            SinkMode::Stall => std::future::pending().await,
        }
    }

    async fn close(&mut self) {}
}

impl InboundSource for MemorySource {
    async fn next_frame(&mut self) -> Option<Result<Bytes, PumpError>> {
        self.inbound.recv().await
    }
}

impl MemoryPeer {
    /// Next payload the pump wrote, decoded as JSON.
    pub async fn next_json(&mut self) -> Option<serde_json::Value> {
        let payload = self.received.recv().await?;
        Some(serde_json::from_slice(&payload).unwrap())
    }

    /// `id` of the next payload.
    pub async fn next_id(&mut self) -> Option<String> {
        let json = self.next_json().await?;
        json["id"].as_str().map(str::to_string)
    }

    /// Sends a frame the pump is expected to ignore.
    pub fn chatter(&self, text: &'static str) {
        let _ = self.inbound.send(Ok(Bytes::from_static(text.as_bytes())));
    }

    /// Closes the connection from the display side.
    pub fn hang_up(self) {
        drop(self);
    }
}

/// Projection ids emitted for one ensemble from a known device, in order.
pub const ENSEMBLE_PROJECTION_IDS: [&str; 6] = [
    "Ensemble",
    "ProfileData",
    "ProfileRickshawData",
    "ProfileC3Data",
    "ProfileEpochData",
    "HprData",
];
