//! # Core Hub Module
//!
//! The live-display pipeline for ADCP ensembles. Ensembles come in from instrument
//! connections, the latest one per instrument is retained, and each arrival is
//! reshaped into display projections that are fanned out to every subscriber.
//!
//! ## Core Components:
//!
//! - **`ensemble`**: The decoded instrument sample and its shape validation.
//!
//! - **`device_store`**: Serial number to last-known ensemble.
//!
//! - **`projection`** / **`builders`**: The closed set of display payloads and the
//!   functions that build each one from an ensemble.
//!
//! - **`rolling_series`**: The bounded heading/pitch/roll windows behind the HPR plot.
//!
//! - **`registry`**: Live subscribers and their bounded outbound queues, with
//!   non-blocking fan-out.
//!
//! - **`hub`**: The single serialized actor that owns all of the above.
//!
//! - **`pump`**: The per-connection drain/inbound loops a transport plugs into.

pub mod device_store;
pub mod ensemble;
pub mod builders;
pub mod hub;
pub mod projection;
pub mod pump;
pub mod registry;
pub mod rolling_series;

pub use ensemble::{AncillaryData, Ensemble, EnsembleTime, VelocityVector};
pub use hub::{BroadcastHub, HubConfig, HubHandle, HubStats, Subscription};
pub use projection::Projection;
pub use pump::{run_pump, InboundSource, OutboundSink, PumpExit};
pub use registry::ConnectionId;
pub use builders::EpochZone;
