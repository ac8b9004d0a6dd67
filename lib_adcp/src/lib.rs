//! Connection hub and projection pipeline for live ADCP displays.

pub mod core;
pub mod errors;

pub use crate::core::*;
pub use errors::{IngestError, ProjectionError, PumpError};
