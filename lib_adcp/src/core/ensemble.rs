//! # Ensemble Model
//!
//! The decoded instrument sample that enters the hub. Decoding from the instrument's
//! native binary format happens upstream; this module only accepts the JSON form and
//! checks that the bin/beam matrices are rectangular so every projection builder can
//! index them without bounds surprises.

use serde::{Deserialize, Serialize};

use crate::errors::IngestError;

/// One complete decoded sample from an instrument.
///
/// Ensembles are immutable once decoded. The hub shares them as `Arc<Ensemble>` and
/// only ever replaces the stored reference for a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ensemble {
    /// Instrument serial number, the device key.
    pub serial_number: String,
    /// Subsystem configuration index.
    #[serde(default)]
    pub cepo_index: u8,
    /// Running ensemble counter reported by the instrument.
    #[serde(default)]
    pub ensemble_number: u32,
    /// Wall-clock fields as reported by the instrument.
    pub time: EnsembleTime,
    /// Amplitude, indexed `[bin][beam]`.
    #[serde(default)]
    pub amplitude: Vec<Vec<f32>>,
    /// Correlation, indexed `[bin][beam]`.
    #[serde(default)]
    pub correlation: Vec<Vec<f32>>,
    /// Earth-referenced velocity per bin, when the instrument produced it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub earth_velocity: Option<Vec<VelocityVector>>,
    /// Attitude and range metadata.
    #[serde(default)]
    pub ancillary: AncillaryData,
}

/// Instrument wall-clock fields. `year` is an offset from 2000.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnsembleTime {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
    /// Hundredths of a second. Carried for raw inspection only.
    #[serde(default)]
    pub hsec: u32,
}

/// Earth velocity vector for one bin.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VelocityVector {
    pub magnitude: f32,
    pub direction_x_north: f32,
    pub direction_y_north: f32,
}

/// Attitude and range metadata.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AncillaryData {
    pub heading: f32,
    pub pitch: f32,
    pub roll: f32,
    /// Range to the center of the first bin.
    pub first_bin_range: f32,
    pub bin_size: f32,
}

impl Ensemble {
    /// Decodes and validates one JSON-encoded ensemble.
    pub fn from_json(bytes: &[u8]) -> Result<Self, IngestError> {
        let ensemble: Ensemble = serde_json::from_slice(bytes)?;
        ensemble.validate()?;
        Ok(ensemble)
    }

    /// Checks the invariants the projection builders rely on.
    pub fn validate(&self) -> Result<(), IngestError> {
        if self.serial_number.trim().is_empty() {
            return Err(IngestError::MissingSerialNumber);
        }
        if self.amplitude.len() != self.correlation.len() {
            return Err(IngestError::BinCountMismatch {
                amplitude: self.amplitude.len(),
                correlation: self.correlation.len(),
            });
        }

        let expected = self.num_beams();
        for (dataset, rows) in [("amplitude", &self.amplitude), ("correlation", &self.correlation)] {
            if let Some((bin, row)) = rows.iter().enumerate().find(|(_, row)| row.len() != expected) {
                return Err(IngestError::RaggedBeams {
                    dataset,
                    bin,
                    expected,
                    found: row.len(),
                });
            }
        }

        if let Some(vectors) = &self.earth_velocity {
            if vectors.len() != self.num_bins() {
                return Err(IngestError::VelocityBinMismatch {
                    expected: self.num_bins(),
                    found: vectors.len(),
                });
            }
        }
        Ok(())
    }

    /// Number of depth bins in the profile.
    pub fn num_bins(&self) -> usize {
        self.amplitude.len()
    }

    /// Number of beams per bin.
    pub fn num_beams(&self) -> usize {
        self.amplitude.first().map_or(0, Vec::len)
    }
}
