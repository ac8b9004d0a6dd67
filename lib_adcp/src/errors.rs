//! # Error Types
//!
//! Typed errors for the hub pipeline. None of these are fatal to the hub: each one is
//! logged at the point where it surfaces and the offending input, projection, or
//! connection is dropped.

use thiserror::Error;

/// Errors raised while turning raw ingest bytes into an `Ensemble`.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The payload was not valid JSON for the ensemble schema.
    #[error("Ensemble decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// The amplitude and correlation matrices disagree on the number of bins.
    #[error("Bin count mismatch: amplitude has {amplitude} bins, correlation has {correlation}")]
    BinCountMismatch {
        /// Rows in the amplitude matrix.
        amplitude: usize,
        /// Rows in the correlation matrix.
        correlation: usize,
    },

    /// A bin row does not carry the same number of beams as the first row.
    #[error("Ragged beam data in {dataset} at bin {bin}: expected {expected} beams, found {found}")]
    RaggedBeams {
        /// Which matrix was ragged ("amplitude" or "correlation").
        dataset: &'static str,
        /// The first offending bin.
        bin: usize,
        /// Beam count of bin 0 of the amplitude matrix.
        expected: usize,
        /// Beam count found at `bin`.
        found: usize,
    },

    /// Earth velocity is present but does not cover every bin.
    #[error("Earth velocity has {found} bins, expected {expected}")]
    VelocityBinMismatch {
        /// Bin count of the amplitude matrix.
        expected: usize,
        /// Entries in the earth velocity array.
        found: usize,
    },

    /// The serial number is empty, so the ensemble cannot be keyed.
    #[error("Ensemble carries an empty serial number")]
    MissingSerialNumber,
}

/// Errors raised while building or encoding a single projection.
#[derive(Debug, Error)]
pub enum ProjectionError {
    /// The ensemble's wall-clock fields do not form a calendar date/time.
    #[error("Invalid ensemble time: {0}")]
    InvalidTime(String),

    /// The projection could not be encoded as JSON.
    #[error("Projection encode error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Errors surfaced by a subscriber transport.
#[derive(Debug, Error)]
pub enum PumpError {
    /// Writing an outbound payload failed.
    #[error("Transport write failed: {0}")]
    Write(String),

    /// Reading from the peer failed.
    #[error("Transport read failed: {0}")]
    Read(String),
}
