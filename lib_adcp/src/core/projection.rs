//! # Projection Payloads
//!
//! Display-oriented reshapings of one ensemble. Every payload is serialized on its own
//! and carries an `id` discriminator so a subscriber can route it to the right chart:
//!
//! | `id`                  | Variant                     |
//! |-----------------------|-----------------------------|
//! | `AdcpList`            | [`Projection::DeviceList`]  |
//! | `Ensemble`            | [`Projection::Ensemble`]    |
//! | `ProfileData`         | [`Projection::Profile`]     |
//! | `ProfileRickshawData` | [`Projection::Rickshaw`]    |
//! | `ProfileC3Data`       | [`Projection::C3`]          |
//! | `ProfileEpochData`    | [`Projection::Epoch`]       |
//! | `HprData`             | [`Projection::Hpr`]         |
//!
//! Projections are transient: built per ingested ensemble, encoded, and dropped.

use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;

use crate::core::ensemble::Ensemble;
use crate::core::rolling_series::RollingSeries;
use crate::errors::ProjectionError;

/// Closed set of payload kinds, internally tagged with `id`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "id")]
pub enum Projection {
    #[serde(rename = "AdcpList")]
    DeviceList(DeviceList),
    #[serde(rename = "Ensemble")]
    Ensemble(EnsemblePassthrough),
    #[serde(rename = "ProfileData")]
    Profile(ProfileData),
    #[serde(rename = "ProfileRickshawData")]
    Rickshaw(ProfileRickshawData),
    #[serde(rename = "ProfileC3Data")]
    C3(ProfileC3Data),
    #[serde(rename = "ProfileEpochData")]
    Epoch(ProfileEpochData),
    #[serde(rename = "HprData")]
    Hpr(HprData),
}

impl Projection {
    /// The wire discriminator of this payload.
    pub fn kind(&self) -> &'static str {
        match self {
            Projection::DeviceList(_) => "AdcpList",
            Projection::Ensemble(_) => "Ensemble",
            Projection::Profile(_) => "ProfileData",
            Projection::Rickshaw(_) => "ProfileRickshawData",
            Projection::C3(_) => "ProfileC3Data",
            Projection::Epoch(_) => "ProfileEpochData",
            Projection::Hpr(_) => "HprData",
        }
    }

    /// Encodes the payload as UTF-8 JSON bytes ready for the outbound queues.
    pub fn to_payload(&self) -> Result<Bytes, ProjectionError> {
        Ok(Bytes::from(serde_json::to_vec(self)?))
    }
}

/// All serial numbers the hub currently knows.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceList {
    pub serial_numbers: Vec<String>,
}

/// The raw ensemble, echoed for inspection.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnsemblePassthrough {
    pub serial_number: String,
    pub cepo_index: u8,
    /// Reserved; always empty.
    pub subsystem_config: String,
    pub ensemble: Arc<Ensemble>,
}

/// One beam's profile as `[value, bin]` pairs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileBeamSeries {
    pub values: Vec<[f32; 2]>,
    pub color: String,
    pub key: String,
    pub area: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileData {
    pub serial_number: String,
    pub cepo_index: u8,
    /// Amplitude series for beams B0..B3.
    pub amp_data: Vec<ProfileBeamSeries>,
    /// Correlation series for beams B0..B3.
    pub corr_data: Vec<ProfileBeamSeries>,
}

/// `{x, y}` point used by the rickshaw charts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PlotPoint {
    pub x: f32,
    pub y: f32,
}

/// One beam's profile as `{x: value, y: bin}` points.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineSeries {
    pub data: Vec<PlotPoint>,
    pub color: String,
    pub key: String,
    pub area: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileRickshawData {
    pub serial_number: String,
    pub cepo_index: u8,
    pub amp_b0_data: LineSeries,
    pub amp_b1_data: LineSeries,
    pub amp_b2_data: LineSeries,
    pub amp_b3_data: LineSeries,
    pub corr_b0_data: LineSeries,
    pub corr_b1_data: LineSeries,
    pub corr_b2_data: LineSeries,
    pub corr_b3_data: LineSeries,
}

/// Column-oriented profile for the C3 charts.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileC3Data {
    pub serial_number: String,
    pub cepo_index: u8,
    /// Bin index per row.
    pub amp_x_axis: Vec<f32>,
    pub amp_b0_data: Vec<f32>,
    pub amp_b1_data: Vec<f32>,
    pub amp_b2_data: Vec<f32>,
    pub amp_b3_data: Vec<f32>,
    /// Range of each bin from the transducer.
    pub corr_x_axis: Vec<f32>,
    pub corr_b0_data: Vec<f32>,
    pub corr_b1_data: Vec<f32>,
    pub corr_b2_data: Vec<f32>,
    pub corr_b3_data: Vec<f32>,
}

/// `{time, y}` point for realtime epoch charts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TimePoint {
    pub time: f32,
    pub y: f32,
}

/// Labelled series for the epoch charts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EpochSeries<P> {
    pub label: String,
    pub values: Vec<P>,
}

/// One heatmap column: a per-bin histogram stamped with unix time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeatmapSeries {
    pub time: i64,
    pub histogram: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileEpochData {
    pub serial_number: String,
    pub cepo_index: u8,
    pub data: Vec<EpochSeries<PlotPoint>>,
    pub realtime_data: Vec<EpochSeries<TimePoint>>,
    pub heatmap_mag_data: HeatmapSeries,
    pub heatmap_dir_y_north_data: HeatmapSeries,
    pub heatmap_dir_x_north_data: HeatmapSeries,
}

/// Heading, pitch and roll windows.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HprData {
    pub serial_number: String,
    pub cepo_index: u8,
    pub hpr_data: Vec<RollingSeries>,
}
