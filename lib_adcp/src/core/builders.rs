//! # Projection Builders
//!
//! Functions that map one ensemble to one projection. They are pure apart from the
//! HPR builder, which appends to the shared [`AttitudeWindows`] it is handed.
//!
//! The profile, rickshaw and C3 encodings all come out of a single bin/beam pass
//! ([`BeamColumns`]), so for the same ensemble they always carry identical numbers and
//! differ only in shape. Only beams 0..=3 are plotted; any further beams are ignored.

use chrono::{Local, LocalResult, NaiveDate, NaiveDateTime, Offset, TimeDelta, TimeZone};
use chrono_tz::Tz;

use crate::core::ensemble::{Ensemble, EnsembleTime, VelocityVector};
use crate::core::projection::{
    DeviceList, EnsemblePassthrough, HeatmapSeries, HprData, LineSeries, PlotPoint, ProfileBeamSeries,
    ProfileC3Data, ProfileData, ProfileEpochData, ProfileRickshawData, Projection,
};
use crate::core::rolling_series::AttitudeWindows;
use crate::errors::ProjectionError;
use std::sync::Arc;

/// Beams that get their own plot series.
pub const PLOTTED_BEAMS: usize = 4;

/// Series key and color per plotted beam.
const BEAM_STYLES: [(&str, &str); PLOTTED_BEAMS] = [
    ("B0", "#ff7f0e"),
    ("B1", "#2ca02c"),
    ("B2", "#7777ff"),
    ("B3", "#d67777"),
];

/// Time zone used to interpret ensemble wall-clock fields.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum EpochZone {
    /// The zone of the host running the hub.
    #[default]
    Local,
    /// A named IANA zone.
    Named(Tz),
}

impl EpochZone {
    /// Parses an IANA zone name; `None` selects the host zone.
    pub fn from_name(name: Option<&str>) -> Result<Self, String> {
        match name {
            None => Ok(EpochZone::Local),
            Some(name) => name
                .parse::<Tz>()
                .map(EpochZone::Named)
                .map_err(|e| format!("Unknown time zone '{}': {}", name, e)),
        }
    }

    /// Unix seconds for the ensemble's wall-clock time in this zone.
    ///
    /// The year field is an offset from 2000. Out-of-range fields carry into the next
    /// larger unit: month 13 is January of the following year, day 0 the last day of
    /// the previous month, second 60 the next minute. Hundredths of a second are
    /// ignored, so the result is always a whole second.
    pub fn unix_time(&self, time: &EnsembleTime) -> Result<i64, ProjectionError> {
        let resolved = wall_clock(time).and_then(|naive| match self {
            EpochZone::Local => resolve_local(&Local, naive),
            EpochZone::Named(tz) => resolve_local(tz, naive),
        });

        resolved.ok_or_else(|| {
            ProjectionError::InvalidTime(format!(
                "year {} (+2000) month {} day {} {:02}:{:02}:{:02}",
                time.year, time.month, time.day, time.hour, time.minute, time.second
            ))
        })
    }
}

/// Normalized wall-clock time, or `None` when it falls outside chrono's range.
fn wall_clock(time: &EnsembleTime) -> Option<NaiveDateTime> {
    let months = (i64::from(time.year) + 2000) * 12 + i64::from(time.month) - 1;
    let year = i32::try_from(months.div_euclid(12)).ok()?;
    let month = months.rem_euclid(12) as u32 + 1;
    let seconds = (i64::from(time.day) - 1) * 86_400
        + i64::from(time.hour) * 3_600
        + i64::from(time.minute) * 60
        + i64::from(time.second);

    let naive = NaiveDate::from_ymd_opt(year, month, 1)?
        .and_hms_opt(0, 0, 0)?
        .checked_add_signed(TimeDelta::try_seconds(seconds)?)?;

    // Keep a day of headroom so applying a zone offset cannot leave chrono's range.
    (NaiveDate::MIN < naive.date() && naive.date() < NaiveDate::MAX).then_some(naive)
}

fn resolve_local<Z: TimeZone>(zone: &Z, naive: NaiveDateTime) -> Option<i64> {
    match zone.from_local_datetime(&naive) {
        LocalResult::Single(t) => Some(t.timestamp()),
        LocalResult::Ambiguous(earliest, _) => Some(earliest.timestamp()),
        LocalResult::None => {
            // Skipped wall time (forward DST shift): apply the offset in force at that instant.
            let offset = zone.offset_from_utc_datetime(&naive).fix().local_minus_utc();
            naive
                .checked_sub_signed(TimeDelta::seconds(i64::from(offset)))
                .map(|utc| utc.and_utc().timestamp())
        }
    }
}

/// Amplitude and correlation split into per-beam columns, indexed by bin.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BeamColumns {
    pub amplitude: [Vec<f32>; PLOTTED_BEAMS],
    pub correlation: [Vec<f32>; PLOTTED_BEAMS],
}

impl BeamColumns {
    pub fn from_ensemble(ensemble: &Ensemble) -> Self {
        let mut columns = BeamColumns::default();
        let beams = ensemble.num_beams().min(PLOTTED_BEAMS);

        for (amp_row, corr_row) in ensemble.amplitude.iter().zip(&ensemble.correlation) {
            for beam in 0..beams {
                if let (Some(amp), Some(corr)) = (amp_row.get(beam), corr_row.get(beam)) {
                    columns.amplitude[beam].push(*amp);
                    columns.correlation[beam].push(*corr);
                }
            }
        }
        columns
    }
}

/// Raw ensemble echo.
pub fn build_ensemble(ensemble: &Arc<Ensemble>) -> Projection {
    Projection::Ensemble(EnsemblePassthrough {
        serial_number: ensemble.serial_number.clone(),
        cepo_index: ensemble.cepo_index,
        subsystem_config: String::new(),
        ensemble: Arc::clone(ensemble),
    })
}

/// Profile series as `[value, bin]` pairs.
pub fn build_profile(ensemble: &Ensemble, columns: &BeamColumns) -> Projection {
    let series = |column: &[f32], beam: usize| ProfileBeamSeries {
        values: column.iter().enumerate().map(|(bin, value)| [*value, bin as f32]).collect(),
        color: BEAM_STYLES[beam].1.to_string(),
        key: BEAM_STYLES[beam].0.to_string(),
        area: false,
    };

    Projection::Profile(ProfileData {
        serial_number: ensemble.serial_number.clone(),
        cepo_index: ensemble.cepo_index,
        amp_data: columns.amplitude.iter().enumerate().map(|(beam, c)| series(c.as_slice(), beam)).collect(),
        corr_data: columns.correlation.iter().enumerate().map(|(beam, c)| series(c.as_slice(), beam)).collect(),
    })
}

/// Profile series as `{x: value, y: bin}` points.
pub fn build_rickshaw(ensemble: &Ensemble, columns: &BeamColumns) -> Projection {
    let line = |column: &[f32], beam: usize| LineSeries {
        data: column
            .iter()
            .enumerate()
            .map(|(bin, value)| PlotPoint { x: *value, y: bin as f32 })
            .collect(),
        color: BEAM_STYLES[beam].1.to_string(),
        key: BEAM_STYLES[beam].0.to_string(),
        area: false,
    };
    let amp = &columns.amplitude;
    let corr = &columns.correlation;

    Projection::Rickshaw(ProfileRickshawData {
        serial_number: ensemble.serial_number.clone(),
        cepo_index: ensemble.cepo_index,
        amp_b0_data: line(amp[0].as_slice(), 0),
        amp_b1_data: line(amp[1].as_slice(), 1),
        amp_b2_data: line(amp[2].as_slice(), 2),
        amp_b3_data: line(amp[3].as_slice(), 3),
        corr_b0_data: line(corr[0].as_slice(), 0),
        corr_b1_data: line(corr[1].as_slice(), 1),
        corr_b2_data: line(corr[2].as_slice(), 2),
        corr_b3_data: line(corr[3].as_slice(), 3),
    })
}

/// Column arrays plus bin-index and bin-range axes.
pub fn build_c3(ensemble: &Ensemble, columns: &BeamColumns) -> Projection {
    let bins = ensemble.num_bins();
    let first_bin_range = ensemble.ancillary.first_bin_range;
    let bin_size = ensemble.ancillary.bin_size;
    let [amp_b0, amp_b1, amp_b2, amp_b3] = columns.amplitude.clone();
    let [corr_b0, corr_b1, corr_b2, corr_b3] = columns.correlation.clone();

    Projection::C3(ProfileC3Data {
        serial_number: ensemble.serial_number.clone(),
        cepo_index: ensemble.cepo_index,
        amp_x_axis: (0..bins).map(|bin| bin as f32).collect(),
        amp_b0_data: amp_b0,
        amp_b1_data: amp_b1,
        amp_b2_data: amp_b2,
        amp_b3_data: amp_b3,
        corr_x_axis: (0..bins).map(|bin| first_bin_range + bin_size * bin as f32).collect(),
        corr_b0_data: corr_b0,
        corr_b1_data: corr_b1,
        corr_b2_data: corr_b2,
        corr_b3_data: corr_b3,
    })
}

/// Heatmap columns for velocity magnitude and direction.
pub fn build_epoch(ensemble: &Ensemble, zone: &EpochZone) -> Result<Projection, ProjectionError> {
    let time = zone.unix_time(&ensemble.time)?;
    let vectors: &[VelocityVector] = ensemble.earth_velocity.as_deref().unwrap_or(&[]);
    let heatmap = |field: fn(&VelocityVector) -> f32| HeatmapSeries {
        time,
        histogram: vectors.iter().map(|v| f64::from(field(v))).collect(),
    };

    Ok(Projection::Epoch(ProfileEpochData {
        serial_number: ensemble.serial_number.clone(),
        cepo_index: ensemble.cepo_index,
        data: Vec::new(),
        realtime_data: Vec::new(),
        heatmap_mag_data: heatmap(|v| v.magnitude),
        heatmap_dir_y_north_data: heatmap(|v| v.direction_y_north),
        heatmap_dir_x_north_data: heatmap(|v| v.direction_x_north),
    }))
}

/// Appends the ensemble's attitude to the shared windows and snapshots them.
pub fn build_hpr(ensemble: &Ensemble, windows: &mut AttitudeWindows) -> Projection {
    windows.record(ensemble.ensemble_number, &ensemble.ancillary);
    Projection::Hpr(HprData {
        serial_number: ensemble.serial_number.clone(),
        cepo_index: ensemble.cepo_index,
        hpr_data: windows.snapshot(),
    })
}

/// Current device population.
pub fn build_device_list(serial_numbers: Vec<String>) -> Projection {
    Projection::DeviceList(DeviceList { serial_numbers })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ensemble::AncillaryData;
    use chrono::Datelike;

    fn three_bins_two_beams() -> Ensemble {
        Ensemble {
            serial_number: "SN1".to_string(),
            cepo_index: 3,
            ensemble_number: 11,
            time: EnsembleTime { year: 24, month: 6, day: 1, hour: 12, minute: 0, second: 0, hsec: 99 },
            amplitude: vec![vec![10.0, 11.0], vec![20.0, 21.0], vec![30.0, 31.0]],
            correlation: vec![vec![0.1, 0.2], vec![0.3, 0.4], vec![0.5, 0.6]],
            earth_velocity: Some(vec![
                VelocityVector { magnitude: 1.5, direction_x_north: 10.0, direction_y_north: 80.0 },
                VelocityVector { magnitude: 2.5, direction_x_north: 20.0, direction_y_north: 70.0 },
                VelocityVector { magnitude: 3.5, direction_x_north: 30.0, direction_y_north: 60.0 },
            ]),
            ancillary: AncillaryData { heading: 45.0, pitch: 2.0, roll: -3.0, first_bin_range: 1.0, bin_size: 0.5 },
        }
    }

    #[test]
    fn test_beam_columns_split_by_beam() {
        let columns = BeamColumns::from_ensemble(&three_bins_two_beams());
        assert_eq!(columns.amplitude[0], vec![10.0, 20.0, 30.0]);
        assert_eq!(columns.amplitude[1], vec![11.0, 21.0, 31.0]);
        assert!(columns.amplitude[2].is_empty());
        assert_eq!(columns.correlation[1], vec![0.2, 0.4, 0.6]);
    }

    #[test]
    fn test_beam_columns_skip_short_rows() {
        let mut ens = three_bins_two_beams();
        ens.correlation[1].pop();
        let columns = BeamColumns::from_ensemble(&ens);
        assert_eq!(columns.amplitude[1], vec![11.0, 31.0]);
        assert_eq!(columns.correlation[1], vec![0.2, 0.6]);
        assert_eq!(columns.amplitude[0], vec![10.0, 20.0, 30.0]);
    }

    #[test]
    fn test_profile_points_are_value_then_bin() {
        let ens = three_bins_two_beams();
        let columns = BeamColumns::from_ensemble(&ens);
        let Projection::Profile(profile) = build_profile(&ens, &columns) else {
            panic!("expected profile projection");
        };
        assert_eq!(profile.amp_data.len(), 4);
        assert_eq!(profile.corr_data.len(), 4);
        assert_eq!(profile.amp_data[1].key, "B1");
        assert_eq!(profile.amp_data[1].color, "#2ca02c");
        assert_eq!(profile.amp_data[1].values, vec![[11.0, 0.0], [21.0, 1.0], [31.0, 2.0]]);
        assert_eq!(profile.corr_data[0].values, vec![[0.1, 0.0], [0.3, 1.0], [0.5, 2.0]]);
        assert!(profile.amp_data[3].values.is_empty());
    }

    #[test]
    fn test_profile_rickshaw_and_c3_agree() {
        let ens = three_bins_two_beams();
        let columns = BeamColumns::from_ensemble(&ens);
        let (Projection::Profile(profile), Projection::Rickshaw(rickshaw), Projection::C3(c3)) = (
            build_profile(&ens, &columns),
            build_rickshaw(&ens, &columns),
            build_c3(&ens, &columns),
        ) else {
            panic!("unexpected projection kinds");
        };

        let profile_b0: Vec<f32> = profile.amp_data[0].values.iter().map(|p| p[0]).collect();
        let rickshaw_b0: Vec<f32> = rickshaw.amp_b0_data.data.iter().map(|p| p.x).collect();
        assert_eq!(profile_b0, c3.amp_b0_data);
        assert_eq!(rickshaw_b0, c3.amp_b0_data);

        let profile_corr_b1: Vec<f32> = profile.corr_data[1].values.iter().map(|p| p[0]).collect();
        let rickshaw_corr_b1: Vec<f32> = rickshaw.corr_b1_data.data.iter().map(|p| p.x).collect();
        assert_eq!(profile_corr_b1, c3.corr_b1_data);
        assert_eq!(rickshaw_corr_b1, c3.corr_b1_data);

        let bins: Vec<f32> = profile.amp_data[0].values.iter().map(|p| p[1]).collect();
        assert_eq!(bins, c3.amp_x_axis);
    }

    #[test]
    fn test_c3_axes() {
        let ens = three_bins_two_beams();
        let Projection::C3(c3) = build_c3(&ens, &BeamColumns::from_ensemble(&ens)) else {
            panic!("expected c3 projection");
        };
        assert_eq!(c3.amp_x_axis, vec![0.0, 1.0, 2.0]);
        assert_eq!(c3.corr_x_axis, vec![1.0, 1.5, 2.0]);
        assert!(c3.amp_b2_data.is_empty());
    }

    #[test]
    fn test_extra_beams_are_ignored() {
        let mut ens = three_bins_two_beams();
        ens.amplitude = vec![vec![1.0, 2.0, 3.0, 4.0, 5.0]];
        ens.correlation = vec![vec![0.1, 0.2, 0.3, 0.4, 0.5]];
        let columns = BeamColumns::from_ensemble(&ens);
        assert_eq!(columns.amplitude[3], vec![4.0]);
        assert_eq!(columns.correlation[3], vec![0.4]);
    }

    #[test]
    fn test_unix_time_in_named_zones() {
        let time = EnsembleTime { year: 24, month: 6, day: 1, hour: 12, minute: 0, second: 0, hsec: 75 };
        let utc = EpochZone::from_name(Some("UTC")).unwrap();
        assert_eq!(utc.unix_time(&time).unwrap(), 1_717_243_200);

        let new_york = EpochZone::from_name(Some("America/New_York")).unwrap();
        assert_eq!(new_york.unix_time(&time).unwrap(), 1_717_257_600);
    }

    #[test]
    fn test_unix_time_in_host_zone_truncates_subseconds() {
        let time = EnsembleTime { year: 24, month: 6, day: 1, hour: 12, minute: 0, second: 0, hsec: 99 };
        let expected = Local
            .with_ymd_and_hms(2024, 6, 1, 12, 0, 0)
            .earliest()
            .unwrap()
            .timestamp();
        assert_eq!(EpochZone::Local.unix_time(&time).unwrap(), expected);
    }

    #[test]
    fn test_unix_time_carries_out_of_range_fields() {
        let utc = EpochZone::from_name(Some("UTC")).unwrap();
        let at = |month, day, hour, second| EnsembleTime { year: 24, month, day, hour, minute: 0, second, hsec: 0 };

        // Month 13 is January 2025.
        assert_eq!(utc.unix_time(&at(13, 1, 12, 0)).unwrap(), 1_735_732_800);
        // Month 0 is December 2023.
        assert_eq!(utc.unix_time(&at(0, 1, 0, 0)).unwrap(), 1_701_388_800);
        // Day 0 of March is the leap day.
        assert_eq!(utc.unix_time(&at(3, 0, 0, 0)).unwrap(), 1_709_164_800);
        // Second 60 is the next minute.
        assert_eq!(utc.unix_time(&at(6, 1, 12, 60)).unwrap(), 1_717_243_260);
        // Hour 24 is midnight of the next day.
        assert_eq!(utc.unix_time(&at(5, 31, 24, 0)).unwrap(), 1_717_200_000);
    }

    #[test]
    fn test_unix_time_rejects_years_out_of_range() {
        for year in [i32::MAX, 2_147_483_000, i32::MIN, 400_000] {
            let time = EnsembleTime { year, month: 6, day: 1, ..Default::default() };
            assert!(matches!(
                EpochZone::Local.unix_time(&time),
                Err(ProjectionError::InvalidTime(_))
            ));
        }

        let last_day = NaiveDate::MAX;
        let edge = EnsembleTime {
            year: last_day.year() - 2000,
            month: last_day.month(),
            day: last_day.day(),
            hour: 23,
            ..Default::default()
        };
        let zone = EpochZone::from_name(Some("Pacific/Kiritimati")).unwrap();
        assert!(zone.unix_time(&edge).is_err());
    }

    #[test]
    fn test_unix_time_across_spring_forward_gap() {
        // 02:30 does not exist in New York on 2024-03-10.
        let time = EnsembleTime { year: 24, month: 3, day: 10, hour: 2, minute: 30, second: 0, hsec: 0 };
        let zone = EpochZone::from_name(Some("America/New_York")).unwrap();
        assert_eq!(zone.unix_time(&time).unwrap(), 1_710_055_800);
    }

    #[test]
    fn test_unknown_zone_name() {
        assert!(EpochZone::from_name(Some("Mars/Olympus_Mons")).is_err());
        assert_eq!(EpochZone::from_name(None).unwrap(), EpochZone::Local);
    }

    #[test]
    fn test_epoch_histograms() {
        let ens = three_bins_two_beams();
        let zone = EpochZone::from_name(Some("UTC")).unwrap();
        let Projection::Epoch(epoch) = build_epoch(&ens, &zone).unwrap() else {
            panic!("expected epoch projection");
        };
        assert_eq!(epoch.heatmap_mag_data.histogram, vec![1.5, 2.5, 3.5]);
        assert_eq!(epoch.heatmap_dir_x_north_data.histogram, vec![10.0, 20.0, 30.0]);
        assert_eq!(epoch.heatmap_dir_y_north_data.histogram, vec![80.0, 70.0, 60.0]);
        assert_eq!(epoch.heatmap_mag_data.time, 1_717_243_200);
        assert_eq!(epoch.heatmap_dir_y_north_data.time, 1_717_243_200);
        assert!(epoch.data.is_empty());
        assert!(epoch.realtime_data.is_empty());
    }

    #[test]
    fn test_epoch_without_velocity_has_empty_histograms() {
        let mut ens = three_bins_two_beams();
        ens.earth_velocity = None;
        let Projection::Epoch(epoch) = build_epoch(&ens, &EpochZone::Local).unwrap() else {
            panic!("expected epoch projection");
        };
        assert!(epoch.heatmap_mag_data.histogram.is_empty());
    }

    #[test]
    fn test_hpr_appends_to_shared_windows() {
        let mut windows = AttitudeWindows::new();
        let mut ens = three_bins_two_beams();
        build_hpr(&ens, &mut windows);
        ens.serial_number = "SN2".to_string();
        ens.ensemble_number = 12;
        ens.ancillary.heading = 50.0;
        let Projection::Hpr(hpr) = build_hpr(&ens, &mut windows) else {
            panic!("expected hpr projection");
        };
        assert_eq!(hpr.serial_number, "SN2");
        assert_eq!(hpr.hpr_data.len(), 3);
        let heading: Vec<[f32; 2]> = hpr.hpr_data[0].points().copied().collect();
        assert_eq!(heading, vec![[11.0, 45.0], [12.0, 50.0]]);
    }

    #[test]
    fn test_passthrough_echoes_ensemble() {
        let ens = Arc::new(three_bins_two_beams());
        let payload = build_ensemble(&ens).to_payload().unwrap();
        let json: serde_json::Value = serde_json::from_slice(&payload).unwrap();
        assert_eq!(json["id"], "Ensemble");
        assert_eq!(json["serialNumber"], "SN1");
        assert_eq!(json["subsystemConfig"], "");
        assert_eq!(json["ensemble"]["ensembleNumber"], 11);
    }
}
