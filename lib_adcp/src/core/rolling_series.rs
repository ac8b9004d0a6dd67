//! # Rolling Attitude Series
//!
//! Fixed-size FIFO windows used by the heading/pitch/roll time-series plot.
//!
//! The three windows in [`AttitudeWindows`] are process-wide: every device's attitude
//! samples land in the same three series. Displays that plot a single instrument see
//! a clean trace; with several instruments the traces interleave. The windows are owned
//! by the hub, not a global.

use std::collections::VecDeque;

use serde::Serialize;

use crate::core::ensemble::AncillaryData;

/// Points kept per series.
pub const ROLLING_WINDOW_LEN: usize = 20;

/// A labelled `[x, y]` series bounded to the most recent [`ROLLING_WINDOW_LEN`] points.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RollingSeries {
    #[serde(rename = "values")]
    points: VecDeque<[f32; 2]>,
    color: String,
    key: String,
    area: bool,
}

impl RollingSeries {
    pub fn new(key: &str, color: &str) -> Self {
        Self {
            points: VecDeque::with_capacity(ROLLING_WINDOW_LEN + 1),
            color: color.to_string(),
            key: key.to_string(),
            area: false,
        }
    }

    /// Appends a point, evicting the oldest one once the window is full.
    pub fn push(&mut self, x: f32, y: f32) {
        self.points.push_back([x, y]);
        while self.points.len() > ROLLING_WINDOW_LEN {
            self.points.pop_front();
        }
    }

    pub fn points(&self) -> impl Iterator<Item = &[f32; 2]> {
        self.points.iter()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn color(&self) -> &str {
        &self.color
    }
}

/// The shared heading, pitch and roll windows.
#[derive(Debug, Clone)]
pub struct AttitudeWindows {
    heading: RollingSeries,
    pitch: RollingSeries,
    roll: RollingSeries,
}

impl Default for AttitudeWindows {
    fn default() -> Self {
        Self {
            heading: RollingSeries::new("Heading", "#ff7f0e"),
            pitch: RollingSeries::new("Pitch", "#2ca02c"),
            roll: RollingSeries::new("Roll", "#7777ff"),
        }
    }
}

impl AttitudeWindows {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one attitude sample at x = `ensemble_number`.
    pub fn record(&mut self, ensemble_number: u32, ancillary: &AncillaryData) {
        let x = ensemble_number as f32;
        self.heading.push(x, ancillary.heading);
        self.pitch.push(x, ancillary.pitch);
        self.roll.push(x, ancillary.roll);
    }

    /// Copies of the three windows in heading, pitch, roll order.
    pub fn snapshot(&self) -> Vec<RollingSeries> {
        vec![self.heading.clone(), self.pitch.clone(), self.roll.clone()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_never_exceeds_limit() {
        let mut series = RollingSeries::new("Heading", "#ff7f0e");
        for i in 0..100 {
            series.push(i as f32, 0.0);
            assert!(series.len() <= ROLLING_WINDOW_LEN);
        }
        assert_eq!(series.len(), ROLLING_WINDOW_LEN);
    }

    #[test]
    fn test_21st_point_evicts_oldest_and_keeps_order() {
        let mut series = RollingSeries::new("Pitch", "#2ca02c");
        for i in 0..=ROLLING_WINDOW_LEN {
            series.push(i as f32, i as f32 * 10.0);
        }
        let xs: Vec<f32> = series.points().map(|p| p[0]).collect();
        let expected: Vec<f32> = (1..=ROLLING_WINDOW_LEN).map(|i| i as f32).collect();
        assert_eq!(xs, expected);
    }

    #[test]
    fn test_attitude_windows_are_shared_across_samples() {
        let mut windows = AttitudeWindows::new();
        let a = AncillaryData { heading: 90.0, pitch: 1.0, roll: 2.0, ..Default::default() };
        let b = AncillaryData { heading: 180.0, pitch: 3.0, roll: 4.0, ..Default::default() };
        windows.record(1, &a);
        windows.record(7, &b);

        let snapshot = windows.snapshot();
        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot[0].key(), "Heading");
        let heading: Vec<[f32; 2]> = snapshot[0].points().copied().collect();
        assert_eq!(heading, vec![[1.0, 90.0], [7.0, 180.0]]);
        let roll: Vec<[f32; 2]> = snapshot[2].points().copied().collect();
        assert_eq!(roll, vec![[1.0, 2.0], [7.0, 4.0]]);
    }

    #[test]
    fn test_series_serializes_as_values_color_key_area() {
        let mut series = RollingSeries::new("Roll", "#7777ff");
        series.push(3.0, -1.5);
        let json = serde_json::to_value(&series).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"values": [[3.0, -1.5]], "color": "#7777ff", "key": "Roll", "area": false})
        );
    }
}
