//! Driving data consumed from the ingestion collaborator.
//!
//! A [`Dataset`] is a name-keyed collection of [`DataArray`]s. Arrays are
//! flat `f64` buffers in time-major order; the engine only ever looks a
//! frame up by time index or takes an array whole, so no richer layout
//! is needed here.

use indexmap::IndexMap;

use crate::error::ConfigError;
use crate::time::TimeAxis;

/// One named driving array.
///
/// Dynamic arrays carry their own [`TimeAxis`] with one frame per
/// instant; static arrays carry a single frame; climatologic arrays
/// carry one frame per cycle position. Every frame holds `cells` values.
#[derive(Clone, Debug, PartialEq)]
pub struct DataArray {
    units: String,
    axis: Option<TimeAxis>,
    frames: usize,
    cells: usize,
    values: Vec<f64>,
}

impl DataArray {
    /// A time-varying array with one frame per instant on `axis`.
    pub fn dynamic(
        units: &str,
        axis: TimeAxis,
        cells: usize,
        values: Vec<f64>,
    ) -> Result<Self, ConfigError> {
        let frames = axis.instant_count();
        Self::checked(units, Some(axis), frames, cells, values)
    }

    /// A time-invariant array holding a single frame.
    pub fn static_frame(units: &str, cells: usize, values: Vec<f64>) -> Result<Self, ConfigError> {
        Self::checked(units, None, 1, cells, values)
    }

    /// A cyclic array holding `frames` climatology positions.
    pub fn climatology(
        units: &str,
        frames: usize,
        cells: usize,
        values: Vec<f64>,
    ) -> Result<Self, ConfigError> {
        Self::checked(units, None, frames, cells, values)
    }

    fn checked(
        units: &str,
        axis: Option<TimeAxis>,
        frames: usize,
        cells: usize,
        values: Vec<f64>,
    ) -> Result<Self, ConfigError> {
        if cells == 0 || frames == 0 {
            return Err(ConfigError::InvalidArray {
                reason: format!("array needs at least one frame and one cell, got {frames}x{cells}"),
            });
        }
        if values.len() != frames * cells {
            return Err(ConfigError::InvalidArray {
                reason: format!(
                    "{} values supplied, {frames} frames x {cells} cells require {}",
                    values.len(),
                    frames * cells
                ),
            });
        }
        Ok(Self {
            units: units.into(),
            axis,
            frames,
            cells,
            values,
        })
    }

    /// Units carried by the array.
    pub fn units(&self) -> &str {
        &self.units
    }

    /// The array's own time axis, present for dynamic arrays only.
    pub fn time_axis(&self) -> Option<&TimeAxis> {
        self.axis.as_ref()
    }

    /// Number of frames along time.
    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Number of values per frame.
    pub fn cells(&self) -> usize {
        self.cells
    }

    /// The values of one frame.
    ///
    /// Callers index within `0..frames()`; the engine resolves offsets
    /// at construction so this holds on the stepping path.
    pub fn frame(&self, index: usize) -> &[f64] {
        let start = index * self.cells;
        &self.values[start..start + self.cells]
    }

    /// The whole buffer, frames concatenated in time order.
    pub fn values(&self) -> &[f64] {
        &self.values
    }
}

/// A name-keyed, order-preserving collection of driving arrays.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Dataset {
    arrays: IndexMap<String, DataArray>,
}

impl Dataset {
    /// An empty dataset.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an array under a name, replacing any previous entry.
    pub fn insert(&mut self, name: &str, array: DataArray) {
        self.arrays.insert(name.into(), array);
    }

    /// Look an array up by name.
    pub fn get(&self, name: &str) -> Option<&DataArray> {
        self.arrays.get(name)
    }

    /// Whether an array with the given name is present.
    pub fn contains(&self, name: &str) -> bool {
        self.arrays.contains_key(name)
    }

    /// Number of arrays held.
    pub fn len(&self) -> usize {
        self.arrays.len()
    }

    /// Whether the dataset holds no arrays.
    pub fn is_empty(&self) -> bool {
        self.arrays.is_empty()
    }

    /// Iterate over `(name, array)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &DataArray)> {
        self.arrays.iter().map(|(n, a)| (n.as_str(), a))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeDelta, TimeZone, Utc};

    fn hourly(instants: usize) -> TimeAxis {
        let start = Utc.with_ymd_and_hms(2019, 1, 1, 0, 0, 0).unwrap();
        TimeAxis::new(start, TimeDelta::hours(1), instants).unwrap()
    }

    #[test]
    fn dynamic_array_indexes_frames_in_time_order() {
        let arr = DataArray::dynamic("1", hourly(3), 2, vec![0.0, 0.1, 1.0, 1.1, 2.0, 2.1]).unwrap();
        assert_eq!(arr.frames(), 3);
        assert_eq!(arr.cells(), 2);
        assert_eq!(arr.frame(1), &[1.0, 1.1]);
        assert!(arr.time_axis().is_some());
    }

    #[test]
    fn static_array_is_single_frame() {
        let arr = DataArray::static_frame("m", 3, vec![5.0, 6.0, 7.0]).unwrap();
        assert_eq!(arr.frames(), 1);
        assert_eq!(arr.frame(0), &[5.0, 6.0, 7.0]);
        assert!(arr.time_axis().is_none());
    }

    #[test]
    fn climatology_carries_cycle_frames() {
        let arr = DataArray::climatology("1", 4, 1, vec![0.1, 0.2, 0.3, 0.4]).unwrap();
        assert_eq!(arr.frames(), 4);
        assert_eq!(arr.values().len(), 4);
    }

    #[test]
    fn value_length_mismatch_rejected() {
        let err = DataArray::static_frame("1", 3, vec![1.0]).unwrap_err();
        assert!(err.to_string().contains("3 cells"));
        assert!(DataArray::dynamic("1", hourly(3), 2, vec![0.0; 5]).is_err());
        assert!(DataArray::climatology("1", 0, 2, vec![]).is_err());
    }

    #[test]
    fn dataset_lookup_by_name() {
        let mut ds = Dataset::new();
        ds.insert(
            "driving_a",
            DataArray::static_frame("1", 1, vec![1.0]).unwrap(),
        );
        assert!(ds.contains("driving_a"));
        assert!(!ds.contains("driving_b"));
        assert_eq!(ds.len(), 1);
        assert_eq!(ds.get("driving_a").unwrap().units(), "1");
        assert_eq!(ds.iter().count(), 1);
    }
}
