//! Fixture components and helpers for Confluence development.
//!
//! Provides a physically meaningless but fully wired trio of dummy
//! components (one per category, exchanging `transfer_*` variables), a
//! pass-through exchanger, and axis/shape/dataset builders for tests.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

mod fixtures;

pub use fixtures::*;

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use indexmap::IndexMap;

use confluence_core::{Category, DataArray, SpaceShape, TimeAxis};
use confluence_engine::Exchanger;

/// Start instant shared by every fixture axis.
pub fn test_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2019, 1, 1, 0, 0, 0).unwrap()
}

/// An axis of hourly instants from [`test_start`].
pub fn hourly_axis(instants: usize) -> TimeAxis {
    axis(1, instants)
}

/// An axis with a whole-hour step from [`test_start`].
pub fn axis(step_hours: i64, instants: usize) -> TimeAxis {
    TimeAxis::new(test_start(), TimeDelta::hours(step_hours), instants).unwrap()
}

/// The 2x2 grid every fixture component runs over.
pub fn test_shape() -> SpaceShape {
    SpaceShape::new(&[2, 2]).unwrap()
}

/// A dynamic array holding one constant value on every frame.
pub fn constant_dynamic(axis: &TimeAxis, cells: usize, value: f64) -> DataArray {
    let frames = axis.instant_count();
    DataArray::dynamic("1", axis.clone(), cells, vec![value; frames * cells]).unwrap()
}

/// A static array holding one constant value.
pub fn constant_static(cells: usize, value: f64) -> DataArray {
    DataArray::static_frame("1", cells, vec![value; cells]).unwrap()
}

/// A last-value pass-through exchanger.
///
/// Keeps the most recent value of every transfer by name; the driver
/// [`absorb`](DirectExchanger::absorb)s each component's outbound
/// transfers before the next component runs. No remapping, no temporal
/// aggregation.
#[derive(Debug, Default)]
pub struct DirectExchanger {
    table: IndexMap<String, Vec<f64>>,
}

impl DirectExchanger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set one transfer's current value.
    pub fn set(&mut self, name: &str, values: Vec<f64>) {
        self.table.insert(name.into(), values);
    }

    /// Take over every outbound transfer returned by a component run.
    pub fn absorb(&mut self, transfers: IndexMap<String, Vec<f64>>) {
        for (name, values) in transfers {
            self.table.insert(name, values);
        }
    }

    /// The current value of a transfer, if any.
    pub fn get(&self, name: &str) -> Option<&[f64]> {
        self.table.get(name).map(|v| v.as_slice())
    }
}

impl Exchanger for DirectExchanger {
    fn transfer(&self, name: &str, _destination: Category) -> Option<&[f64]> {
        self.get(name)
    }
}

/// An exchanger with every fixture transfer preset to zeros.
///
/// Seeds the within-tick dependency loop: surfacelayer reads transfers
/// that subsurface and openwater only produce later in the tick.
pub fn seeded_exchanger(cells: usize) -> DirectExchanger {
    let mut exchanger = DirectExchanger::new();
    for name in [
        "transfer_i",
        "transfer_j",
        "transfer_k",
        "transfer_l",
        "transfer_m",
        "transfer_n",
    ] {
        exchanger.set(name, vec![0.0; cells]);
    }
    exchanger
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exchanger_returns_latest_value() {
        let mut exchanger = DirectExchanger::new();
        exchanger.set("transfer_i", vec![1.0]);
        let mut transfers = IndexMap::new();
        transfers.insert("transfer_i".to_string(), vec![2.0]);
        exchanger.absorb(transfers);
        assert_eq!(
            exchanger.transfer("transfer_i", Category::Subsurface),
            Some(&[2.0][..])
        );
        assert_eq!(exchanger.transfer("transfer_z", Category::Subsurface), None);
    }

    #[test]
    fn seeded_exchanger_covers_every_fixture_transfer() {
        let exchanger = seeded_exchanger(4);
        for name in ["transfer_i", "transfer_j", "transfer_k", "transfer_l"] {
            assert_eq!(exchanger.get(name), Some(&[0.0; 4][..]));
        }
    }
}
