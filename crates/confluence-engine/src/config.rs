//! Component configuration as assembled by the driver.

use std::path::PathBuf;

use chrono::TimeDelta;
use indexmap::IndexMap;

use confluence_core::{ComponentDescriptor, Dataset, SpaceShape, TimeAxis};
use confluence_records::AggregationMethod;

/// A request to record one observable at one output period.
#[derive(Clone, Debug, PartialEq)]
pub struct RecordRequest {
    /// Name of a declared state, outward transfer, or diagnostic
    /// output.
    pub name: String,
    /// Aggregation period; must be an integer multiple of the owning
    /// component's timestep.
    pub period: TimeDelta,
    /// Methods to aggregate with.
    pub methods: Vec<AggregationMethod>,
}

impl RecordRequest {
    /// Convenience constructor.
    pub fn new(name: &str, period: TimeDelta, methods: &[AggregationMethod]) -> Self {
        Self {
            name: name.into(),
            period,
            methods: methods.to_vec(),
        }
    }
}

/// Everything a component needs besides its process.
///
/// Plain data assembled by the configuration collaborator; validation
/// happens when the component is constructed from it, so the per-tick
/// loop performs pure numeric work.
pub struct ComponentConfig {
    /// Identifier used in dump and output file names.
    pub identifier: String,
    /// The component type's variable declaration.
    pub descriptor: ComponentDescriptor,
    /// The component's own time axis.
    pub axis: TimeAxis,
    /// The component's spatial shape.
    pub shape: SpaceShape,
    /// Driving data covering the declared inputs.
    pub dataset: Dataset,
    /// Values for the declared parameters.
    pub parameters: IndexMap<String, f64>,
    /// Overrides for the declared constants.
    pub constants: IndexMap<String, f64>,
    /// Observables to aggregate and emit.
    pub records: Vec<RecordRequest>,
    /// Directory receiving dump and record files.
    pub saving_directory: PathBuf,
}
