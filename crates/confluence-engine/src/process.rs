//! The process contract: user-supplied physics behind one execution
//! interface, with its substitution variants.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;

use confluence_core::{Category, Dataset, ProcessError, SpaceShape};
use confluence_state::State;

// ── Contexts ────────────────────────────────────────────────────

/// What a process sees while seeding initial conditions.
pub struct InitContext<'a> {
    category: Category,
    shape: &'a SpaceShape,
    states: &'a mut IndexMap<String, State>,
}

impl<'a> InitContext<'a> {
    /// Build a context over a component's freshly allocated states.
    pub fn new(
        category: Category,
        shape: &'a SpaceShape,
        states: &'a mut IndexMap<String, State>,
    ) -> Self {
        Self {
            category,
            shape,
            states,
        }
    }

    /// Category of the owning component.
    pub fn category(&self) -> Category {
        self.category
    }

    /// Spatial shape of the owning component.
    pub fn shape(&self) -> &SpaceShape {
        self.shape
    }

    /// Number of grid cells.
    pub fn cells(&self) -> usize {
        self.shape.cell_count()
    }

    /// Mutable access to a declared state, typically to seed slot -1.
    pub fn state_mut(&mut self, name: &str) -> Result<&mut State, ProcessError> {
        self.states
            .get_mut(name)
            .ok_or_else(|| ProcessError::MissingVariable { name: name.into() })
    }
}

/// What a process sees during one tick.
///
/// Everything is resolved before the process runs: parameters and
/// constants by name, driving inputs at the current tick, inbound
/// transfers from the exchanger, and the state buffers.
pub struct RunContext<'a> {
    category: Category,
    datetime: DateTime<Utc>,
    timestep_seconds: i64,
    cells: usize,
    parameters: &'a IndexMap<String, f64>,
    constants: &'a IndexMap<String, f64>,
    inputs: IndexMap<&'a str, &'a [f64]>,
    transfers: IndexMap<&'a str, &'a [f64]>,
    states: &'a mut IndexMap<String, State>,
}

impl<'a> RunContext<'a> {
    /// Build a context for one tick of the owning component.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        category: Category,
        datetime: DateTime<Utc>,
        timestep_seconds: i64,
        cells: usize,
        parameters: &'a IndexMap<String, f64>,
        constants: &'a IndexMap<String, f64>,
        inputs: IndexMap<&'a str, &'a [f64]>,
        transfers: IndexMap<&'a str, &'a [f64]>,
        states: &'a mut IndexMap<String, State>,
    ) -> Self {
        Self {
            category,
            datetime,
            timestep_seconds,
            cells,
            parameters,
            constants,
            inputs,
            transfers,
            states,
        }
    }

    /// Category of the owning component.
    pub fn category(&self) -> Category {
        self.category
    }

    /// Datetime of the tick being computed.
    pub fn datetime(&self) -> DateTime<Utc> {
        self.datetime
    }

    /// The component timestep in seconds.
    pub fn timestep_seconds(&self) -> i64 {
        self.timestep_seconds
    }

    /// Number of grid cells.
    pub fn cells(&self) -> usize {
        self.cells
    }

    /// A configured parameter value.
    pub fn parameter(&self, name: &str) -> Result<f64, ProcessError> {
        self.parameters
            .get(name)
            .copied()
            .ok_or_else(|| ProcessError::MissingVariable { name: name.into() })
    }

    /// A constant value, configured or defaulted.
    pub fn constant(&self, name: &str) -> Result<f64, ProcessError> {
        self.constants
            .get(name)
            .copied()
            .ok_or_else(|| ProcessError::MissingVariable { name: name.into() })
    }

    /// A driving input resolved for this tick.
    ///
    /// Dynamic inputs are one frame; static inputs the single frame;
    /// climatologic inputs the whole cycle.
    pub fn input(&self, name: &str) -> Result<&[f64], ProcessError> {
        self.inputs
            .get(name)
            .copied()
            .ok_or_else(|| ProcessError::MissingVariable { name: name.into() })
    }

    /// An inbound transfer pulled from the exchanger.
    pub fn transfer(&self, name: &str) -> Result<&[f64], ProcessError> {
        self.transfers
            .get(name)
            .copied()
            .ok_or_else(|| ProcessError::MissingVariable { name: name.into() })
    }

    /// Read access to a declared state.
    pub fn state(&self, name: &str) -> Result<&State, ProcessError> {
        self.states
            .get(name)
            .ok_or_else(|| ProcessError::MissingVariable { name: name.into() })
    }

    /// Mutable access to a declared state.
    pub fn state_mut(&mut self, name: &str) -> Result<&mut State, ProcessError> {
        self.states
            .get_mut(name)
            .ok_or_else(|| ProcessError::MissingVariable { name: name.into() })
    }
}

/// What a process sees while finalising after the last tick.
pub struct FinalContext<'a> {
    category: Category,
    states: &'a mut IndexMap<String, State>,
}

impl<'a> FinalContext<'a> {
    /// Build a context over a component's final states.
    pub fn new(category: Category, states: &'a mut IndexMap<String, State>) -> Self {
        Self { category, states }
    }

    /// Category of the owning component.
    pub fn category(&self) -> Category {
        self.category
    }

    /// Read access to a declared state.
    pub fn state(&self, name: &str) -> Result<&State, ProcessError> {
        self.states
            .get(name)
            .ok_or_else(|| ProcessError::MissingVariable { name: name.into() })
    }

    /// Mutable access to a declared state.
    pub fn state_mut(&mut self, name: &str) -> Result<&mut State, ProcessError> {
        self.states
            .get_mut(name)
            .ok_or_else(|| ProcessError::MissingVariable { name: name.into() })
    }
}

// ── Output ──────────────────────────────────────────────────────

/// What one tick of a process produces.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StepOutput {
    /// Outbound transfers handed to the exchanger, name to values.
    pub transfers: IndexMap<String, Vec<f64>>,
    /// Diagnostic outputs, name to values.
    pub outputs: IndexMap<String, Vec<f64>>,
}

impl StepOutput {
    /// An output with no transfers and no diagnostics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an outbound transfer.
    pub fn transfer(&mut self, name: &str, values: Vec<f64>) -> &mut Self {
        self.transfers.insert(name.into(), values);
        self
    }

    /// Add a diagnostic output.
    pub fn output(&mut self, name: &str, values: Vec<f64>) -> &mut Self {
        self.outputs.insert(name.into(), values);
        self
    }
}

// ── The process trait and its variants ──────────────────────────

/// User-supplied physics for one component.
///
/// # Contract
///
/// - `run()` computes into state slot 0 reading committed slots, and
///   returns every declared outbound transfer and diagnostic output.
/// - `&self` everywhere: carried numeric state lives in the component's
///   state buffers, not in the process value.
/// - Hooks are only ever called by the owning component: `initialise`
///   exactly once per run (unless states are seeded from a dump), `run`
///   once per due tick, `finalise` once at the end of the axis.
///
/// # Object safety
///
/// The trait is object-safe; the engine stores `Box<dyn Process>`.
pub trait Process: Send {
    /// Human-readable name for error reporting and log events.
    fn name(&self) -> &str;

    /// Seed initial conditions into the freshly zeroed states.
    ///
    /// Default: keep the zeros.
    fn initialise(&self, ctx: &mut InitContext<'_>) -> Result<(), ProcessError> {
        let _ = ctx;
        Ok(())
    }

    /// Compute one timestep.
    fn run(&self, ctx: &mut RunContext<'_>) -> Result<StepOutput, ProcessError>;

    /// Release or summarise after the last timestep.
    ///
    /// Default: nothing to do.
    fn finalise(&self, ctx: &mut FinalContext<'_>) -> Result<(), ProcessError> {
        let _ = ctx;
        Ok(())
    }
}

/// The three behaviors behind one execution contract.
///
/// A replayed component returns previously recorded values unchanged
/// instead of computing; a null component returns zero-filled values
/// for every declared outward. Both carry no states, accept no records,
/// and no-op on initialise, finalise, and dump operations.
pub enum ProcessKind {
    /// A simulated component running user-supplied physics.
    Simulated(Box<dyn Process>),
    /// A component substituted with recorded data.
    Replayed(Dataset),
    /// A component substituted with zeros.
    Null,
}

impl ProcessKind {
    /// Short label used in log events.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Simulated(_) => "simulated",
            Self::Replayed(_) => "replayed",
            Self::Null => "null",
        }
    }
}

impl std::fmt::Debug for ProcessKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Simulated(_) => f.write_str("ProcessKind::Simulated(..)"),
            Self::Replayed(dataset) => f.debug_tuple("ProcessKind::Replayed").field(dataset).finish(),
            Self::Null => f.write_str("ProcessKind::Null"),
        }
    }
}
