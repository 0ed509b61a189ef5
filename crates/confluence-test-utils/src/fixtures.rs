//! The dummy component trio: descriptors, processes, and configs.
//!
//! The three components exchange physically meaningless `transfer_*`
//! variables forming a closed loop: surfacelayer produces `transfer_i`
//! (to subsurface) and `transfer_j` (to openwater), subsurface produces
//! `transfer_k` and `transfer_m`, openwater produces `transfer_l` and
//! `transfer_n`. Every state advances by a fixed increment per step, so
//! expected values are easy to derive in tests.

use std::cell::Cell;
use std::path::PathBuf;

use indexmap::IndexMap;

use confluence_core::{
    Category, ComponentDescriptor, ConstantDef, Dataset, InputDef, InputKind, InwardDef,
    OutwardDef, ProcessError, StateDef, TimeAxis, VarDef,
};
use confluence_engine::{
    ComponentConfig, InitContext, Process, RunContext, StepOutput,
};

use crate::{constant_dynamic, constant_static, test_shape};

// ── Descriptors ─────────────────────────────────────────────────

/// Declaration of the dummy surfacelayer component.
pub fn surfacelayer_descriptor() -> ComponentDescriptor {
    ComponentDescriptor {
        category: Category::Surfacelayer,
        solver_history: 1,
        inwards: vec![
            InwardDef::new("transfer_k", "1", Category::Subsurface),
            InwardDef::new("transfer_l", "1", Category::Openwater),
        ],
        outwards: vec![
            OutwardDef::new("transfer_i", "1", &[Category::Subsurface]),
            OutwardDef::new("transfer_j", "1", &[Category::Openwater]),
        ],
        inputs: vec![
            InputDef::new("driving_a", "1", InputKind::Dynamic),
            InputDef::new("ancillary_c", "1", InputKind::Static),
        ],
        parameters: vec![],
        constants: vec![],
        states: vec![StateDef::new("state_a", "1"), StateDef::new("state_b", "1")],
        outputs: vec![VarDef::new("output_x", "1")],
    }
}

/// Declaration of the dummy subsurface component.
pub fn subsurface_descriptor() -> ComponentDescriptor {
    ComponentDescriptor {
        category: Category::Subsurface,
        solver_history: 1,
        inwards: vec![
            InwardDef::new("transfer_i", "1", Category::Surfacelayer),
            InwardDef::new("transfer_n", "1", Category::Openwater),
        ],
        outwards: vec![
            OutwardDef::new("transfer_k", "1", &[Category::Surfacelayer]),
            OutwardDef::new("transfer_m", "1", &[Category::Openwater]),
        ],
        inputs: vec![InputDef::new("driving_a", "1", InputKind::Dynamic)],
        parameters: vec![VarDef::new("parameter_a", "1")],
        constants: vec![],
        states: vec![StateDef::new("state_a", "1"), StateDef::new("state_b", "1")],
        outputs: vec![],
    }
}

/// Declaration of the dummy openwater component.
pub fn openwater_descriptor() -> ComponentDescriptor {
    ComponentDescriptor {
        category: Category::Openwater,
        solver_history: 1,
        inwards: vec![
            InwardDef::new("transfer_j", "1", Category::Surfacelayer),
            InwardDef::new("transfer_m", "1", Category::Subsurface),
        ],
        outwards: vec![
            OutwardDef::new("transfer_l", "1", &[Category::Surfacelayer]),
            OutwardDef::new("transfer_n", "1", &[Category::Subsurface]),
        ],
        inputs: vec![InputDef::new("ancillary_b", "1", InputKind::Static)],
        parameters: vec![VarDef::new("parameter_c", "1")],
        constants: vec![ConstantDef::new("constant_c", "1", 3.0)],
        states: vec![StateDef::new("state_a", "1")],
        outputs: vec![VarDef::new("output_x", "1"), VarDef::new("output_y", "1")],
    }
}

// ── Processes ───────────────────────────────────────────────────

fn advance_state(ctx: &mut RunContext<'_>, name: &str, increment: f64) -> Result<(), ProcessError> {
    let state = ctx.state_mut(name)?;
    let (current, last) = state.current_and_last();
    for (c, &l) in current.iter_mut().zip(last) {
        *c = l + increment;
    }
    Ok(())
}

fn zero_state(ctx: &mut InitContext<'_>, name: &str) -> Result<(), ProcessError> {
    ctx.state_mut(name)?.last_mut().fill(0.0);
    Ok(())
}

/// The dummy surfacelayer physics.
///
/// `state_a` advances by 1 and `state_b` by 2 per step; transfers and
/// the diagnostic output combine the driving data, the inbound
/// transfers, and the just-computed states.
pub struct DummySurfaceLayer;

impl Process for DummySurfaceLayer {
    fn name(&self) -> &str {
        "dummy_surfacelayer"
    }

    fn initialise(&self, ctx: &mut InitContext<'_>) -> Result<(), ProcessError> {
        zero_state(ctx, "state_a")?;
        zero_state(ctx, "state_b")
    }

    fn run(&self, ctx: &mut RunContext<'_>) -> Result<StepOutput, ProcessError> {
        advance_state(ctx, "state_a", 1.0)?;
        advance_state(ctx, "state_b", 2.0)?;

        let cells = ctx.cells();
        let driving_a = ctx.input("driving_a")?;
        let ancillary_c = ctx.input("ancillary_c")?;
        let transfer_k = ctx.transfer("transfer_k")?;
        let transfer_l = ctx.transfer("transfer_l")?;
        let state_a = ctx.state("state_a")?.current();
        let state_b = ctx.state("state_b")?.current();

        let mut out = StepOutput::new();
        out.transfer(
            "transfer_i",
            (0..cells)
                .map(|i| driving_a[i] + transfer_l[i] + ancillary_c[i] * state_a[i])
                .collect(),
        );
        out.transfer(
            "transfer_j",
            (0..cells)
                .map(|i| driving_a[i] + transfer_k[i] + state_b[i])
                .collect(),
        );
        out.output(
            "output_x",
            (0..cells)
                .map(|i| driving_a[i] + transfer_k[i] - state_a[i])
                .collect(),
        );
        Ok(out)
    }
}

/// The dummy subsurface physics.
pub struct DummySubsurface;

impl Process for DummySubsurface {
    fn name(&self) -> &str {
        "dummy_subsurface"
    }

    fn initialise(&self, ctx: &mut InitContext<'_>) -> Result<(), ProcessError> {
        zero_state(ctx, "state_a")?;
        zero_state(ctx, "state_b")
    }

    fn run(&self, ctx: &mut RunContext<'_>) -> Result<StepOutput, ProcessError> {
        advance_state(ctx, "state_a", 1.0)?;
        advance_state(ctx, "state_b", 2.0)?;

        let cells = ctx.cells();
        let parameter_a = ctx.parameter("parameter_a")?;
        let driving_a = ctx.input("driving_a")?;
        let transfer_i = ctx.transfer("transfer_i")?;
        let transfer_n = ctx.transfer("transfer_n")?;
        let state_a = ctx.state("state_a")?.current();
        let state_b = ctx.state("state_b")?.current();

        let mut out = StepOutput::new();
        out.transfer(
            "transfer_k",
            (0..cells)
                .map(|i| driving_a[i] * parameter_a + state_a[i])
                .collect(),
        );
        out.transfer(
            "transfer_m",
            (0..cells)
                .map(|i| transfer_i[i] + transfer_n[i] + state_b[i])
                .collect(),
        );
        Ok(out)
    }
}

/// The dummy openwater physics.
pub struct DummyOpenwater;

impl Process for DummyOpenwater {
    fn name(&self) -> &str {
        "dummy_openwater"
    }

    fn initialise(&self, ctx: &mut InitContext<'_>) -> Result<(), ProcessError> {
        zero_state(ctx, "state_a")
    }

    fn run(&self, ctx: &mut RunContext<'_>) -> Result<StepOutput, ProcessError> {
        advance_state(ctx, "state_a", 1.0)?;

        let cells = ctx.cells();
        let parameter_c = ctx.parameter("parameter_c")?;
        let constant_c = ctx.constant("constant_c")?;
        let ancillary_b = ctx.input("ancillary_b")?;
        let transfer_j = ctx.transfer("transfer_j")?;
        let transfer_m = ctx.transfer("transfer_m")?;
        let state_a = ctx.state("state_a")?.current();

        let mut out = StepOutput::new();
        out.transfer(
            "transfer_l",
            (0..cells)
                .map(|i| ancillary_b[i] * transfer_m[i] + state_a[i])
                .collect(),
        );
        out.transfer(
            "transfer_n",
            (0..cells).map(|i| parameter_c * transfer_j[i]).collect(),
        );
        out.output(
            "output_x",
            (0..cells)
                .map(|i| parameter_c * transfer_j[i] + constant_c)
                .collect(),
        );
        out.output(
            "output_y",
            (0..cells)
                .map(|i| ancillary_b[i] * transfer_m[i] - state_a[i])
                .collect(),
        );
        Ok(out)
    }
}

/// A process returning one constant value for every declared outward
/// and output, performing no state bookkeeping.
pub struct ConstProcess {
    name: String,
    value: f64,
    transfers: Vec<String>,
    outputs: Vec<String>,
}

impl ConstProcess {
    /// Emit `value` for every outward and output a descriptor declares.
    pub fn new(name: &str, descriptor: &ComponentDescriptor, value: f64) -> Self {
        Self {
            name: name.into(),
            value,
            transfers: descriptor.outwards.iter().map(|o| o.name.clone()).collect(),
            outputs: descriptor.outputs.iter().map(|o| o.name.clone()).collect(),
        }
    }
}

impl Process for ConstProcess {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self, ctx: &mut RunContext<'_>) -> Result<StepOutput, ProcessError> {
        let cells = ctx.cells();
        let mut out = StepOutput::new();
        for name in &self.transfers {
            out.transfer(name, vec![self.value; cells]);
        }
        for name in &self.outputs {
            out.output(name, vec![self.value; cells]);
        }
        Ok(out)
    }
}

/// A process that succeeds a fixed number of times, then fails.
pub struct FailingProcess {
    name: String,
    remaining: Cell<usize>,
    inner: ConstProcess,
}

impl FailingProcess {
    /// Succeed `succeed_count` times before failing every call.
    pub fn new(name: &str, descriptor: &ComponentDescriptor, succeed_count: usize) -> Self {
        Self {
            name: name.into(),
            remaining: Cell::new(succeed_count),
            inner: ConstProcess::new(name, descriptor, 0.0),
        }
    }
}

impl Process for FailingProcess {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self, ctx: &mut RunContext<'_>) -> Result<StepOutput, ProcessError> {
        let remaining = self.remaining.get();
        if remaining == 0 {
            return Err(ProcessError::ExecutionFailed {
                reason: "injected failure".into(),
            });
        }
        self.remaining.set(remaining - 1);
        self.inner.run(ctx)
    }
}

// ── Configurations ──────────────────────────────────────────────

/// A ready-to-build surfacelayer configuration over the fixture grid.
///
/// Driving and ancillary data hold the constant 1.0 on the given axis.
pub fn dummy_surfacelayer_config(axis: TimeAxis, saving_directory: PathBuf) -> ComponentConfig {
    let shape = test_shape();
    let cells = shape.cell_count();
    let mut dataset = Dataset::new();
    dataset.insert("driving_a", constant_dynamic(&axis, cells, 1.0));
    dataset.insert("ancillary_c", constant_static(cells, 1.0));
    ComponentConfig {
        identifier: "dummy".into(),
        descriptor: surfacelayer_descriptor(),
        axis,
        shape,
        dataset,
        parameters: IndexMap::new(),
        constants: IndexMap::new(),
        records: vec![],
        saving_directory,
    }
}

/// A ready-to-build subsurface configuration (`parameter_a` = 2.0).
pub fn dummy_subsurface_config(axis: TimeAxis, saving_directory: PathBuf) -> ComponentConfig {
    let shape = test_shape();
    let cells = shape.cell_count();
    let mut dataset = Dataset::new();
    dataset.insert("driving_a", constant_dynamic(&axis, cells, 1.0));
    let mut parameters = IndexMap::new();
    parameters.insert("parameter_a".to_string(), 2.0);
    ComponentConfig {
        identifier: "dummy".into(),
        descriptor: subsurface_descriptor(),
        axis,
        shape,
        dataset,
        parameters,
        constants: IndexMap::new(),
        records: vec![],
        saving_directory,
    }
}

/// A ready-to-build openwater configuration (`parameter_c` = 4.0).
pub fn dummy_openwater_config(axis: TimeAxis, saving_directory: PathBuf) -> ComponentConfig {
    let shape = test_shape();
    let cells = shape.cell_count();
    let mut dataset = Dataset::new();
    dataset.insert("ancillary_b", constant_static(cells, 1.0));
    let mut parameters = IndexMap::new();
    parameters.insert("parameter_c".to_string(), 4.0);
    ComponentConfig {
        identifier: "dummy".into(),
        descriptor: openwater_descriptor(),
        axis,
        shape,
        dataset,
        parameters,
        constants: IndexMap::new(),
        records: vec![],
        saving_directory,
    }
}
