//! Immutable per-component-type variable descriptors.
//!
//! A [`ComponentDescriptor`] is a plain value listing every variable a
//! component type declares: inbound and outbound transfers, driving
//! inputs, parameters, constants, states, and diagnostic outputs. The
//! engine queries descriptors directly; there is no registry, no
//! inheritance, and no reflection. Descriptors are attached to a
//! component by composition and never mutated after validation.

use crate::error::ConfigError;
use crate::id::Category;

/// How a driving input is laid out along time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputKind {
    /// One frame per instant on the component's own time axis; indexed
    /// at the current tick.
    Dynamic,
    /// A single time-invariant frame; taken whole.
    Static,
    /// A fixed cycle of frames (seasonal, monthly, ...); taken whole.
    Climatologic(ClimatologyFrequency),
}

/// The cycle length of a climatologic input.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClimatologyFrequency {
    /// Four frames: DJF, MAM, JJA, SON.
    Seasonal,
    /// Twelve frames: January to December.
    Monthly,
    /// 366 frames: January 1st to December 31st, with February 29th.
    DayOfYear,
    /// A caller-chosen number of frames.
    Custom(u32),
}

impl ClimatologyFrequency {
    /// Number of frames a conforming input array must carry.
    pub fn frame_count(self) -> usize {
        match self {
            Self::Seasonal => 4,
            Self::Monthly => 12,
            Self::DayOfYear => 366,
            Self::Custom(n) => n as usize,
        }
    }
}

/// A named, unit-tagged variable with no further structure.
///
/// Used for parameters and diagnostic outputs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VarDef {
    /// Variable name, unique within its role.
    pub name: String,
    /// Units the component computes in; supplied values must agree.
    pub units: String,
}

impl VarDef {
    /// Convenience constructor.
    pub fn new(name: &str, units: &str) -> Self {
        Self {
            name: name.into(),
            units: units.into(),
        }
    }
}

/// A constant with a default value, overridable at configuration time.
#[derive(Clone, Debug, PartialEq)]
pub struct ConstantDef {
    /// Constant name, unique within its role.
    pub name: String,
    /// Units of the constant.
    pub units: String,
    /// Value used when the configuration supplies no override.
    pub default: f64,
}

impl ConstantDef {
    /// Convenience constructor.
    pub fn new(name: &str, units: &str, default: f64) -> Self {
        Self {
            name: name.into(),
            units: units.into(),
            default,
        }
    }
}

/// An inbound transfer pulled from the exchanger every tick.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InwardDef {
    /// Transfer name, as produced by the source component.
    pub name: String,
    /// Units the transfer is expected in.
    pub units: String,
    /// Category producing the transfer.
    pub from: Category,
}

impl InwardDef {
    /// Convenience constructor.
    pub fn new(name: &str, units: &str, from: Category) -> Self {
        Self {
            name: name.into(),
            units: units.into(),
            from,
        }
    }
}

/// An outbound transfer handed to the exchanger every tick.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutwardDef {
    /// Transfer name.
    pub name: String,
    /// Units the transfer is produced in.
    pub units: String,
    /// Categories consuming the transfer.
    pub to: Vec<Category>,
}

impl OutwardDef {
    /// Convenience constructor.
    pub fn new(name: &str, units: &str, to: &[Category]) -> Self {
        Self {
            name: name.into(),
            units: units.into(),
            to: to.to_vec(),
        }
    }
}

/// A driving input resolved from the dataset every tick.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InputDef {
    /// Input name looked up in the dataset.
    pub name: String,
    /// Units the supplied array must carry.
    pub units: String,
    /// Temporal layout of the input.
    pub kind: InputKind,
}

impl InputDef {
    /// Convenience constructor.
    pub fn new(name: &str, units: &str, kind: InputKind) -> Self {
        Self {
            name: name.into(),
            units: units.into(),
            kind,
        }
    }
}

/// A state carried between timesteps in a bounded history buffer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StateDef {
    /// State name, unique across states, outwards, and outputs.
    pub name: String,
    /// Units of the state.
    pub units: String,
    /// Number of vertical or categorical divisions per grid cell.
    pub divisions: usize,
}

impl StateDef {
    /// A state with a single division per cell.
    pub fn new(name: &str, units: &str) -> Self {
        Self {
            name: name.into(),
            units: units.into(),
            divisions: 1,
        }
    }

    /// A state with several divisions per cell.
    pub fn with_divisions(name: &str, units: &str, divisions: usize) -> Self {
        Self {
            name: name.into(),
            units: units.into(),
            divisions,
        }
    }
}

/// The complete declaration of a component type's variables.
///
/// Built once, validated with [`validate`](ComponentDescriptor::validate),
/// then shared immutably with the engine.
#[derive(Clone, Debug, PartialEq)]
pub struct ComponentDescriptor {
    /// Part of the water cycle this component type simulates.
    pub category: Category,
    /// Number of past steps retained beyond the one being computed.
    pub solver_history: usize,
    /// Inbound transfers expected from the exchanger.
    pub inwards: Vec<InwardDef>,
    /// Outbound transfers handed to the exchanger.
    pub outwards: Vec<OutwardDef>,
    /// Driving inputs resolved from the dataset.
    pub inputs: Vec<InputDef>,
    /// Parameters that must be supplied at configuration time.
    pub parameters: Vec<VarDef>,
    /// Constants with defaults, overridable at configuration time.
    pub constants: Vec<ConstantDef>,
    /// States carried between timesteps.
    pub states: Vec<StateDef>,
    /// Diagnostic outputs produced each tick.
    pub outputs: Vec<VarDef>,
}

impl ComponentDescriptor {
    /// Check the structural invariants of the declaration.
    ///
    /// Names must be non-empty and unique within each role; a name used
    /// as a state, outward transfer, or diagnostic output must be unique
    /// across those three roles so that a record request binds to exactly
    /// one of them; state divisions and custom climatology frame counts
    /// must be at least one.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let roles: [(&str, Vec<&str>); 7] = [
            ("inward", self.inwards.iter().map(|v| v.name.as_str()).collect()),
            ("outward", self.outwards.iter().map(|v| v.name.as_str()).collect()),
            ("input", self.inputs.iter().map(|v| v.name.as_str()).collect()),
            ("parameter", self.parameters.iter().map(|v| v.name.as_str()).collect()),
            ("constant", self.constants.iter().map(|v| v.name.as_str()).collect()),
            ("state", self.states.iter().map(|v| v.name.as_str()).collect()),
            ("output", self.outputs.iter().map(|v| v.name.as_str()).collect()),
        ];
        for (role, names) in &roles {
            for (i, name) in names.iter().enumerate() {
                if name.is_empty() {
                    return Err(ConfigError::InvalidDescriptor {
                        reason: format!("{role} with empty name"),
                    });
                }
                if names[..i].contains(name) {
                    return Err(ConfigError::InvalidDescriptor {
                        reason: format!("duplicate {role} '{name}'"),
                    });
                }
            }
        }

        // A record name resolves to exactly one of state/outward/output.
        let mut recordable: Vec<(&str, &str)> = Vec::new();
        for s in &self.states {
            recordable.push(("state", &s.name));
        }
        for o in &self.outwards {
            recordable.push(("outward", &o.name));
        }
        for o in &self.outputs {
            recordable.push(("output", &o.name));
        }
        for (i, (role, name)) in recordable.iter().enumerate() {
            if let Some((other, _)) = recordable[..i].iter().find(|(_, n)| n == name) {
                return Err(ConfigError::InvalidDescriptor {
                    reason: format!("'{name}' declared both as {other} and as {role}"),
                });
            }
        }

        for s in &self.states {
            if s.divisions == 0 {
                return Err(ConfigError::InvalidDescriptor {
                    reason: format!("state '{}' has zero divisions", s.name),
                });
            }
        }
        for i in &self.inputs {
            if let InputKind::Climatologic(ClimatologyFrequency::Custom(0)) = i.kind {
                return Err(ConfigError::InvalidDescriptor {
                    reason: format!("climatologic input '{}' has zero frames", i.name),
                });
            }
        }
        Ok(())
    }

    /// Look up a declared state by name.
    pub fn state(&self, name: &str) -> Option<&StateDef> {
        self.states.iter().find(|s| s.name == name)
    }

    /// Look up a declared outbound transfer by name.
    pub fn outward(&self, name: &str) -> Option<&OutwardDef> {
        self.outwards.iter().find(|o| o.name == name)
    }

    /// Look up a declared diagnostic output by name.
    pub fn output(&self, name: &str) -> Option<&VarDef> {
        self.outputs.iter().find(|o| o.name == name)
    }

    /// Look up a declared driving input by name.
    pub fn input(&self, name: &str) -> Option<&InputDef> {
        self.inputs.iter().find(|i| i.name == name)
    }

    /// Look up a declared parameter by name.
    pub fn parameter(&self, name: &str) -> Option<&VarDef> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Look up a declared constant by name.
    pub fn constant(&self, name: &str) -> Option<&ConstantDef> {
        self.constants.iter().find(|c| c.name == name)
    }

    /// History buffer depth: the computing slot plus the retained past.
    pub fn history_depth(&self) -> usize {
        self.solver_history + 1
    }
}
