//! Error types for the Confluence coupling framework.
//!
//! Organized by subsystem: configuration (construction-time validation),
//! timing (supermesh and aggregation-period arithmetic), dumps
//! (snapshot persistence and resumption), and process execution. All
//! validation happens at construction time so the per-tick stepping loop
//! performs pure numeric work with no defensive checks.

use std::error::Error;
use std::fmt;

use chrono::{DateTime, Utc};

use crate::id::Category;

/// Errors detected while validating a component's configuration.
///
/// Fatal at construction; never recovered.
#[derive(Debug)]
pub enum ConfigError {
    /// A parameter declared by the component descriptor was not supplied.
    MissingParameter {
        /// Category of the component being configured.
        category: Category,
        /// Name of the missing parameter.
        name: String,
    },
    /// An input declared by the component descriptor is absent from the
    /// supplied dataset.
    MissingInput {
        /// Category of the component being configured.
        category: Category,
        /// Name of the missing input variable.
        name: String,
    },
    /// A supplied array's units differ from the units the descriptor
    /// declares for that variable.
    UnitsMismatch {
        /// Name of the offending variable.
        name: String,
        /// Units declared by the component descriptor.
        required: String,
        /// Units carried by the supplied array.
        supplied: String,
    },
    /// A dynamic input's time axis cannot be subset to cover the
    /// component's own axis.
    TimeDomainMismatch {
        /// Name of the offending variable.
        name: String,
        /// Description of the incompatibility.
        reason: String,
    },
    /// A supplied array's cell count differs from the component's
    /// spatial shape.
    SpaceDomainMismatch {
        /// Name of the offending variable.
        name: String,
        /// Cell count implied by the component shape.
        required: usize,
        /// Cell count carried by the supplied array.
        supplied: usize,
    },
    /// A requested record name is not a declared state, outward transfer,
    /// or diagnostic output of the component.
    UnknownRecord {
        /// Category of the component being configured.
        category: Category,
        /// The unrecognised record name.
        name: String,
    },
    /// The same record was requested twice at the same output period.
    DuplicateRecord {
        /// Category of the component being configured.
        category: Category,
        /// The doubly-requested record name.
        name: String,
    },
    /// A requested aggregation method name (or alias) is not recognised.
    UnknownMethod {
        /// The unrecognised method name.
        name: String,
    },
    /// A component descriptor failed structural validation.
    InvalidDescriptor {
        /// Description of the validation failure.
        reason: String,
    },
    /// A time axis failed structural validation.
    InvalidAxis {
        /// Description of the validation failure.
        reason: String,
    },
    /// A spatial shape has no dimensions or a zero-extent dimension.
    InvalidShape {
        /// Description of the validation failure.
        reason: String,
    },
    /// A data array's value length is inconsistent with its declared
    /// frame and cell counts.
    InvalidArray {
        /// Description of the validation failure.
        reason: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingParameter { category, name } => {
                write!(f, "parameter '{name}' missing for {category} component")
            }
            Self::MissingInput { category, name } => {
                write!(f, "input '{name}' missing in dataset for {category} component")
            }
            Self::UnitsMismatch {
                name,
                required,
                supplied,
            } => write!(
                f,
                "units of '{name}' ({supplied}) not equal to units required ({required})"
            ),
            Self::TimeDomainMismatch { name, reason } => {
                write!(f, "time axis of '{name}' incompatible: {reason}")
            }
            Self::SpaceDomainMismatch {
                name,
                required,
                supplied,
            } => write!(
                f,
                "'{name}' covers {supplied} cells, component shape requires {required}"
            ),
            Self::UnknownRecord { category, name } => {
                write!(f, "record '{name}' not available for {category} component")
            }
            Self::DuplicateRecord { category, name } => write!(
                f,
                "record '{name}' requested twice at the same period for {category} component"
            ),
            Self::UnknownMethod { name } => {
                write!(f, "method '{name}' for record aggregation unknown")
            }
            Self::InvalidDescriptor { reason } => write!(f, "invalid descriptor: {reason}"),
            Self::InvalidAxis { reason } => write!(f, "invalid time axis: {reason}"),
            Self::InvalidShape { reason } => write!(f, "invalid spatial shape: {reason}"),
            Self::InvalidArray { reason } => write!(f, "invalid data array: {reason}"),
        }
    }
}

impl Error for ConfigError {}

/// Errors in the arithmetic relating component timesteps, the supermesh
/// step, and aggregation periods.
///
/// Fatal at construction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TimingError {
    /// A component timestep is not an integer multiple of the supermesh
    /// (fastest) timestep.
    StepNotMultiple {
        /// Category whose timestep is incompatible.
        category: Category,
        /// The offending timestep, in seconds.
        step_seconds: i64,
        /// The supermesh timestep, in seconds.
        supermesh_seconds: i64,
    },
    /// The three category axes do not share one global start and end
    /// instant.
    PeriodMismatch {
        /// Category whose axis disagrees with the surfacelayer axis.
        category: Category,
    },
    /// A requested aggregation period is not strictly positive.
    InvalidPeriod {
        /// The offending period, in seconds.
        seconds: i64,
    },
    /// A requested aggregation period is shorter than the owning
    /// component's timestep.
    PeriodTooShort {
        /// The requested period, in seconds.
        period_seconds: i64,
        /// The component timestep, in seconds.
        step_seconds: i64,
    },
    /// A requested aggregation period is not an integer multiple of the
    /// owning component's timestep.
    PeriodNotMultiple {
        /// The requested period, in seconds.
        period_seconds: i64,
        /// The component timestep, in seconds.
        step_seconds: i64,
    },
}

impl fmt::Display for TimingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StepNotMultiple {
                category,
                step_seconds,
                supermesh_seconds,
            } => write!(
                f,
                "timestep of {category} component ({step_seconds}s) not a multiple \
                 integer of timestep of fastest component ({supermesh_seconds}s)"
            ),
            Self::PeriodMismatch { category } => write!(
                f,
                "time axis of {category} component does not share the global start/end"
            ),
            Self::InvalidPeriod { seconds } => {
                write!(f, "aggregation period must be positive, got {seconds}s")
            }
            Self::PeriodTooShort {
                period_seconds,
                step_seconds,
            } => write!(
                f,
                "aggregation period ({period_seconds}s) shorter than component \
                 timestep ({step_seconds}s)"
            ),
            Self::PeriodNotMultiple {
                period_seconds,
                step_seconds,
            } => write!(
                f,
                "aggregation period ({period_seconds}s) not a multiple integer of \
                 component timestep ({step_seconds}s)"
            ),
        }
    }
}

impl Error for TimingError {}

/// Errors while writing, reading, or resuming from a dump file.
///
/// Resumption is refused rather than guessed: any mismatch between a
/// snapshot and the current configuration is fatal and surfaced to the
/// caller.
#[derive(Debug)]
pub enum DumpError {
    /// Underlying I/O failure.
    Io(std::io::Error),
    /// The file does not start with the expected magic bytes.
    BadMagic,
    /// The file's format version is newer than this build understands.
    UnsupportedVersion {
        /// Version number found in the file.
        found: u32,
    },
    /// The file is structurally broken (truncated frame, invalid UTF-8,
    /// out-of-range tag).
    MalformedFile {
        /// Description of the defect.
        detail: String,
    },
    /// The snapshot's variable set, shape, or history depth does not
    /// match the current configuration.
    Incompatible {
        /// Description of the mismatch.
        reason: String,
    },
    /// The requested timestamp is not present in the dump.
    TimestampNotFound {
        /// The timestamp that was requested.
        requested: DateTime<Utc>,
    },
    /// The dump contains no frames to restore from.
    Empty,
    /// A dump was requested before initialisation created the dump
    /// target for the run.
    NoDumpTarget,
    /// A reloaded stream window-start timestamp does not align with the
    /// period implied by the current configuration.
    WindowMisaligned {
        /// The reloaded window-start timestamp.
        window_start: DateTime<Utc>,
        /// The configured aggregation period, in seconds.
        period_seconds: i64,
    },
}

impl fmt::Display for DumpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "i/o: {e}"),
            Self::BadMagic => write!(f, "not a confluence dump file (bad magic)"),
            Self::UnsupportedVersion { found } => {
                write!(f, "unsupported dump format version {found}")
            }
            Self::MalformedFile { detail } => write!(f, "malformed dump file: {detail}"),
            Self::Incompatible { reason } => {
                write!(f, "dump incompatible with configuration: {reason}")
            }
            Self::TimestampNotFound { requested } => {
                write!(f, "{requested} not available in dump")
            }
            Self::Empty => write!(f, "dump contains no snapshots"),
            Self::NoDumpTarget => write!(f, "no dump target: component not initialised for a run"),
            Self::WindowMisaligned {
                window_start,
                period_seconds,
            } => write!(
                f,
                "reloaded window start {window_start} does not align with the \
                 configured period ({period_seconds}s)"
            ),
        }
    }
}

impl Error for DumpError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for DumpError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

/// Errors raised by a user-supplied process hook during a tick.
///
/// Wrapped by the engine with the failing component's identity and
/// propagated uncaught; the run aborts with no rollback of dumps already
/// written.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProcessError {
    /// The process hook failed for a domain-specific reason.
    ExecutionFailed {
        /// Human-readable description of the failure.
        reason: String,
    },
    /// The process referred to a variable its descriptor does not declare.
    MissingVariable {
        /// The unrecognised variable name.
        name: String,
    },
    /// A computed value is NaN or infinite.
    NotFinite {
        /// Name of the offending variable.
        variable: String,
    },
}

impl fmt::Display for ProcessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExecutionFailed { reason } => write!(f, "execution failed: {reason}"),
            Self::MissingVariable { name } => {
                write!(f, "variable '{name}' not declared by this component")
            }
            Self::NotFinite { variable } => {
                write!(f, "non-finite value computed for '{variable}'")
            }
        }
    }
}

impl Error for ProcessError {}
