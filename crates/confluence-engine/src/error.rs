//! Errors surfaced by component construction and lifecycle operations.

use std::error::Error;
use std::fmt;

use confluence_core::{Category, ConfigError, DumpError, ProcessError, TimingError};

/// Any failure of a [`Component`](crate::Component) operation.
///
/// Configuration and timing variants only occur at construction; dump
/// variants at checkpoint or restore; the rest during the run loop. A
/// process failure aborts the run with no rollback of dumps already
/// written.
#[derive(Debug)]
pub enum ComponentError {
    /// Configuration validation failed at construction.
    Config(ConfigError),
    /// Timestep or aggregation period arithmetic failed at construction.
    Timing(TimingError),
    /// Writing, reading, or validating a dump file failed.
    Dump(DumpError),
    /// A run-loop operation was invoked before `initialise`.
    NotInitialised {
        /// Category of the offending component.
        category: Category,
    },
    /// An inbound transfer was not available from the exchanger.
    MissingTransfer {
        /// Category of the component pulling the transfer.
        category: Category,
        /// Name of the missing transfer.
        name: String,
    },
    /// A user process hook failed during a tick.
    Process {
        /// Category of the failing component.
        category: Category,
        /// Name of the failing process.
        name: String,
        /// The underlying process error.
        source: ProcessError,
    },
}

impl fmt::Display for ComponentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "{e}"),
            Self::Timing(e) => write!(f, "{e}"),
            Self::Dump(e) => write!(f, "{e}"),
            Self::NotInitialised { category } => {
                write!(f, "{category} component not initialised for a run")
            }
            Self::MissingTransfer { category, name } => {
                write!(f, "transfer '{name}' not available for {category} component")
            }
            Self::Process {
                category,
                name,
                source,
            } => write!(f, "process '{name}' ({category}) failed: {source}"),
        }
    }
}

impl Error for ComponentError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(e) => Some(e),
            Self::Timing(e) => Some(e),
            Self::Dump(e) => Some(e),
            Self::Process { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<ConfigError> for ComponentError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<TimingError> for ComponentError {
    fn from(e: TimingError) -> Self {
        Self::Timing(e)
    }
}

impl From<DumpError> for ComponentError {
    fn from(e: DumpError) -> Self {
        Self::Dump(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn process_failure_names_the_process() {
        let err = ComponentError::Process {
            category: Category::Subsurface,
            name: "dummy".into(),
            source: ProcessError::ExecutionFailed {
                reason: "solver diverged".into(),
            },
        };
        let msg = err.to_string();
        assert!(msg.contains("dummy"));
        assert!(msg.contains("subsurface"));
        assert!(err.source().is_some());
    }

    #[test]
    fn construction_errors_wrap_their_source() {
        let err = ComponentError::from(ConfigError::MissingParameter {
            category: Category::Openwater,
            name: "parameter_c".into(),
        });
        assert!(err.to_string().contains("parameter_c"));
        assert!(err.source().is_some());
    }
}
