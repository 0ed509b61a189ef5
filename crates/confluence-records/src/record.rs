//! Records: named instantaneous observables eligible for aggregation.

use std::fmt;

/// Where a record's value is read from on each owning-component tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RecordSource {
    /// A component state, read from slot 0 before rotation.
    State,
    /// An outbound transfer produced for the exchanger.
    Outward,
    /// A diagnostic output of the process function.
    Output,
}

impl RecordSource {
    /// Stable single-byte tag used in dump file headers.
    pub fn code(self) -> u8 {
        match self {
            Self::State => 0,
            Self::Outward => 1,
            Self::Output => 2,
        }
    }

    /// Inverse of [`code()`](RecordSource::code).
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::State),
            1 => Some(Self::Outward),
            2 => Some(Self::Output),
            _ => None,
        }
    }
}

impl fmt::Display for RecordSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::State => "state",
            Self::Outward => "outward",
            Self::Output => "output",
        })
    }
}

/// A named observable bound to exactly one source.
///
/// The owning component captures the record's instantaneous value on
/// every tick it runs and folds it into each stream the record is
/// registered with.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Record {
    /// Name of the observed variable.
    pub name: String,
    /// Units of the observed variable.
    pub units: String,
    /// Which of the component's value families the record reads.
    pub source: RecordSource,
}

impl Record {
    /// Convenience constructor.
    pub fn new(name: &str, units: &str, source: RecordSource) -> Self {
        Self {
            name: name.into(),
            units: units.into(),
            source,
        }
    }
}
