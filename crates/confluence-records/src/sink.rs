//! Output sinks receiving finalised window aggregates.

use std::cell::RefCell;
use std::rc::Rc;

use chrono::{DateTime, Utc};

use confluence_core::DumpError;

use crate::method::AggregationMethod;

/// One finalised (record, method) aggregate handed to a sink at window
/// closure.
#[derive(Debug)]
pub struct WindowAggregate<'a> {
    /// Name of the record the aggregate belongs to.
    pub record: &'a str,
    /// Method that produced the aggregate.
    pub method: AggregationMethod,
    /// Finalised values for the window.
    pub values: Vec<f64>,
}

/// An append-only series of window aggregates for one frequency.
///
/// A sink receives exactly one call per window closure, carrying every
/// registered (record, method) aggregate tagged with the closing
/// timestamp. Implementations append; nothing is ever rewritten.
pub trait RecordSink {
    /// Append one closed window.
    fn emit(
        &mut self,
        closing: DateTime<Utc>,
        aggregates: &[WindowAggregate<'_>],
    ) -> Result<(), DumpError>;
}

/// One closed window as retained by [`MemorySink`].
#[derive(Clone, Debug, PartialEq)]
pub struct ClosedWindow {
    /// Closing timestamp of the window.
    pub closing: DateTime<Utc>,
    /// Every (record, method) aggregate emitted at closure.
    pub aggregates: Vec<(String, AggregationMethod, Vec<f64>)>,
}

impl ClosedWindow {
    /// The aggregate for one (record, method) pair, if emitted.
    pub fn get(&self, record: &str, method: AggregationMethod) -> Option<&[f64]> {
        self.aggregates
            .iter()
            .find(|(r, m, _)| r == record && *m == method)
            .map(|(_, _, v)| v.as_slice())
    }
}

/// An in-memory sink for tests and drivers that post-process in place.
///
/// Clones share the same backing store, so a handle kept by the test
/// observes windows closed by the stream that owns the boxed sink.
#[derive(Clone, Debug, Default)]
pub struct MemorySink {
    windows: Rc<RefCell<Vec<ClosedWindow>>>,
}

impl MemorySink {
    /// An empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of windows closed so far.
    pub fn len(&self) -> usize {
        self.windows.borrow().len()
    }

    /// Whether no window has closed yet.
    pub fn is_empty(&self) -> bool {
        self.windows.borrow().is_empty()
    }

    /// A copy of every closed window, in emission order.
    pub fn windows(&self) -> Vec<ClosedWindow> {
        self.windows.borrow().clone()
    }
}

impl RecordSink for MemorySink {
    fn emit(
        &mut self,
        closing: DateTime<Utc>,
        aggregates: &[WindowAggregate<'_>],
    ) -> Result<(), DumpError> {
        self.windows.borrow_mut().push(ClosedWindow {
            closing,
            aggregates: aggregates
                .iter()
                .map(|a| (a.record.to_string(), a.method, a.values.clone()))
                .collect(),
        });
        Ok(())
    }
}
