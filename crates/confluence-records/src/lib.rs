//! Periodic aggregation of instantaneous observables.
//!
//! Each [`RecordStream`] is bound to one output period and covers one
//! or more [`Record`]s, each aggregated by one or more
//! [`AggregationMethod`]s. Streams fold one sample per owning-component
//! tick into running [`Accumulator`]s, close windows exactly when
//! `elapsed ticks x timestep == period`, emit to a [`RecordSink`], and
//! can snapshot and resume mid-window.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod accumulator;
pub mod method;
pub mod record;
pub mod sink;
pub mod stream;

pub use accumulator::Accumulator;
pub use method::AggregationMethod;
pub use record::{Record, RecordSource};
pub use sink::{ClosedWindow, MemorySink, RecordSink, WindowAggregate};
pub use stream::{
    frequency_tag, AccumulatorState, RecordStream, RegisteredRecord, StreamSnapshot,
};
