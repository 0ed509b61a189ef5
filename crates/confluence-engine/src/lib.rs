//! Component execution and state lifecycle engine.
//!
//! A [`Component`] owns one category's numeric state and advances it
//! one time instant per due tick: it resolves declared inputs from its
//! dataset, pulls inbound transfers from the [`Exchanger`], dispatches
//! on the [`ProcessKind`] (simulated physics, replayed data, or zeros),
//! folds registered records into their streams, and rotates its state
//! buffers. All validation happens at construction so the stepping loop
//! performs pure numeric work with no defensive checks.
//!
//! The driver iterates the supermesh clock and, on each tick, invokes
//! [`Component::run`] on every due component in category order; each
//! component's outbound transfers feed the exchanger which supplies the
//! next due component's inputs.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod component;
pub mod config;
pub mod error;
pub mod exchanger;
pub mod process;

pub use component::Component;
pub use config::{ComponentConfig, RecordRequest};
pub use error::ComponentError;
pub use exchanger::Exchanger;
pub use process::{FinalContext, InitContext, Process, ProcessKind, RunContext, StepOutput};
