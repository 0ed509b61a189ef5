//! Core types for the Confluence coupling framework.
//!
//! This is the leaf crate with zero internal dependencies. It defines the
//! fundamental abstractions used throughout the workspace: component
//! categories, the time axis and spatial shape consumed from collaborators,
//! immutable variable descriptors, driving datasets, and the error
//! taxonomy.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod dataset;
pub mod descriptor;
pub mod error;
pub mod id;
pub mod space;
pub mod time;

pub use dataset::{DataArray, Dataset};
pub use descriptor::{
    ClimatologyFrequency, ComponentDescriptor, ConstantDef, InputDef, InputKind, InwardDef,
    OutwardDef, StateDef, VarDef,
};
pub use error::{ConfigError, DumpError, ProcessError, TimingError};
pub use id::Category;
pub use space::SpaceShape;
pub use time::TimeAxis;
