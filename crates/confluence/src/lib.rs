//! Confluence: a coupling engine for hydrological process models.
//!
//! Couples three process models (surfacelayer, subsurface, openwater)
//! that may each advance at a different fixed timestep over a fixed
//! spatial grid, exchanging named variables every tick. This facade
//! crate re-exports the public API from all Confluence sub-crates; for
//! most users, adding `confluence` as a single dependency is
//! sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use confluence::prelude::*;
//! use chrono::{TimeDelta, TimeZone, Utc};
//!
//! // Three time axes sharing one period: hourly, hourly, 3-hourly.
//! let start = Utc.with_ymd_and_hms(2019, 1, 1, 0, 0, 0).unwrap();
//! let hourly = TimeAxis::new(start, TimeDelta::hours(1), 13).unwrap();
//! let coarse = TimeAxis::new(start, TimeDelta::hours(3), 5).unwrap();
//!
//! // The fastest axis defines the supermesh; the clock yields which
//! // categories are due on each fine tick.
//! let mut clock = Clock::new(&hourly, &hourly, &coarse).unwrap();
//! let mut openwater_ticks = Vec::new();
//! while let Some(due) = clock.next() {
//!     if due.openwater {
//!         openwater_ticks.push(clock.subindex(Category::Openwater));
//!     }
//! }
//! assert_eq!(openwater_ticks, vec![0, 1, 2, 3]);
//! ```
//!
//! # Modules
//!
//! Each module corresponds to a sub-crate. Use them for types not in
//! the prelude:
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`core`](self::core) | `confluence-core` | Categories, axes, shapes, descriptors, datasets, errors |
//! | [`clock`] | `confluence-clock` | The supermesh [`clock::Clock`] |
//! | [`state`] | `confluence-state` | Rolling history [`state::State`] buffers |
//! | [`records`] | `confluence-records` | Aggregation methods, streams, sinks |
//! | [`dump`] | `confluence-dump` | Binary state/stream/record file formats |
//! | [`engine`] | `confluence-engine` | [`engine::Component`] and the process contract |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Core types: categories, axes, shapes, descriptors, datasets, and
/// the error taxonomy (`confluence-core`).
pub use confluence_core as core;

/// The supermesh clock (`confluence-clock`).
pub use confluence_clock as clock;

/// Bounded-history state buffers (`confluence-state`).
pub use confluence_state as state;

/// Periodic aggregation of instantaneous observables
/// (`confluence-records`).
pub use confluence_records as records;

/// Binary dump and record output file formats (`confluence-dump`).
pub use confluence_dump as dump;

/// The component execution and state lifecycle engine
/// (`confluence-engine`).
pub use confluence_engine as engine;

/// Common imports for typical Confluence usage.
///
/// ```rust
/// use confluence::prelude::*;
/// ```
pub mod prelude {
    pub use confluence_core::{
        Category, ComponentDescriptor, ConfigError, ConstantDef, DataArray, Dataset, DumpError,
        InputDef, InputKind, InwardDef, OutwardDef, ProcessError, SpaceShape, StateDef, TimeAxis,
        TimingError, VarDef,
    };

    pub use confluence_clock::{Clock, DueSet};

    pub use confluence_state::State;

    pub use confluence_records::{
        AggregationMethod, MemorySink, Record, RecordSink, RecordSource, RecordStream,
    };

    pub use confluence_engine::{
        Component, ComponentConfig, ComponentError, Exchanger, FinalContext, InitContext, Process,
        ProcessKind, RecordRequest, RunContext, StepOutput,
    };
}
