//! Supermesh clock: the scheduling grid shared by coupled components.
//!
//! The fastest of the three category timesteps defines the supermesh
//! step; every other timestep must be an exact integer multiple of it.
//! [`Clock`] precomputes one due-tick switch table per category and then
//! iterates, yielding a [`DueSet`] per tick. All validation happens at
//! construction; iteration cannot fail.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

use chrono::{DateTime, TimeDelta, Utc};

use confluence_core::{Category, TimeAxis, TimingError};

/// Which categories are due to execute on one supermesh tick.
///
/// Within a tick, due components execute in [`Category::ORDER`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DueSet {
    /// Whether the surfacelayer component is due.
    pub surfacelayer: bool,
    /// Whether the subsurface component is due.
    pub subsurface: bool,
    /// Whether the openwater component is due.
    pub openwater: bool,
}

impl DueSet {
    /// Whether the given category is due on this tick.
    pub fn is_due(&self, category: Category) -> bool {
        match category {
            Category::Surfacelayer => self.surfacelayer,
            Category::Subsurface => self.subsurface,
            Category::Openwater => self.openwater,
        }
    }

    /// The due categories, in execution order.
    pub fn due_categories(&self) -> impl Iterator<Item = Category> + '_ {
        Category::ORDER.into_iter().filter(|c| self.is_due(*c))
    }
}

/// The global tick counter on the supermesh axis.
///
/// Construction derives the supermesh from the three category axes and
/// fails on any timing incompatibility. The internal tick starts one
/// position before the first valid tick so that the first advance lands
/// on tick 0; iteration stops once the tick reaches the second-to-last
/// supermesh index, because the final index is the closing bound of the
/// last step, not the start of another.
#[derive(Clone, Debug)]
pub struct Clock {
    step: TimeDelta,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    length: usize,
    multiples: [usize; 3],
    switches: [Vec<bool>; 3],
    current_tick: i64,
    current_datetime: DateTime<Utc>,
}

impl Clock {
    /// Build the supermesh from the three category time axes.
    ///
    /// All three axes must span the same `[start, end]` period, and each
    /// timestep must be an exact integer multiple of the fastest one.
    pub fn new(
        surfacelayer: &TimeAxis,
        subsurface: &TimeAxis,
        openwater: &TimeAxis,
    ) -> Result<Self, TimingError> {
        let axes = [surfacelayer, subsurface, openwater];

        for (i, axis) in axes.iter().enumerate() {
            if !axis.same_period_as(surfacelayer) {
                return Err(TimingError::PeriodMismatch {
                    category: Category::ORDER[i],
                });
            }
        }

        // The supermesh is the fastest component.
        let supermesh_seconds = axes
            .iter()
            .map(|a| a.step_seconds())
            .min()
            .expect("three axes");

        let mut multiples = [0usize; 3];
        for (i, axis) in axes.iter().enumerate() {
            let step_seconds = axis.step_seconds();
            if step_seconds % supermesh_seconds != 0 {
                return Err(TimingError::StepNotMultiple {
                    category: Category::ORDER[i],
                    step_seconds,
                    supermesh_seconds,
                });
            }
            multiples[i] = (step_seconds / supermesh_seconds) as usize;
        }

        // Supermesh axis length: the longest category axis rescaled to
        // the supermesh rate, plus the closing bound.
        let length = axes
            .iter()
            .zip(multiples)
            .map(|(a, m)| a.span_count() * m)
            .max()
            .expect("three axes")
            + 1;

        let switches = multiples.map(|m| {
            let mut table = vec![false; length];
            for slot in table.iter_mut().step_by(m) {
                *slot = true;
            }
            table
        });

        let step = TimeDelta::seconds(supermesh_seconds);
        let start = surfacelayer.start();
        Ok(Self {
            step,
            start,
            end: surfacelayer.end(),
            length,
            multiples,
            switches,
            // One position before the first valid tick: the iterator
            // advances in time before indexing the switches.
            current_tick: -1,
            current_datetime: start - step,
        })
    }

    /// The supermesh timestep.
    pub fn timedelta(&self) -> TimeDelta {
        self.step
    }

    /// The supermesh timestep in seconds.
    pub fn timedelta_in_seconds(&self) -> i64 {
        self.step.num_seconds()
    }

    /// Number of instants on the supermesh axis.
    pub fn len(&self) -> usize {
        self.length
    }

    /// Whether the supermesh axis is empty (never true after construction).
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// The shared start instant of the run.
    pub fn start_datetime(&self) -> DateTime<Utc> {
        self.start
    }

    /// The shared end instant of the run.
    pub fn end_datetime(&self) -> DateTime<Utc> {
        self.end
    }

    /// The datetime of the current tick.
    pub fn current_datetime(&self) -> DateTime<Utc> {
        self.current_datetime
    }

    /// The current supermesh tick, `-1` before the first advance.
    pub fn current_tick(&self) -> i64 {
        self.current_tick
    }

    /// A category's timestep expressed in supermesh ticks.
    pub fn step_multiple(&self, category: Category) -> usize {
        self.multiples[category.code() as usize]
    }

    /// The current tick index on a category's own axis.
    ///
    /// Valid once the clock has advanced at least once.
    pub fn subindex(&self, category: Category) -> usize {
        debug_assert!(self.current_tick >= 0, "clock has not advanced yet");
        self.current_tick as usize / self.multiples[category.code() as usize]
    }
}

impl Iterator for Clock {
    type Item = DueSet;

    fn next(&mut self) -> Option<DueSet> {
        // The last index is the end of the final timestep; it must not
        // be used as the start of another iteration.
        if self.current_tick >= self.length as i64 - 2 {
            return None;
        }
        self.current_tick += 1;
        self.current_datetime += self.step;

        let tick = self.current_tick as usize;
        Some(DueSet {
            surfacelayer: self.switches[0][tick],
            subsurface: self.switches[1][tick],
            openwater: self.switches[2][tick],
        })
    }
}
