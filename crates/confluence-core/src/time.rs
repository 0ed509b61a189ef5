//! The time axis consumed from the temporal-domain collaborator.

use chrono::{DateTime, TimeDelta, Utc};

use crate::error::ConfigError;

/// An ordered, regularly-spaced sequence of instants.
///
/// The axis holds N+1 instants separated by one fixed step; a component
/// bound to the axis performs N steps, and the final instant is the
/// closing bound of the last step, not the start of another. Spacing is
/// strictly monotonic and constant by construction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TimeAxis {
    start: DateTime<Utc>,
    step: TimeDelta,
    instants: usize,
}

impl TimeAxis {
    /// Create an axis from a start instant, a step, and an instant count.
    ///
    /// The step must be a positive whole number of seconds and the axis
    /// must hold at least two instants (one steppable span).
    pub fn new(
        start: DateTime<Utc>,
        step: TimeDelta,
        instants: usize,
    ) -> Result<Self, ConfigError> {
        if step <= TimeDelta::zero() || step.subsec_nanos() != 0 {
            return Err(ConfigError::InvalidAxis {
                reason: format!("step must be a positive whole number of seconds, got {step}"),
            });
        }
        if instants < 2 {
            return Err(ConfigError::InvalidAxis {
                reason: format!("axis needs at least 2 instants, got {instants}"),
            });
        }
        Ok(Self {
            start,
            step,
            instants,
        })
    }

    /// Create an axis covering `[start, end]` with the given step.
    ///
    /// `end - start` must be a positive integer multiple of `step`.
    pub fn from_start_end_step(
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        step: TimeDelta,
    ) -> Result<Self, ConfigError> {
        if step <= TimeDelta::zero() || step.subsec_nanos() != 0 {
            return Err(ConfigError::InvalidAxis {
                reason: format!("step must be a positive whole number of seconds, got {step}"),
            });
        }
        let span = (end - start).num_seconds();
        let step_s = step.num_seconds();
        if span <= 0 || span % step_s != 0 {
            return Err(ConfigError::InvalidAxis {
                reason: format!("period [{start}, {end}] not a whole number of {step_s}s steps"),
            });
        }
        let spans = usize::try_from(span / step_s).map_err(|_| ConfigError::InvalidAxis {
            reason: format!("period [{start}, {end}] too long for this platform"),
        })?;
        Self::new(start, step, spans + 1)
    }

    /// The first instant on the axis.
    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    /// The last instant on the axis (the closing bound of the last step).
    pub fn end(&self) -> DateTime<Utc> {
        self.instant(self.instants - 1)
    }

    /// The fixed spacing between consecutive instants.
    pub fn step(&self) -> TimeDelta {
        self.step
    }

    /// The fixed spacing in seconds.
    pub fn step_seconds(&self) -> i64 {
        self.step.num_seconds()
    }

    /// Number of instants on the axis (N+1).
    pub fn instant_count(&self) -> usize {
        self.instants
    }

    /// Number of steppable spans on the axis (N).
    pub fn span_count(&self) -> usize {
        self.instants - 1
    }

    /// The instant at the given position.
    ///
    /// Defined for any index by extension of the axis arithmetic; callers
    /// index within `0..instant_count()` in normal operation.
    pub fn instant(&self, index: usize) -> DateTime<Utc> {
        self.start + TimeDelta::seconds(self.step.num_seconds() * index as i64)
    }

    /// Position of the given instant on the axis, if it falls exactly on
    /// one of the axis's instants.
    pub fn index_of(&self, instant: DateTime<Utc>) -> Option<usize> {
        let offset = (instant - self.start).num_seconds();
        let step_s = self.step.num_seconds();
        if offset < 0 || offset % step_s != 0 {
            return None;
        }
        let index = usize::try_from(offset / step_s).ok()?;
        (index < self.instants).then_some(index)
    }

    /// Whether this axis spans the same `[start, end]` period as another.
    pub fn same_period_as(&self, other: &TimeAxis) -> bool {
        self.start == other.start && self.end() == other.end()
    }
}
