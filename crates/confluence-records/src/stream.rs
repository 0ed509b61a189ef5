//! Record streams: one accumulator set per output frequency.

use chrono::{DateTime, TimeDelta, Utc};
use indexmap::IndexMap;

use confluence_core::{DumpError, TimingError};

use crate::accumulator::Accumulator;
use crate::method::AggregationMethod;
use crate::record::Record;
use crate::sink::{RecordSink, WindowAggregate};

/// Human-readable tag for an aggregation period, used in file names.
///
/// Whole weeks, days, hours, and minutes get their natural name with a
/// factor prefix (`weekly`, `2daily`, `6hourly`, `minute`, `30min`);
/// anything else falls back to a count of seconds (`90s`).
pub fn frequency_tag(delta: TimeDelta) -> String {
    let seconds = delta.num_seconds();
    if seconds % 604_800 == 0 {
        match seconds / 604_800 {
            1 => "weekly".into(),
            factor => format!("{factor}weekly"),
        }
    } else if seconds % 86_400 == 0 {
        match seconds / 86_400 {
            1 => "daily".into(),
            factor => format!("{factor}daily"),
        }
    } else if seconds % 3_600 == 0 {
        match seconds / 3_600 {
            1 => "hourly".into(),
            factor => format!("{factor}hourly"),
        }
    } else if seconds % 60 == 0 {
        match seconds / 60 {
            1 => "minute".into(),
            factor => format!("{factor}min"),
        }
    } else {
        format!("{seconds}s")
    }
}

/// A record as registered with one stream, with its per-method
/// accumulators.
#[derive(Debug, PartialEq)]
pub struct RegisteredRecord {
    /// The record's declaration.
    pub record: Record,
    /// Number of values per instantaneous sample.
    pub len: usize,
    /// One accumulator per registered method, deduplicated.
    accumulators: Vec<Accumulator>,
}

impl RegisteredRecord {
    /// The methods aggregating this record, in registration order.
    pub fn methods(&self) -> Vec<AggregationMethod> {
        self.accumulators.iter().map(|a| a.method()).collect()
    }
}

/// The resumable aggregation progress of one stream.
///
/// Everything needed to continue a window after an interruption: the
/// window-start timestamp, the per-record contribution counter, and the
/// raw running values of every accumulator.
#[derive(Clone, Debug, PartialEq)]
pub struct StreamSnapshot {
    /// Start instant of the window in progress.
    pub window_start: DateTime<Utc>,
    /// Contributions folded into the window so far (records x ticks).
    pub trigger_tracker: u64,
    /// Raw accumulator payloads in registration order.
    pub accumulators: Vec<AccumulatorState>,
}

/// One accumulator's raw running state within a [`StreamSnapshot`].
#[derive(Clone, Debug, PartialEq)]
pub struct AccumulatorState {
    /// Record the accumulator belongs to.
    pub record: String,
    /// Method the accumulator applies.
    pub method: AggregationMethod,
    /// Samples folded into the window so far.
    pub count: u64,
    /// Unfinalised running values.
    pub values: Vec<f64>,
}

/// Accumulates instantaneous observations into aggregates for one
/// output period.
///
/// Constructed against the owning component's timestep and axis start;
/// the period must be a positive integer multiple of the timestep, at
/// least one timestep long. The window closes exactly when every
/// registered record has contributed `period / timestep` samples, at
/// which point the finalised aggregates go to the sink tagged with the
/// closing timestamp and all accumulators reset.
pub struct RecordStream {
    period: TimeDelta,
    timestep: TimeDelta,
    steps_per_window: usize,
    /// First window start; restored window starts must align with this
    /// grid.
    anchor: DateTime<Utc>,
    window_start: DateTime<Utc>,
    /// Total contributions per window: registered records x steps.
    trigger: usize,
    trigger_tracker: usize,
    records: IndexMap<String, RegisteredRecord>,
    sink: Box<dyn RecordSink>,
}

impl std::fmt::Debug for RecordStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordStream")
            .field("period", &self.period)
            .field("timestep", &self.timestep)
            .field("steps_per_window", &self.steps_per_window)
            .field("anchor", &self.anchor)
            .field("window_start", &self.window_start)
            .field("trigger", &self.trigger)
            .field("trigger_tracker", &self.trigger_tracker)
            .field("records", &self.records)
            .finish_non_exhaustive()
    }
}

impl RecordStream {
    /// Create a stream for one aggregation period.
    pub fn new(
        period: TimeDelta,
        timestep: TimeDelta,
        start: DateTime<Utc>,
        sink: Box<dyn RecordSink>,
    ) -> Result<Self, TimingError> {
        let period_seconds = period.num_seconds();
        let step_seconds = timestep.num_seconds();
        if period_seconds <= 0 {
            return Err(TimingError::InvalidPeriod {
                seconds: period_seconds,
            });
        }
        if period_seconds < step_seconds {
            return Err(TimingError::PeriodTooShort {
                period_seconds,
                step_seconds,
            });
        }
        if period_seconds % step_seconds != 0 {
            return Err(TimingError::PeriodNotMultiple {
                period_seconds,
                step_seconds,
            });
        }
        Ok(Self {
            period,
            timestep,
            steps_per_window: (period_seconds / step_seconds) as usize,
            anchor: start,
            window_start: start,
            trigger: 0,
            trigger_tracker: 0,
            records: IndexMap::new(),
            sink,
        })
    }

    /// Register a record with one or more aggregation methods.
    ///
    /// Duplicate methods collapse; each surviving (record, method) pair
    /// gets its own accumulator.
    pub fn add_record(&mut self, record: Record, len: usize, methods: &[AggregationMethod]) {
        debug_assert!(
            !self.records.contains_key(&record.name),
            "record '{}' already registered",
            record.name
        );
        let mut accumulators: Vec<Accumulator> = Vec::new();
        for &method in methods {
            if accumulators.iter().all(|a| a.method() != method) {
                accumulators.push(Accumulator::new(method, len));
            }
        }
        self.trigger += self.steps_per_window;
        self.records.insert(
            record.name.clone(),
            RegisteredRecord {
                record,
                len,
                accumulators,
            },
        );
    }

    /// Fold one tick's instantaneous value of a registered record.
    ///
    /// Once every record has contributed a full window of samples, the
    /// window closes: finalised aggregates are appended to the sink
    /// tagged with the closing timestamp, accumulators reset to their
    /// identities, and the window start advances by one period.
    pub fn update(&mut self, name: &str, sample: &[f64]) -> Result<(), DumpError> {
        let Some(registered) = self.records.get_mut(name) else {
            debug_assert!(false, "record '{name}' not registered with this stream");
            return Ok(());
        };
        for acc in &mut registered.accumulators {
            acc.fold(sample);
        }
        self.trigger_tracker += 1;
        if self.trigger_tracker == self.trigger {
            self.close_window()?;
        }
        Ok(())
    }

    fn close_window(&mut self) -> Result<(), DumpError> {
        let closing = self.window_start + self.period;
        let mut aggregates = Vec::new();
        for registered in self.records.values() {
            for acc in &registered.accumulators {
                aggregates.push(WindowAggregate {
                    record: &registered.record.name,
                    method: acc.method(),
                    values: acc.aggregate(),
                });
            }
        }
        tracing::debug!(
            closing = %closing,
            aggregates = aggregates.len(),
            "record stream window closed"
        );
        self.sink.emit(closing, &aggregates)?;

        for registered in self.records.values_mut() {
            for acc in &mut registered.accumulators {
                acc.reset();
            }
        }
        self.window_start = closing;
        self.trigger_tracker = 0;
        Ok(())
    }

    /// Capture the stream's resumable progress.
    pub fn snapshot(&self) -> StreamSnapshot {
        StreamSnapshot {
            window_start: self.window_start,
            trigger_tracker: self.trigger_tracker as u64,
            accumulators: self
                .records
                .values()
                .flat_map(|registered| {
                    registered.accumulators.iter().map(|acc| AccumulatorState {
                        record: registered.record.name.clone(),
                        method: acc.method(),
                        count: acc.count(),
                        values: acc.raw_values().to_vec(),
                    })
                })
                .collect(),
        }
    }

    /// Resume mid-window from a snapshot.
    ///
    /// The snapshot's window start must fall on the window grid implied
    /// by the stream's period; its accumulator set must match the
    /// stream's registration exactly. Subsequent ticks continue
    /// accumulating as if never interrupted.
    pub fn restore(&mut self, snapshot: &StreamSnapshot) -> Result<(), DumpError> {
        let period_seconds = self.period.num_seconds();
        let offset = (snapshot.window_start - self.anchor).num_seconds();
        if offset % period_seconds != 0 {
            return Err(DumpError::WindowMisaligned {
                window_start: snapshot.window_start,
                period_seconds,
            });
        }
        if snapshot.trigger_tracker as usize >= self.trigger.max(1) {
            return Err(DumpError::Incompatible {
                reason: format!(
                    "snapshot tracker {} describes a closed window (trigger {})",
                    snapshot.trigger_tracker, self.trigger
                ),
            });
        }
        let registered_count: usize = self.records.values().map(|r| r.accumulators.len()).sum();
        if snapshot.accumulators.len() != registered_count {
            return Err(DumpError::Incompatible {
                reason: format!(
                    "snapshot carries {} accumulators, stream registers {registered_count}",
                    snapshot.accumulators.len(),
                ),
            });
        }
        for state in &snapshot.accumulators {
            let acc = self
                .records
                .get(&state.record)
                .and_then(|r| r.accumulators.iter().find(|a| a.method() == state.method))
                .ok_or_else(|| DumpError::Incompatible {
                    reason: format!(
                        "snapshot accumulator ({}, {}) not registered with this stream",
                        state.record, state.method
                    ),
                })?;
            if state.values.len() != acc.len() {
                return Err(DumpError::Incompatible {
                    reason: format!(
                        "snapshot accumulator ({}, {}) carries {} values, stream expects {}",
                        state.record,
                        state.method,
                        state.values.len(),
                        acc.len()
                    ),
                });
            }
        }
        for state in &snapshot.accumulators {
            let acc = self
                .records
                .get_mut(&state.record)
                .and_then(|r| {
                    r.accumulators
                        .iter_mut()
                        .find(|a| a.method() == state.method)
                })
                .expect("membership checked above");
            acc.restore_raw(&state.values, state.count);
        }
        self.window_start = snapshot.window_start;
        self.trigger_tracker = snapshot.trigger_tracker as usize;
        Ok(())
    }

    /// Reset the stream to the first window of a run.
    pub fn reset(&mut self, start: DateTime<Utc>) {
        self.anchor = start;
        self.window_start = start;
        self.trigger_tracker = 0;
        for registered in self.records.values_mut() {
            for acc in &mut registered.accumulators {
                acc.reset();
            }
        }
    }

    /// Replace the output sink, returning the previous one.
    pub fn set_sink(&mut self, sink: Box<dyn RecordSink>) -> Box<dyn RecordSink> {
        std::mem::replace(&mut self.sink, sink)
    }

    /// The aggregation period.
    pub fn period(&self) -> TimeDelta {
        self.period
    }

    /// The owning component's timestep.
    pub fn timestep(&self) -> TimeDelta {
        self.timestep
    }

    /// Number of owning-component ticks per window.
    pub fn steps_per_window(&self) -> usize {
        self.steps_per_window
    }

    /// Start instant of the window in progress.
    pub fn window_start(&self) -> DateTime<Utc> {
        self.window_start
    }

    /// Complete ticks folded into the window in progress.
    pub fn elapsed_ticks(&self) -> usize {
        if self.records.is_empty() {
            0
        } else {
            self.trigger_tracker / self.records.len()
        }
    }

    /// The registered records, in registration order.
    pub fn records(&self) -> impl Iterator<Item = &RegisteredRecord> {
        self.records.values()
    }

    /// Number of registered records.
    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    /// The file-name tag for this stream's period.
    pub fn frequency(&self) -> String {
        frequency_tag(self.period)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RecordSource;
    use crate::sink::MemorySink;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2019, 1, 1, 0, 0, 0).unwrap()
    }

    fn hourly_stream(period_hours: i64) -> (RecordStream, MemorySink) {
        let sink = MemorySink::new();
        let stream = RecordStream::new(
            TimeDelta::hours(period_hours),
            TimeDelta::hours(1),
            t0(),
            Box::new(sink.clone()),
        )
        .unwrap();
        (stream, sink)
    }

    fn output_record(name: &str) -> Record {
        Record::new(name, "1", RecordSource::Output)
    }

    // ── Construction ─────────────────────────────────────────────

    #[test]
    fn period_shorter_than_timestep_rejected() {
        let err = RecordStream::new(
            TimeDelta::minutes(30),
            TimeDelta::hours(1),
            t0(),
            Box::new(MemorySink::new()),
        )
        .unwrap_err();
        assert!(matches!(err, TimingError::PeriodTooShort { .. }));
    }

    #[test]
    fn period_not_multiple_rejected() {
        let err = RecordStream::new(
            TimeDelta::minutes(90),
            TimeDelta::hours(1),
            t0(),
            Box::new(MemorySink::new()),
        )
        .unwrap_err();
        assert!(matches!(err, TimingError::PeriodNotMultiple { .. }));
    }

    #[test]
    fn nonpositive_period_rejected() {
        let err = RecordStream::new(
            TimeDelta::zero(),
            TimeDelta::hours(1),
            t0(),
            Box::new(MemorySink::new()),
        )
        .unwrap_err();
        assert_eq!(err, TimingError::InvalidPeriod { seconds: 0 });
    }

    // ── Aggregation ──────────────────────────────────────────────

    #[test]
    fn constant_feed_closes_with_expected_aggregates() {
        let (mut stream, sink) = hourly_stream(4);
        stream.add_record(output_record("output_x"), 1, &AggregationMethod::ALL);

        for _ in 0..4 {
            stream.update("output_x", &[2.5]).unwrap();
        }

        let windows = sink.windows();
        assert_eq!(windows.len(), 1);
        let window = &windows[0];
        assert_eq!(window.closing, t0() + TimeDelta::hours(4));
        assert_eq!(window.get("output_x", AggregationMethod::Sum), Some(&[10.0][..]));
        assert_eq!(window.get("output_x", AggregationMethod::Mean), Some(&[2.5][..]));
        assert_eq!(window.get("output_x", AggregationMethod::Minimum), Some(&[2.5][..]));
        assert_eq!(window.get("output_x", AggregationMethod::Maximum), Some(&[2.5][..]));
        assert_eq!(window.get("output_x", AggregationMethod::Point), Some(&[2.5][..]));
    }

    #[test]
    fn twelve_ticks_at_period_four_emit_three_windows() {
        let (mut stream, sink) = hourly_stream(4);
        stream.add_record(output_record("output_x"), 1, &[AggregationMethod::Sum]);

        for _ in 0..12 {
            stream.update("output_x", &[2.0]).unwrap();
        }

        let windows = sink.windows();
        assert_eq!(windows.len(), 3);
        for (i, window) in windows.iter().enumerate() {
            assert_eq!(window.closing, t0() + TimeDelta::hours(4 * (i as i64 + 1)));
            assert_eq!(window.get("output_x", AggregationMethod::Sum), Some(&[8.0][..]));
        }
        assert_eq!(stream.window_start(), t0() + TimeDelta::hours(12));
        assert_eq!(stream.elapsed_ticks(), 0);
    }

    #[test]
    fn window_closes_only_after_every_record_contributes() {
        let (mut stream, sink) = hourly_stream(2);
        stream.add_record(output_record("output_x"), 1, &[AggregationMethod::Sum]);
        stream.add_record(output_record("output_y"), 1, &[AggregationMethod::Point]);

        for tick in 0..2 {
            stream.update("output_x", &[1.0]).unwrap();
            assert!(sink.is_empty(), "closed before output_y on tick {tick}");
            stream.update("output_y", &[4.0]).unwrap();
        }

        let windows = sink.windows();
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].get("output_x", AggregationMethod::Sum), Some(&[2.0][..]));
        assert_eq!(windows[0].get("output_y", AggregationMethod::Point), Some(&[4.0][..]));
    }

    #[test]
    fn point_emits_latest_value_only() {
        let (mut stream, sink) = hourly_stream(3);
        stream.add_record(output_record("output_x"), 2, &[AggregationMethod::Point]);

        stream.update("output_x", &[1.0, 10.0]).unwrap();
        stream.update("output_x", &[2.0, 20.0]).unwrap();
        stream.update("output_x", &[3.0, 30.0]).unwrap();

        let windows = sink.windows();
        assert_eq!(
            windows[0].get("output_x", AggregationMethod::Point),
            Some(&[3.0, 30.0][..])
        );
    }

    #[test]
    fn duplicate_methods_collapse() {
        let (mut stream, _sink) = hourly_stream(2);
        stream.add_record(
            output_record("output_x"),
            1,
            &[AggregationMethod::Sum, AggregationMethod::Sum],
        );
        let registered = stream.records().next().unwrap();
        assert_eq!(registered.methods(), vec![AggregationMethod::Sum]);
    }

    // ── Snapshot / restore ───────────────────────────────────────

    #[test]
    fn interrupted_window_resumes_to_identical_closure() {
        let make = |sink: &MemorySink| {
            let mut stream = RecordStream::new(
                TimeDelta::hours(8),
                TimeDelta::hours(1),
                t0(),
                Box::new(sink.clone()),
            )
            .unwrap();
            stream.add_record(
                output_record("output_x"),
                1,
                &[
                    AggregationMethod::Sum,
                    AggregationMethod::Mean,
                    AggregationMethod::Maximum,
                ],
            );
            stream
        };
        let samples: Vec<[f64; 1]> = (0..8).map(|t| [t as f64 * 0.5]).collect();

        // Uninterrupted reference run over ticks 0-7.
        let reference_sink = MemorySink::new();
        let mut reference = make(&reference_sink);
        for s in &samples {
            reference.update("output_x", s).unwrap();
        }

        // Interrupted run: snapshot after tick 5, resume in a fresh
        // stream, complete ticks 6-7.
        let first_sink = MemorySink::new();
        let mut first = make(&first_sink);
        for s in &samples[..6] {
            first.update("output_x", s).unwrap();
        }
        let snapshot = first.snapshot();
        assert_eq!(first.elapsed_ticks(), 6);

        let resumed_sink = MemorySink::new();
        let mut resumed = make(&resumed_sink);
        resumed.restore(&snapshot).unwrap();
        for s in &samples[6..] {
            resumed.update("output_x", s).unwrap();
        }

        assert_eq!(resumed_sink.windows(), reference_sink.windows());
    }

    #[test]
    fn misaligned_window_start_rejected() {
        let (mut stream, _sink) = hourly_stream(8);
        stream.add_record(output_record("output_x"), 1, &[AggregationMethod::Sum]);
        let mut snapshot = stream.snapshot();
        snapshot.window_start = t0() + TimeDelta::hours(3);

        let err = stream.restore(&snapshot).unwrap_err();
        assert!(matches!(err, DumpError::WindowMisaligned { .. }));
    }

    #[test]
    fn mismatched_record_set_rejected() {
        let (mut stream, _sink) = hourly_stream(4);
        stream.add_record(output_record("output_x"), 1, &[AggregationMethod::Sum]);
        let mut snapshot = stream.snapshot();
        snapshot.accumulators[0].record = "output_y".into();

        let err = stream.restore(&snapshot).unwrap_err();
        assert!(matches!(err, DumpError::Incompatible { .. }));
    }

    #[test]
    fn mismatched_value_length_rejected() {
        let (mut stream, _sink) = hourly_stream(4);
        stream.add_record(output_record("output_x"), 2, &[AggregationMethod::Sum]);
        let mut snapshot = stream.snapshot();
        snapshot.accumulators[0].values = vec![0.0];

        let err = stream.restore(&snapshot).unwrap_err();
        assert!(matches!(err, DumpError::Incompatible { .. }));
    }

    #[test]
    fn reset_returns_to_the_first_window() {
        let (mut stream, _sink) = hourly_stream(4);
        stream.add_record(output_record("output_x"), 1, &[AggregationMethod::Sum]);
        stream.update("output_x", &[1.0]).unwrap();

        stream.reset(t0());
        assert_eq!(stream.window_start(), t0());
        assert_eq!(stream.elapsed_ticks(), 0);
        let snapshot = stream.snapshot();
        assert_eq!(snapshot.accumulators[0].values, vec![0.0]);
    }

    // ── Frequency tags ───────────────────────────────────────────

    #[test]
    fn frequency_tags_follow_natural_periods() {
        assert_eq!(frequency_tag(TimeDelta::weeks(1)), "weekly");
        assert_eq!(frequency_tag(TimeDelta::days(2)), "2daily");
        assert_eq!(frequency_tag(TimeDelta::days(1)), "daily");
        assert_eq!(frequency_tag(TimeDelta::hours(6)), "6hourly");
        assert_eq!(frequency_tag(TimeDelta::minutes(1)), "minute");
        assert_eq!(frequency_tag(TimeDelta::minutes(30)), "30min");
        assert_eq!(frequency_tag(TimeDelta::seconds(90)), "90s");
    }
}
