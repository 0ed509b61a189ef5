//! Checkpoint and resume: state dumps restore bitwise, record streams
//! revive mid-window and close identically to an uninterrupted run.

use chrono::{TimeDelta, TimeZone, Utc};
use confluence_core::TimeAxis;
use confluence_dump::load_record_file;
use confluence_engine::{Component, ComponentError, ProcessKind, RecordRequest};
use confluence_records::AggregationMethod;
use confluence_test_utils::{
    dummy_surfacelayer_config, hourly_axis, seeded_exchanger, test_shape, DummySurfaceLayer,
};

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

fn temp_dir(stem: &str) -> PathBuf {
    static COUNTER: AtomicUsize = AtomicUsize::new(0);
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    let dir = std::env::temp_dir().join(format!(
        "confluence_resume_{}_{stem}_{n}",
        std::process::id()
    ));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn recording_surfacelayer(dir: &PathBuf) -> Component {
    let mut config = dummy_surfacelayer_config(hourly_axis(25), dir.clone());
    config.records.push(RecordRequest::new(
        "output_x",
        TimeDelta::hours(8),
        &[AggregationMethod::Sum, AggregationMethod::Mean],
    ));
    Component::new(config, ProcessKind::Simulated(Box::new(DummySurfaceLayer))).unwrap()
}

#[test]
fn state_dump_restores_bitwise() {
    let dir = temp_dir("states");
    let mut component = Component::new(
        dummy_surfacelayer_config(hourly_axis(25), dir.clone()),
        ProcessKind::Simulated(Box::new(DummySurfaceLayer)),
    )
    .unwrap();
    component.initialise("run", true).unwrap();

    let exchanger = seeded_exchanger(test_shape().cell_count());
    for tick in 0..5 {
        component.run(tick, &exchanger).unwrap();
    }
    component.dump_states(5).unwrap();

    let mut restored = Component::new(
        dummy_surfacelayer_config(hourly_axis(25), dir.clone()),
        ProcessKind::Simulated(Box::new(DummySurfaceLayer)),
    )
    .unwrap();
    let dump_path = dir.join("dummy_surfacelayer_run_dump_states.cfd");
    let used = restored
        .initialise_states_from_dump(&dump_path, None)
        .unwrap();
    assert_eq!(
        used,
        Utc.with_ymd_and_hms(2019, 1, 1, 5, 0, 0).unwrap()
    );
    assert!(restored.states_initialised());

    for name in ["state_a", "state_b"] {
        let original = component.state(name).unwrap();
        let rebuilt = restored.state(name).unwrap();
        assert_eq!(original.depth(), rebuilt.depth());
        for k in 0..original.depth() {
            assert_eq!(original.slot(k), rebuilt.slot(k), "{name} slot -{k}");
        }
    }

    // The restored component steps on as if never interrupted.
    restored.initialise("run", false).unwrap();
    restored.run(5, &exchanger).unwrap();
    assert_eq!(restored.state("state_a").unwrap().last()[0], 6.0);
}

#[test]
fn restore_refuses_a_missing_timestamp() {
    let dir = temp_dir("missing_ts");
    let mut component = Component::new(
        dummy_surfacelayer_config(hourly_axis(25), dir.clone()),
        ProcessKind::Simulated(Box::new(DummySurfaceLayer)),
    )
    .unwrap();
    component.initialise("run", true).unwrap();
    let exchanger = seeded_exchanger(test_shape().cell_count());
    component.run(0, &exchanger).unwrap();
    component.dump_states(1).unwrap();

    let dump_path = dir.join("dummy_surfacelayer_run_dump_states.cfd");
    let err = component
        .initialise_states_from_dump(
            &dump_path,
            Some(Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap()),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        ComponentError::Dump(confluence_core::DumpError::TimestampNotFound { .. })
    ));
}

#[test]
fn interrupted_window_closes_like_an_uninterrupted_run() {
    // Reference: ticks 0-7 in one go, one 8h window closure.
    let reference_dir = temp_dir("reference");
    let mut reference = recording_surfacelayer(&reference_dir);
    reference.initialise("run", true).unwrap();
    let exchanger = seeded_exchanger(test_shape().cell_count());
    for tick in 0..8 {
        reference.run(tick, &exchanger).unwrap();
    }

    // Interrupted: ticks 0-5, dump mid-window, drop everything.
    let dir = temp_dir("interrupted");
    let mut first = recording_surfacelayer(&dir);
    first.initialise("run", true).unwrap();
    for tick in 0..6 {
        first.run(tick, &exchanger).unwrap();
    }
    first.dump_states(6).unwrap();
    first.dump_record_streams(6).unwrap();
    drop(first);

    // Resume: seed states and revive streams from the dumps, reuse the
    // run's files, complete ticks 6-7.
    let mut resumed = recording_surfacelayer(&dir);
    let state_dump = dir.join("dummy_surfacelayer_run_dump_states.cfd");
    let stream_pattern = dir
        .join("dummy_surfacelayer_run_dump_record_stream_{}.cfd")
        .to_string_lossy()
        .into_owned();
    let state_at = resumed
        .initialise_states_from_dump(&state_dump, None)
        .unwrap();
    let stream_ats = resumed
        .revive_record_streams_from_dump(&stream_pattern, None)
        .unwrap();
    assert_eq!(stream_ats, vec![state_at]);
    resumed.initialise("run", false).unwrap();
    for tick in 6..8 {
        resumed.run(tick, &exchanger).unwrap();
    }

    // Both runs emitted exactly one window with identical aggregates.
    let reference_path = reference_dir.join("dummy_surfacelayer_run_records_8hourly.cfr");
    let resumed_path = dir.join("dummy_surfacelayer_run_records_8hourly.cfr");
    let (_, reference_frames) = load_record_file(&reference_path).unwrap();
    let (_, resumed_frames) = load_record_file(&resumed_path).unwrap();
    assert_eq!(reference_frames.len(), 1);
    assert_eq!(reference_frames, resumed_frames);

    // And the carried states agree too.
    assert_eq!(
        reference.state("state_a").unwrap().last(),
        resumed.state("state_a").unwrap().last()
    );
}

#[test]
fn revive_refuses_a_misaligned_window() {
    // Dump a stream anchored at midnight, then revive it into a
    // component whose axis starts one hour later: the stored window
    // start no longer falls on the new window grid.
    let dir = temp_dir("misaligned");
    let mut component = recording_surfacelayer(&dir);
    component.initialise("run", true).unwrap();
    let exchanger = seeded_exchanger(test_shape().cell_count());
    for tick in 0..3 {
        component.run(tick, &exchanger).unwrap();
    }
    component.dump_record_streams(3).unwrap();
    drop(component);

    let shifted_start = Utc.with_ymd_and_hms(2019, 1, 1, 1, 0, 0).unwrap();
    let shifted_axis = TimeAxis::new(shifted_start, TimeDelta::hours(1), 25).unwrap();
    let mut config = dummy_surfacelayer_config(shifted_axis, dir.clone());
    config.records.push(RecordRequest::new(
        "output_x",
        TimeDelta::hours(8),
        &[AggregationMethod::Sum, AggregationMethod::Mean],
    ));
    let mut shifted =
        Component::new(config, ProcessKind::Simulated(Box::new(DummySurfaceLayer))).unwrap();

    let pattern = dir
        .join("dummy_surfacelayer_run_dump_record_stream_{}.cfd")
        .to_string_lossy()
        .into_owned();
    let err = shifted
        .revive_record_streams_from_dump(&pattern, None)
        .unwrap_err();
    assert!(matches!(
        err,
        ComponentError::Dump(confluence_core::DumpError::WindowMisaligned { .. })
    ));
}

#[test]
fn states_and_streams_restore_independently() {
    // The two dump families are deliberately separate: a driver may
    // seed states from a dump while letting record windows start
    // fresh.
    let dir = temp_dir("independent");
    let mut component = recording_surfacelayer(&dir);
    component.initialise("run", true).unwrap();
    let exchanger = seeded_exchanger(test_shape().cell_count());
    for tick in 0..4 {
        component.run(tick, &exchanger).unwrap();
    }
    component.dump_states(4).unwrap();
    drop(component);

    let mut restored = recording_surfacelayer(&dir);
    let state_dump = dir.join("dummy_surfacelayer_run_dump_states.cfd");
    restored
        .initialise_states_from_dump(&state_dump, None)
        .unwrap();
    // No stream revival: initialise resets the windows to the axis
    // start while keeping the seeded states.
    restored.initialise("restart", true).unwrap();
    assert_eq!(restored.state("state_a").unwrap().last()[0], 4.0);
    let stream = restored.stream(TimeDelta::hours(8)).unwrap();
    assert_eq!(stream.elapsed_ticks(), 0);
    assert_eq!(
        stream.window_start(),
        Utc.with_ymd_and_hms(2019, 1, 1, 0, 0, 0).unwrap()
    );
}
