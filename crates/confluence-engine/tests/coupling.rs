//! End-to-end coupling: three components with different timesteps
//! driven over one supermesh, exchanging transfers within each tick.

use chrono::TimeDelta;
use confluence_clock::Clock;
use confluence_core::{Category, Dataset};
use confluence_engine::{Component, ComponentError, ProcessKind, RecordRequest};
use confluence_records::AggregationMethod;
use confluence_test_utils::{
    axis, constant_dynamic, dummy_openwater_config, dummy_subsurface_config,
    dummy_surfacelayer_config, hourly_axis, seeded_exchanger, test_shape, ConstProcess,
    DummyOpenwater, DummySubsurface, DummySurfaceLayer, FailingProcess,
};

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

fn temp_dir(stem: &str) -> PathBuf {
    static COUNTER: AtomicUsize = AtomicUsize::new(0);
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    let dir = std::env::temp_dir().join(format!(
        "confluence_coupling_{}_{stem}_{n}",
        std::process::id()
    ));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// The full dummy trio on hourly/hourly/3-hourly axes spanning 12h.
fn trio(dir: &PathBuf) -> (Component, Component, Component) {
    let surfacelayer = Component::new(
        dummy_surfacelayer_config(hourly_axis(13), dir.clone()),
        ProcessKind::Simulated(Box::new(DummySurfaceLayer)),
    )
    .unwrap();
    let subsurface = Component::new(
        dummy_subsurface_config(hourly_axis(13), dir.clone()),
        ProcessKind::Simulated(Box::new(DummySubsurface)),
    )
    .unwrap();
    let openwater = Component::new(
        dummy_openwater_config(axis(3, 5), dir.clone()),
        ProcessKind::Simulated(Box::new(DummyOpenwater)),
    )
    .unwrap();
    (surfacelayer, subsurface, openwater)
}

#[test]
fn components_execute_per_their_step_multiples() {
    let dir = temp_dir("schedule");
    let (mut surfacelayer, mut subsurface, mut openwater) = trio(&dir);
    surfacelayer.initialise("run", true).unwrap();
    subsurface.initialise("run", true).unwrap();
    openwater.initialise("run", true).unwrap();

    let mut clock = Clock::new(
        surfacelayer.axis(),
        subsurface.axis(),
        openwater.axis(),
    )
    .unwrap();
    let mut exchanger = seeded_exchanger(test_shape().cell_count());

    let mut surfacelayer_ticks = Vec::new();
    let mut openwater_ticks = Vec::new();
    while let Some(due) = clock.next() {
        if due.surfacelayer {
            let tick = clock.subindex(Category::Surfacelayer);
            surfacelayer_ticks.push(clock.current_tick());
            let out = surfacelayer.run(tick, &exchanger).unwrap();
            exchanger.absorb(out);
        }
        if due.subsurface {
            let tick = clock.subindex(Category::Subsurface);
            let out = subsurface.run(tick, &exchanger).unwrap();
            exchanger.absorb(out);
        }
        if due.openwater {
            let tick = clock.subindex(Category::Openwater);
            openwater_ticks.push(clock.current_tick());
            let out = openwater.run(tick, &exchanger).unwrap();
            exchanger.absorb(out);
        }
    }

    // 12 supermesh ticks: the hourly components run on every one, the
    // 3-hourly component on ticks 0, 3, 6, 9.
    assert_eq!(surfacelayer_ticks, (0..12).collect::<Vec<i64>>());
    assert_eq!(openwater_ticks, vec![0, 3, 6, 9]);

    // Each state advanced once per run of its component.
    assert_eq!(surfacelayer.state("state_a").unwrap().last()[0], 12.0);
    assert_eq!(subsurface.state("state_b").unwrap().last()[0], 24.0);
    assert_eq!(openwater.state("state_a").unwrap().last()[0], 4.0);

    surfacelayer.finalise().unwrap();
    subsurface.finalise().unwrap();
    openwater.finalise().unwrap();
}

#[test]
fn transfers_route_between_components_within_one_tick() {
    let dir = temp_dir("transfers");
    let (mut surfacelayer, mut subsurface, mut openwater) = trio(&dir);
    surfacelayer.initialise("run", true).unwrap();
    subsurface.initialise("run", true).unwrap();
    openwater.initialise("run", true).unwrap();

    let cells = test_shape().cell_count();
    let mut exchanger = seeded_exchanger(cells);

    // Tick 0 by hand, category order.
    let out = surfacelayer.run(0, &exchanger).unwrap();
    // state_a = 1, state_b = 2 after the first step.
    assert_eq!(out["transfer_i"], vec![2.0; cells]); // 1 + 0 + 1*1
    assert_eq!(out["transfer_j"], vec![3.0; cells]); // 1 + 0 + 2
    exchanger.absorb(out);

    let out = subsurface.run(0, &exchanger).unwrap();
    assert_eq!(out["transfer_k"], vec![3.0; cells]); // 1*2 + 1
    assert_eq!(out["transfer_m"], vec![4.0; cells]); // 2 + 0 + 2
    exchanger.absorb(out);

    let out = openwater.run(0, &exchanger).unwrap();
    assert_eq!(out["transfer_l"], vec![5.0; cells]); // 1*4 + 1
    assert_eq!(out["transfer_n"], vec![12.0; cells]); // 4*3
    exchanger.absorb(out);

    // Tick 1: the surfacelayer now sees this tick's subsurface and
    // openwater values from the previous tick.
    let out = surfacelayer.run(1, &exchanger).unwrap();
    // state_a = 2, state_b = 4; transfer_k = 3, transfer_l = 5.
    assert_eq!(out["transfer_i"], vec![8.0; cells]); // 1 + 5 + 1*2
    assert_eq!(out["transfer_j"], vec![8.0; cells]); // 1 + 3 + 4
}

#[test]
fn null_substitute_returns_zeros_and_skips_lifecycle() {
    let dir = temp_dir("null");
    let cells = test_shape().cell_count();
    let mut openwater = Component::new(
        dummy_openwater_config(axis(3, 5), dir),
        ProcessKind::Null,
    )
    .unwrap();

    // No-op lifecycle: nothing to initialise, dump, or finalise.
    openwater.initialise("run", true).unwrap();
    assert!(openwater.state("state_a").is_none());

    let exchanger = seeded_exchanger(cells);
    let out = openwater.run(0, &exchanger).unwrap();
    assert_eq!(out["transfer_l"], vec![0.0; cells]);
    assert_eq!(out["transfer_n"], vec![0.0; cells]);

    openwater.dump_states(0).unwrap();
    openwater.finalise().unwrap();
}

#[test]
fn replayed_substitute_echoes_its_dataset() {
    let dir = temp_dir("replayed");
    let cells = test_shape().cell_count();
    let ow_axis = axis(3, 5);

    let mut recorded = Dataset::new();
    recorded.insert("transfer_l", constant_dynamic(&ow_axis, cells, 7.0));
    recorded.insert("transfer_n", constant_dynamic(&ow_axis, cells, 9.0));

    let mut config = dummy_openwater_config(ow_axis, dir);
    config.dataset = Dataset::new();
    let mut openwater = Component::new(config, ProcessKind::Replayed(recorded)).unwrap();

    openwater.initialise("run", true).unwrap();
    let exchanger = seeded_exchanger(cells);
    for tick in 0..4 {
        let out = openwater.run(tick, &exchanger).unwrap();
        assert_eq!(out["transfer_l"], vec![7.0; cells]);
        assert_eq!(out["transfer_n"], vec![9.0; cells]);
    }
}

#[test]
fn replayed_dataset_must_cover_the_outwards() {
    let dir = temp_dir("replayed_missing");
    let cells = test_shape().cell_count();
    let ow_axis = axis(3, 5);

    // transfer_n missing from the recorded dataset.
    let mut recorded = Dataset::new();
    recorded.insert("transfer_l", constant_dynamic(&ow_axis, cells, 7.0));

    let err = Component::new(
        dummy_openwater_config(ow_axis, dir),
        ProcessKind::Replayed(recorded),
    )
    .unwrap_err();
    assert!(matches!(
        err,
        ComponentError::Config(confluence_core::ConfigError::MissingInput { .. })
    ));
}

#[test]
fn constant_record_emits_expected_windows() {
    // A stream at period 4 x timestep fed the constant 2 for 12 ticks
    // emits exactly 3 closures, each sum = 8 and mean = 2.
    let dir = temp_dir("records");
    let mut config = dummy_surfacelayer_config(hourly_axis(13), dir.clone());
    config.records.push(RecordRequest::new(
        "output_x",
        TimeDelta::hours(4),
        &[AggregationMethod::Sum, AggregationMethod::Mean],
    ));
    let descriptor = config.descriptor.clone();
    let mut surfacelayer = Component::new(
        config,
        ProcessKind::Simulated(Box::new(ConstProcess::new("const", &descriptor, 2.0))),
    )
    .unwrap();
    surfacelayer.initialise("run", true).unwrap();

    let cells = test_shape().cell_count();
    let exchanger = seeded_exchanger(cells);
    for tick in 0..12 {
        surfacelayer.run(tick, &exchanger).unwrap();
    }

    let path = dir.join("dummy_surfacelayer_run_records_4hourly.cfr");
    let (header, frames) = confluence_dump::load_record_file(&path).unwrap();
    assert_eq!(header.period_seconds, 4 * 3600);
    assert_eq!(frames.len(), 3);
    for frame in &frames {
        assert_eq!(frame.values[0], vec![8.0; cells]); // sum
        assert_eq!(frame.values[1], vec![2.0; cells]); // mean
    }
}

#[test]
fn process_failure_aborts_the_run() {
    let dir = temp_dir("failure");
    let config = dummy_surfacelayer_config(hourly_axis(13), dir);
    let descriptor = config.descriptor.clone();
    let mut surfacelayer = Component::new(
        config,
        ProcessKind::Simulated(Box::new(FailingProcess::new("flaky", &descriptor, 2))),
    )
    .unwrap();
    surfacelayer.initialise("run", true).unwrap();

    let exchanger = seeded_exchanger(test_shape().cell_count());
    surfacelayer.run(0, &exchanger).unwrap();
    surfacelayer.run(1, &exchanger).unwrap();
    let err = surfacelayer.run(2, &exchanger).unwrap_err();
    match err {
        ComponentError::Process { name, .. } => assert_eq!(name, "flaky"),
        other => panic!("expected a process failure, got {other}"),
    }
}
