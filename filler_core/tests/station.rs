//! Threaded integration tests: full station with simulated hardware and
//! real time, plus thread lifecycle and cleanup checks.

use filler_core::mocks::{
    FailingFaultStore, MemoryFaultStore, RecordingPump, SharedLevelInput, SharedPulseCounter,
    SharedRangeSensor,
};
use filler_core::{
    DebounceCfg, FlowCfg, PresenceCfg, ProcessCfg, ProcessState, Station, StationBuilder,
    StationIo,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::{Duration, Instant};

struct Rig {
    station: Station,
    start: Arc<AtomicBool>,
    stop: Arc<AtomicBool>,
    range_tenths: Arc<AtomicU32>,
    pulses: Arc<AtomicU32>,
    persist: MemoryFaultStore,
}

fn fast_cfg() -> (DebounceCfg, PresenceCfg, FlowCfg, ProcessCfg) {
    (
        DebounceCfg {
            period_ms: 1,
            samples_stable: 2,
        },
        PresenceCfg {
            period_ms: 2,
            samples_stable: 2,
            threshold_cm: 10.0,
            echo_timeout_us: 1_000,
        },
        FlowCfg {
            period_ms: 2,
            ml_per_pulse: 1.0,
        },
        ProcessCfg {
            target_volume_ml: 20.0,
            fill_timeout_ms: 2_000,
            no_flow_timeout_ms: 500,
            // long dwell so tests can observe FILL_COMPLETE before rearm
            settle_ms: 60_000,
            control_period_ms: 2,
            auto_mode: true,
        },
    )
}

fn rig(persist: MemoryFaultStore) -> Rig {
    let (buttons, presence, flow, process) = fast_cfg();
    let (start_btn, start) = SharedLevelInput::released();
    let (stop_btn, stop) = SharedLevelInput::released();
    let (fill_btn, _fill) = SharedLevelInput::released();
    // start far away, no bottle
    let (range, range_tenths) = SharedRangeSensor::at_cm(50.0);
    let (counter, pulses) = SharedPulseCounter::new();
    let (pump, _pump_on) = RecordingPump::new();

    let station = StationBuilder::new()
        .with_io(StationIo {
            start_button: Box::new(start_btn),
            stop_button: Box::new(stop_btn),
            fill_button: Box::new(fill_btn),
            range: Box::new(range),
            pulses: Box::new(counter),
            pump: Box::new(pump),
            persist: Box::new(persist.clone()),
        })
        .with_buttons(buttons)
        .with_presence(presence)
        .with_flow(flow)
        .with_process(process)
        .build()
        .unwrap();

    Rig {
        station,
        start,
        stop,
        range_tenths,
        pulses,
        persist,
    }
}

fn wait_for_state(station: &Station, wanted: ProcessState, deadline: Duration) -> bool {
    let until = Instant::now() + deadline;
    while Instant::now() < until {
        if station.snapshot().process_state == wanted {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    false
}

fn press(level: &Arc<AtomicBool>) {
    level.store(false, Ordering::SeqCst);
    std::thread::sleep(Duration::from_millis(20));
    level.store(true, Ordering::SeqCst);
}

#[test]
fn full_fill_cycle_reaches_complete_and_persists_the_count() {
    let r = rig(MemoryFaultStore::new());

    press(&r.start);
    assert!(wait_for_state(
        &r.station,
        ProcessState::WaitingForBottle,
        Duration::from_secs(1)
    ));

    // bottle placed under the head
    r.range_tenths.store(50, Ordering::SeqCst); // 5.0 cm
    assert!(wait_for_state(
        &r.station,
        ProcessState::Filling,
        Duration::from_secs(1)
    ));
    assert!(r.station.snapshot().pump_on);

    // feed pulses until the 20 ml target is crossed
    let until = Instant::now() + Duration::from_secs(2);
    while Instant::now() < until
        && r.station.snapshot().process_state == ProcessState::Filling
    {
        r.pulses.fetch_add(2, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(2));
    }

    let snap = r.station.snapshot();
    assert_eq!(snap.process_state, ProcessState::FillComplete);
    assert!(
        snap.dispensed_volume_ml >= 20.0,
        "dispensed {}",
        snap.dispensed_volume_ml
    );
    assert!(!snap.pump_on);
    assert_eq!(snap.lifetime_bottle_count, 1);
    assert_eq!(r.persist.bottle_count(), 1);

    r.station.shutdown();
}

#[test]
fn stop_button_halts_the_station() {
    let r = rig(MemoryFaultStore::new());

    press(&r.start);
    assert!(wait_for_state(
        &r.station,
        ProcessState::WaitingForBottle,
        Duration::from_secs(1)
    ));

    press(&r.stop);
    assert!(wait_for_state(
        &r.station,
        ProcessState::Stopped,
        Duration::from_secs(1)
    ));
    assert!(!r.station.snapshot().pump_on);

    r.station.shutdown();
}

#[test]
fn boot_seeds_persisted_counter_and_fault_code() {
    let persist = MemoryFaultStore::with_count(41);
    let r = rig(persist);
    let snap = r.station.snapshot();
    assert_eq!(snap.lifetime_bottle_count, 41);
    assert_eq!(snap.process_state, ProcessState::Stopped);
    r.station.shutdown();
}

#[test]
fn boot_falls_back_to_defaults_when_persistence_load_fails() {
    let (buttons, presence, flow, process) = fast_cfg();
    let (start_btn, _start) = SharedLevelInput::released();
    let (stop_btn, _stop) = SharedLevelInput::released();
    let (fill_btn, _fill) = SharedLevelInput::released();
    let (range, _range_tenths) = SharedRangeSensor::at_cm(50.0);
    let (counter, _pulses) = SharedPulseCounter::new();
    let (pump, _pump_on) = RecordingPump::new();

    let station = StationBuilder::new()
        .with_io(StationIo {
            start_button: Box::new(start_btn),
            stop_button: Box::new(stop_btn),
            fill_button: Box::new(fill_btn),
            range: Box::new(range),
            pulses: Box::new(counter),
            pump: Box::new(pump),
            persist: Box::new(FailingFaultStore),
        })
        .with_buttons(buttons)
        .with_presence(presence)
        .with_flow(flow)
        .with_process(process)
        .build()
        .unwrap();

    let snap = station.snapshot();
    assert_eq!(snap.lifetime_bottle_count, 0);
    assert_eq!(snap.last_fault_code, 0);
    assert_eq!(snap.process_state, ProcessState::Stopped);
    station.shutdown();
}

#[test]
fn station_threads_exit_on_drop() {
    let r = rig(MemoryFaultStore::new());
    std::thread::sleep(Duration::from_millis(50));
    drop(r.station);
    // passes if drop joins every task without hanging
}

#[test]
fn station_shutdown_is_prompt() {
    let r = rig(MemoryFaultStore::new());
    std::thread::sleep(Duration::from_millis(50));

    let started = Instant::now();
    r.station.shutdown();
    let took = started.elapsed();
    assert!(
        took < Duration::from_millis(500),
        "shutdown took {took:?}, expected prompt task exit"
    );
}

#[test]
fn stations_can_be_recreated_without_leaking_threads() {
    for _ in 0..5 {
        let r = rig(MemoryFaultStore::new());
        std::thread::sleep(Duration::from_millis(10));
        let _ = r.station.snapshot();
        drop(r.station);
    }
}
