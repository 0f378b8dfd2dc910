//! Transition-table tests for the pure `evaluate` function.

use filler_core::{Effects, FaultKind, ProcessCfg, ProcessState, TickInputs, TickTiming, evaluate};
use rstest::rstest;

fn cfg() -> ProcessCfg {
    ProcessCfg::default()
}

fn quiet() -> TickTiming {
    TickTiming::default()
}

#[test]
fn start_arms_the_station_and_clears_faults() {
    let inputs = TickInputs {
        start_pressed: true,
        ..TickInputs::default()
    };
    let t = evaluate(ProcessState::Stopped, &inputs, &quiet(), &cfg());
    assert_eq!(t.next, ProcessState::WaitingForBottle);
    assert!(t.effects.clear_faults);
    assert_eq!(t.effects.pump, None);
}

#[test]
fn auto_mode_starts_filling_on_stable_presence() {
    let inputs = TickInputs {
        bottle_present: true,
        auto_mode: true,
        ..TickInputs::default()
    };
    let t = evaluate(ProcessState::WaitingForBottle, &inputs, &quiet(), &cfg());
    assert_eq!(t.next, ProcessState::Filling);
    assert_eq!(t.effects.pump, Some(true));
    assert!(t.effects.reset_volume);
}

#[test]
fn manual_mode_waits_for_the_fill_button() {
    let inputs = TickInputs {
        bottle_present: true,
        auto_mode: false,
        ..TickInputs::default()
    };
    let t = evaluate(ProcessState::WaitingForBottle, &inputs, &quiet(), &cfg());
    assert_eq!(t.next, ProcessState::BottleReady);
    assert_eq!(t.effects, Effects::default());

    let t = evaluate(
        ProcessState::BottleReady,
        &TickInputs {
            fill_pressed: true,
            ..inputs
        },
        &quiet(),
        &cfg(),
    );
    assert_eq!(t.next, ProcessState::Filling);
    assert_eq!(t.effects.pump, Some(true));
}

#[test]
fn bottle_withdrawn_while_ready_rearms() {
    let inputs = TickInputs {
        bottle_present: false,
        auto_mode: false,
        ..TickInputs::default()
    };
    let t = evaluate(ProcessState::BottleReady, &inputs, &quiet(), &cfg());
    assert_eq!(t.next, ProcessState::WaitingForBottle);
    assert_eq!(t.effects, Effects::default());
}

#[test]
fn target_reached_completes_and_counts() {
    let inputs = TickInputs {
        bottle_present: true,
        dispensed_volume_ml: 500.0,
        auto_mode: true,
        ..TickInputs::default()
    };
    let t = evaluate(ProcessState::Filling, &inputs, &quiet(), &cfg());
    assert_eq!(t.next, ProcessState::FillComplete);
    assert_eq!(t.effects.pump, Some(false));
    assert!(t.effects.count_bottle);
    assert_eq!(t.effects.set_fault, None);
}

#[rstest]
#[case::bottle_removed(
    TickInputs { bottle_present: false, ..TickInputs::default() },
    TickTiming::default(),
    FaultKind::BottleRemoved
)]
#[case::no_flow(
    TickInputs { bottle_present: true, ..TickInputs::default() },
    TickTiming { no_flow_elapsed_ms: 5_001, ..TickTiming::default() },
    FaultKind::NoFlow
)]
#[case::overall_timeout(
    TickInputs { bottle_present: true, ..TickInputs::default() },
    TickTiming { cycle_elapsed_ms: 30_001, ..TickTiming::default() },
    FaultKind::Timeout
)]
fn filling_faults_latch_and_stop_the_pump(
    #[case] inputs: TickInputs,
    #[case] timing: TickTiming,
    #[case] expected: FaultKind,
) {
    let t = evaluate(ProcessState::Filling, &inputs, &timing, &cfg());
    assert_eq!(t.next, ProcessState::Fault);
    assert_eq!(t.effects.pump, Some(false));
    assert_eq!(t.effects.set_fault, Some(expected));
}

#[test]
fn timeouts_at_exact_boundary_do_not_fire() {
    let inputs = TickInputs {
        bottle_present: true,
        ..TickInputs::default()
    };
    let timing = TickTiming {
        cycle_elapsed_ms: 30_000,
        no_flow_elapsed_ms: 5_000,
        settle_elapsed_ms: 0,
    };
    let t = evaluate(ProcessState::Filling, &inputs, &timing, &cfg());
    assert_eq!(t.next, ProcessState::Filling);
}

#[test]
fn settle_delay_or_stop_rearms_after_completion() {
    let inputs = TickInputs::default();
    let t = evaluate(
        ProcessState::FillComplete,
        &inputs,
        &TickTiming {
            settle_elapsed_ms: 800,
            ..TickTiming::default()
        },
        &cfg(),
    );
    assert_eq!(t.next, ProcessState::WaitingForBottle);

    // stop during the settle dwell rearms too, it does not halt
    let t = evaluate(
        ProcessState::FillComplete,
        &TickInputs {
            stop_pressed: true,
            ..inputs
        },
        &quiet(),
        &cfg(),
    );
    assert_eq!(t.next, ProcessState::WaitingForBottle);
    assert_eq!(t.effects.pump, None);
}

#[rstest]
#[case(ProcessState::WaitingForBottle)]
#[case(ProcessState::BottleReady)]
#[case(ProcessState::Filling)]
#[case(ProcessState::Fault)]
fn stop_halts_from_every_active_state(#[case] from: ProcessState) {
    let inputs = TickInputs {
        stop_pressed: true,
        bottle_present: true,
        ..TickInputs::default()
    };
    let t = evaluate(from, &inputs, &quiet(), &cfg());
    assert_eq!(t.next, ProcessState::Stopped);
    assert_eq!(t.effects.pump, Some(false));
    assert_eq!(t.effects.set_fault, None);
}

#[test]
fn stop_while_stopped_is_idempotent() {
    let inputs = TickInputs {
        stop_pressed: true,
        ..TickInputs::default()
    };
    let t = evaluate(ProcessState::Stopped, &inputs, &quiet(), &cfg());
    assert_eq!(t.next, ProcessState::Stopped);
    assert_eq!(t.effects, Effects::default());
}

#[test]
fn start_acknowledges_a_fault() {
    let inputs = TickInputs {
        start_pressed: true,
        ..TickInputs::default()
    };
    let t = evaluate(ProcessState::Fault, &inputs, &quiet(), &cfg());
    assert_eq!(t.next, ProcessState::Stopped);
    assert!(t.effects.clear_faults);
}

#[test]
fn fault_is_latched_until_acknowledged() {
    // the triggering condition clearing does not leave FAULT
    let inputs = TickInputs {
        bottle_present: true,
        ..TickInputs::default()
    };
    let t = evaluate(ProcessState::Fault, &inputs, &quiet(), &cfg());
    assert_eq!(t.next, ProcessState::Fault);
    assert_eq!(t.effects, Effects::default());
}

// pump on iff entering FILLING; every other commanded level is off
#[test]
fn pump_is_only_commanded_on_toward_filling() {
    let cfg = cfg();
    let states = [
        ProcessState::Stopped,
        ProcessState::WaitingForBottle,
        ProcessState::BottleReady,
        ProcessState::Filling,
        ProcessState::FillComplete,
        ProcessState::Fault,
    ];
    for state in states {
        for start in [false, true] {
            for stop in [false, true] {
                for fill in [false, true] {
                    for present in [false, true] {
                        for auto in [false, true] {
                            let inputs = TickInputs {
                                start_pressed: start,
                                stop_pressed: stop,
                                fill_pressed: fill,
                                bottle_present: present,
                                dispensed_volume_ml: 0.0,
                                auto_mode: auto,
                            };
                            let t = evaluate(state, &inputs, &quiet(), &cfg);
                            if t.effects.pump == Some(true) {
                                assert_eq!(t.next, ProcessState::Filling);
                            }
                            if t.next == ProcessState::Fault && state != ProcessState::Fault {
                                assert_eq!(
                                    state,
                                    ProcessState::Filling,
                                    "fault entered from {state}"
                                );
                            }
                        }
                    }
                }
            }
        }
    }
}
