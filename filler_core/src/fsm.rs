//! The filling state machine.
//!
//! Transition logic is a pure function [`evaluate`] over a state, an input
//! snapshot and elapsed timers, returning the next state plus effects. The
//! [`FillingMachine`] wraps it with real time, the pump actuator and the
//! persistence bridge, committing each tick's result to the shared store in
//! one lock hold.

use crate::config::ProcessCfg;
use crate::error::{Result, map_hw_error_dyn};
use crate::state::{ConsumedButtons, ControlUpdate, SharedState, StateStore};
use eyre::WrapErr;
use filler_traits::{Clock, FaultStore, PumpSwitch};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Process states. `Fault` and `Stopped` are both re-enterable; there is no
/// terminal state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ProcessState {
    #[default]
    Stopped,
    WaitingForBottle,
    BottleReady,
    Filling,
    FillComplete,
    Fault,
}

impl ProcessState {
    pub fn name(self) -> &'static str {
        match self {
            Self::Stopped => "STOPPED",
            Self::WaitingForBottle => "WAITING_FOR_BOTTLE",
            Self::BottleReady => "BOTTLE_READY",
            Self::Filling => "FILLING",
            Self::FillComplete => "FILL_COMPLETE",
            Self::Fault => "FAULT",
        }
    }
}

impl std::fmt::Display for ProcessState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Persisted fault code for post-mortem display. Code 0 means "no fault".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    BottleRemoved,
    NoFlow,
    Timeout,
}

pub const NO_FAULT_CODE: u8 = 0;

impl FaultKind {
    pub fn code(self) -> u8 {
        match self {
            Self::BottleRemoved => 1,
            Self::NoFlow => 2,
            Self::Timeout => 3,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::BottleRemoved),
            2 => Some(Self::NoFlow),
            3 => Some(Self::Timeout),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::BottleRemoved => "bottle-removed",
            Self::NoFlow => "no-flow",
            Self::Timeout => "timeout",
        }
    }
}

/// Inputs to one transition evaluation, taken from a single snapshot.
#[derive(Debug, Clone, Copy, Default)]
pub struct TickInputs {
    pub start_pressed: bool,
    pub stop_pressed: bool,
    pub fill_pressed: bool,
    pub bottle_present: bool,
    pub dispensed_volume_ml: f32,
    pub auto_mode: bool,
}

impl From<&SharedState> for TickInputs {
    fn from(s: &SharedState) -> Self {
        Self {
            start_pressed: s.start_pressed,
            stop_pressed: s.stop_pressed,
            fill_pressed: s.fill_pressed,
            bottle_present: s.bottle_present,
            dispensed_volume_ml: s.dispensed_volume_ml,
            auto_mode: s.auto_mode,
        }
    }
}

/// Elapsed timers, data-driven rather than scheduler-level. Only the fields
/// relevant to the current state are consulted.
#[derive(Debug, Clone, Copy, Default)]
pub struct TickTiming {
    /// Since the current fill cycle started (valid in FILLING).
    pub cycle_elapsed_ms: u64,
    /// Since dispensed volume last increased (valid in FILLING).
    pub no_flow_elapsed_ms: u64,
    /// Since FILL_COMPLETE was entered (valid in FILL_COMPLETE).
    pub settle_elapsed_ms: u64,
}

/// Side effects of a transition, applied by the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Effects {
    pub pump: Option<bool>,
    pub reset_volume: bool,
    pub clear_faults: bool,
    pub set_fault: Option<FaultKind>,
    pub count_bottle: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transition {
    pub next: ProcessState,
    pub effects: Effects,
}

fn stay(state: ProcessState) -> Transition {
    Transition {
        next: state,
        effects: Effects::default(),
    }
}

fn goto(next: ProcessState) -> Transition {
    Transition {
        next,
        effects: Effects::default(),
    }
}

fn stopped() -> Transition {
    Transition {
        next: ProcessState::Stopped,
        effects: Effects {
            pump: Some(false),
            ..Effects::default()
        },
    }
}

fn start_filling() -> Transition {
    Transition {
        next: ProcessState::Filling,
        effects: Effects {
            pump: Some(true),
            reset_volume: true,
            ..Effects::default()
        },
    }
}

fn fault(kind: FaultKind) -> Transition {
    Transition {
        next: ProcessState::Fault,
        effects: Effects {
            pump: Some(false),
            set_fault: Some(kind),
            ..Effects::default()
        },
    }
}

/// Pure transition function, evaluated once per control tick.
///
/// Trigger precedence within a state follows declaration order below. In
/// FILLING the stop press is honored first, then bottle removal (the more
/// specific and urgent condition), then target reached, then the no-flow
/// and overall-timeout guards. Fault entry is one-way per cycle: once in
/// FAULT no further condition changes the latched flag until acknowledged.
pub fn evaluate(
    state: ProcessState,
    inputs: &TickInputs,
    timing: &TickTiming,
    cfg: &ProcessCfg,
) -> Transition {
    use ProcessState::{BottleReady, FillComplete, Filling, Stopped, WaitingForBottle};

    match state {
        Stopped => {
            if inputs.start_pressed {
                Transition {
                    next: WaitingForBottle,
                    effects: Effects {
                        clear_faults: true,
                        ..Effects::default()
                    },
                }
            } else {
                // repeated stop presses while stopped are no-ops
                stay(state)
            }
        }
        WaitingForBottle => {
            if inputs.stop_pressed {
                stopped()
            } else if inputs.bottle_present {
                if inputs.auto_mode {
                    start_filling()
                } else {
                    goto(BottleReady)
                }
            } else {
                stay(state)
            }
        }
        BottleReady => {
            if inputs.stop_pressed {
                stopped()
            } else if !inputs.bottle_present {
                goto(WaitingForBottle)
            } else if inputs.fill_pressed {
                start_filling()
            } else {
                stay(state)
            }
        }
        Filling => {
            if inputs.stop_pressed {
                stopped()
            } else if !inputs.bottle_present {
                fault(FaultKind::BottleRemoved)
            } else if inputs.dispensed_volume_ml >= cfg.target_volume_ml {
                Transition {
                    next: FillComplete,
                    effects: Effects {
                        pump: Some(false),
                        count_bottle: true,
                        ..Effects::default()
                    },
                }
            } else if timing.no_flow_elapsed_ms > cfg.no_flow_timeout_ms {
                fault(FaultKind::NoFlow)
            } else if timing.cycle_elapsed_ms > cfg.fill_timeout_ms {
                fault(FaultKind::Timeout)
            } else {
                stay(state)
            }
        }
        FillComplete => {
            // stop here rearms for the next bottle instead of halting
            if inputs.stop_pressed || timing.settle_elapsed_ms >= cfg.settle_ms {
                goto(WaitingForBottle)
            } else {
                stay(state)
            }
        }
        ProcessState::Fault => {
            if inputs.start_pressed {
                // acknowledge: clear the latched flags, keep last_fault_code
                Transition {
                    next: Stopped,
                    effects: Effects {
                        clear_faults: true,
                        ..Effects::default()
                    },
                }
            } else if inputs.stop_pressed {
                stopped()
            } else {
                stay(state)
            }
        }
    }
}

/// Drives [`evaluate`] against real time, the pump and the persistence
/// bridge. One instance, owned by the control task.
pub struct FillingMachine {
    store: StateStore,
    pump: Box<dyn PumpSwitch + Send>,
    persist: Box<dyn FaultStore + Send>,
    cfg: ProcessCfg,
    clock: Arc<dyn Clock + Send + Sync>,
    epoch: Instant,
    cycle_started_ms: u64,
    last_flow_ms: u64,
    last_volume_ml: f32,
    complete_since_ms: u64,
}

impl FillingMachine {
    pub fn new(
        store: StateStore,
        pump: Box<dyn PumpSwitch + Send>,
        persist: Box<dyn FaultStore + Send>,
        cfg: ProcessCfg,
        clock: Arc<dyn Clock + Send + Sync>,
    ) -> Self {
        let epoch = clock.now();
        Self {
            store,
            pump,
            persist,
            cfg,
            clock,
            epoch,
            cycle_started_ms: 0,
            last_flow_ms: 0,
            last_volume_ml: 0.0,
            complete_since_ms: 0,
        }
    }

    /// One control tick: snapshot, evaluate, actuate, persist, commit.
    ///
    /// A failure to switch the pump on aborts the tick with an error (the
    /// caller decides whether to keep running); a failure to switch it off
    /// is logged and the tick still commits, so the recorded state never
    /// claims an actuation that was not at least attempted.
    pub fn tick(&mut self) -> Result<()> {
        let snap = self.store.snapshot();
        let now_ms = self.clock.ms_since(self.epoch);

        // volume bookkeeping for the no-flow guard
        if snap.dispensed_volume_ml > self.last_volume_ml {
            self.last_volume_ml = snap.dispensed_volume_ml;
            self.last_flow_ms = now_ms;
        }

        let inputs = TickInputs::from(&snap);
        let timing = TickTiming {
            cycle_elapsed_ms: now_ms.saturating_sub(self.cycle_started_ms),
            no_flow_elapsed_ms: now_ms.saturating_sub(self.last_flow_ms),
            settle_elapsed_ms: now_ms.saturating_sub(self.complete_since_ms),
        };

        let t = evaluate(snap.process_state, &inputs, &timing, &self.cfg);

        if t.next != snap.process_state {
            info!(from = %snap.process_state, to = %t.next, "state transition");
        }

        // restart timers on entry, not while dwelling
        if t.next == ProcessState::Filling && snap.process_state != ProcessState::Filling {
            self.cycle_started_ms = now_ms;
            self.last_flow_ms = now_ms;
            self.last_volume_ml = 0.0;
        }
        if t.next == ProcessState::FillComplete && snap.process_state != ProcessState::FillComplete
        {
            self.complete_since_ms = now_ms;
        }

        match t.effects.pump {
            Some(true) => {
                self.pump
                    .set_on()
                    .map_err(|e| map_hw_error_dyn(e.as_ref()))
                    .wrap_err("switching pump on")?;
                debug!("pump on");
            }
            Some(false) => {
                if let Err(e) = self.pump.set_off() {
                    warn!(error = %e, "pump off command failed");
                }
            }
            None => {}
        }

        let mut last_fault_code = None;
        if let Some(kind) = t.effects.set_fault {
            warn!(fault = kind.name(), "process fault latched");
            last_fault_code = Some(kind.code());
            if let Err(e) = self.persist.save_fault_code(kind.code()) {
                warn!(error = %e, "failed to persist fault code");
            }
        }

        let mut lifetime_bottle_count = None;
        if t.effects.count_bottle {
            let count = snap.lifetime_bottle_count.saturating_add(1);
            info!(count, volume_ml = snap.dispensed_volume_ml, "bottle filled");
            if let Err(e) = self.persist.save_bottle_count(count) {
                warn!(error = %e, "failed to persist bottle count");
            }
            lifetime_bottle_count = Some(count);
        }

        self.store.commit_control(&ControlUpdate {
            process_state: t.next,
            pump_on: t.effects.pump,
            reset_volume: t.effects.reset_volume,
            clear_faults: t.effects.clear_faults,
            set_fault: t.effects.set_fault,
            last_fault_code,
            lifetime_bottle_count,
            consumed: ConsumedButtons {
                start: snap.start_pressed,
                stop: snap.stop_pressed,
                fill: snap.fill_pressed,
            },
        });

        Ok(())
    }

    /// Best-effort pump shutoff, used on control-task exit.
    pub fn pump_off(&mut self) {
        if let Err(e) = self.pump.set_off() {
            warn!(error = %e, "pump off on shutdown failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> ProcessCfg {
        ProcessCfg::default()
    }

    #[test]
    fn stop_wins_over_every_filling_condition() {
        let inputs = TickInputs {
            stop_pressed: true,
            bottle_present: false,
            dispensed_volume_ml: 1000.0,
            ..TickInputs::default()
        };
        let timing = TickTiming {
            cycle_elapsed_ms: 60_000,
            no_flow_elapsed_ms: 60_000,
            settle_elapsed_ms: 0,
        };
        let t = evaluate(ProcessState::Filling, &inputs, &timing, &cfg());
        assert_eq!(t.next, ProcessState::Stopped);
        assert_eq!(t.effects.set_fault, None);
        assert_eq!(t.effects.pump, Some(false));
    }

    #[test]
    fn bottle_removed_wins_over_timeouts() {
        let inputs = TickInputs {
            bottle_present: false,
            ..TickInputs::default()
        };
        let timing = TickTiming {
            cycle_elapsed_ms: 60_000,
            no_flow_elapsed_ms: 60_000,
            settle_elapsed_ms: 0,
        };
        let t = evaluate(ProcessState::Filling, &inputs, &timing, &cfg());
        assert_eq!(t.effects.set_fault, Some(FaultKind::BottleRemoved));
    }

    #[test]
    fn fault_codes_round_trip() {
        for kind in [FaultKind::BottleRemoved, FaultKind::NoFlow, FaultKind::Timeout] {
            assert_eq!(FaultKind::from_code(kind.code()), Some(kind));
        }
        assert_eq!(FaultKind::from_code(NO_FAULT_CODE), None);
    }
}
