//! Task orchestration: one thread per filter/actuator concern.
//!
//! Each periodic task owns its hardware handle and per-channel filter state
//! outright and touches the shared store only through the narrow methods it
//! is allowed to call. Shutdown is cooperative via an `AtomicBool` checked
//! around each periodic sleep; `Station::drop` requests shutdown and joins
//! every task.

use crate::config::{DebounceCfg, FlowCfg, PresenceCfg, ProcessCfg};
use crate::debounce::Debouncer;
use crate::flow::FlowIntegrator;
use crate::fsm::{FillingMachine, NO_FAULT_CODE};
use crate::presence::PresenceFilter;
use crate::state::{Button, SharedState, StateStore};
use crate::util::period_from_ms;
use filler_traits::{Clock, DigitalInput, FaultStore, PulseCounter, PumpSwitch, RangeSensor};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Injected hardware surface. The core never touches pins directly.
pub struct StationIo {
    pub start_button: Box<dyn DigitalInput + Send>,
    pub stop_button: Box<dyn DigitalInput + Send>,
    pub fill_button: Box<dyn DigitalInput + Send>,
    pub range: Box<dyn RangeSensor + Send>,
    pub pulses: Box<dyn PulseCounter + Send>,
    pub pump: Box<dyn PumpSwitch + Send>,
    pub persist: Box<dyn FaultStore + Send>,
}

/// Full configuration for a running station.
#[derive(Debug, Clone, Copy, Default)]
pub struct StationCfg {
    pub buttons: DebounceCfg,
    pub presence: PresenceCfg,
    pub flow: FlowCfg,
    pub process: ProcessCfg,
}

/// A running station: the shared store plus its worker threads.
#[derive(Debug)]
pub struct Station {
    store: StateStore,
    shutdown: Arc<AtomicBool>,
    handles: Vec<JoinHandle<()>>,
}

impl Station {
    /// Boot and spawn all tasks. Persisted values are loaded first; a load
    /// failure degrades to defaults rather than blocking the process.
    pub(crate) fn start(
        mut io: StationIo,
        cfg: StationCfg,
        clock: Arc<dyn Clock + Send + Sync>,
    ) -> Self {
        let count = match io.persist.load_bottle_count() {
            Ok(n) => n,
            Err(e) => {
                warn!(error = %e, "failed to load bottle count, starting at 0");
                0
            }
        };
        let code = match io.persist.load_fault_code() {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "failed to load fault code, assuming none");
                NO_FAULT_CODE
            }
        };
        info!(
            bottle_count = count,
            last_fault_code = code,
            auto_mode = cfg.process.auto_mode,
            "station booting"
        );

        let store = StateStore::new(SharedState::boot(cfg.process.auto_mode, count, code));
        let shutdown = Arc::new(AtomicBool::new(false));

        let handles = vec![
            spawn_button_task(
                "button-start",
                io.start_button,
                Button::Start,
                store.clone(),
                cfg.buttons,
                Arc::clone(&clock),
                Arc::clone(&shutdown),
            ),
            spawn_button_task(
                "button-stop",
                io.stop_button,
                Button::Stop,
                store.clone(),
                cfg.buttons,
                Arc::clone(&clock),
                Arc::clone(&shutdown),
            ),
            spawn_button_task(
                "button-fill",
                io.fill_button,
                Button::Fill,
                store.clone(),
                cfg.buttons,
                Arc::clone(&clock),
                Arc::clone(&shutdown),
            ),
            spawn_presence_task(
                io.range,
                store.clone(),
                cfg.presence,
                Arc::clone(&clock),
                Arc::clone(&shutdown),
            ),
            spawn_flow_task(
                io.pulses,
                store.clone(),
                cfg.flow,
                Arc::clone(&clock),
                Arc::clone(&shutdown),
            ),
            spawn_control_task(
                FillingMachine::new(store.clone(), io.pump, io.persist, cfg.process, clock.clone()),
                cfg.process.control_period_ms,
                clock,
                Arc::clone(&shutdown),
            ),
        ];

        Self {
            store,
            shutdown,
            handles,
        }
    }

    /// Handle for observers (display, telemetry).
    pub fn store(&self) -> StateStore {
        self.store.clone()
    }

    pub fn snapshot(&self) -> SharedState {
        self.store.snapshot()
    }

    /// Signal all tasks to exit after their current iteration. Safe to call
    /// from a signal handler context.
    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    /// Request shutdown and join every task.
    pub fn shutdown(mut self) {
        self.join_tasks();
    }

    fn join_tasks(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                error!("station task panicked");
            }
        }
        debug!("all station tasks joined");
    }
}

impl Drop for Station {
    fn drop(&mut self) {
        self.join_tasks();
    }
}

fn spawn_button_task(
    name: &'static str,
    mut input: Box<dyn DigitalInput + Send>,
    button: Button,
    store: StateStore,
    cfg: DebounceCfg,
    clock: Arc<dyn Clock + Send + Sync>,
    shutdown: Arc<AtomicBool>,
) -> JoinHandle<()> {
    let period = period_from_ms(cfg.period_ms);
    thread::spawn(move || {
        // idle reads high on pulled-up wiring; a failed initial read must
        // not register a phantom press at boot
        let initial = input.read().unwrap_or(true);
        let mut debouncer = Debouncer::new(cfg.samples_stable, initial);
        debug!(task = name, period_ms = cfg.period_ms, "task started");
        while !shutdown.load(Ordering::SeqCst) {
            match input.read() {
                Ok(level) => {
                    if debouncer.sample(level) {
                        debug!(task = name, "press");
                        store.press_button(button);
                    }
                }
                Err(e) => warn!(task = name, error = %e, "button read failed"),
            }
            clock.sleep(period);
        }
        debug!(task = name, "task stopped");
    })
}

fn spawn_presence_task(
    mut range: Box<dyn RangeSensor + Send>,
    store: StateStore,
    cfg: PresenceCfg,
    clock: Arc<dyn Clock + Send + Sync>,
    shutdown: Arc<AtomicBool>,
) -> JoinHandle<()> {
    let period = period_from_ms(cfg.period_ms);
    let echo_timeout = Duration::from_micros(cfg.echo_timeout_us);
    thread::spawn(move || {
        let mut filter = PresenceFilter::new(cfg.threshold_cm, cfg.samples_stable);
        debug!(task = "presence", period_ms = cfg.period_ms, "task started");
        while !shutdown.load(Ordering::SeqCst) {
            let distance = match range.measure_cm(echo_timeout) {
                Ok(d) => d,
                Err(e) => {
                    // a broken sensor reads as "absent", failing pump-safe
                    warn!(error = %e, "range measurement failed");
                    None
                }
            };
            if let Some(present) = filter.sample(distance) {
                info!(present, "bottle presence changed");
                store.set_bottle_present(present);
            }
            clock.sleep(period);
        }
        debug!(task = "presence", "task stopped");
    })
}

fn spawn_flow_task(
    mut pulses: Box<dyn PulseCounter + Send>,
    store: StateStore,
    cfg: FlowCfg,
    clock: Arc<dyn Clock + Send + Sync>,
    shutdown: Arc<AtomicBool>,
) -> JoinHandle<()> {
    let period = period_from_ms(cfg.period_ms);
    thread::spawn(move || {
        let mut integrator = FlowIntegrator::new(cfg.ml_per_pulse);
        debug!(task = "flow", period_ms = cfg.period_ms, "task started");
        while !shutdown.load(Ordering::SeqCst) {
            let batch = pulses.drain();
            if batch > 0 {
                let ml = integrator.integrate(batch);
                store.add_volume_ml(ml);
            }
            clock.sleep(period);
        }
        debug!(
            task = "flow",
            pulses_total = integrator.pulses_total(),
            "task stopped"
        );
    })
}

fn spawn_control_task(
    mut machine: FillingMachine,
    period_ms: u64,
    clock: Arc<dyn Clock + Send + Sync>,
    shutdown: Arc<AtomicBool>,
) -> JoinHandle<()> {
    let period = period_from_ms(period_ms);
    thread::spawn(move || {
        debug!(task = "control", period_ms, "task started");
        while !shutdown.load(Ordering::SeqCst) {
            if let Err(e) = machine.tick() {
                // pump-on failure; keep the loop alive, the no-flow guard
                // will latch a fault if the pump really is dead
                error!(error = %e, "control tick failed");
            }
            clock.sleep(period);
        }
        machine.pump_off();
        debug!(task = "control", "task stopped");
    })
}
