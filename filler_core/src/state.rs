//! The mutex-owned shared state record.
//!
//! Every task reads and writes the whole struct under one lock; no
//! reference to the guarded data ever escapes, so the state machine always
//! observes a complete, internally consistent snapshot. Field ownership is
//! enforced by construction rather than convention: filters only get
//! [`StateStore::press_button`], [`StateStore::set_bottle_present`] and
//! [`StateStore::add_volume_ml`]; the state machine only gets
//! [`StateStore::commit_control`]; observers only get
//! [`StateStore::snapshot`].

use crate::fsm::{FaultKind, ProcessState};
use std::sync::{Arc, Mutex};

/// Operator buttons, each an independent debounced channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    Start,
    Stop,
    Fill,
}

/// Latched process faults; set by the state machine only, cleared by an
/// acknowledging start press.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Faults {
    pub bottle_removed: bool,
    pub no_flow: bool,
    pub timeout: bool,
}

impl Faults {
    pub fn any(self) -> bool {
        self.bottle_removed || self.no_flow || self.timeout
    }

    fn set(&mut self, kind: FaultKind) {
        match kind {
            FaultKind::BottleRemoved => self.bottle_removed = true,
            FaultKind::NoFlow => self.no_flow = true,
            FaultKind::Timeout => self.timeout = true,
        }
    }

    fn clear(&mut self) {
        *self = Self::default();
    }
}

/// The single source of truth shared by every task.
///
/// Button fields are edge-triggered event flags (set by the debounce
/// tasks, cleared by the consuming state machine), not levels.
#[derive(Debug, Clone, Default)]
pub struct SharedState {
    pub start_pressed: bool,
    pub stop_pressed: bool,
    pub fill_pressed: bool,
    /// Stability-filtered bottle presence.
    pub bottle_present: bool,
    /// Accumulated volume for the current fill cycle; reset at cycle start,
    /// monotonically non-decreasing until then.
    pub dispensed_volume_ml: f32,
    pub process_state: ProcessState,
    /// Mirror of the actuator command, for observability.
    pub pump_on: bool,
    pub auto_mode: bool,
    pub faults: Faults,
    /// Persisted; retained until a new fault overwrites it.
    pub last_fault_code: u8,
    /// Persisted; incremented only on successful fill completion.
    pub lifetime_bottle_count: u32,
}

impl SharedState {
    /// Initial record seeded from persisted values at boot.
    pub fn boot(auto_mode: bool, lifetime_bottle_count: u32, last_fault_code: u8) -> Self {
        Self {
            auto_mode,
            lifetime_bottle_count,
            last_fault_code,
            ..Self::default()
        }
    }
}

/// Button edges the machine consumed this tick. Only flags that were set in
/// the consumed snapshot are cleared, so a press landing between snapshot
/// and commit survives to the next tick.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsumedButtons {
    pub start: bool,
    pub stop: bool,
    pub fill: bool,
}

/// One control tick's worth of mutations, applied in a single lock hold.
#[derive(Debug, Clone, Copy)]
pub struct ControlUpdate {
    pub process_state: ProcessState,
    pub pump_on: Option<bool>,
    pub reset_volume: bool,
    pub clear_faults: bool,
    pub set_fault: Option<FaultKind>,
    pub last_fault_code: Option<u8>,
    pub lifetime_bottle_count: Option<u32>,
    pub consumed: ConsumedButtons,
}

/// Handle to the shared record; cheap to clone, one per task.
#[derive(Debug, Clone)]
pub struct StateStore {
    inner: Arc<Mutex<SharedState>>,
}

impl StateStore {
    pub fn new(initial: SharedState) -> Self {
        Self {
            inner: Arc::new(Mutex::new(initial)),
        }
    }

    /// Whole-struct copy under the lock. A poisoned lock still yields the
    /// record: whole-struct writes cannot be torn, so the value is intact.
    pub fn snapshot(&self) -> SharedState {
        match self.inner.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    // Poisoned lock on a write means "no state change this tick".
    fn update(&self, f: impl FnOnce(&mut SharedState)) {
        if let Ok(mut guard) = self.inner.lock() {
            f(&mut guard);
        }
    }

    /// Record a debounced press edge (filter-owned).
    pub fn press_button(&self, button: Button) {
        self.update(|s| match button {
            Button::Start => s.start_pressed = true,
            Button::Stop => s.stop_pressed = true,
            Button::Fill => s.fill_pressed = true,
        });
    }

    /// Publish a committed presence change (filter-owned).
    pub fn set_bottle_present(&self, present: bool) {
        self.update(|s| s.bottle_present = present);
    }

    /// Accumulate dispensed volume for the current cycle (filter-owned).
    /// Negative or non-finite increments are discarded to keep the cycle
    /// volume monotonic.
    pub fn add_volume_ml(&self, ml: f32) {
        if ml.is_finite() && ml > 0.0 {
            self.update(|s| s.dispensed_volume_ml += ml);
        }
    }

    pub fn set_auto_mode(&self, auto: bool) {
        self.update(|s| s.auto_mode = auto);
    }

    /// Apply one control tick's results (machine-owned).
    pub fn commit_control(&self, u: &ControlUpdate) {
        self.update(|s| {
            s.process_state = u.process_state;
            if let Some(on) = u.pump_on {
                s.pump_on = on;
            }
            if u.reset_volume {
                s.dispensed_volume_ml = 0.0;
            }
            if u.clear_faults {
                s.faults.clear();
            }
            if let Some(kind) = u.set_fault {
                s.faults.set(kind);
            }
            if let Some(code) = u.last_fault_code {
                s.last_fault_code = code;
            }
            if let Some(n) = u.lifetime_bottle_count {
                s.lifetime_bottle_count = n;
            }
            if u.consumed.start {
                s.start_pressed = false;
            }
            if u.consumed.stop {
                s.stop_pressed = false;
            }
            if u.consumed.fill {
                s.fill_pressed = false;
            }
        });
    }
}
