//! Test and helper mocks for filler_core

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A digital input driven by a shared flag (true = electrically high).
#[derive(Clone)]
pub struct SharedLevelInput {
    level: Arc<AtomicBool>,
}

impl SharedLevelInput {
    /// Returns the input plus the handle tests flip. Starts high (released
    /// on pulled-up wiring).
    pub fn released() -> (Self, Arc<AtomicBool>) {
        let level = Arc::new(AtomicBool::new(true));
        (
            Self {
                level: Arc::clone(&level),
            },
            level,
        )
    }
}

impl filler_traits::DigitalInput for SharedLevelInput {
    fn read(&mut self) -> Result<bool, BoxError> {
        Ok(self.level.load(Ordering::SeqCst))
    }
}

/// A range sensor reporting a shared distance in tenths of a centimetre;
/// `u32::MAX` means echo timeout.
#[derive(Clone)]
pub struct SharedRangeSensor {
    tenths: Arc<AtomicU32>,
}

impl SharedRangeSensor {
    pub fn at_cm(cm: f32) -> (Self, Arc<AtomicU32>) {
        let tenths = Arc::new(AtomicU32::new((cm * 10.0) as u32));
        (
            Self {
                tenths: Arc::clone(&tenths),
            },
            tenths,
        )
    }
}

impl filler_traits::RangeSensor for SharedRangeSensor {
    fn measure_cm(&mut self, _timeout: Duration) -> Result<Option<f32>, BoxError> {
        match self.tenths.load(Ordering::SeqCst) {
            u32::MAX => Ok(None),
            t => Ok(Some(t as f32 / 10.0)),
        }
    }
}

/// An interrupt-style pulse counter tests feed via the shared handle.
#[derive(Clone)]
pub struct SharedPulseCounter {
    count: Arc<AtomicU32>,
}

impl SharedPulseCounter {
    pub fn new() -> (Self, Arc<AtomicU32>) {
        let count = Arc::new(AtomicU32::new(0));
        (
            Self {
                count: Arc::clone(&count),
            },
            count,
        )
    }
}

impl filler_traits::PulseCounter for SharedPulseCounter {
    fn drain(&mut self) -> u32 {
        self.count.swap(0, Ordering::SeqCst)
    }
}

/// A pump that records its commanded level.
#[derive(Clone)]
pub struct RecordingPump {
    on: Arc<AtomicBool>,
}

impl RecordingPump {
    pub fn new() -> (Self, Arc<AtomicBool>) {
        let on = Arc::new(AtomicBool::new(false));
        (
            Self {
                on: Arc::clone(&on),
            },
            on,
        )
    }
}

impl filler_traits::PumpSwitch for RecordingPump {
    fn set_on(&mut self) -> Result<(), BoxError> {
        self.on.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn set_off(&mut self) -> Result<(), BoxError> {
        self.on.store(false, Ordering::SeqCst);
        Ok(())
    }
}

/// In-memory persistence recording every save for assertion.
#[derive(Clone, Default)]
pub struct MemoryFaultStore {
    count: Arc<AtomicU32>,
    code: Arc<AtomicU8>,
    saved_counts: Arc<Mutex<Vec<u32>>>,
}

impl MemoryFaultStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_count(count: u32) -> Self {
        let s = Self::default();
        s.count.store(count, Ordering::SeqCst);
        s
    }

    pub fn fault_code(&self) -> u8 {
        self.code.load(Ordering::SeqCst)
    }

    pub fn bottle_count(&self) -> u32 {
        self.count.load(Ordering::SeqCst)
    }

    /// Every count value passed to `save_bottle_count`, in order.
    pub fn saved_counts(&self) -> Vec<u32> {
        match self.saved_counts.lock() {
            Ok(g) => g.clone(),
            Err(p) => p.into_inner().clone(),
        }
    }
}

/// Persistence whose every operation fails, for exercising the degraded
/// paths (boot defaults, save failures ignored by the control loop).
#[derive(Clone, Copy, Default)]
pub struct FailingFaultStore;

impl filler_traits::FaultStore for FailingFaultStore {
    fn load_bottle_count(&mut self) -> Result<u32, BoxError> {
        Err("persistence backend offline".into())
    }

    fn save_bottle_count(&mut self, _count: u32) -> Result<(), BoxError> {
        Err("persistence backend offline".into())
    }

    fn load_fault_code(&mut self) -> Result<u8, BoxError> {
        Err("persistence backend offline".into())
    }

    fn save_fault_code(&mut self, _code: u8) -> Result<(), BoxError> {
        Err("persistence backend offline".into())
    }
}

impl filler_traits::FaultStore for MemoryFaultStore {
    fn load_bottle_count(&mut self) -> Result<u32, BoxError> {
        Ok(self.count.load(Ordering::SeqCst))
    }

    fn save_bottle_count(&mut self, count: u32) -> Result<(), BoxError> {
        self.count.store(count, Ordering::SeqCst);
        if let Ok(mut g) = self.saved_counts.lock() {
            g.push(count);
        }
        Ok(())
    }

    fn load_fault_code(&mut self) -> Result<u8, BoxError> {
        Ok(self.code.load(Ordering::SeqCst))
    }

    fn save_fault_code(&mut self, code: u8) -> Result<(), BoxError> {
        self.code.store(code, Ordering::SeqCst);
        Ok(())
    }
}
