//! Hardware backends for the filling station: simulated devices for host
//! runs and tests, plus GPIO implementations behind the `hardware` feature.

pub mod error;
pub mod persist;
pub mod util;

#[cfg(feature = "hardware")]
pub mod gpio;

pub use persist::FilePersistence;

use filler_traits::{DigitalInput, PulseCounter, PumpSwitch, RangeSensor};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Simulated push button (pulled-up wiring: high = released). Reads low
/// for a short window after the configured delay, once.
pub struct SimulatedButton {
    press_at: Option<Duration>,
    hold: Duration,
    started: Instant,
}

impl SimulatedButton {
    pub fn press_after(delay: Duration) -> Self {
        Self {
            press_at: Some(delay),
            hold: Duration::from_millis(200),
            started: Instant::now(),
        }
    }

    pub fn never() -> Self {
        Self {
            press_at: None,
            hold: Duration::ZERO,
            started: Instant::now(),
        }
    }
}

impl DigitalInput for SimulatedButton {
    fn read(&mut self) -> Result<bool, BoxError> {
        let Some(at) = self.press_at else {
            return Ok(true);
        };
        let elapsed = self.started.elapsed();
        let pressed = elapsed >= at && elapsed < at + self.hold;
        Ok(!pressed)
    }
}

/// Simulated ultrasonic sensor: far reading until the bottle "arrives".
pub struct SimulatedRangeSensor {
    bottle_at: Duration,
    started: Instant,
}

impl SimulatedRangeSensor {
    pub fn bottle_after(delay: Duration) -> Self {
        Self {
            bottle_at: delay,
            started: Instant::now(),
        }
    }
}

impl RangeSensor for SimulatedRangeSensor {
    fn measure_cm(&mut self, _timeout: Duration) -> Result<Option<f32>, BoxError> {
        if self.started.elapsed() >= self.bottle_at {
            Ok(Some(5.0))
        } else {
            Ok(Some(50.0))
        }
    }
}

/// Simulated pump; exposes its commanded level so the simulated flow
/// counter can produce pulses only while pumping.
pub struct SimulatedPump {
    on: Arc<AtomicBool>,
}

impl SimulatedPump {
    pub fn new() -> Self {
        Self {
            on: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn level(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.on)
    }
}

impl Default for SimulatedPump {
    fn default() -> Self {
        Self::new()
    }
}

impl PumpSwitch for SimulatedPump {
    fn set_on(&mut self) -> Result<(), BoxError> {
        if !self.on.swap(true, Ordering::SeqCst) {
            println!("Pump on (simulated)");
        }
        Ok(())
    }

    fn set_off(&mut self) -> Result<(), BoxError> {
        if self.on.swap(false, Ordering::SeqCst) {
            println!("Pump off (simulated)");
        }
        Ok(())
    }
}

/// Simulated flow meter: emits pulses at a fixed rate while the linked
/// pump level is on.
pub struct SimulatedFlowCounter {
    pump_on: Arc<AtomicBool>,
    pulses_per_sec: f32,
    last_drain: Instant,
    carry: f32,
}

impl SimulatedFlowCounter {
    pub fn new(pump_on: Arc<AtomicBool>, pulses_per_sec: f32) -> Self {
        Self {
            pump_on,
            pulses_per_sec,
            last_drain: Instant::now(),
            carry: 0.0,
        }
    }
}

impl PulseCounter for SimulatedFlowCounter {
    fn drain(&mut self) -> u32 {
        let elapsed = self.last_drain.elapsed();
        self.last_drain = Instant::now();
        if !self.pump_on.load(Ordering::SeqCst) {
            self.carry = 0.0;
            return 0;
        }
        let exact = elapsed.as_secs_f32() * self.pulses_per_sec + self.carry;
        let whole = exact.floor();
        self.carry = exact - whole;
        whole as u32
    }
}
