pub mod clock;

pub use clock::{Clock, MonotonicClock};

/// Raw digital pin input. Buttons are wired pulled-up/active-low; the
/// debouncer owns that mapping, so `read` reports the electrical level only.
pub trait DigitalInput {
    fn read(&mut self) -> Result<bool, Box<dyn std::error::Error + Send + Sync>>;
}

/// On/off pump actuator (MOSFET low-side switch or equivalent).
pub trait PumpSwitch {
    fn set_on(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
    fn set_off(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Ultrasonic (or similar) distance sensor with a bounded echo wait.
///
/// `Ok(None)` means the echo never arrived within `timeout`; callers must
/// treat that as "nothing in range", never as presence.
pub trait RangeSensor {
    fn measure_cm(
        &mut self,
        timeout: std::time::Duration,
    ) -> Result<Option<f32>, Box<dyn std::error::Error + Send + Sync>>;
}

/// Interrupt-incremented pulse counter (flow meter).
///
/// `drain` reads and zeroes the count in one atomic operation so pulses are
/// never double-counted or lost between the interrupt writer and the reader.
pub trait PulseCounter {
    fn drain(&mut self) -> u32;
}

/// Persistence bridge for the lifetime bottle counter and last fault code.
///
/// Consulted at boot and on counter/fault transitions only; load failures
/// degrade to defaults (count 0, code 0) instead of halting the station.
pub trait FaultStore {
    fn load_bottle_count(&mut self) -> Result<u32, Box<dyn std::error::Error + Send + Sync>>;
    fn save_bottle_count(
        &mut self,
        count: u32,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
    fn load_fault_code(&mut self) -> Result<u8, Box<dyn std::error::Error + Send + Sync>>;
    fn save_fault_code(
        &mut self,
        code: u8,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}
