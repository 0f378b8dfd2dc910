//! Raspberry Pi GPIO backends (rppal), enabled with the `hardware` feature.

use crate::error::{HwError, Result};
use crate::util::wait_for_level_with_timeout;
use filler_traits::{DigitalInput, PulseCounter, PumpSwitch, RangeSensor};
use rppal::gpio::{Gpio, InputPin, Level, OutputPin, Trigger};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tracing::trace;

// speed of sound: ~58 us per cm of round trip
const US_PER_CM: f32 = 58.0;
const ECHO_POLL: Duration = Duration::from_micros(20);

type BoxError = Box<dyn std::error::Error + Send + Sync>;

fn gpio() -> Result<Gpio> {
    Gpio::new().map_err(|e| HwError::Gpio(e.to_string()))
}

/// Pulled-up push button input.
pub struct GpioButton {
    pin: InputPin,
}

impl GpioButton {
    pub fn new(pin: u8) -> Result<Self> {
        let pin = gpio()?
            .get(pin)
            .map_err(|e| HwError::Gpio(e.to_string()))?
            .into_input_pullup();
        Ok(Self { pin })
    }
}

impl DigitalInput for GpioButton {
    fn read(&mut self) -> std::result::Result<bool, BoxError> {
        Ok(self.pin.is_high())
    }
}

/// MOSFET-switched pump output.
pub struct GpioPump {
    pin: OutputPin,
}

impl GpioPump {
    pub fn new(pin: u8) -> Result<Self> {
        let mut pin = gpio()?
            .get(pin)
            .map_err(|e| HwError::Gpio(e.to_string()))?
            .into_output();
        pin.set_low();
        Ok(Self { pin })
    }
}

impl PumpSwitch for GpioPump {
    fn set_on(&mut self) -> std::result::Result<(), BoxError> {
        self.pin.set_high();
        Ok(())
    }

    fn set_off(&mut self) -> std::result::Result<(), BoxError> {
        self.pin.set_low();
        Ok(())
    }
}

impl Drop for GpioPump {
    fn drop(&mut self) {
        // never leave the pump running on teardown
        self.pin.set_low();
    }
}

/// HC-SR04 ultrasonic ranger: 10 us trigger pulse, then a bounded wait for
/// the echo line. A silent echo reports `Ok(None)`, not an error.
pub struct UltrasonicRanger {
    trigger: OutputPin,
    echo: InputPin,
}

impl UltrasonicRanger {
    pub fn new(trigger_pin: u8, echo_pin: u8) -> Result<Self> {
        let g = gpio()?;
        let mut trigger = g
            .get(trigger_pin)
            .map_err(|e| HwError::Gpio(e.to_string()))?
            .into_output();
        trigger.set_low();
        let echo = g
            .get(echo_pin)
            .map_err(|e| HwError::Gpio(e.to_string()))?
            .into_input();
        Ok(Self { trigger, echo })
    }
}

impl RangeSensor for UltrasonicRanger {
    fn measure_cm(
        &mut self,
        timeout: Duration,
    ) -> std::result::Result<Option<f32>, BoxError> {
        self.trigger.set_high();
        std::thread::sleep(Duration::from_micros(10));
        self.trigger.set_low();

        let echo = &self.echo;
        if wait_for_level_with_timeout(|| echo.is_high(), true, timeout, ECHO_POLL).is_err() {
            return Ok(None);
        }
        let high_time =
            match wait_for_level_with_timeout(|| echo.is_high(), false, timeout, ECHO_POLL) {
                Ok(d) => d,
                Err(HwError::Timeout) => return Ok(None),
                Err(e) => return Err(Box::new(e)),
            };

        let cm = high_time.as_micros() as f32 / US_PER_CM;
        trace!(cm, "ultrasonic echo");
        Ok(Some(cm))
    }
}

/// Flow meter pulse counter fed by a rising-edge GPIO interrupt. The
/// interrupt callback is the single writer, `drain` the single reader; the
/// atomic swap keeps the drain lossless without touching the general lock.
pub struct InterruptPulseCounter {
    count: Arc<AtomicU32>,
    // held so the async interrupt stays registered
    _pin: InputPin,
}

impl InterruptPulseCounter {
    pub fn new(pin: u8) -> Result<Self> {
        let mut pin = gpio()?
            .get(pin)
            .map_err(|e| HwError::Gpio(e.to_string()))?
            .into_input();
        let count = Arc::new(AtomicU32::new(0));
        let isr_count = Arc::clone(&count);
        pin.set_async_interrupt(Trigger::RisingEdge, move |_level: Level| {
            isr_count.fetch_add(1, Ordering::Relaxed);
        })
        .map_err(|e| HwError::Gpio(e.to_string()))?;
        Ok(Self { count, _pin: pin })
    }
}

impl PulseCounter for InterruptPulseCounter {
    fn drain(&mut self) -> u32 {
        self.count.swap(0, Ordering::AcqRel)
    }
}
