//! Flow-meter pulse integration.

/// Converts drained pulse batches into millilitres.
///
/// The counter drain itself is the `PulseCounter` implementation's job
/// (atomic read-and-zero); this type only applies the calibration constant,
/// which makes the conversion pulse-count-conserving by construction: a
/// batch of k pulses always contributes exactly `k * ml_per_pulse`.
#[derive(Debug, Clone)]
pub struct FlowIntegrator {
    ml_per_pulse: f32,
    pulses_total: u64,
}

impl FlowIntegrator {
    pub fn new(ml_per_pulse: f32) -> Self {
        Self {
            ml_per_pulse,
            pulses_total: 0,
        }
    }

    /// Millilitres dispensed by one drained batch of pulses.
    pub fn integrate(&mut self, pulses: u32) -> f32 {
        self.pulses_total += u64::from(pulses);
        pulses as f32 * self.ml_per_pulse
    }

    /// Telemetry: pulses seen since this integrator was created.
    pub fn pulses_total(&self) -> u64 {
        self.pulses_total
    }
}
