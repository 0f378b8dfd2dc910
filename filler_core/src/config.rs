//! Core-side configuration structs and conversions from the TOML schema.
//!
//! Defaults match the reference station wiring: 10 ms button sampling with
//! 5 stable samples, 100 ms ultrasonic sampling with 3 stable samples and a
//! 10 cm presence threshold, 500 ms flow integration, 500 ml target.

/// Button sampling and debounce configuration (one per channel).
#[derive(Debug, Clone, Copy)]
pub struct DebounceCfg {
    pub period_ms: u64,
    /// Consecutive identical raw samples required to commit a level change.
    pub samples_stable: u8,
}

impl Default for DebounceCfg {
    fn default() -> Self {
        Self {
            period_ms: 10,
            samples_stable: 5,
        }
    }
}

/// Presence stability filter configuration.
#[derive(Debug, Clone, Copy)]
pub struct PresenceCfg {
    pub period_ms: u64,
    /// Consecutive disagreeing samples required to flip the stable value.
    pub samples_stable: u8,
    /// Closer than this => bottle present.
    pub threshold_cm: f32,
    /// Bounded wait for the echo; a silent sensor reads as "absent".
    pub echo_timeout_us: u64,
}

impl Default for PresenceCfg {
    fn default() -> Self {
        Self {
            period_ms: 100,
            samples_stable: 3,
            threshold_cm: 10.0,
            echo_timeout_us: 30_000,
        }
    }
}

/// Flow integration configuration.
#[derive(Debug, Clone, Copy)]
pub struct FlowCfg {
    pub period_ms: u64,
    /// Calibration constant; configuration, never derived at runtime.
    pub ml_per_pulse: f32,
}

impl Default for FlowCfg {
    fn default() -> Self {
        Self {
            period_ms: 500,
            ml_per_pulse: 1000.0 / 16818.0,
        }
    }
}

/// Filling process parameters consumed by the state machine.
#[derive(Debug, Clone, Copy)]
pub struct ProcessCfg {
    pub target_volume_ml: f32,
    /// Hard cap on a single fill cycle (ms).
    pub fill_timeout_ms: u64,
    /// Abort if no new volume arrives for longer than this while filling.
    pub no_flow_timeout_ms: u64,
    /// Dwell in FILL_COMPLETE before rearming for the next bottle (ms).
    pub settle_ms: u64,
    pub control_period_ms: u64,
    /// true: fill starts on stable presence; false: requires the fill button.
    pub auto_mode: bool,
}

impl Default for ProcessCfg {
    fn default() -> Self {
        Self {
            target_volume_ml: 500.0,
            fill_timeout_ms: 30_000,
            no_flow_timeout_ms: 5_000,
            settle_ms: 800,
            control_period_ms: 50,
            auto_mode: true,
        }
    }
}

impl From<&filler_config::ButtonsCfg> for DebounceCfg {
    fn from(c: &filler_config::ButtonsCfg) -> Self {
        Self {
            period_ms: c.period_ms,
            samples_stable: c.samples_stable,
        }
    }
}

impl From<&filler_config::PresenceCfg> for PresenceCfg {
    fn from(c: &filler_config::PresenceCfg) -> Self {
        Self {
            period_ms: c.period_ms,
            samples_stable: c.samples_stable,
            threshold_cm: c.threshold_cm,
            echo_timeout_us: c.echo_timeout_us,
        }
    }
}

// Takes the whole config so a persisted `[calibration]` section can
// override `[flow].ml_per_pulse`.
impl From<&filler_config::Config> for FlowCfg {
    fn from(c: &filler_config::Config) -> Self {
        Self {
            period_ms: c.flow.period_ms,
            ml_per_pulse: c.ml_per_pulse(),
        }
    }
}

impl From<&filler_config::ProcessCfg> for ProcessCfg {
    fn from(c: &filler_config::ProcessCfg) -> Self {
        Self {
            target_volume_ml: c.target_volume_ml,
            fill_timeout_ms: c.fill_timeout_ms,
            no_flow_timeout_ms: c.no_flow_timeout_ms,
            settle_ms: c.settle_ms,
            control_period_ms: c.control_period_ms,
            auto_mode: c.auto_mode,
        }
    }
}
