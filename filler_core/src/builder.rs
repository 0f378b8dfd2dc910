//! Validating builder for a running [`Station`].

use crate::config::{DebounceCfg, FlowCfg, PresenceCfg, ProcessCfg};
use crate::error::BuildError;
use crate::station::{Station, StationCfg, StationIo};
use filler_traits::{Clock, MonotonicClock};
use std::sync::Arc;

/// Builds a [`Station`], validating configuration before any thread is
/// spawned or any pin is touched.
///
/// ```no_run
/// # use filler_core::StationBuilder;
/// # fn io() -> filler_core::StationIo { unimplemented!() }
/// let station = StationBuilder::new().with_io(io()).build()?;
/// # Ok::<(), filler_core::BuildError>(())
/// ```
#[derive(Default)]
pub struct StationBuilder {
    io: Option<StationIo>,
    buttons: DebounceCfg,
    presence: PresenceCfg,
    flow: FlowCfg,
    process: ProcessCfg,
    clock: Option<Box<dyn Clock + Send + Sync>>,
}

impl StationBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_io(mut self, io: StationIo) -> Self {
        self.io = Some(io);
        self
    }

    pub fn with_buttons(mut self, cfg: DebounceCfg) -> Self {
        self.buttons = cfg;
        self
    }

    pub fn with_presence(mut self, cfg: PresenceCfg) -> Self {
        self.presence = cfg;
        self
    }

    pub fn with_flow(mut self, cfg: FlowCfg) -> Self {
        self.flow = cfg;
        self
    }

    pub fn with_process(mut self, cfg: ProcessCfg) -> Self {
        self.process = cfg;
        self
    }

    /// Take every tunable from a loaded TOML config in one call.
    pub fn from_config(mut self, cfg: &filler_config::Config) -> Self {
        self.buttons = DebounceCfg::from(&cfg.buttons);
        self.presence = PresenceCfg::from(&cfg.presence);
        self.flow = FlowCfg::from(cfg);
        self.process = ProcessCfg::from(&cfg.process);
        self
    }

    /// Override the time source; tests inject a simulated clock here.
    pub fn with_clock(mut self, clock: Box<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Validate and start the station.
    pub fn build(self) -> Result<Station, BuildError> {
        if self.process.target_volume_ml <= 0.0 || !self.process.target_volume_ml.is_finite() {
            return Err(BuildError::InvalidConfig("target volume must be positive"));
        }
        if self.flow.ml_per_pulse <= 0.0 || !self.flow.ml_per_pulse.is_finite() {
            return Err(BuildError::InvalidConfig("ml per pulse must be positive"));
        }
        if self.presence.threshold_cm <= 0.0 || !self.presence.threshold_cm.is_finite() {
            return Err(BuildError::InvalidConfig(
                "presence threshold must be positive",
            ));
        }
        if self.process.no_flow_timeout_ms >= self.process.fill_timeout_ms {
            return Err(BuildError::InvalidConfig(
                "no-flow timeout must be shorter than the fill timeout",
            ));
        }
        if self.process.control_period_ms == 0 {
            return Err(BuildError::InvalidConfig("control period must be nonzero"));
        }

        let io = self.io.ok_or(BuildError::MissingIo)?;

        let clock: Arc<dyn Clock + Send + Sync> = match self.clock {
            Some(c) => Arc::from(c),
            None => Arc::new(MonotonicClock::new()),
        };

        let cfg = StationCfg {
            buttons: self.buttons,
            presence: self.presence,
            flow: self.flow,
            process: self.process,
        };
        Ok(Station::start(io, cfg, clock))
    }
}
