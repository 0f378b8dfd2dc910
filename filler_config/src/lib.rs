#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schemas and flow-meter calibration parsing for the filling station.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - The calibration CSV loader enforces headers and fits millilitres per
//!   pulse by least squares through the origin (a flow meter with zero
//!   pulses has dispensed zero millilitres by definition).

use serde::Deserialize;

/// Flow calibration CSV schema.
///
/// Expected headers:
/// pulses,ml
///
/// Example:
/// pulses,ml
/// 1682,100.0
/// 8409,500.0
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct CalibrationRow {
    pub pulses: u32,
    pub ml: f32,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Pins {
    pub button_start: u8,
    pub button_stop: u8,
    pub button_fill: u8,
    pub pump: u8,
    pub ultra_trig: u8,
    pub ultra_echo: u8,
    pub flow_pulse: u8,
}

impl Default for Pins {
    fn default() -> Self {
        Self {
            button_start: 25,
            button_stop: 26,
            button_fill: 27,
            pump: 23,
            ultra_trig: 18,
            ultra_echo: 19,
            flow_pulse: 34,
        }
    }
}

/// Button sampling and debounce settings. Buttons are pulled-up/active-low;
/// `samples_stable` consecutive identical samples commit a level change.
#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct ButtonsCfg {
    pub period_ms: u64,
    pub samples_stable: u8,
}

impl Default for ButtonsCfg {
    fn default() -> Self {
        Self {
            period_ms: 10,
            samples_stable: 5,
        }
    }
}

/// Bottle presence detection via the ultrasonic sensor.
#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct PresenceCfg {
    pub period_ms: u64,
    /// Consecutive disagreeing samples required to flip the stable value.
    pub samples_stable: u8,
    /// Closer than this => bottle present.
    pub threshold_cm: f32,
    /// Bounded wait for the echo pulse; a silent sensor reads as "absent".
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

/// Flow integration settings.
#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct FlowCfg {
    pub period_ms: u64,
    /// Calibration constant. The YF-S402 datasheet value is a starting
    /// point; recalibrate with `ml_new = ml_old * (v_measured / v_real)`
    /// or a calibration CSV.
    pub ml_per_pulse: f32,
}

impl Default for FlowCfg {
    fn default() -> Self {
        Self {
            period_ms: 500,
            // 16818 pulses per litre
            ml_per_pulse: 1000.0 / 16818.0,
        }
    }
}

/// Filling process parameters consumed by the state machine.
#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct ProcessCfg {
    pub target_volume_ml: f32,
    /// Hard cap on a single fill cycle (ms).
    pub fill_timeout_ms: u64,
    /// Abort if no new volume arrives for this long while filling (ms).
    pub no_flow_timeout_ms: u64,
    /// Dwell in FILL_COMPLETE before returning to WAITING_FOR_BOTTLE (ms).
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

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Persistence {
    /// Path of the record holding the lifetime counter and last fault code.
    /// Defaults to `filler_state.toml` next to the binary.
    pub file: Option<String>,
}

/// Optional persisted flow calibration; preferred over `[flow].ml_per_pulse`
/// when present.
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct PersistedCalibration {
    pub ml_per_pulse: f32,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub pins: Pins,
    pub buttons: ButtonsCfg,
    pub presence: PresenceCfg,
    pub flow: FlowCfg,
    pub process: ProcessCfg,
    pub logging: Logging,
    pub persistence: Persistence,
    pub calibration: Option<PersistedCalibration>,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

impl Config {
    /// Effective millilitres per pulse after applying persisted calibration.
    pub fn ml_per_pulse(&self) -> f32 {
        self.calibration
            .map_or(self.flow.ml_per_pulse, |c| c.ml_per_pulse)
    }

    pub fn validate(&self) -> eyre::Result<()> {
        // Buttons
        if self.buttons.period_ms == 0 {
            eyre::bail!("buttons.period_ms must be >= 1");
        }
        if self.buttons.samples_stable == 0 {
            eyre::bail!("buttons.samples_stable must be >= 1");
        }

        // Presence
        if self.presence.period_ms == 0 {
            eyre::bail!("presence.period_ms must be >= 1");
        }
        if self.presence.samples_stable == 0 {
            eyre::bail!("presence.samples_stable must be >= 1");
        }
        if !self.presence.threshold_cm.is_finite() || self.presence.threshold_cm <= 0.0 {
            eyre::bail!("presence.threshold_cm must be finite and > 0");
        }
        if self.presence.echo_timeout_us == 0 {
            eyre::bail!("presence.echo_timeout_us must be >= 1");
        }

        // Flow
        if self.flow.period_ms == 0 {
            eyre::bail!("flow.period_ms must be >= 1");
        }
        let mpp = self.ml_per_pulse();
        if !mpp.is_finite() || mpp <= 0.0 {
            eyre::bail!("ml_per_pulse must be finite and > 0");
        }

        // Process
        if !self.process.target_volume_ml.is_finite() || self.process.target_volume_ml <= 0.0 {
            eyre::bail!("process.target_volume_ml must be finite and > 0");
        }
        if self.process.fill_timeout_ms == 0 {
            eyre::bail!("process.fill_timeout_ms must be >= 1");
        }
        if self.process.fill_timeout_ms > 10 * 60 * 1000 {
            eyre::bail!("process.fill_timeout_ms is unreasonably large (>10min)");
        }
        if self.process.no_flow_timeout_ms == 0 {
            eyre::bail!("process.no_flow_timeout_ms must be >= 1");
        }
        if self.process.no_flow_timeout_ms >= self.process.fill_timeout_ms {
            eyre::bail!("process.no_flow_timeout_ms must be below process.fill_timeout_ms");
        }
        if self.process.control_period_ms == 0 {
            eyre::bail!("process.control_period_ms must be >= 1");
        }

        Ok(())
    }
}

/// Result of a flow calibration fit: millilitres dispensed per pulse.
#[derive(Debug, Clone, Copy)]
pub struct FlowCalibration {
    pub ml_per_pulse: f32,
}

impl FlowCalibration {
    /// Fit ml = k * pulses through the origin by least squares:
    /// k = Σ(p·ml) / Σ(p²). Requires at least two rows with strictly
    /// increasing pulse counts and non-negative volumes.
    pub fn from_rows(rows: &[CalibrationRow]) -> eyre::Result<Self> {
        if rows.len() < 2 {
            eyre::bail!("calibration requires at least two rows, got {}", rows.len());
        }
        for i in 1..rows.len() {
            if rows[i].pulses <= rows[i - 1].pulses {
                eyre::bail!(
                    "calibration pulse counts must be strictly increasing (rows {} and {})",
                    i - 1,
                    i
                );
            }
        }

        let mut num = 0.0f64;
        let mut den = 0.0f64;
        for r in rows {
            if !r.ml.is_finite() || r.ml < 0.0 {
                eyre::bail!("calibration ml values must be finite and >= 0");
            }
            let p = f64::from(r.pulses);
            num += p * f64::from(r.ml);
            den += p * p;
        }
        if den == 0.0 {
            eyre::bail!("calibration cannot determine slope (all pulse counts zero)");
        }
        let k = num / den;
        if !k.is_finite() || k <= 0.0 {
            eyre::bail!("calibration produced an invalid slope");
        }
        Ok(Self {
            ml_per_pulse: k as f32,
        })
    }
}

impl TryFrom<Vec<CalibrationRow>> for FlowCalibration {
    type Error = eyre::Report;
    fn try_from(rows: Vec<CalibrationRow>) -> Result<Self, Self::Error> {
        Self::from_rows(&rows)
    }
}

pub fn load_calibration_csv(path: &std::path::Path) -> eyre::Result<FlowCalibration> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(|e| eyre::eyre!("open calibration CSV {:?}: {}", path, e))?;

    // Enforce exact headers
    let headers = rdr
        .headers()
        .map_err(|e| eyre::eyre!("read CSV headers {:?}: {}", path, e))?
        .clone();
    let expected = ["pulses", "ml"];
    let actual: Vec<String> = headers.iter().map(|s| s.to_string()).collect();
    if actual != expected {
        eyre::bail!(
            "calibration CSV must have headers 'pulses,ml', got: {}",
            actual.join(",")
        );
    }

    let mut rows = Vec::new();
    for (idx, rec) in rdr.deserialize::<CalibrationRow>().enumerate() {
        match rec {
            Ok(row) => rows.push(row),
            Err(e) => {
                eyre::bail!("invalid CSV row {}: {}", idx + 2, e);
            }
        }
    }

    FlowCalibration::from_rows(&rows)
}
