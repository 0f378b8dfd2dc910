//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "filler", version, about = "Bottle filling station CLI")]
pub struct Cli {
    /// Path to config TOML (typed)
    #[arg(long, value_name = "FILE", default_value = "etc/filler_config.toml")]
    pub config: PathBuf,

    /// Log as JSON lines instead of pretty
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    pub log_level: String,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the filling station (simulated unless built with --features hardware)
    Run {
        /// Stop after this many seconds (runs until Ctrl-C when omitted)
        #[arg(long, value_name = "SECS")]
        duration_s: Option<u64>,
        /// Override [process].auto_mode from the config
        #[arg(long, value_name = "BOOL")]
        auto: Option<bool>,
        /// Status line period in milliseconds
        #[arg(long, value_name = "MS", default_value_t = 500)]
        status_ms: u64,
    },
    /// Validate the config file and print the effective values
    CheckConfig,
    /// Fit millilitres-per-pulse from a calibration CSV (headers: pulses,ml)
    Calibrate {
        /// Calibration CSV path
        #[arg(long, value_name = "FILE")]
        csv: PathBuf,
    },
}
