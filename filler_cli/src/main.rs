mod cli;
mod logging;
mod run;

use clap::Parser;
use cli::{Cli, Commands};
use eyre::WrapErr;
use serde_json::json;
use std::fs;
use tracing::info;

fn load_config(path: &std::path::Path) -> eyre::Result<filler_config::Config> {
    if !path.exists() {
        return Ok(filler_config::Config::default());
    }
    let text = fs::read_to_string(path)
        .wrap_err_with(|| format!("read config file {}", path.display()))?;
    filler_config::load_toml(&text)
        .wrap_err_with(|| format!("parse config file {}", path.display()))
}

fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    let mut cfg = load_config(&cli.config)?;
    logging::init(&cfg.logging, cli.json, &cli.log_level)?;
    if !cli.config.exists() {
        info!(path = %cli.config.display(), "config file not found, using defaults");
    }
    cfg.validate().wrap_err("invalid configuration")?;

    match cli.cmd {
        Commands::Run {
            duration_s,
            auto,
            status_ms,
        } => {
            if let Some(auto) = auto {
                cfg.process.auto_mode = auto;
            }
            let summary = run::run(&cfg, duration_s, status_ms, cli.json)?;
            if cli.json {
                println!(
                    "{}",
                    json!({
                        "duration_s": summary.duration_s,
                        "final_state": summary.final_state.name(),
                        "bottles_filled": summary.bottles_filled,
                        "lifetime_bottle_count": summary.lifetime_bottle_count,
                        "dispensed_volume_ml": summary.dispensed_volume_ml,
                        "last_fault_code": summary.last_fault_code,
                    })
                );
            } else {
                println!(
                    "run finished after {:.1}s: state={} bottles_filled={} total={} fault_code={}",
                    summary.duration_s,
                    summary.final_state,
                    summary.bottles_filled,
                    summary.lifetime_bottle_count,
                    summary.last_fault_code,
                );
            }
        }
        Commands::CheckConfig => {
            if cli.json {
                println!(
                    "{}",
                    json!({
                        "ok": true,
                        "target_volume_ml": cfg.process.target_volume_ml,
                        "ml_per_pulse": cfg.ml_per_pulse(),
                        "auto_mode": cfg.process.auto_mode,
                        "fill_timeout_ms": cfg.process.fill_timeout_ms,
                        "no_flow_timeout_ms": cfg.process.no_flow_timeout_ms,
                    })
                );
            } else {
                println!("config OK");
                println!("  target volume: {:.1} ml", cfg.process.target_volume_ml);
                println!("  ml per pulse:  {:.6}", cfg.ml_per_pulse());
                println!("  auto mode:     {}", cfg.process.auto_mode);
                println!(
                    "  timeouts:      fill {} ms, no-flow {} ms",
                    cfg.process.fill_timeout_ms, cfg.process.no_flow_timeout_ms
                );
            }
        }
        Commands::Calibrate { csv } => {
            let cal = filler_config::load_calibration_csv(&csv)?;
            if cli.json {
                println!("{}", json!({ "ml_per_pulse": cal.ml_per_pulse }));
            } else {
                println!("ml_per_pulse = {:.6}", cal.ml_per_pulse);
                println!("add to the config to persist:");
                println!("  [calibration]");
                println!("  ml_per_pulse = {:.6}", cal.ml_per_pulse);
            }
        }
    }

    Ok(())
}
