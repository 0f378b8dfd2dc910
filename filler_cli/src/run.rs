//! Station assembly and the foreground run loop.

use crossbeam_channel::{RecvTimeoutError, bounded};
use eyre::WrapErr;
use filler_core::{ProcessState, SharedState, StationBuilder, StationIo};
use filler_hardware::FilePersistence;
use std::time::{Duration, Instant};
use tracing::info;

const DEFAULT_STATE_FILE: &str = "filler_state.toml";

pub struct RunSummary {
    pub duration_s: f64,
    pub final_state: ProcessState,
    pub bottles_filled: u32,
    pub lifetime_bottle_count: u32,
    pub dispensed_volume_ml: f32,
    pub last_fault_code: u8,
}

fn persistence(cfg: &filler_config::Config) -> FilePersistence {
    let path = cfg
        .persistence
        .file
        .clone()
        .unwrap_or_else(|| DEFAULT_STATE_FILE.to_string());
    FilePersistence::new(path)
}

#[cfg(feature = "hardware")]
fn build_io(cfg: &filler_config::Config) -> eyre::Result<StationIo> {
    use filler_hardware::gpio::{GpioButton, GpioPump, InterruptPulseCounter, UltrasonicRanger};

    let p = &cfg.pins;
    Ok(StationIo {
        start_button: Box::new(
            GpioButton::new(p.button_start).wrap_err("open start button pin")?,
        ),
        stop_button: Box::new(GpioButton::new(p.button_stop).wrap_err("open stop button pin")?),
        fill_button: Box::new(GpioButton::new(p.button_fill).wrap_err("open fill button pin")?),
        range: Box::new(
            UltrasonicRanger::new(p.ultra_trig, p.ultra_echo).wrap_err("open ultrasonic pins")?,
        ),
        pulses: Box::new(
            InterruptPulseCounter::new(p.flow_pulse).wrap_err("open flow pulse pin")?,
        ),
        pump: Box::new(GpioPump::new(p.pump).wrap_err("open pump pin")?),
        persist: Box::new(persistence(cfg)),
    })
}

#[cfg(not(feature = "hardware"))]
fn build_io(cfg: &filler_config::Config) -> eyre::Result<StationIo> {
    use filler_hardware::{
        SimulatedButton, SimulatedFlowCounter, SimulatedPump, SimulatedRangeSensor,
    };

    info!("no hardware feature, running simulated devices");

    // the simulated operator presses start shortly after boot, then a
    // bottle arrives; flow runs at a rate that fills the target in ~5 s
    let pump = SimulatedPump::new();
    let rate = cfg.process.target_volume_ml / (5.0 * cfg.ml_per_pulse());
    let flow = SimulatedFlowCounter::new(pump.level(), rate);

    Ok(StationIo {
        start_button: Box::new(SimulatedButton::press_after(Duration::from_millis(300))),
        stop_button: Box::new(SimulatedButton::never()),
        fill_button: Box::new(SimulatedButton::never()),
        range: Box::new(SimulatedRangeSensor::bottle_after(Duration::from_millis(
            1_500,
        ))),
        pulses: Box::new(flow),
        pump: Box::new(pump),
        persist: Box::new(persistence(cfg)),
    })
}

fn status_line(s: &SharedState) {
    println!(
        "state={} volume={:.1}ml pump={} bottle={} bottles_total={} fault_code={}",
        s.process_state,
        s.dispensed_volume_ml,
        if s.pump_on { "on" } else { "off" },
        if s.bottle_present { "yes" } else { "no" },
        s.lifetime_bottle_count,
        s.last_fault_code,
    );
}

pub fn run(
    cfg: &filler_config::Config,
    duration_s: Option<u64>,
    status_ms: u64,
    json: bool,
) -> eyre::Result<RunSummary> {
    let io = build_io(cfg)?;
    let station = StationBuilder::new().with_io(io).from_config(cfg).build()?;
    let boot_count = station.snapshot().lifetime_bottle_count;
    let started = Instant::now();

    // Ctrl-C wakes the status loop through the channel instead of polling a
    // flag, so shutdown is immediate
    let (tx, rx) = bounded::<()>(1);
    ctrlc::set_handler(move || {
        let _ = tx.try_send(());
    })
    .wrap_err("install Ctrl-C handler")?;

    let deadline = duration_s.map(|s| started + Duration::from_secs(s));
    let period = Duration::from_millis(status_ms.max(50));
    loop {
        match rx.recv_timeout(period) {
            Ok(()) => {
                info!("interrupt received, shutting down");
                break;
            }
            Err(RecvTimeoutError::Timeout) => {
                if !json {
                    status_line(&station.snapshot());
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
        if let Some(d) = deadline
            && Instant::now() >= d
        {
            info!("run duration elapsed, shutting down");
            break;
        }
    }

    let snap = station.snapshot();
    station.shutdown();

    Ok(RunSummary {
        duration_s: started.elapsed().as_secs_f64(),
        final_state: snap.process_state,
        bottles_filled: snap.lifetime_bottle_count.saturating_sub(boot_count),
        lifetime_bottle_count: snap.lifetime_bottle_count,
        dispensed_volume_ml: snap.dispensed_volume_ml,
        last_fault_code: snap.last_fault_code,
    })
}
