#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Core filling-station logic (hardware-agnostic).
//!
//! This crate provides the concurrent sensing-and-control kernel for an
//! automated bottle-filling station. All hardware interactions go through
//! the `filler_traits` seam traits.
//!
//! ## Architecture
//!
//! - **Shared state**: one mutex-owned record, whole-struct copy in/out
//!   (`state` module)
//! - **Input filters**: button debounce, presence stability, flow
//!   integration (`debounce`, `presence`, `flow`)
//! - **Control**: the filling state machine and its pure transition table
//!   (`fsm`)
//! - **Orchestration**: thread-per-concern periodic tasks (`station`)
//!
//! ## Concurrency model
//!
//! Filters own their per-channel state and publish committed results into
//! the `StateStore`; the state machine consumes whole-struct snapshots and
//! commits its tick in a single lock hold. The interrupt pulse counter is
//! the one resource outside the lock (atomic read-and-zero).

pub mod builder;
pub mod config;
pub mod debounce;
pub mod error;
pub mod flow;
pub mod fsm;
pub mod mocks;
pub mod presence;
pub mod state;
pub mod station;
pub mod util;

pub use builder::StationBuilder;
pub use config::{DebounceCfg, FlowCfg, PresenceCfg, ProcessCfg};
pub use debounce::Debouncer;
pub use error::{BuildError, FillerError, Result};
pub use flow::FlowIntegrator;
pub use fsm::{
    Effects, FaultKind, FillingMachine, ProcessState, TickInputs, TickTiming, Transition, evaluate,
};
pub use presence::PresenceFilter;
pub use state::{Button, ControlUpdate, Faults, SharedState, StateStore};
pub use station::{Station, StationIo};
