#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Control core of the tensile testing rig (hardware-agnostic).
//!
//! All hardware access goes through `tensile_traits` lines, a `Clock` and
//! the `tensile_hardware` HX711 driver, so the whole rig runs against the
//! simulated lines in tests.
//!
//! ## Architecture
//!
//! - **Sampling**: background thread, load cell → force → debounce filter →
//!   shared current/peak force (`sampler`, `filter`, `shared`)
//! - **Motion**: open-loop stepper with dead-reckoned position (`motion`)
//! - **Runs**: motion + logging threads with a shared stop tag (`process`,
//!   `run_log`)
//! - **Facade**: command/query API for a UI or CLI (`rig`)

pub mod config;
pub mod conversions;
pub mod error;
pub mod filter;
pub mod motion;
pub mod process;
pub mod rig;
pub mod run_log;
pub mod sampler;
pub mod shared;
pub mod util;

pub use config::{MotionCfg, RigConfig, RunLogCfg, SamplingCfg, SensorCfg, TestRunConfig};
pub use error::{Result, RigError};
pub use filter::ForceFilter;
pub use motion::{MotorController, MoveOutcome};
pub use process::{ProcessState, RunResult, StopSignal, TestProcess};
pub use rig::{Rig, RigLines, RigSnapshot};
pub use shared::{ForceState, Position};
