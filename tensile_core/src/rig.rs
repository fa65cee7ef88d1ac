//! Command/query facade over the whole rig.
//!
//! `Rig` owns the load cell, the motor, the background sampler and the test
//! process. Every method takes `&self`, so a `Rig` can sit in an `Arc` and be
//! driven from a UI thread while a signal handler calls
//! [`Rig::request_stop`].
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tensile_hardware::Hx711;
use tensile_traits::{Clock, InputLine, OutputLine};

use crate::config::{RigConfig, TestRunConfig};
use crate::error::{Result, RigError};
use crate::motion::MotorController;
use crate::process::{ProcessState, RunResult, TestProcess};
use crate::sampler::{ForceConditioner, ForceSampler};
use crate::shared::{ForceState, Position};
use crate::util::lock;

pub type DynClock = Arc<dyn Clock + Send + Sync>;
pub type BoxedInput = Box<dyn InputLine + Send>;
pub type BoxedOutput = Box<dyn OutputLine + Send>;
pub type RigLoadCell = Hx711<BoxedInput, BoxedOutput, DynClock>;
pub type RigMotor = MotorController<BoxedOutput, DynClock>;

/// Lowest feed rate and pull length the operator can dial in.
pub const MIN_FEED_RATE_MM_MIN: f64 = 1.0;
pub const MIN_PULL_LENGTH_MM: f64 = 1.0;

/// The five lines the rig is wired with.
pub struct RigLines {
    pub hx711_dt: BoxedInput,
    pub hx711_sck: BoxedOutput,
    pub motor_step: BoxedOutput,
    pub motor_dir: BoxedOutput,
    pub motor_en: Option<BoxedOutput>,
}

/// Point-in-time view for a display.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RigSnapshot {
    pub state: ProcessState,
    pub position_mm: f64,
    pub current_force: f64,
    pub peak_force: f64,
    pub last_result: Option<RunResult>,
    pub settings: TestRunConfig,
}

pub struct Rig {
    process: TestProcess<BoxedOutput, DynClock>,
    sampler: ForceSampler,
    load_cell: Arc<Mutex<RigLoadCell>>,
    motor: Arc<Mutex<RigMotor>>,
    position: Position,
    forces: Arc<ForceState>,
    settings: Mutex<TestRunConfig>,
    tare_samples: usize,
}

impl core::fmt::Debug for Rig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Rig")
            .field("state", &self.process.state())
            .field("position_mm", &self.position.get())
            .field("current_force", &self.forces.current())
            .finish_non_exhaustive()
    }
}

impl Rig {
    /// Bring the rig up: reset and tare the load cell, enable the motor
    /// driver and start the sampler. A tare that gets no data leaves the
    /// offset at zero and is only logged.
    pub fn new(lines: RigLines, clock: DynClock, cfg: &RigConfig) -> Result<Self> {
        let mut cell = Hx711::new(
            lines.hx711_dt,
            lines.hx711_sck,
            clock.clone(),
            cfg.sensor.reference_unit,
        )
        .map_err(|e| eyre::Report::new(RigError::from(e)))?
        .with_ready_timeout(cfg.sensor.read_timeout);
        cell.reset();
        match cell.tare_checked(cfg.sensor.tare_samples) {
            Some(offset) => tracing::info!(offset, "startup tare"),
            None => tracing::warn!("startup tare got no data from the load cell; offset left at 0"),
        }

        let motor = MotorController::new(
            lines.motor_step,
            lines.motor_dir,
            lines.motor_en,
            clock.clone(),
            &cfg.motion,
        )?;
        let position = motor.position_handle();
        let motor = Arc::new(Mutex::new(motor));
        let forces = Arc::new(ForceState::new());
        let load_cell = Arc::new(Mutex::new(cell));

        let sampler = ForceSampler::spawn(
            load_cell.clone(),
            forces.clone(),
            ForceConditioner::from_cfg(cfg.sensor.raw_to_force, &cfg.sampling),
            cfg.sampling,
            clock.clone(),
        );
        let process = TestProcess::new(motor.clone(), forces.clone(), clock, cfg.log.clone());

        Ok(Self {
            process,
            sampler,
            load_cell,
            motor,
            position,
            forces,
            settings: Mutex::new(clamp_settings(cfg.run)),
            tare_samples: cfg.sensor.tare_samples,
        })
    }

    // ── Load cell ───────────────────────────────────────────────────────────

    /// Zero the load cell on the current reading. Returns the new offset.
    pub fn tare(&self) -> Result<f64> {
        let offset = lock(&self.load_cell)
            .tare_checked(self.tare_samples)
            .ok_or_else(|| {
                eyre::Report::new(RigError::Calibration(
                    "no data from the load cell during tare".into(),
                ))
            })?;
        tracing::info!(offset, "tare");
        Ok(offset)
    }

    pub fn set_reference_unit(&self, reference_unit: f64) -> Result<()> {
        lock(&self.load_cell)
            .set_reference_unit(reference_unit)
            .map_err(|e| eyre::Report::new(RigError::from(e)))
    }

    pub fn current_force(&self) -> f64 {
        self.forces.current()
    }

    /// Peak since the last reset; 0 until a sample arrives.
    pub fn peak_force(&self) -> f64 {
        self.forces.peak().unwrap_or(0.0)
    }

    pub fn reset_peak_force(&self) {
        self.forces.reset_peak();
    }

    /// Forces published by the sampler so far.
    pub fn samples_published(&self) -> u64 {
        self.forces.samples()
    }

    pub fn sampler_missed_ticks(&self) -> u64 {
        self.sampler.missed_ticks()
    }

    // ── Run settings ────────────────────────────────────────────────────────

    pub fn settings(&self) -> TestRunConfig {
        *lock(&self.settings)
    }

    /// Returns the value actually stored after clamping.
    pub fn set_feed_rate(&self, mm_min: f64) -> f64 {
        self.update_settings(|s| s.feed_rate_mm_min = mm_min)
            .feed_rate_mm_min
    }

    pub fn adjust_feed_rate(&self, delta: f64) -> f64 {
        self.update_settings(|s| s.feed_rate_mm_min += delta)
            .feed_rate_mm_min
    }

    pub fn set_pull_length(&self, mm: f64) -> f64 {
        self.update_settings(|s| s.pull_length_mm = mm).pull_length_mm
    }

    pub fn adjust_pull_length(&self, delta: f64) -> f64 {
        self.update_settings(|s| s.pull_length_mm += delta)
            .pull_length_mm
    }

    pub fn set_abort_threshold(&self, force: f64) -> f64 {
        self.update_settings(|s| s.force_drop_abort = force)
            .force_drop_abort
    }

    pub fn adjust_abort_threshold(&self, delta: f64) -> f64 {
        self.update_settings(|s| s.force_drop_abort += delta)
            .force_drop_abort
    }

    fn update_settings(&self, f: impl FnOnce(&mut TestRunConfig)) -> TestRunConfig {
        let mut guard = lock(&self.settings);
        f(&mut guard);
        *guard = clamp_settings(*guard);
        *guard
    }

    // ── Motion ──────────────────────────────────────────────────────────────

    pub fn position(&self) -> f64 {
        self.position.get()
    }

    /// Jog by `delta_mm` at the jog frequency; blocks until done.
    pub fn move_by(&self, delta_mm: f64) -> Result<u64> {
        self.refuse_while_running()?;
        lock(&self.motor).move_by(delta_mm)
    }

    pub fn return_to_zero(&self) -> Result<u64> {
        self.move_by(-self.position())
    }

    pub fn reset_position(&self) -> Result<()> {
        self.refuse_while_running()?;
        lock(&self.motor).reset_position();
        Ok(())
    }

    fn refuse_while_running(&self) -> Result<()> {
        if self.process.is_running() {
            return Err(eyre::Report::new(RigError::Busy));
        }
        Ok(())
    }

    // ── Test runs ───────────────────────────────────────────────────────────

    pub fn start_run(&self, config: TestRunConfig) -> Result<PathBuf> {
        self.process.start(config)
    }

    /// Start a run with the current feed, pull and abort settings.
    pub fn start_configured_run(&self) -> Result<PathBuf> {
        self.process.start(self.settings())
    }

    pub fn request_stop(&self) -> bool {
        self.process.request_stop()
    }

    pub fn is_running(&self) -> bool {
        self.process.is_running()
    }

    pub fn wait_for_run(&self) -> Option<RunResult> {
        self.process.wait()
    }

    pub fn wait_for_run_timeout(&self, timeout: Duration) -> Option<RunResult> {
        self.process.wait_timeout(timeout)
    }

    pub fn run_result(&self) -> Option<RunResult> {
        self.process.last_result()
    }

    pub fn last_error(&self) -> Option<String> {
        self.process.last_error()
    }

    pub fn log_file_path(&self) -> Option<PathBuf> {
        self.process.log_path()
    }

    pub fn set_log_base_name(&self, base: &str) {
        self.process.set_log_base_name(base);
    }

    pub fn state(&self) -> RigSnapshot {
        RigSnapshot {
            state: self.process.state(),
            position_mm: self.position(),
            current_force: self.current_force(),
            peak_force: self.peak_force(),
            last_result: self.run_result(),
            settings: self.settings(),
        }
    }
}

fn clamp_settings(s: TestRunConfig) -> TestRunConfig {
    TestRunConfig {
        feed_rate_mm_min: s.feed_rate_mm_min.max(MIN_FEED_RATE_MM_MIN),
        pull_length_mm: s.pull_length_mm.max(MIN_PULL_LENGTH_MM),
        force_drop_abort: s.force_drop_abort.max(0.0),
    }
}
