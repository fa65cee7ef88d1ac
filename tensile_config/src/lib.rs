#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema for the tensile rig.
//!
//! `Config` and its sections are deserialized from TOML and validated with
//! `Config::validate`. Every section except `[pins]` has defaults matching the
//! stock rig (1600 steps/rev on a 3.125 mm lead screw, HX711 at 80 Hz).
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct Pins {
    pub hx711_dt: u8,
    pub hx711_sck: u8,
    pub motor_step: u8,
    pub motor_dir: u8,
    pub motor_en: Option<u8>,
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct Sensor {
    /// Raw counts per force unit, used by weight readouts.
    pub reference_unit: f64,
    /// Linear factor from tared raw counts to newtons; negative on this rig
    /// so that tension reads positive.
    pub raw_to_force: f64,
    /// Max time to wait for HX711 data-ready (DT low) on a plain read.
    pub read_timeout_ms: u64,
    /// Readings averaged by a tare.
    pub tare_samples: usize,
}

impl Default for Sensor {
    fn default() -> Self {
        Self {
            reference_unit: 420.0,
            raw_to_force: -0.000_302_440_6,
            read_timeout_ms: 500,
            tare_samples: 10,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct Sampling {
    /// Target sampling period in microseconds.
    pub period_us: u64,
    /// Per-tick bound on waiting for data-ready; a miss skips the tick.
    pub tick_budget_ms: u64,
    /// Jump (N) above which a sample must be confirmed by the next one.
    pub filter_threshold: f64,
    /// Max distance (N) between the two samples confirming a jump.
    pub filter_tolerance: f64,
}

impl Default for Sampling {
    fn default() -> Self {
        Self {
            period_us: 12_500,
            tick_budget_ms: 15,
            filter_threshold: 15.0,
            filter_tolerance: 2.0,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct Motor {
    pub steps_per_rev: u32,
    pub travel_per_rev_mm: f64,
    /// Step frequency for manual moves (Hz).
    pub jog_frequency_hz: f64,
}

impl Default for Motor {
    fn default() -> Self {
        Self {
            steps_per_rev: 1600,
            travel_per_rev_mm: 3.125,
            jog_frequency_hz: 853.0,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Run {
    pub feed_rate_mm_min: f64,
    pub pull_length_mm: f64,
    /// Force drop (N) between log samples that aborts the run; 0 disables.
    pub force_drop_abort: f64,
    pub log_interval_ms: u64,
    pub log_dir: String,
    pub log_base_name: String,
}

impl Default for Run {
    fn default() -> Self {
        Self {
            feed_rate_mm_min: 5.0,
            pull_length_mm: 5.0,
            force_drop_abort: 0.0,
            log_interval_ms: 150,
            log_dir: "./logs".into(),
            log_base_name: "tensile_log".into(),
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub pins: Pins,
    #[serde(default)]
    pub sensor: Sensor,
    #[serde(default)]
    pub sampling: Sampling,
    #[serde(default)]
    pub motor: Motor,
    #[serde(default)]
    pub run: Run,
    #[serde(default)]
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Pins
        let mut used = vec![
            self.pins.hx711_dt,
            self.pins.hx711_sck,
            self.pins.motor_step,
            self.pins.motor_dir,
        ];
        used.extend(self.pins.motor_en);
        let mut sorted = used.clone();
        sorted.sort_unstable();
        sorted.dedup();
        if sorted.len() != used.len() {
            eyre::bail!("pins must be distinct, got {used:?}");
        }

        // Sensor
        if !self.sensor.reference_unit.is_finite() || self.sensor.reference_unit == 0.0 {
            eyre::bail!("sensor.reference_unit must be finite and non-zero");
        }
        if !self.sensor.raw_to_force.is_finite() || self.sensor.raw_to_force == 0.0 {
            eyre::bail!("sensor.raw_to_force must be finite and non-zero");
        }
        if self.sensor.read_timeout_ms == 0 {
            eyre::bail!("sensor.read_timeout_ms must be >= 1");
        }
        if self.sensor.tare_samples == 0 {
            eyre::bail!("sensor.tare_samples must be >= 1");
        }

        // Sampling
        if self.sampling.period_us == 0 {
            eyre::bail!("sampling.period_us must be > 0");
        }
        if self.sampling.tick_budget_ms == 0 {
            eyre::bail!("sampling.tick_budget_ms must be >= 1");
        }
        if !at_least(self.sampling.filter_threshold, 0.0) {
            eyre::bail!("sampling.filter_threshold must be >= 0");
        }
        if !at_least(self.sampling.filter_tolerance, 0.0) {
            eyre::bail!("sampling.filter_tolerance must be >= 0");
        }

        // Motor
        if self.motor.steps_per_rev == 0 {
            eyre::bail!("motor.steps_per_rev must be > 0");
        }
        if !positive(self.motor.travel_per_rev_mm) {
            eyre::bail!("motor.travel_per_rev_mm must be > 0");
        }
        if !positive(self.motor.jog_frequency_hz) {
            eyre::bail!("motor.jog_frequency_hz must be > 0");
        }

        // Run
        if !at_least(self.run.feed_rate_mm_min, 1.0) {
            eyre::bail!("run.feed_rate_mm_min must be >= 1");
        }
        if !at_least(self.run.pull_length_mm, 1.0) {
            eyre::bail!("run.pull_length_mm must be >= 1");
        }
        if !at_least(self.run.force_drop_abort, 0.0) {
            eyre::bail!("run.force_drop_abort must be >= 0");
        }
        if self.run.log_interval_ms == 0 {
            eyre::bail!("run.log_interval_ms must be >= 1");
        }
        if self.run.log_dir.trim().is_empty() {
            eyre::bail!("run.log_dir must not be empty");
        }

        // Logging
        if let Some(rot) = self.logging.rotation.as_deref()
            && !matches!(rot, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly, got {rot:?}");
        }

        Ok(())
    }
}

#[inline]
fn at_least(v: f64, min: f64) -> bool {
    v.is_finite() && v >= min
}

#[inline]
fn positive(v: f64) -> bool {
    v.is_finite() && v > 0.0
}
