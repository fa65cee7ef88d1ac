//! Runtime configuration for the rig.
//!
//! These are plain structs consumed by the sampler, motor controller and test
//! process. They are separate from the TOML schema in `tensile_config`; see
//! `conversions` for the mapping.
use std::path::PathBuf;
use std::time::Duration;

/// Load-cell driver settings.
#[derive(Debug, Clone, Copy)]
pub struct SensorCfg {
    pub reference_unit: f64,
    /// Tared raw counts to newtons.
    pub raw_to_force: f64,
    pub read_timeout: Duration,
    pub tare_samples: usize,
}

impl Default for SensorCfg {
    fn default() -> Self {
        Self {
            reference_unit: 420.0,
            raw_to_force: -0.000_302_440_6,
            read_timeout: Duration::from_millis(500),
            tare_samples: 10,
        }
    }
}

/// Sampling loop pacing and the debounce filter parameters.
#[derive(Debug, Clone, Copy)]
pub struct SamplingCfg {
    pub period: Duration,
    /// Upper bound on waiting for data-ready within one tick.
    pub tick_budget: Duration,
    pub filter_threshold: f64,
    pub filter_tolerance: f64,
}

impl Default for SamplingCfg {
    fn default() -> Self {
        Self {
            period: Duration::from_micros(12_500),
            tick_budget: Duration::from_millis(15),
            filter_threshold: 15.0,
            filter_tolerance: 2.0,
        }
    }
}

/// Lead-screw geometry and manual move speed.
#[derive(Debug, Clone, Copy)]
pub struct MotionCfg {
    pub steps_per_rev: u32,
    pub travel_per_rev_mm: f64,
    pub jog_frequency_hz: f64,
}

impl MotionCfg {
    /// Carriage travel per step pulse.
    #[inline]
    pub fn mm_per_step(&self) -> f64 {
        self.travel_per_rev_mm / f64::from(self.steps_per_rev.max(1))
    }
}

impl Default for MotionCfg {
    fn default() -> Self {
        Self {
            steps_per_rev: 1600,
            travel_per_rev_mm: 3.125,
            jog_frequency_hz: 853.0,
        }
    }
}

/// Parameters of one test run, chosen by the operator before start.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TestRunConfig {
    pub feed_rate_mm_min: f64,
    pub pull_length_mm: f64,
    /// Force drop between consecutive log samples that aborts the run.
    /// Zero disables the check.
    pub force_drop_abort: f64,
}

impl Default for TestRunConfig {
    fn default() -> Self {
        Self {
            feed_rate_mm_min: 5.0,
            pull_length_mm: 5.0,
            force_drop_abort: 0.0,
        }
    }
}

/// Where and how often a run writes its data log.
#[derive(Debug, Clone)]
pub struct RunLogCfg {
    pub dir: PathBuf,
    pub base_name: String,
    pub interval: Duration,
}

impl Default for RunLogCfg {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./logs"),
            base_name: crate::run_log::DEFAULT_BASE_NAME.to_string(),
            interval: Duration::from_millis(150),
        }
    }
}

/// Everything `Rig::new` needs besides the lines and the clock.
#[derive(Debug, Clone, Default)]
pub struct RigConfig {
    pub sensor: SensorCfg,
    pub sampling: SamplingCfg,
    pub motion: MotionCfg,
    pub run: TestRunConfig,
    pub log: RunLogCfg,
}
