//! `From` implementations bridging `tensile_config` types to `tensile_core` types.

use std::path::PathBuf;
use std::time::Duration;

use crate::config::{MotionCfg, RigConfig, RunLogCfg, SamplingCfg, SensorCfg, TestRunConfig};

// ── SensorCfg ────────────────────────────────────────────────────────────────

impl From<&tensile_config::Sensor> for SensorCfg {
    fn from(c: &tensile_config::Sensor) -> Self {
        Self {
            reference_unit: c.reference_unit,
            raw_to_force: c.raw_to_force,
            read_timeout: Duration::from_millis(c.read_timeout_ms),
            tare_samples: c.tare_samples,
        }
    }
}

// ── SamplingCfg ──────────────────────────────────────────────────────────────

impl From<&tensile_config::Sampling> for SamplingCfg {
    fn from(c: &tensile_config::Sampling) -> Self {
        Self {
            period: Duration::from_micros(c.period_us),
            tick_budget: Duration::from_millis(c.tick_budget_ms),
            filter_threshold: c.filter_threshold,
            filter_tolerance: c.filter_tolerance,
        }
    }
}

// ── MotionCfg ────────────────────────────────────────────────────────────────

impl From<&tensile_config::Motor> for MotionCfg {
    fn from(c: &tensile_config::Motor) -> Self {
        Self {
            steps_per_rev: c.steps_per_rev,
            travel_per_rev_mm: c.travel_per_rev_mm,
            jog_frequency_hz: c.jog_frequency_hz,
        }
    }
}

// ── Run ──────────────────────────────────────────────────────────────────────

impl From<&tensile_config::Run> for TestRunConfig {
    fn from(c: &tensile_config::Run) -> Self {
        Self {
            feed_rate_mm_min: c.feed_rate_mm_min,
            pull_length_mm: c.pull_length_mm,
            force_drop_abort: c.force_drop_abort,
        }
    }
}

impl From<&tensile_config::Run> for RunLogCfg {
    fn from(c: &tensile_config::Run) -> Self {
        Self {
            dir: PathBuf::from(&c.log_dir),
            base_name: c.log_base_name.clone(),
            interval: Duration::from_millis(c.log_interval_ms),
        }
    }
}

// ── RigConfig ────────────────────────────────────────────────────────────────

impl From<&tensile_config::Config> for RigConfig {
    fn from(c: &tensile_config::Config) -> Self {
        Self {
            sensor: (&c.sensor).into(),
            sampling: (&c.sampling).into(),
            motion: (&c.motor).into(),
            run: (&c.run).into(),
            log: (&c.run).into(),
        }
    }
}
