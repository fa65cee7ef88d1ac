//! Open-loop stepper control with dead-reckoned position.
//!
//! The controller drives three output lines (step, direction, optional
//! enable) and times every pulse through a [`Clock`]. Position is counted
//! per pulse and published through a shared [`Position`], so observers see
//! it advance while a move is in progress.
use std::time::Duration;

use tensile_traits::{Clock, OutputLine};

use crate::config::MotionCfg;
use crate::error::{Result, RigError};
use crate::process::StopSignal;
use crate::shared::Position;
use crate::util::{feed_to_frequency_hz, step_period, steps_for_distance};

/// How a rate-controlled move ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    Reached,
    Stopped,
}

pub struct MotorController<L, C> {
    step: L,
    dir: L,
    // Held so the driver stays enabled for the controller's lifetime.
    _enable: Option<L>,
    clock: C,
    mm_per_step: f64,
    jog_period: Duration,
    position: Position,
}

impl<L, C> core::fmt::Debug for MotorController<L, C> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MotorController")
            .field("mm_per_step", &self.mm_per_step)
            .field("jog_period", &self.jog_period)
            .field("position_mm", &self.position.get())
            .finish_non_exhaustive()
    }
}

impl<L: OutputLine, C: Clock> MotorController<L, C> {
    /// Take the lines and drive enable once. EN is active-low on the
    /// step/dir drivers this rig uses, so it is pulled low here and never
    /// touched again.
    pub fn new(mut step: L, dir: L, enable: Option<L>, clock: C, cfg: &MotionCfg) -> Result<Self> {
        let mm_per_step = cfg.mm_per_step();
        if !mm_per_step.is_finite() || mm_per_step <= 0.0 || cfg.steps_per_rev == 0 {
            return Err(eyre::Report::new(RigError::Motion(format!(
                "invalid lead-screw geometry: {} mm over {} steps",
                cfg.travel_per_rev_mm, cfg.steps_per_rev
            ))));
        }
        let jog_period = step_period(cfg.jog_frequency_hz).ok_or_else(|| {
            eyre::Report::new(RigError::Motion(format!(
                "jog frequency must be > 0 Hz, got {}",
                cfg.jog_frequency_hz
            )))
        })?;

        step.set_low();
        let enable = enable.map(|mut en| {
            en.set_low();
            en
        });
        tracing::debug!(mm_per_step, jog_hz = cfg.jog_frequency_hz, "motor controller ready");

        Ok(Self {
            step,
            dir,
            _enable: enable,
            clock,
            mm_per_step,
            jog_period,
            position: Position::new(),
        })
    }

    pub fn mm_per_step(&self) -> f64 {
        self.mm_per_step
    }

    pub fn position(&self) -> f64 {
        self.position.get()
    }

    /// Shared handle observers can read while a move runs.
    pub fn position_handle(&self) -> Position {
        self.position.clone()
    }

    pub fn reset_position(&mut self) {
        self.position.set(0.0);
    }

    /// Relative move at the jog frequency. Blocks until every step is out;
    /// returns the number of steps issued.
    pub fn move_by(&mut self, distance_mm: f64) -> Result<u64> {
        if !distance_mm.is_finite() {
            return Err(eyre::Report::new(RigError::Motion(format!(
                "move distance must be finite, got {distance_mm}"
            ))));
        }
        let steps = steps_for_distance(distance_mm, self.mm_per_step);
        let forward = distance_mm >= 0.0;
        self.dir.set_level(forward);
        tracing::debug!(distance_mm, steps, "jog");
        for _ in 0..steps {
            self.pulse(forward, self.jog_period);
        }
        Ok(steps)
    }

    /// Pull forward at `feed_mm_min` until `target_mm` is covered or `stop`
    /// is observed. The stop signal is checked once before every step.
    pub fn move_at_rate(
        &mut self,
        target_mm: f64,
        feed_mm_min: f64,
        stop: &StopSignal,
    ) -> Result<MoveOutcome> {
        let hz = feed_to_frequency_hz(feed_mm_min, self.mm_per_step);
        let period = step_period(hz).ok_or_else(|| {
            eyre::Report::new(RigError::Motion(format!(
                "feed rate {feed_mm_min} mm/min gives no usable step frequency"
            )))
        })?;

        self.dir.set_high();
        tracing::debug!(target_mm, feed_mm_min, step_hz = hz, "rate move start");
        let mut steps_done: u64 = 0;
        while (steps_done as f64) * self.mm_per_step < target_mm {
            if stop.is_set() {
                tracing::debug!(steps_done, "rate move stopped");
                return Ok(MoveOutcome::Stopped);
            }
            self.pulse(true, period);
            steps_done += 1;
        }
        tracing::debug!(steps_done, "rate move reached target");
        Ok(MoveOutcome::Reached)
    }

    /// One step: high for half the period, low for the rest, then count it.
    fn pulse(&mut self, forward: bool, period: Duration) {
        let high = period / 2;
        self.step.set_high();
        self.clock.sleep(high);
        self.step.set_low();
        self.clock.sleep(period.saturating_sub(high));
        let delta = if forward {
            self.mm_per_step
        } else {
            -self.mm_per_step
        };
        self.position.advance(delta);
    }
}
