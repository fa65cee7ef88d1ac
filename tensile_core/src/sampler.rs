//! Background force sampling.
//!
//! Spawns a thread that polls the shared load cell at a fixed period, turns
//! each tared reading into a force, runs it through [`ForceFilter`] and
//! publishes the result to [`ForceState`]. A tick whose read exceeds the
//! budget is skipped and the previous force stays published.
//!
//! Each `ForceSampler` owns exactly one thread, shut down and joined when the
//! sampler is dropped.
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use tensile_traits::{Clock, LoadCell};

use crate::config::SamplingCfg;
use crate::filter::ForceFilter;
use crate::shared::ForceState;
use crate::util::lock;

/// Tared raw counts → force → debounce filter.
#[derive(Debug, Clone)]
pub struct ForceConditioner {
    raw_to_force: f64,
    filter: ForceFilter,
}

impl ForceConditioner {
    pub fn new(raw_to_force: f64, filter: ForceFilter) -> Self {
        Self {
            raw_to_force,
            filter,
        }
    }

    pub fn from_cfg(raw_to_force: f64, cfg: &SamplingCfg) -> Self {
        Self::new(
            raw_to_force,
            ForceFilter::new(cfg.filter_threshold, cfg.filter_tolerance),
        )
    }

    /// Filtered force for one offset-corrected reading.
    #[inline]
    pub fn condition(&mut self, tared_counts: f64) -> f64 {
        self.filter.process(tared_counts * self.raw_to_force)
    }

    /// One sampling step: read within `budget`, condition and publish.
    /// Returns the published force, or `None` when the tick was skipped.
    pub fn tick<L: LoadCell + ?Sized>(
        &mut self,
        cell: &mut L,
        budget: std::time::Duration,
        state: &ForceState,
    ) -> Option<f64> {
        let tared = cell.read_value(budget)?;
        let force = self.condition(tared);
        state.publish(force);
        Some(force)
    }
}

pub struct ForceSampler {
    shutdown: Arc<AtomicBool>,
    missed: Arc<AtomicU64>,
    join_handle: Option<JoinHandle<()>>,
}

impl ForceSampler {
    pub fn spawn<L, C>(
        cell: Arc<Mutex<L>>,
        state: Arc<ForceState>,
        mut conditioner: ForceConditioner,
        cfg: SamplingCfg,
        clock: C,
    ) -> Self
    where
        L: LoadCell + Send + 'static,
        C: Clock + Send + Sync + 'static,
    {
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();
        let missed = Arc::new(AtomicU64::new(0));
        let missed_clone = missed.clone();
        let period = cfg.period;
        let budget = cfg.tick_budget;

        let join_handle = std::thread::spawn(move || {
            tracing::debug!(
                period_us = period.as_micros() as u64,
                budget_ms = budget.as_millis() as u64,
                "force sampler started"
            );
            loop {
                if shutdown_clone.load(Ordering::Relaxed) {
                    tracing::debug!("force sampler received shutdown signal");
                    break;
                }

                let tick_start = clock.now();
                let published = {
                    let mut guard = lock(&cell);
                    conditioner.tick(&mut *guard, budget, &state)
                };
                match published {
                    Some(force) => tracing::trace!(force, "force sample"),
                    None => {
                        missed_clone.fetch_add(1, Ordering::Relaxed);
                        tracing::trace!("sample tick skipped, no data within budget");
                    }
                }

                if shutdown_clone.load(Ordering::Relaxed) {
                    break;
                }
                // Sleep out the rest of the period; an overrun starts the
                // next tick immediately without catching up.
                let elapsed = clock.now().saturating_duration_since(tick_start);
                if let Some(rest) = period.checked_sub(elapsed) {
                    clock.sleep(rest);
                }
            }
            tracing::trace!("force sampler exiting cleanly");
        });

        Self {
            shutdown,
            missed,
            join_handle: Some(join_handle),
        }
    }

    /// Ticks skipped because the load cell had no data within the budget.
    pub fn missed_ticks(&self) -> u64 {
        self.missed.load(Ordering::Relaxed)
    }
}

impl Drop for ForceSampler {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        // The thread exits after at most one read budget plus one period.
        if let Some(handle) = self.join_handle.take() {
            match handle.join() {
                Ok(()) => tracing::trace!("force sampler joined"),
                Err(e) => tracing::warn!(?e, "force sampler panicked during shutdown"),
            }
        }
    }
}
