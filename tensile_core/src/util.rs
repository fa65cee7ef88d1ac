//! Common time/rate helpers for tensile_core.
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// Number of seconds in one minute.
pub const SECS_PER_MIN: f64 = 60.0;

/// Step frequency (Hz) that advances the carriage at `feed_mm_min`.
#[inline]
pub fn feed_to_frequency_hz(feed_mm_min: f64, mm_per_step: f64) -> f64 {
    (feed_mm_min / SECS_PER_MIN) / mm_per_step
}

/// Period of one step pulse at `frequency_hz`, or `None` when the frequency
/// is not a finite positive number.
#[inline]
pub fn step_period(frequency_hz: f64) -> Option<Duration> {
    if !frequency_hz.is_finite() || frequency_hz <= 0.0 {
        return None;
    }
    Duration::try_from_secs_f64(frequency_hz.recip()).ok()
}

/// Whole steps needed to cover `distance_mm`, rounded to nearest.
#[inline]
pub fn steps_for_distance(distance_mm: f64, mm_per_step: f64) -> u64 {
    let steps = (distance_mm.abs() / mm_per_step).round();
    if steps.is_finite() && steps > 0.0 {
        steps as u64
    } else {
        0
    }
}

/// Lock a mutex, taking over the data if a previous holder panicked.
/// The guarded values here stay consistent across a panic (plain numbers
/// and line handles), so continuing is safe.
#[inline]
pub fn lock<T: ?Sized>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}
