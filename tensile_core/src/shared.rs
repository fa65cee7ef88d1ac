//! Values shared between the sampling loop, the motor and the caller.
//!
//! Each value has a single writer (the sampler for forces, the motor for the
//! position); readers only ever see whole `f64`s, never a torn update.
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// `f64` stored as its bit pattern in an `AtomicU64`.
#[derive(Debug, Default)]
pub struct AtomicF64(AtomicU64);

impl AtomicF64 {
    pub fn new(v: f64) -> Self {
        Self(AtomicU64::new(v.to_bits()))
    }

    #[inline]
    pub fn load(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Acquire))
    }

    #[inline]
    pub fn store(&self, v: f64) {
        self.0.store(v.to_bits(), Ordering::Release);
    }

    /// Apply `f` atomically, returning the new value.
    pub fn update(&self, mut f: impl FnMut(f64) -> f64) -> f64 {
        let mut cur = self.0.load(Ordering::Acquire);
        loop {
            let next = f(f64::from_bits(cur)).to_bits();
            match self
                .0
                .compare_exchange_weak(cur, next, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return f64::from_bits(next),
                Err(actual) => cur = actual,
            }
        }
    }
}

/// Latest filtered force and the running peak.
///
/// The peak is NaN until the first sample after a reset; [`ForceState::peak`]
/// hides that as `None`.
#[derive(Debug)]
pub struct ForceState {
    current: AtomicF64,
    peak: AtomicF64,
    samples: AtomicU64,
}

impl Default for ForceState {
    fn default() -> Self {
        Self {
            current: AtomicF64::new(0.0),
            peak: AtomicF64::new(f64::NAN),
            samples: AtomicU64::new(0),
        }
    }
}

impl ForceState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a filtered force and fold it into the peak.
    pub fn publish(&self, force: f64) {
        self.current.store(force);
        self.peak
            .update(|peak| if peak.is_nan() || force > peak { force } else { peak });
        self.samples.fetch_add(1, Ordering::AcqRel);
    }

    pub fn current(&self) -> f64 {
        self.current.load()
    }

    pub fn peak(&self) -> Option<f64> {
        let p = self.peak.load();
        (!p.is_nan()).then_some(p)
    }

    pub fn reset_peak(&self) {
        self.peak.store(f64::NAN);
    }

    /// Samples published since construction.
    pub fn samples(&self) -> u64 {
        self.samples.load(Ordering::Acquire)
    }
}

/// Carriage position in mm relative to the last reset. Cloning shares it.
#[derive(Debug, Clone, Default)]
pub struct Position(Arc<AtomicF64>);

impl Position {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn get(&self) -> f64 {
        self.0.load()
    }

    pub(crate) fn set(&self, mm: f64) {
        self.0.store(mm);
    }

    pub(crate) fn advance(&self, delta_mm: f64) {
        self.0.update(|p| p + delta_mm);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peak_unset_until_first_sample() {
        let s = ForceState::new();
        assert_eq!(s.peak(), None);
        s.publish(-3.0);
        assert_eq!(s.peak(), Some(-3.0));
        s.publish(-5.0);
        assert_eq!(s.peak(), Some(-3.0));
        assert_eq!(s.current(), -5.0);
    }

    #[test]
    fn reset_peak_keeps_current() {
        let s = ForceState::new();
        s.publish(40.0);
        s.publish(10.0);
        s.reset_peak();
        assert_eq!(s.peak(), None);
        assert_eq!(s.current(), 10.0);
        assert_eq!(s.samples(), 2);
    }

    #[test]
    fn position_clones_share_value() {
        let p = Position::new();
        let q = p.clone();
        p.advance(1.5);
        p.advance(-0.5);
        assert_eq!(q.get(), 1.0);
        q.set(0.0);
        assert_eq!(p.get(), 0.0);
    }
}
