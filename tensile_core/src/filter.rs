//! Two-sample debounce filter for force readings.
//!
//! Small moves pass straight through. A jump larger than `threshold` is held
//! back as a candidate and only accepted if the next sample lands within
//! `tolerance` of it, in which case the two are averaged. Anything else
//! discards the candidate and keeps the last accepted value.
//!
//! While a candidate is pending, the next sample is judged only against the
//! candidate, not against `threshold`: `[0, 20, 5]` yields `[0, 0, 0]`, the
//! 5 being dropped together with the unconfirmed 20. The threshold rule
//! applies again from the sample after that.

/// Debounce state: at most one pending candidate at any time.
#[derive(Debug, Clone)]
pub struct ForceFilter {
    threshold: f64,
    tolerance: f64,
    last_accepted: Option<f64>,
    pending: Option<f64>,
}

impl Default for ForceFilter {
    fn default() -> Self {
        Self::new(15.0, 2.0)
    }
}

impl ForceFilter {
    pub fn new(threshold: f64, tolerance: f64) -> Self {
        Self {
            threshold,
            tolerance,
            last_accepted: None,
            pending: None,
        }
    }

    /// Feed one sample and return the filtered value.
    pub fn process(&mut self, sample: f64) -> f64 {
        let Some(last) = self.last_accepted else {
            return self.accept(sample);
        };

        if let Some(candidate) = self.pending.take() {
            if (sample - candidate).abs() <= self.tolerance {
                return self.accept((candidate + sample) / 2.0);
            }
            tracing::trace!(candidate, sample, "force jump not confirmed");
            return last;
        }

        if (sample - last).abs() <= self.threshold {
            return self.accept(sample);
        }

        self.pending = Some(sample);
        last
    }

    /// Forget both the accepted value and any candidate.
    pub fn reset(&mut self) {
        self.last_accepted = None;
        self.pending = None;
    }

    pub fn last_accepted(&self) -> Option<f64> {
        self.last_accepted
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    #[inline]
    fn accept(&mut self, value: f64) -> f64 {
        self.last_accepted = Some(value);
        self.pending = None;
        value
    }
}
