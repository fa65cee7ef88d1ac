//! Hardware-facing traits shared across the tensile rig crates.
//!
//! The load-cell driver and the stepper controller only ever touch the rig
//! through the two line traits plus a [`Clock`], so both can be exercised
//! against simulated lines and a virtual clock. The sampling loop only needs
//! a [`LoadCell`].
pub mod clock;

pub use clock::{Clock, MonotonicClock};

use std::time::Duration;

/// A tared load-cell reading source, polled by the sampling loop.
pub trait LoadCell {
    /// One offset-corrected reading, waiting at most `timeout` for data.
    /// `None` means the converter produced nothing in time.
    fn read_value(&mut self, timeout: Duration) -> Option<f64>;
}

/// A digital input line (e.g. the HX711 data line).
pub trait InputLine {
    fn is_high(&self) -> bool;

    fn is_low(&self) -> bool {
        !self.is_high()
    }
}

/// A digital output line (clock, step, direction, enable).
pub trait OutputLine {
    fn set_high(&mut self);
    fn set_low(&mut self);

    fn set_level(&mut self, high: bool) {
        if high {
            self.set_high();
        } else {
            self.set_low();
        }
    }
}

impl<T: InputLine + ?Sized> InputLine for Box<T> {
    fn is_high(&self) -> bool {
        (**self).is_high()
    }
}

impl<T: OutputLine + ?Sized> OutputLine for Box<T> {
    fn set_high(&mut self) {
        (**self).set_high();
    }
    fn set_low(&mut self) {
        (**self).set_low();
    }
}
