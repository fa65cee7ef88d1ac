//! HX711 load-cell amplifier driver over two bit-banged lines.
//!
//! The driver owns the data input (DT) and clock output (SCK) lines plus a
//! [`Clock`] used for the reset hold and for polling data-ready. It keeps the
//! tare offset and the reference unit, so callers get offset-corrected values
//! and weights directly.
use std::time::Duration;

use tensile_traits::{Clock, InputLine, LoadCell, OutputLine};
use tracing::{debug, trace};

use crate::error::{HwError, Result};
use crate::util::wait_until_low_with_timeout;

/// Smallest value the 24-bit converter can report.
pub const HX711_MINIMUM: i32 = -(1 << 23);
/// Largest value the 24-bit converter can report.
pub const HX711_MAXIMUM: i32 = (1 << 23) - 1;

/// Default bound on waiting for DT to signal a new conversion.
pub const DEFAULT_READY_TIMEOUT: Duration = Duration::from_millis(500);
/// SCK hold time for reset; anything above 60 µs powers the chip down.
pub const RESET_HOLD: Duration = Duration::from_micros(600);

const READY_POLL_INTERVAL: Duration = Duration::from_micros(200);
const DATA_BITS: u32 = 24;
// Channel A, gain 128: one pulse after the data bits.
const GAIN_PULSES: u8 = 1;

/// Interpret a 24-bit two's complement pattern as a signed reading.
#[inline]
pub fn decode_twos_complement(bits: u32) -> i32 {
    let value = (bits & 0x00FF_FFFF) as i32;
    if value & 0x0080_0000 != 0 {
        value - 0x0100_0000
    } else {
        value
    }
}

pub struct Hx711<D, K, C> {
    dt: D,
    sck: K,
    clock: C,
    ready_timeout: Duration,
    offset: f64,
    reference_unit: f64,
}

impl<D, K, C> core::fmt::Debug for Hx711<D, K, C> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Hx711")
            .field("offset", &self.offset)
            .field("reference_unit", &self.reference_unit)
            .field("ready_timeout", &self.ready_timeout)
            .finish_non_exhaustive()
    }
}

impl<D: InputLine, K: OutputLine, C: Clock> Hx711<D, K, C> {
    pub fn new(dt: D, mut sck: K, clock: C, reference_unit: f64) -> Result<Self> {
        validate_reference_unit(reference_unit)?;
        sck.set_low(); // clock idle low
        Ok(Self {
            dt,
            sck,
            clock,
            ready_timeout: DEFAULT_READY_TIMEOUT,
            offset: 0.0,
            reference_unit,
        })
    }

    /// Override the data-ready bound used by [`Hx711::read_raw`].
    pub fn with_ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout = timeout;
        self
    }

    /// Power-cycle the converter: hold SCK high past the power-down
    /// threshold, then low for the same time.
    pub fn reset(&mut self) {
        self.sck.set_high();
        self.clock.sleep(RESET_HOLD);
        self.sck.set_low();
        self.clock.sleep(RESET_HOLD);
        debug!("hx711 reset");
    }

    /// DT low means a conversion is waiting to be clocked out.
    pub fn is_ready(&self) -> bool {
        self.dt.is_low()
    }

    /// Read one conversion, waiting up to the configured ready timeout.
    pub fn read_raw(&mut self) -> Option<i32> {
        self.read_raw_within(self.ready_timeout)
    }

    /// Read one conversion, waiting at most `timeout` for data-ready.
    ///
    /// Returns `None` when the converter never signalled ready, which is
    /// distinct from a genuine zero reading.
    pub fn read_raw_within(&mut self, timeout: Duration) -> Option<i32> {
        let dt = &self.dt;
        if let Err(e) =
            wait_until_low_with_timeout(|| dt.is_high(), timeout, READY_POLL_INTERVAL, &self.clock)
        {
            trace!(error = %e, timeout_us = timeout.as_micros() as u64, "hx711 no data");
            return None;
        }

        // Clock out 24 bits, MSB first; DT is valid once the pulse completes.
        let mut bits: u32 = 0;
        for _ in 0..DATA_BITS {
            self.pulse_clock();
            bits = (bits << 1) | u32::from(self.dt.is_high());
        }

        // Select gain/channel for the next conversion.
        for _ in 0..GAIN_PULSES {
            self.pulse_clock();
        }

        let raw = decode_twos_complement(bits);
        trace!(raw, "hx711 raw read");
        Some(raw)
    }

    /// Mean of `n` reads; reads that time out count as zero.
    pub fn read_average(&mut self, n: usize) -> f64 {
        let n = n.max(1);
        let total: f64 = (0..n)
            .map(|_| f64::from(self.read_raw().unwrap_or(0)))
            .sum();
        total / n as f64
    }

    /// Mean of the reads among `n` attempts that produced data, or `None`
    /// when every attempt timed out.
    pub fn read_average_checked(&mut self, n: usize) -> Option<f64> {
        let mut total = 0.0;
        let mut got = 0usize;
        for _ in 0..n.max(1) {
            if let Some(raw) = self.read_raw() {
                total += f64::from(raw);
                got += 1;
            }
        }
        (got > 0).then(|| total / got as f64)
    }

    pub fn tare(&mut self, n: usize) {
        self.offset = self.read_average(n);
        debug!(offset = self.offset, samples = n, "hx711 tare");
    }

    /// Tare only if at least one read produced data; returns the new offset.
    pub fn tare_checked(&mut self, n: usize) -> Option<f64> {
        let offset = self.read_average_checked(n)?;
        self.offset = offset;
        debug!(offset, samples = n, "hx711 tare");
        Some(offset)
    }

    pub fn get_value(&mut self, n: usize) -> f64 {
        self.read_average(n) - self.offset
    }

    pub fn get_weight(&mut self, n: usize) -> f64 {
        self.get_value(n) / self.reference_unit
    }

    /// One offset-corrected reading, bounded by `timeout`.
    pub fn read_value_within(&mut self, timeout: Duration) -> Option<f64> {
        self.read_raw_within(timeout)
            .map(|raw| f64::from(raw) - self.offset)
    }

    pub fn set_reference_unit(&mut self, reference_unit: f64) -> Result<()> {
        validate_reference_unit(reference_unit)?;
        self.reference_unit = reference_unit;
        Ok(())
    }

    pub fn reference_unit(&self) -> f64 {
        self.reference_unit
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    pub fn set_offset(&mut self, offset: f64) {
        self.offset = offset;
    }

    #[inline]
    fn pulse_clock(&mut self) {
        self.sck.set_high();
        spin_delay();
        self.sck.set_low();
        spin_delay();
    }
}

impl<D: InputLine, K: OutputLine, C: Clock> LoadCell for Hx711<D, K, C> {
    fn read_value(&mut self, timeout: Duration) -> Option<f64> {
        self.read_value_within(timeout)
    }
}

fn validate_reference_unit(reference_unit: f64) -> Result<()> {
    if !reference_unit.is_finite() || reference_unit == 0.0 {
        return Err(HwError::InvalidReferenceUnit(reference_unit));
    }
    Ok(())
}

#[inline(always)]
fn spin_delay() {
    // SCK must stay high well under 60 µs; a few cycles is plenty.
    for _ in 0..8 {
        std::hint::spin_loop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimHx711;
    use tensile_traits::clock::test_clock::TestClock;

    type SimDriver = Hx711<crate::sim::SimDataLine, crate::sim::SimClockLine, TestClock>;

    fn driver(sim: &SimHx711) -> SimDriver {
        let (dt, sck) = sim.lines();
        Hx711::new(dt, sck, TestClock::new(), 1.0).unwrap()
    }

    #[test]
    fn decodes_twos_complement_extremes() {
        assert_eq!(decode_twos_complement(0x80_0000), -8_388_608);
        assert_eq!(decode_twos_complement(0x7F_FFFF), 8_388_607);
        assert_eq!(decode_twos_complement(0x00_0001), 1);
        assert_eq!(decode_twos_complement(0xFF_FFFF), -1);
        assert_eq!(decode_twos_complement(0), 0);
    }

    #[test]
    fn decode_ignores_bits_above_24() {
        assert_eq!(decode_twos_complement(0xFF00_0005), 5);
    }

    #[test]
    fn read_clocks_25_pulses_per_conversion() {
        let sim = SimHx711::new();
        sim.push(-1234);
        let mut hx = driver(&sim);
        assert_eq!(hx.read_raw(), Some(-1234));
        assert_eq!(sim.pulses_seen(), 25);
    }

    #[test]
    fn timeout_is_none_not_zero() {
        let sim = SimHx711::new();
        let mut hx = driver(&sim);
        assert_eq!(hx.read_raw_within(Duration::from_millis(15)), None);
        assert_eq!(sim.pulses_seen(), 0);

        sim.push(0);
        assert_eq!(hx.read_raw(), Some(0));
    }

    #[test]
    fn average_counts_missing_reads_as_zero() {
        let sim = SimHx711::new();
        sim.extend([100, 300]);
        let mut hx = driver(&sim);
        // Third and fourth reads time out.
        assert!((hx.read_average(4) - 100.0).abs() < 1e-9);
    }

    #[test]
    fn checked_average_skips_missing_reads() {
        let sim = SimHx711::new();
        sim.extend([100, 300]);
        let mut hx = driver(&sim);
        assert_eq!(hx.read_average_checked(4), Some(200.0));
        assert_eq!(hx.read_average_checked(2), None);
    }

    #[test]
    fn tare_then_value_and_weight() {
        let sim = SimHx711::new();
        sim.extend([1000, 1002]);
        let mut hx = driver(&sim);
        hx.set_reference_unit(4.0).unwrap();
        hx.tare(2);
        assert!((hx.offset() - 1001.0).abs() < 1e-9);

        sim.push(1401);
        assert!((hx.get_weight(1) - 100.0).abs() < 1e-9);
    }

    #[test]
    fn rejects_zero_reference_unit() {
        let sim = SimHx711::new();
        let mut hx = driver(&sim);
        assert!(matches!(
            hx.set_reference_unit(0.0),
            Err(HwError::InvalidReferenceUnit(_))
        ));
        assert_eq!(hx.reference_unit(), 1.0);
    }

    #[test]
    fn reset_does_not_consume_a_conversion() {
        let sim = SimHx711::new();
        sim.push(42);
        let mut hx = driver(&sim);
        hx.reset();
        assert_eq!(hx.read_raw(), Some(42));
    }
}
