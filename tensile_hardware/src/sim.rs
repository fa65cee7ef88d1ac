//! Simulated lines for running the rig without GPIO.
//!
//! [`SimHx711`] models the amplifier at the bit level: DT stays high until a
//! conversion is available, then shifts one bit out per SCK rising edge and
//! consumes the conversion on the 25th pulse. [`SimLine`] is a plain output
//! line that records its level and rising edges, used for step/dir/enable.
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tensile_traits::{InputLine, OutputLine};

type Source = Box<dyn FnMut() -> Option<i32> + Send>;

#[derive(Default)]
struct Hx711State {
    queue: VecDeque<i32>,
    source: Option<Source>,
    // Conversion being shifted out, as 24-bit pattern.
    current: Option<u32>,
    // Rising edges seen in the current frame.
    frame_pulses: u8,
    // The reader has observed DT low; only then do clock edges shift data.
    armed: bool,
    sck_high: bool,
    pulses_seen: u64,
}

impl Hx711State {
    fn load_next(&mut self) {
        if self.current.is_some() {
            return;
        }
        let next = match self.queue.pop_front() {
            Some(v) => Some(v),
            None => self.source.as_mut().and_then(|f| f()),
        };
        self.current = next.map(|v| (v as u32) & 0x00FF_FFFF);
    }

    fn data_level(&mut self) -> bool {
        if self.armed && (1..=24).contains(&self.frame_pulses) {
            let bit = 24 - u32::from(self.frame_pulses);
            return self.current.is_some_and(|bits| (bits >> bit) & 1 == 1);
        }
        if self.frame_pulses == 0 {
            self.load_next();
            if self.current.is_some() {
                self.armed = true;
                return false;
            }
        }
        true
    }

    fn rising_edge(&mut self) {
        if !self.armed {
            return;
        }
        self.pulses_seen += 1;
        self.frame_pulses += 1;
        if self.frame_pulses >= 25 {
            self.current = None;
            self.frame_pulses = 0;
            self.armed = false;
        }
    }
}

/// Bit-level HX711 model. Clone to share between the test and the lines.
#[derive(Clone, Default)]
pub struct SimHx711 {
    state: Arc<Mutex<Hx711State>>,
}

impl SimHx711 {
    pub fn new() -> Self {
        Self::default()
    }

    /// Produce conversions on demand once the queue is empty; returning
    /// `None` leaves DT high (no data).
    pub fn with_source(self, source: impl FnMut() -> Option<i32> + Send + 'static) -> Self {
        self.lock().source = Some(Box::new(source));
        self
    }

    pub fn push(&self, raw: i32) {
        self.lock().queue.push_back(raw);
    }

    pub fn extend(&self, raws: impl IntoIterator<Item = i32>) {
        self.lock().queue.extend(raws);
    }

    /// Clock pulses that shifted data (including gain pulses).
    pub fn pulses_seen(&self) -> u64 {
        self.lock().pulses_seen
    }

    pub fn lines(&self) -> (SimDataLine, SimClockLine) {
        (
            SimDataLine { sim: self.clone() },
            SimClockLine { sim: self.clone() },
        )
    }

    fn lock(&self) -> MutexGuard<'_, Hx711State> {
        // A panic while holding the lock only happens in a failing test.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

pub struct SimDataLine {
    sim: SimHx711,
}

impl InputLine for SimDataLine {
    fn is_high(&self) -> bool {
        self.sim.lock().data_level()
    }
}

pub struct SimClockLine {
    sim: SimHx711,
}

impl OutputLine for SimClockLine {
    fn set_high(&mut self) {
        let mut st = self.sim.lock();
        if !st.sck_high {
            st.sck_high = true;
            st.rising_edge();
        }
    }

    fn set_low(&mut self) {
        self.sim.lock().sck_high = false;
    }
}

#[derive(Debug, Default)]
struct LineState {
    high: AtomicBool,
    rising_edges: AtomicU64,
}

/// Output line that records its level; clones observe the same line.
#[derive(Debug, Clone, Default)]
pub struct SimLine {
    state: Arc<LineState>,
}

impl SimLine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn level(&self) -> bool {
        self.state.high.load(Ordering::Acquire)
    }

    pub fn rising_edges(&self) -> u64 {
        self.state.rising_edges.load(Ordering::Acquire)
    }
}

impl OutputLine for SimLine {
    fn set_high(&mut self) {
        if !self.state.high.swap(true, Ordering::AcqRel) {
            self.state.rising_edges.fetch_add(1, Ordering::AcqRel);
        }
    }

    fn set_low(&mut self) {
        self.state.high.store(false, Ordering::Release);
    }
}

impl InputLine for SimLine {
    fn is_high(&self) -> bool {
        self.level()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_line_high_until_conversion_available() {
        let sim = SimHx711::new();
        let (dt, _sck) = sim.lines();
        assert!(dt.is_high());
        sim.push(5);
        assert!(dt.is_low());
    }

    #[test]
    fn source_feeds_when_queue_empty() {
        let mut n = 0;
        let sim = SimHx711::new().with_source(move || {
            n += 1;
            (n <= 1).then_some(7)
        });
        let (dt, _sck) = sim.lines();
        assert!(dt.is_low());
    }

    #[test]
    fn sim_line_counts_rising_edges_only() {
        let mut line = SimLine::new();
        let probe = line.clone();
        line.set_high();
        line.set_high();
        line.set_low();
        line.set_high();
        assert_eq!(probe.rising_edges(), 2);
        assert!(probe.level());
    }
}
