use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tensile_core::{MotionCfg, MotorController, MoveOutcome, RunResult, StopSignal};
use tensile_hardware::sim::SimLine;
use tensile_traits::Clock;
use tensile_traits::clock::test_clock::TestClock;

struct Lines {
    step: SimLine,
    dir: SimLine,
    en: SimLine,
}

fn make<C: Clock>(clock: C) -> (MotorController<SimLine, C>, Lines) {
    let lines = Lines {
        step: SimLine::new(),
        dir: SimLine::new(),
        en: SimLine::new(),
    };
    let m = MotorController::new(
        lines.step.clone(),
        lines.dir.clone(),
        Some(lines.en.clone()),
        clock,
        &MotionCfg::default(),
    )
    .expect("controller");
    (m, lines)
}

#[test]
fn lead_screw_resolution() {
    let (m, _) = make(TestClock::new());
    assert_eq!(m.mm_per_step(), 0.001_953_125);
}

#[test]
fn jog_ten_mm_issues_5120_steps() {
    let clock = TestClock::new();
    let (mut m, lines) = make(clock.clone());
    assert_eq!(m.move_by(10.0).expect("move"), 5120);
    assert_eq!(lines.step.rising_edges(), 5120);
    assert!(lines.dir.level());
    assert!((m.position() - 10.0).abs() <= m.mm_per_step());
    // 5120 pulses at 853 Hz
    let secs = clock.elapsed().as_secs_f64();
    assert!((secs - 5120.0 / 853.0).abs() < 1e-3, "took {secs}s");
}

#[test]
fn enable_driven_low_once_at_construction() {
    let en = SimLine::new();
    let mut probe = en.clone();
    tensile_traits::OutputLine::set_high(&mut probe);
    let mut m = MotorController::new(
        SimLine::new(),
        SimLine::new(),
        Some(en.clone()),
        TestClock::new(),
        &MotionCfg::default(),
    )
    .expect("controller");
    assert!(!en.level());
    m.move_by(1.0).expect("move");
    assert!(!en.level());
    assert_eq!(en.rising_edges(), 1);
}

#[test]
fn rate_move_reaches_target_at_feed_speed() {
    let clock = TestClock::new();
    let (mut m, lines) = make(clock.clone());
    // 60 mm/min on 1/512 mm steps: 512 Hz, so 1 mm takes one second.
    let outcome = m
        .move_at_rate(1.0, 60.0, &StopSignal::new())
        .expect("move");
    assert_eq!(outcome, MoveOutcome::Reached);
    assert_eq!(lines.step.rising_edges(), 512);
    assert_eq!(m.position(), 1.0);
    assert_eq!(clock.elapsed(), Duration::from_secs(1));
}

#[test]
fn position_is_observable_through_handle() {
    let (mut m, _) = make(TestClock::new());
    let handle = m.position_handle();
    m.move_by(2.0).expect("move");
    assert_eq!(handle.get(), 2.0);
    m.reset_position();
    assert_eq!(handle.get(), 0.0);
}

/// Virtual clock that raises a stop after a fixed number of sleeps.
struct StopAfterSleeps {
    inner: TestClock,
    stop: StopSignal,
    remaining: AtomicU64,
}

impl Clock for StopAfterSleeps {
    fn now(&self) -> Instant {
        self.inner.now()
    }

    fn sleep(&self, d: Duration) {
        self.inner.sleep(d);
        if self.remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.stop.request(RunResult::AbortedExternal);
        }
    }
}

#[test]
fn stop_is_checked_before_every_step() {
    let stop = StopSignal::new();
    let clock = StopAfterSleeps {
        inner: TestClock::new(),
        stop: stop.clone(),
        // two sleeps per step: stop lands right after the 10th step
        remaining: AtomicU64::new(20),
    };
    let (mut m, lines) = make(clock);
    let outcome = m.move_at_rate(5.0, 5.0, &stop).expect("move");
    assert_eq!(outcome, MoveOutcome::Stopped);
    assert_eq!(lines.step.rising_edges(), 10);
    assert!((m.position() - 10.0 * m.mm_per_step()).abs() < 1e-12);
}
