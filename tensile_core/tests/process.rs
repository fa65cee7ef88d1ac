//! End-to-end runs on simulated motor lines and a real clock.
use std::io::{self, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tensile_core::{
    ForceState, MotionCfg, MotorController, Position, ProcessState, RigError, RunLogCfg,
    RunResult, TestProcess, TestRunConfig,
};
use tensile_core::process::LogOpener;
use tensile_core::run_log::{LogWriter, RunLog};
use tensile_hardware::sim::SimLine;
use tensile_traits::MonotonicClock;

type SimProcess = TestProcess<SimLine, MonotonicClock>;

struct Harness {
    process: SimProcess,
    forces: Arc<ForceState>,
    motor: Arc<Mutex<MotorController<SimLine, MonotonicClock>>>,
    // readable while a run holds the motor
    position: Position,
    step: SimLine,
}

fn harness(log_dir: &Path) -> Harness {
    let step = SimLine::new();
    let motor = MotorController::new(
        step.clone(),
        SimLine::new(),
        None,
        MonotonicClock::new(),
        &MotionCfg::default(),
    )
    .expect("controller");
    let position = motor.position_handle();
    let motor = Arc::new(Mutex::new(motor));
    let forces = Arc::new(ForceState::new());
    let log_cfg = RunLogCfg {
        dir: log_dir.to_path_buf(),
        base_name: "run".into(),
        interval: Duration::from_millis(10),
    };
    let process = TestProcess::new(motor.clone(), forces.clone(), MonotonicClock::new(), log_cfg);
    Harness {
        process,
        forces,
        motor,
        position,
        step,
    }
}

fn fast_pull() -> TestRunConfig {
    TestRunConfig {
        feed_rate_mm_min: 600.0,
        pull_length_mm: 1.0,
        force_drop_abort: 0.0,
    }
}

fn slow_pull(force_drop_abort: f64) -> TestRunConfig {
    TestRunConfig {
        feed_rate_mm_min: 1.0,
        pull_length_mm: 5.0,
        force_drop_abort,
    }
}

const WAIT: Duration = Duration::from_secs(10);

#[test]
fn run_completes_at_pull_length() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(dir.path());
    let path = h.process.start(fast_pull()).expect("start");
    assert_eq!(path, dir.path().join("run_1.csv"));

    assert_eq!(h.process.wait_timeout(WAIT), Some(RunResult::Completed));
    assert_eq!(h.process.state(), ProcessState::Idle);
    assert_eq!(h.step.rising_edges(), 512);
    assert_eq!(h.motor.lock().unwrap().position(), 1.0);
    assert_eq!(h.process.last_result(), Some(RunResult::Completed));
    assert_eq!(h.process.last_error(), None);

    let text = std::fs::read_to_string(&path).unwrap();
    let mut lines = text.lines();
    assert_eq!(lines.next(), Some("Position;Force"));
    let mut last_pos = -1.0;
    let mut rows = 0;
    for line in lines {
        let (pos, force) = line.split_once(';').expect("two columns");
        assert_eq!(pos.split_once('.').map(|(_, d)| d.len()), Some(2), "{line}");
        assert_eq!(force, "0.00");
        let pos: f64 = pos.parse().unwrap();
        assert!(pos >= last_pos, "positions must not go backwards");
        last_pos = pos;
        rows += 1;
    }
    assert!(rows >= 1);
}

#[test]
fn force_drop_aborts_run() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(dir.path());
    h.forces.publish(50.0);
    h.process.start(slow_pull(15.0)).expect("start");
    std::thread::sleep(Duration::from_millis(60));
    h.forces.publish(30.0);

    assert_eq!(h.process.wait_timeout(WAIT), Some(RunResult::AbortedForceDrop));
    assert!(!h.process.is_running());
    // stopped long before 5 mm at 1 mm/min
    assert!(h.position.get() < 0.1);

    let text = std::fs::read_to_string(h.process.log_path().unwrap()).unwrap();
    assert!(text.lines().last().unwrap().ends_with(";30.00"));
}

#[test]
fn drop_below_threshold_keeps_running() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(dir.path());
    h.forces.publish(50.0);
    h.process.start(slow_pull(25.0)).expect("start");
    std::thread::sleep(Duration::from_millis(40));
    h.forces.publish(30.0);
    std::thread::sleep(Duration::from_millis(40));

    assert!(h.process.is_running());
    assert!(h.process.request_stop());
    assert_eq!(h.process.wait_timeout(WAIT), Some(RunResult::AbortedExternal));
}

#[test]
fn external_stop_is_reported_and_idle_stop_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(dir.path());
    assert!(!h.process.request_stop());

    h.process.start(slow_pull(0.0)).expect("start");
    assert_eq!(h.process.state(), ProcessState::Running);
    assert!(h.process.request_stop());
    assert!(!h.process.request_stop());
    assert_eq!(h.process.wait(), Some(RunResult::AbortedExternal));
    assert!(!h.process.request_stop());
}

#[test]
fn second_start_while_running_is_busy() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(dir.path());
    h.process.start(slow_pull(0.0)).expect("start");
    let err = h.process.start(fast_pull()).unwrap_err();
    assert_eq!(err.downcast_ref::<RigError>(), Some(&RigError::Busy));
    // the refused start did not allocate a second log
    assert!(!dir.path().join("run_2.csv").exists());
    h.process.request_stop();
    h.process.wait();
}

#[test]
fn start_resets_peak_and_position() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(dir.path());
    h.motor.lock().unwrap().move_by(0.1).expect("jog");
    h.forces.publish(80.0);

    h.process.start(slow_pull(0.0)).expect("start");
    assert_eq!(h.forces.peak(), None);
    assert!(h.position.get() < 0.01);
    h.process.request_stop();
    h.process.wait();
}

#[test]
fn unwritable_log_dir_refuses_start() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("not_a_dir");
    std::fs::write(&blocker, b"x").unwrap();
    let h = harness(&blocker);
    h.forces.publish(12.0);

    let err = h.process.start(fast_pull()).unwrap_err();
    assert!(matches!(err.downcast_ref::<RigError>(), Some(RigError::LogFile(_))));
    assert_eq!(h.process.state(), ProcessState::Idle);
    assert_eq!(h.process.last_result(), None);
    assert_eq!(h.process.log_path(), None);
    assert_eq!(h.forces.peak(), Some(12.0));
    assert_eq!(h.step.rising_edges(), 0);
}

#[test]
fn invalid_config_refused_without_side_effects() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(dir.path());
    let err = h
        .process
        .start(TestRunConfig {
            feed_rate_mm_min: 0.0,
            ..fast_pull()
        })
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<RigError>(),
        Some(RigError::InvalidConfig(_))
    ));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn consecutive_runs_use_new_files() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(dir.path());
    h.process.start(fast_pull()).expect("first");
    h.process.wait();
    h.process.set_log_base_name("sample");
    let second = h.process.start(fast_pull()).expect("second");
    h.process.wait();
    assert_eq!(second, dir.path().join("sample_1.csv"));
    assert!(dir.path().join("run_1.csv").exists());
}

/// Accepts the header plus `rows_ok` rows, then fails every write.
struct FailingSink {
    rows_ok: usize,
    writes: Arc<AtomicUsize>,
    dropped: Arc<AtomicBool>,
}

impl Write for FailingSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.writes.fetch_add(1, Ordering::AcqRel) > self.rows_ok {
            return Err(io::Error::other("disk full"));
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for FailingSink {
    fn drop(&mut self) {
        self.dropped.store(true, Ordering::Release);
    }
}

#[test]
fn log_write_failure_aborts_run() {
    let dir = tempfile::tempdir().unwrap();
    let writes = Arc::new(AtomicUsize::new(0));
    let dropped = Arc::new(AtomicBool::new(false));
    let opener: LogOpener = {
        let writes = writes.clone();
        let dropped = dropped.clone();
        Arc::new(move |cfg: &RunLogCfg| {
            let sink = FailingSink {
                rows_ok: 3,
                writes: writes.clone(),
                dropped: dropped.clone(),
            };
            RunLog::with_writer(Box::new(sink) as LogWriter, cfg.dir.join("failing.csv"))
        })
    };
    let h = harness(dir.path());
    let process = h.process.with_log_opener(opener);

    process.start(slow_pull(0.0)).expect("start");
    assert_eq!(process.wait_timeout(WAIT), Some(RunResult::AbortedLogFailure));
    assert_eq!(process.state(), ProcessState::Idle);
    let err = process.last_error().expect("log error kept");
    assert!(err.contains("disk full"), "{err}");
    assert!(dropped.load(Ordering::Acquire), "writer still held after the run");
    // header + 3 rows went through before the failing write
    assert!(writes.load(Ordering::Acquire) >= 5);
    // 5 mm at 1 mm/min would take minutes
    assert!(h.position.get() < 0.1);
}

#[test]
fn stop_right_after_restart_reaches_new_run() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(dir.path());
    h.process.start(fast_pull()).expect("first");
    assert_eq!(h.process.wait(), Some(RunResult::Completed));

    h.process.start(slow_pull(0.0)).expect("second");
    assert!(h.process.request_stop());
    assert_eq!(h.process.wait_timeout(WAIT), Some(RunResult::AbortedExternal));
}
