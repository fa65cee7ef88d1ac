//! One tensile test run.
//!
//! `start` spawns a motion thread that pulls the carriage at the feed rate;
//! the motion thread spawns a logging thread that snapshots position and
//! force at a fixed interval. Both share one [`StopSignal`]; whichever sets
//! it first decides the [`RunResult`]. The run ends when both threads have
//! exited and the log is closed.
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel as xch;
use tensile_traits::{Clock, OutputLine};

use crate::config::{RunLogCfg, TestRunConfig};
use crate::error::{Result, RigError};
use crate::motion::{MotorController, MoveOutcome};
use crate::run_log::{LogRecord, RunLog};
use crate::shared::{ForceState, Position};
use crate::util::{feed_to_frequency_hz, lock, step_period};

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunResult {
    /// Pull length reached.
    Completed,
    /// Force fell by at least the abort threshold between two log samples.
    AbortedForceDrop,
    /// Stopped on request from outside.
    AbortedExternal,
    /// The data log could not be written.
    AbortedLogFailure,
}

impl RunResult {
    const fn code(self) -> u8 {
        match self {
            Self::Completed => 1,
            Self::AbortedForceDrop => 2,
            Self::AbortedExternal => 3,
            Self::AbortedLogFailure => 4,
        }
    }

    const fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Completed),
            2 => Some(Self::AbortedForceDrop),
            3 => Some(Self::AbortedExternal),
            4 => Some(Self::AbortedLogFailure),
            _ => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::AbortedForceDrop => "aborted_force_drop",
            Self::AbortedExternal => "aborted_external",
            Self::AbortedLogFailure => "aborted_log_failure",
        }
    }
}

impl std::fmt::Display for RunResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

const NO_REASON: u8 = 0;

/// Shared stop tag. The first reason set sticks; later requests are no-ops.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicU8>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `reason` unless a reason is already set. Returns whether this call won.
    pub fn request(&self, reason: RunResult) -> bool {
        self.0
            .compare_exchange(NO_REASON, reason.code(), Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    #[inline]
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Acquire) != NO_REASON
    }

    pub fn reason(&self) -> Option<RunResult> {
        RunResult::from_code(self.0.load(Ordering::Acquire))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Idle,
    Running,
}

/// True when force fell from `previous` to `current` by at least `threshold`.
/// A threshold of zero (or less) disables the check.
#[inline]
pub fn force_drop_exceeded(previous: f64, current: f64, threshold: f64) -> bool {
    threshold > 0.0 && previous - current >= threshold
}

/// Refuse configs the motion thread could not run.
pub fn validate_run(config: &TestRunConfig, mm_per_step: f64) -> Result<()> {
    let invalid = |msg: String| Err(eyre::Report::new(RigError::InvalidConfig(msg)));
    let TestRunConfig {
        feed_rate_mm_min: feed,
        pull_length_mm: pull,
        force_drop_abort: abort,
    } = *config;
    if !feed.is_finite() || feed <= 0.0 {
        return invalid(format!("feed rate must be > 0 mm/min, got {feed}"));
    }
    if !pull.is_finite() || pull <= 0.0 {
        return invalid(format!("pull length must be > 0 mm, got {pull}"));
    }
    if !abort.is_finite() || abort < 0.0 {
        return invalid(format!("force drop threshold must be >= 0, got {abort}"));
    }
    if step_period(feed_to_frequency_hz(feed, mm_per_step)).is_none() {
        return invalid(format!("feed rate {feed} mm/min is too slow to step"));
    }
    Ok(())
}

/// Opens the data log for a run from the current log settings.
pub type LogOpener = Arc<dyn Fn(&RunLogCfg) -> Result<RunLog> + Send + Sync>;

fn open_log_file(cfg: &RunLogCfg) -> Result<RunLog> {
    RunLog::create(&cfg.dir, &cfg.base_name)
}

#[derive(Debug)]
struct RunShared {
    running: AtomicBool,
    stop: Mutex<StopSignal>,
    last_result: Mutex<Option<RunResult>>,
    last_error: Mutex<Option<String>>,
    log_path: Mutex<Option<PathBuf>>,
}

impl RunShared {
    fn record_error(&self, msg: String) {
        let mut slot = lock(&self.last_error);
        if slot.is_none() {
            *slot = Some(msg);
        }
    }
}

pub struct TestProcess<L, C> {
    motor: Arc<Mutex<MotorController<L, C>>>,
    position: Position,
    forces: Arc<ForceState>,
    clock: C,
    log_cfg: Mutex<RunLogCfg>,
    open_log: LogOpener,
    shared: Arc<RunShared>,
    handle: Mutex<Option<JoinHandle<()>>>,
    done: Mutex<Option<xch::Receiver<RunResult>>>,
}

impl<L, C> TestProcess<L, C>
where
    L: OutputLine + Send + 'static,
    C: Clock + Clone + Send + Sync + 'static,
{
    pub fn new(
        motor: Arc<Mutex<MotorController<L, C>>>,
        forces: Arc<ForceState>,
        clock: C,
        log_cfg: RunLogCfg,
    ) -> Self {
        let position = lock(&motor).position_handle();
        Self {
            motor,
            position,
            forces,
            clock,
            log_cfg: Mutex::new(log_cfg),
            open_log: Arc::new(open_log_file),
            shared: Arc::new(RunShared {
                running: AtomicBool::new(false),
                stop: Mutex::new(StopSignal::new()),
                last_result: Mutex::new(None),
                last_error: Mutex::new(None),
                log_path: Mutex::new(None),
            }),
            handle: Mutex::new(None),
            done: Mutex::new(None),
        }
    }

    /// Replace how run logs are opened; the default creates the next free
    /// CSV file in the configured directory.
    pub fn with_log_opener(mut self, open_log: LogOpener) -> Self {
        self.open_log = open_log;
        self
    }

    /// Begin a run. Refused while another run is active or when `config` is
    /// invalid; a log file that cannot be created also refuses the start and
    /// leaves everything as it was. Returns the log file path.
    pub fn start(&self, config: TestRunConfig) -> Result<PathBuf> {
        if self.is_running() {
            return Err(eyre::Report::new(RigError::Busy));
        }
        let mm_per_step = lock(&self.motor).mm_per_step();
        validate_run(&config, mm_per_step)?;
        self.reap();

        // Claim the run and install its stop signal under one lock, so a stop
        // request never sees `running` paired with the previous run's signal.
        let stop = StopSignal::new();
        {
            let mut slot = lock(&self.shared.stop);
            if self
                .shared
                .running
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                return Err(eyre::Report::new(RigError::Busy));
            }
            *slot = stop.clone();
        }

        let log_cfg = lock(&self.log_cfg).clone();
        let log = match (self.open_log)(&log_cfg) {
            Ok(log) => log,
            Err(e) => {
                self.shared.running.store(false, Ordering::Release);
                return Err(e);
            }
        };
        let path = log.path().to_path_buf();

        self.forces.reset_peak();
        lock(&self.motor).reset_position();

        *lock(&self.shared.last_result) = None;
        *lock(&self.shared.last_error) = None;
        *lock(&self.shared.log_path) = Some(path.clone());
        let (done_tx, done_rx) = xch::bounded(1);
        *lock(&self.done) = Some(done_rx);

        tracing::info!(
            feed_mm_min = config.feed_rate_mm_min,
            pull_mm = config.pull_length_mm,
            force_drop_abort = config.force_drop_abort,
            path = %path.display(),
            "run start"
        );

        let job = RunJob {
            config,
            interval: log_cfg.interval,
            motor: self.motor.clone(),
            position: self.position.clone(),
            forces: self.forces.clone(),
            clock: self.clock.clone(),
            shared: self.shared.clone(),
            stop,
        };
        let handle = std::thread::spawn(move || {
            let result = job.run(log);
            // Receiver may be gone if nobody waits; the result is also kept in `shared`.
            let _ = done_tx.send(result);
        });
        *lock(&self.handle) = Some(handle);
        Ok(path)
    }

    /// Ask the active run to stop. Returns `false` when idle or when another
    /// stop reason was already set.
    pub fn request_stop(&self) -> bool {
        let slot = lock(&self.shared.stop);
        if !self.is_running() {
            return false;
        }
        let won = slot.request(RunResult::AbortedExternal);
        drop(slot);
        if won {
            tracing::info!("external stop requested");
        }
        won
    }

    /// Block until the active run (if any) has finished and return the
    /// result of the latest run.
    pub fn wait(&self) -> Option<RunResult> {
        self.reap();
        self.last_result()
    }

    /// Like [`TestProcess::wait`] but gives up after `timeout`, returning
    /// `None` if the run is still going.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<RunResult> {
        let rx = lock(&self.done).clone()?;
        match rx.recv_timeout(timeout) {
            Ok(result) => {
                self.reap();
                Some(result)
            }
            Err(xch::RecvTimeoutError::Timeout) => None,
            Err(xch::RecvTimeoutError::Disconnected) => self.wait(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    pub fn state(&self) -> ProcessState {
        if self.is_running() {
            ProcessState::Running
        } else {
            ProcessState::Idle
        }
    }

    /// Result of the latest finished run; `None` before the first run ends
    /// and while a run is active.
    pub fn last_result(&self) -> Option<RunResult> {
        *lock(&self.shared.last_result)
    }

    pub fn last_error(&self) -> Option<String> {
        lock(&self.shared.last_error).clone()
    }

    pub fn log_path(&self) -> Option<PathBuf> {
        lock(&self.shared.log_path).clone()
    }

    /// Base name for the next run's log file.
    pub fn set_log_base_name(&self, base: &str) {
        lock(&self.log_cfg).base_name = base.to_string();
    }

    pub fn log_cfg(&self) -> RunLogCfg {
        lock(&self.log_cfg).clone()
    }

    fn reap(&self) {
        let Some(handle) = lock(&self.handle).take() else {
            return;
        };
        if handle.join().is_err() {
            tracing::error!("motion thread panicked");
            self.shared.record_error("motion thread panicked".into());
            let mut last = lock(&self.shared.last_result);
            if last.is_none() {
                *last = Some(RunResult::AbortedExternal);
            }
            drop(last);
            self.shared.running.store(false, Ordering::Release);
        }
    }
}

impl<L, C> Drop for TestProcess<L, C> {
    fn drop(&mut self) {
        if self.shared.running.load(Ordering::Acquire) {
            lock(&self.shared.stop).request(RunResult::AbortedExternal);
        }
        if let Some(handle) = lock(&self.handle).take()
            && handle.join().is_err()
        {
            tracing::warn!("motion thread panicked during shutdown");
        }
    }
}

/// Everything the motion thread owns for one run.
struct RunJob<L, C> {
    config: TestRunConfig,
    interval: Duration,
    motor: Arc<Mutex<MotorController<L, C>>>,
    position: Position,
    forces: Arc<ForceState>,
    clock: C,
    shared: Arc<RunShared>,
    stop: StopSignal,
}

impl<L, C> RunJob<L, C>
where
    L: OutputLine + Send + 'static,
    C: Clock + Clone + Send + Sync + 'static,
{
    fn run(self, log: RunLog) -> RunResult {
        let logger = {
            let logging = LoggingTask {
                position: self.position.clone(),
                forces: self.forces.clone(),
                stop: self.stop.clone(),
                threshold: self.config.force_drop_abort,
                interval: self.interval,
                clock: self.clock.clone(),
            };
            std::thread::spawn(move || logging.run(log))
        };

        let outcome = lock(&self.motor).move_at_rate(
            self.config.pull_length_mm,
            self.config.feed_rate_mm_min,
            &self.stop,
        );
        match outcome {
            Ok(MoveOutcome::Reached) => {
                self.stop.request(RunResult::Completed);
            }
            Ok(MoveOutcome::Stopped) => {}
            Err(e) => {
                tracing::error!(error = %e, "motion failed mid-run");
                self.shared.record_error(e.to_string());
                self.stop.request(RunResult::AbortedExternal);
            }
        }

        let logged = logger.join().unwrap_or_else(|_| {
            Err(eyre::Report::new(RigError::LogFile(
                "logging thread panicked".into(),
            )))
        });
        if let Err(e) = logged {
            self.stop.request(RunResult::AbortedLogFailure);
            self.shared.record_error(e.to_string());
        }

        let result = self.stop.reason().unwrap_or(RunResult::Completed);
        tracing::info!(
            result = %result,
            position_mm = self.position.get(),
            peak_force = self.forces.peak().unwrap_or(0.0),
            "run finished"
        );
        *lock(&self.shared.last_result) = Some(result);
        self.shared.running.store(false, Ordering::Release);
        result
    }
}

struct LoggingTask<C> {
    position: Position,
    forces: Arc<ForceState>,
    stop: StopSignal,
    threshold: f64,
    interval: Duration,
    clock: C,
}

impl<C: Clock> LoggingTask<C> {
    fn run(self, mut log: RunLog) -> Result<()> {
        let mut previous: Option<f64> = None;
        while !self.stop.is_set() {
            let rec = LogRecord {
                position_mm: self.position.get(),
                force: self.forces.current(),
            };
            if let Err(e) = log.append(rec) {
                tracing::error!(error = %e, "run log write failed");
                self.stop.request(RunResult::AbortedLogFailure);
                return Err(e);
            }
            if previous.is_some_and(|p| force_drop_exceeded(p, rec.force, self.threshold)) {
                if self.stop.request(RunResult::AbortedForceDrop) {
                    tracing::info!(
                        previous = previous.unwrap_or_default(),
                        current = rec.force,
                        threshold = self.threshold,
                        "force drop abort"
                    );
                }
                break;
            }
            previous = Some(rec.force);
            self.clock.sleep(self.interval);
        }
        log.close().map(|_| ())
    }
}
