//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[inline]
pub fn json_mode() -> bool {
    JSON_MODE.get().copied().unwrap_or(false)
}

#[derive(Parser, Debug)]
#[command(name = "tensile", version, about = "Tensile test rig CLI")]
pub struct Cli {
    /// Path to config TOML (typed)
    #[arg(long, value_name = "FILE", default_value = "etc/tensile_config.toml")]
    pub config: PathBuf,

    /// Log and report as JSON lines instead of pretty text
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace); defaults to [logging].level
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one tensile test (Ctrl-C stops it)
    Pull {
        /// Feed rate in mm/min (clamped to >= 1); defaults to [run] in the config
        #[arg(long, value_name = "MM_PER_MIN")]
        feed: Option<f64>,
        /// Pull length in mm (clamped to >= 1)
        #[arg(long, value_name = "MM")]
        length: Option<f64>,
        /// Force drop between log samples that aborts the run; 0 disables
        #[arg(long, value_name = "N")]
        abort_drop: Option<f64>,
        /// Base name of the CSV log file
        #[arg(long, value_name = "NAME")]
        log_name: Option<String>,
    },
    /// Move the carriage by a relative distance at jog speed
    Jog {
        /// Distance in mm; negative moves back
        #[arg(long, allow_hyphen_values = true)]
        mm: f64,
    },
    /// Zero the load cell on the current load
    Tare,
    /// Quick health check (load cell answers, motor accepts steps)
    SelfCheck,
}
