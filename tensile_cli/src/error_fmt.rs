//! Human-readable error descriptions and structured JSON error formatting.

use tensile_core::{RigError, RunResult};

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    if let Some(re) = err.downcast_ref::<RigError>() {
        return match re {
            RigError::Busy => "What happened: A test run is already in progress.\nLikely causes: A second start or a jog was issued while the carriage is pulling.\nHow to fix: Wait for the run to finish or stop it first.".to_string(),
            RigError::InvalidConfig(msg) => format!(
                "What happened: Invalid run settings ({msg}).\nLikely causes: Feed rate or pull length not positive, or a negative abort threshold.\nHow to fix: Pass --feed/--length/--abort-drop with sensible values or fix [run] in the config."
            ),
            RigError::Motion(msg) => format!(
                "What happened: Motor command refused ({msg}).\nLikely causes: Zero jog frequency or lead-screw geometry in [motor].\nHow to fix: Check motor.steps_per_rev, motor.travel_per_rev_mm and motor.jog_frequency_hz."
            ),
            RigError::LogFile(msg) => format!(
                "What happened: The run log could not be written ({msg}).\nLikely causes: run.log_dir is not writable, is a file, or the disk is full.\nHow to fix: Point run.log_dir at a writable directory and retry."
            ),
            RigError::Hardware(msg) => format!(
                "What happened: Hardware error ({msg}).\nLikely causes: Wiring, power, or GPIO permissions.\nHow to fix: Check [pins] and the HX711/driver wiring; re-run with --log-level=debug."
            ),
            RigError::Calibration(msg) => format!(
                "What happened: Calibration failed ({msg}).\nLikely causes: The load cell gave no data during tare, or a zero reference unit.\nHow to fix: Check the HX711 wiring and sensor.reference_unit, then tare again."
            ),
        };
    }

    // String-based heuristics for errors coming from init or config
    let msg = err.to_string();
    let chain = format!("{err:#}");
    let lower = chain.to_ascii_lowercase();

    if lower.contains("hx711") && lower.contains("timeout") {
        return "What happened: HX711 did not produce data within the configured timeout.\nLikely causes: Wrong DT/SCK pins, wiring/power issues, or timeout configured too low.\nHow to fix: Check [pins] in the config, verify 5V/GND, and raise sensor.read_timeout_ms.".to_string();
    }

    if lower.contains("open hx711") || lower.contains("open motor pins") || lower.contains("open gpio") {
        return "What happened: Failed to initialize hardware pins.\nLikely causes: Incorrect pin numbers or insufficient GPIO permissions.\nHow to fix: Fix the [pins] values in the config; ensure the process has permission to access GPIO.".to_string();
    }

    if lower.contains("read config") {
        return format!(
            "What happened: The config file could not be read.\nLikely causes: Wrong --config path or missing file.\nHow to fix: Pass --config pointing at a TOML file (see etc/tensile_config.toml). Original: {chain}"
        );
    }

    if lower.contains("invalid configuration") {
        return format!(
            "What happened: Configuration is invalid or incomplete ({chain}).\nLikely causes: Missing [pins] (hx711_dt, hx711_sck, motor_step, motor_dir), or out-of-range values.\nHow to fix: Edit the TOML config and try again."
        );
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable exit codes for errors: busy 2, invalid run settings 3, log file 4,
/// everything else 1.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    match err.downcast_ref::<RigError>() {
        Some(RigError::Busy) => 2,
        Some(RigError::InvalidConfig(_)) => 3,
        Some(RigError::LogFile(_)) => 4,
        _ => 1,
    }
}

/// Exit code for a finished run. A force-drop abort is the normal end of a
/// test to failure, so it exits 0 like a completed pull.
pub fn exit_code_for_result(result: RunResult) -> i32 {
    match result {
        RunResult::Completed | RunResult::AbortedForceDrop => 0,
        RunResult::AbortedExternal => 130,
        RunResult::AbortedLogFailure => 4,
    }
}

fn reason_name(err: &eyre::Report) -> &'static str {
    match err.downcast_ref::<RigError>() {
        Some(RigError::Busy) => "Busy",
        Some(RigError::InvalidConfig(_)) => "InvalidConfig",
        Some(RigError::Motion(_)) => "Motion",
        Some(RigError::LogFile(_)) => "LogFile",
        Some(RigError::Hardware(_)) => "Hardware",
        Some(RigError::Calibration(_)) => "Calibration",
        None => "Error",
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    serde_json::json!({ "reason": reason_name(err), "message": humanize(err) }).to_string()
}
