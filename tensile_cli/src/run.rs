//! Command execution against an assembled rig.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tensile_core::{Rig, RunResult};

use crate::cli::json_mode;

const PROGRESS_EVERY: Duration = Duration::from_millis(500);

/// Operator overrides for one pull; `None` keeps the configured value.
#[derive(Debug, Default, Clone)]
pub struct PullOverrides {
    pub feed_rate_mm_min: Option<f64>,
    pub pull_length_mm: Option<f64>,
    pub force_drop_abort: Option<f64>,
    pub log_base_name: Option<String>,
}

pub fn run_pull(rig: Arc<Rig>, overrides: PullOverrides) -> eyre::Result<RunResult> {
    if let Some(v) = overrides.feed_rate_mm_min {
        rig.set_feed_rate(v);
    }
    if let Some(v) = overrides.pull_length_mm {
        rig.set_pull_length(v);
    }
    if let Some(v) = overrides.force_drop_abort {
        rig.set_abort_threshold(v);
    }
    if let Some(name) = overrides.log_base_name.as_deref() {
        rig.set_log_base_name(name);
    }

    {
        let rig = rig.clone();
        ctrlc::set_handler(move || {
            if rig.request_stop() {
                tracing::warn!("Ctrl-C: stopping run");
            }
        })?;
    }

    let settings = rig.settings();
    let path = rig.start_configured_run()?;
    tracing::info!(
        feed_mm_min = settings.feed_rate_mm_min,
        pull_mm = settings.pull_length_mm,
        force_drop_abort = settings.force_drop_abort,
        log = %path.display(),
        "pull started"
    );

    let result = loop {
        if let Some(result) = rig.wait_for_run_timeout(PROGRESS_EVERY) {
            break result;
        }
        tracing::info!(
            position_mm = rig.position(),
            force = rig.current_force(),
            peak_force = rig.peak_force(),
            "pulling"
        );
    };

    let peak = rig.peak_force();
    let position = rig.position();
    if json_mode() {
        println!(
            "{}",
            json!({
                "result": result.as_str(),
                "peak_force": peak,
                "position_mm": position,
                "log_file": path.display().to_string(),
                "error": rig.last_error(),
            })
        );
    } else {
        println!("Run {result}: peak force {peak:.2} N at {position:.2} mm");
        println!("Log: {}", path.display());
        if let Some(err) = rig.last_error() {
            println!("Error: {err}");
        }
    }
    Ok(result)
}

pub fn run_jog(rig: &Rig, mm: f64) -> eyre::Result<()> {
    let steps = rig.move_by(mm)?;
    let position = rig.position();
    if json_mode() {
        println!("{}", json!({ "steps": steps, "position_mm": position }));
    } else {
        println!("Moved {steps} steps, position {position:.3} mm");
    }
    Ok(())
}

pub fn run_tare(rig: &Rig) -> eyre::Result<()> {
    let offset = rig.tare()?;
    if json_mode() {
        println!("{}", json!({ "offset": offset }));
    } else {
        println!("Tared, offset {offset:.1} counts");
    }
    Ok(())
}

/// Wait for a few sampler ticks, then jog a few steps out and back.
pub fn self_check(rig: &Rig) -> eyre::Result<()> {
    let before = rig.samples_published();
    let deadline = std::time::Instant::now() + Duration::from_secs(2);
    while rig.samples_published() < before + 3 {
        if std::time::Instant::now() >= deadline {
            eyre::bail!(
                "load cell produced no data (hx711 timeout): {} ticks missed",
                rig.sampler_missed_ticks()
            );
        }
        std::thread::sleep(Duration::from_millis(10));
    }

    let mm_step = 0.01;
    rig.move_by(mm_step)?;
    rig.move_by(-mm_step)?;

    if json_mode() {
        println!(
            "{}",
            json!({ "status": "ok", "force": rig.current_force(), "position_mm": rig.position() })
        );
    } else {
        println!("OK: force {:.2} N, position {:.3} mm", rig.current_force(), rig.position());
    }
    Ok(())
}
