mod backend;
mod cli;
mod error_fmt;
mod logging;
mod run;

use std::sync::Arc;

use clap::Parser;
use eyre::WrapErr;

use crate::cli::{Cli, Commands, JSON_MODE, json_mode};
use crate::error_fmt::{exit_code_for_error, exit_code_for_result, format_error_json, humanize};
use crate::run::PullOverrides;

fn main() {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);
    // Only affects panic/backtrace formatting; reports are printed below.
    let _ = color_eyre::install();

    let code = match real_main(cli) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            if json_mode() {
                eprintln!("{}", format_error_json(&e));
            } else {
                eprintln!("{}", humanize(&e));
            }
            exit_code_for_error(&e)
        }
    };
    std::process::exit(code);
}

fn real_main(cli: Cli) -> eyre::Result<i32> {
    let text = std::fs::read_to_string(&cli.config)
        .wrap_err_with(|| format!("read config {}", cli.config.display()))?;
    let cfg = tensile_config::load_toml(&text).wrap_err("invalid configuration")?;
    cfg.validate().wrap_err("invalid configuration")?;

    logging::init_tracing(&cli, &cfg.logging)?;
    tracing::debug!(config = %cli.config.display(), "config loaded");

    let rig = Arc::new(backend::build_rig(&cfg)?);

    match cli.cmd {
        Commands::Pull {
            feed,
            length,
            abort_drop,
            log_name,
        } => {
            let result = run::run_pull(
                rig,
                PullOverrides {
                    feed_rate_mm_min: feed,
                    pull_length_mm: length,
                    force_drop_abort: abort_drop,
                    log_base_name: log_name,
                },
            )?;
            Ok(exit_code_for_result(result))
        }
        Commands::Jog { mm } => run::run_jog(&rig, mm).map(|()| 0),
        Commands::Tare => run::run_tare(&rig).map(|()| 0),
        Commands::SelfCheck => run::self_check(&rig).map(|()| 0),
    }
}
