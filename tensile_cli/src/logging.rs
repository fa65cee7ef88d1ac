//! Tracing setup: console layer plus an optional JSON-lines file layer.

use eyre::WrapErr;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

use crate::cli::{Cli, FILE_GUARD};

/// `RUST_LOG` wins over `--log-level`, which wins over `[logging].level`.
fn console_filter(cli: &Cli, cfg: &tensile_config::Logging) -> EnvFilter {
    if let Ok(f) = EnvFilter::try_from_default_env() {
        return f;
    }
    let level = cli
        .log_level
        .as_deref()
        .or(cfg.level.as_deref())
        .unwrap_or("info");
    EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"))
}

fn rolling_appender(path: &str, rotation: Option<&str>) -> tracing_appender::rolling::RollingFileAppender {
    use tracing_appender::rolling;
    let path = std::path::Path::new(path);
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| std::path::Path::new("."));
    let file = path
        .file_name()
        .map_or_else(|| "tensile.log".into(), |f| f.to_string_lossy().into_owned());
    match rotation.unwrap_or("never") {
        "daily" => rolling::daily(dir, file),
        "hourly" => rolling::hourly(dir, file),
        _ => rolling::never(dir, file),
    }
}

pub fn init_tracing(cli: &Cli, cfg: &tensile_config::Logging) -> eyre::Result<()> {
    let console = if cli.json {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_filter(console_filter(cli, cfg))
            .boxed()
    } else {
        fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .with_filter(console_filter(cli, cfg))
            .boxed()
    };

    let file = cfg.file.as_deref().map(|path| {
        let (writer, guard) =
            tracing_appender::non_blocking(rolling_appender(path, cfg.rotation.as_deref()));
        let _ = FILE_GUARD.set(guard);
        let level = cfg.level.as_deref().unwrap_or("info");
        fmt::layer()
            .json()
            .with_writer(writer)
            .with_filter(EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info")))
            .boxed()
    });

    tracing_subscriber::registry()
        .with(console)
        .with(file)
        .try_init()
        .wrap_err("install tracing subscriber")?;
    Ok(())
}
