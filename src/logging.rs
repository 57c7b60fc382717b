use anyhow::Result;
use std::fs::{self, File};
use std::path::Path;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize global logging for a host process embedding the runtime.
///
/// Writes to the given log file when one is provided, optionally mirroring to
/// stdout. Filter format: `<level>,offstage=<level>`.
pub fn setup_logging(
    log_path: Option<&Path>,
    log_level: &tracing::Level,
    with_stdout: bool,
) -> Result<()> {
    let filter = format!("{},offstage={}", log_level.as_str(), log_level.as_str());

    let registry = tracing_subscriber::registry();

    let file_layer = match log_path {
        Some(path) => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            let file = File::create(path)?;
            let writer = std::sync::Mutex::new(file);
            Some(
                fmt::layer()
                    .with_writer(writer)
                    .with_target(true)
                    .with_ansi(false)
                    .with_filter(EnvFilter::builder().parse(&filter)?),
            )
        }
        None => None,
    };

    let stdout_layer = if with_stdout {
        Some(
            fmt::layer()
                .with_writer(std::io::stdout)
                .with_target(true)
                .with_ansi(true)
                .with_filter(EnvFilter::builder().parse(&filter)?),
        )
    } else {
        None
    };

    registry
        .with(file_layer)
        .with(stdout_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}
