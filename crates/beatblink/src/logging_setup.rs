//! Tracing subscriber setup shared by both binaries

use std::fs::File;

use anyhow::{Context, Result};
use beatblink_core::LogConfig;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    filter::EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt, Layer,
};

/// Handle to keep the logging worker thread alive
pub struct LogGuard {
    _guard: WorkerGuard,
}

/// Level from the config, `RUST_LOG` taking precedence
fn build_filter(config: &LogConfig) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(config.parse_level().into())
        .from_env_lossy()
}

/// Initialize the logging system.
///
/// Console output goes to stderr so stdout stays free for program output.
/// The returned guard must be held for file output to be flushed.
pub fn init(config: &LogConfig) -> Result<Option<LogGuard>> {
    let console_layer = config.console_output.then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_filter(build_filter(config))
    });

    let (file_layer, guard) = if config.file_output {
        config
            .ensure_log_directory()
            .context("Failed to create log directory")?;

        match config.cleanup_old_logs() {
            Ok(0) => {}
            Ok(removed) => eprintln!("Removed {} old log files", removed),
            Err(e) => eprintln!("Warning: Failed to cleanup old log files: {}", e),
        }

        let log_path = config.current_log_path();
        let file = File::create(&log_path)
            .with_context(|| format!("Failed to create log file: {:?}", log_path))?;
        let (non_blocking, worker_guard) = tracing_appender::non_blocking(file);

        let layer = fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_filter(build_filter(config));

        (Some(layer), Some(LogGuard { _guard: worker_guard }))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    tracing::info!("Logging initialized at level: {}", config.level);
    if config.file_output {
        tracing::info!("Log file path: {:?}", config.current_log_path());
    }

    Ok(guard)
}
