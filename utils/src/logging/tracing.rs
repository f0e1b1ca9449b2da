use anyhow::anyhow;
use tracing::Level;
use tracing_subscriber::{filter::LevelFilter, fmt, prelude::*, EnvFilter};

use std::fs::{create_dir_all, OpenOptions};

use crate::config::LoggingConfig;

/// Installs the global subscriber. `RUST_LOG` takes precedence over the configured level
/// for stdout, the files always follow the configuration.
pub fn start_tracing(config: &LoggingConfig) -> anyhow::Result<()> {
    let level: LevelFilter = config.level.parse().unwrap_or(Level::INFO.into());
    let stdout_filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let file_layers = if config.files {
        create_dir_all(&config.path)?;
        let error_logs = OpenOptions::new()
            .append(true)
            .create(true)
            .open(format!("{}/error.log", &config.path))?;
        let logs = OpenOptions::new()
            .append(true)
            .create(true)
            .open(format!("{}/logs.log", &config.path))?;
        Some(
            // log-error file, to log the errors that arise
            fmt::layer()
                .with_ansi(false)
                .with_writer(error_logs)
                .with_filter(LevelFilter::ERROR)
                .and_then(
                    // log-debug file, everything at the configured level
                    fmt::layer()
                        .with_ansi(false)
                        .with_writer(logs)
                        .with_filter(level),
                ),
        )
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(file_layers)
        .with(fmt::Layer::default().with_filter(stdout_filter))
        .try_init()
        .map_err(|e| anyhow!("Error starting tracing, {e}"))
}
