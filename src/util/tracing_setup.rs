//! Tracing/logging initialization

use anyhow::{anyhow, Result};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::LoggingConfig;

/// Install the global subscriber; `RUST_LOG` overrides the configured level
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| anyhow!("Invalid log level {:?}: {e}", config.level))?;

    let subscriber = tracing_subscriber::registry().with(filter);

    let installed = match config.format.as_str() {
        "json" => subscriber
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .try_init(),
        "pretty" => subscriber
            .with(fmt::layer().with_target(true).with_thread_names(true))
            .try_init(),
        other => return Err(anyhow!("Unknown log format {other:?}, expected json or pretty")),
    };

    installed.map_err(|e| anyhow!("Failed to install tracing subscriber: {e}"))
}
