//! Logging initialization helpers for hosts.
//!
//! The agent itself only emits `tracing` events; hosts decide where they
//! go. These helpers cover the two common setups: stderr with an env
//! filter, and a daily-rolling log file for hosts that run headless.

use color_eyre::{eyre::eyre, Result};
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Initialize stderr logging. `directive` is the default filter (e.g.
/// `medquiz_offline=info`), overridable via `RUST_LOG`.
pub fn init(directive: &str) -> Result<()> {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_target(false)
    .try_init()
    .map_err(|e| eyre!("Failed to initialize logging: {}", e))
}

/// Initialize daily-rolling file logging under `directory`. The returned
/// guard must be kept alive for buffered log lines to be flushed.
pub fn init_file(directory: &Path, directive: &str) -> Result<WorkerGuard> {
  let appender = tracing_appender::rolling::daily(directory, "medquiz-offline.log");
  let (writer, guard) = tracing_appender::non_blocking(appender);

  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::new(directive))
    .with_writer(writer)
    .with_ansi(false)
    .try_init()
    .map_err(|e| eyre!("Failed to initialize logging: {}", e))?;

  Ok(guard)
}
