//! Logging utilities for CLI commands and daemon

use std::path::PathBuf;

use fabled::config::DaemonConfig;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
  EnvFilter,
  filter::{Directive, LevelFilter},
};

const LOG_FILE: &str = "fabled.log";

/// Get the fabled data directory (respects env vars)
pub fn data_dir() -> PathBuf {
  fabled::dirs::default_data_dir()
}

/// Initialize logging for CLI commands (stderr only; stdout carries results)
pub fn init_cli_logging() {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::builder().with_default_directive(tracing::Level::WARN.into()).from_env_lossy())
    .with_writer(std::io::stderr)
    .init();
}

/// Parse log level from config string
fn parse_log_level(level: &str) -> Option<tracing::Level> {
  match level.to_lowercase().as_str() {
    "off" => None,
    "error" => Some(tracing::Level::ERROR),
    "warn" => Some(tracing::Level::WARN),
    "debug" => Some(tracing::Level::DEBUG),
    "trace" => Some(tracing::Level::TRACE),
    _ => Some(tracing::Level::INFO),
  }
}

/// Initialize logging for the daemon with config-driven settings.
///
/// In foreground mode: logs to stderr with colors. Never stdout, which is
/// the protocol channel in stdio mode.
/// In background mode: logs to a rolling file only (no ANSI).
///
/// Returns the guard that must be kept alive for the duration of the program
pub fn init_daemon_logging(config: &DaemonConfig, foreground: bool) -> Option<WorkerGuard> {
  let directive: Directive = match parse_log_level(&config.log_level) {
    Some(level) => level.into(),
    None => LevelFilter::OFF.into(),
  };

  // Build env filter (allows RUST_LOG override)
  let env_filter = EnvFilter::builder().with_default_directive(directive).from_env_lossy();

  if foreground {
    tracing_subscriber::fmt()
      .with_env_filter(env_filter)
      .with_target(true)
      .with_ansi(true)
      .with_writer(std::io::stderr)
      .init();
    return None;
  }

  let log_dir = data_dir();
  if std::fs::create_dir_all(&log_dir).is_err() {
    // Fall back to console-only logging
    init_cli_logging();
    return None;
  }

  let file_appender = match config.log_rotation.as_str() {
    "hourly" => tracing_appender::rolling::hourly(&log_dir, LOG_FILE),
    "never" => tracing_appender::rolling::never(&log_dir, LOG_FILE),
    _ => tracing_appender::rolling::daily(&log_dir, LOG_FILE),
  };

  let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

  tracing_subscriber::fmt()
    .with_env_filter(env_filter)
    .with_target(true)
    .with_ansi(false)
    .with_writer(file_writer)
    .init();

  Some(guard)
}
