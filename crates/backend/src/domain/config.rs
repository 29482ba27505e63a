//! Configuration system for the fabled daemon.
//!
//! Config priority: `$CONFIG_DIR/config.toml` > `$XDG_CONFIG_HOME/fabled/config.toml`
//! > platform config dir > built-in defaults. See [`crate::dirs::default_config_dir`].

use std::{
  collections::BTreeMap,
  path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
  #[error("Failed to read config {}: {source}", .path.display())]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
  #[error("Failed to parse config {}: {source}", .path.display())]
  Parse {
    path: PathBuf,
    #[source]
    source: toml::de::Error,
  },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
  pub daemon: DaemonConfig,
  pub compiler: CompilerSettings,
}

impl Config {
  /// Load the user config, falling back to defaults when absent or unreadable.
  pub fn load() -> Self {
    let path = Self::user_config_path();
    if !path.exists() {
      return Self::default();
    }

    match Self::load_from(&path) {
      Ok(config) => config,
      Err(e) => {
        tracing::warn!("{}, using defaults", e);
        Self::default()
      }
    }
  }

  pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
      path: path.to_path_buf(),
      source,
    })
  }

  /// Get the user-level config path
  pub fn user_config_path() -> PathBuf {
    crate::dirs::default_config_dir().join("config.toml")
  }
}

// ============================================================================
// Daemon Configuration
// ============================================================================

/// Daemon process configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
  /// Log level: "off", "error", "warn", "info", "debug", "trace"
  /// Default: "info"
  #[serde(default = "default_log_level")]
  pub log_level: String,

  /// Log file rotation: "daily", "hourly", "never"
  /// Default: "daily"
  #[serde(default = "default_log_rotation")]
  pub log_rotation: String,

  /// Requests that may queue behind a running compile before senders wait
  /// Default: 256
  #[serde(default = "default_mailbox_capacity")]
  pub mailbox_capacity: usize,
}

fn default_log_level() -> String {
  "info".to_string()
}
fn default_log_rotation() -> String {
  "daily".to_string()
}
fn default_mailbox_capacity() -> usize {
  256
}

impl Default for DaemonConfig {
  fn default() -> Self {
    Self {
      log_level: default_log_level(),
      log_rotation: default_log_rotation(),
      mailbox_capacity: default_mailbox_capacity(),
    }
  }
}

// ============================================================================
// Compiler Configuration
// ============================================================================

/// External compiler invocation used by [`crate::compiler::ExternalBackend`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerSettings {
  /// Executable that emits one file; the file path is appended to `args`
  pub command: Option<String>,
  pub args: Vec<String>,
  /// Extra environment for the compiler process
  pub env: BTreeMap<String, String>,
}
