use std::path::{Path, PathBuf};

/// Get the default socket path
pub fn default_socket_path() -> PathBuf {
  // Try XDG_RUNTIME_DIR first, fallback to /tmp
  if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
    PathBuf::from(runtime_dir).join("fabled.sock")
  } else {
    let uid = unsafe { libc::getuid() };
    PathBuf::from(format!("/tmp/fabled-{}.sock", uid))
  }
}

/// Check if a daemon is accepting connections on `socket_path`.
pub fn is_daemon_running(socket_path: &Path) -> bool {
  std::os::unix::net::UnixStream::connect(socket_path).is_ok()
}

/// Get the default base path for fabled data (log files)
///
/// Respects the following environment variables (in order of precedence):
/// 1. DATA_DIR - explicit data directory override
/// 2. XDG_DATA_HOME - standard XDG data home directory
/// 3. dirs::data_local_dir() - platform default
pub fn default_data_dir() -> PathBuf {
  if let Ok(dir) = std::env::var("DATA_DIR") {
    return PathBuf::from(dir);
  }

  if let Ok(xdg_data) = std::env::var("XDG_DATA_HOME") {
    return PathBuf::from(xdg_data).join("fabled");
  }

  dirs::data_local_dir().unwrap_or_else(|| PathBuf::from(".")).join("fabled")
}

/// Get the default config directory
///
/// Respects the following environment variables (in order of precedence):
/// 1. CONFIG_DIR - explicit config directory override
/// 2. XDG_CONFIG_HOME - standard XDG config home directory
/// 3. dirs::config_dir() - platform default
pub fn default_config_dir() -> PathBuf {
  if let Ok(dir) = std::env::var("CONFIG_DIR") {
    return PathBuf::from(dir);
  }

  if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
    return PathBuf::from(xdg_config).join("fabled");
  }

  dirs::config_dir().unwrap_or_else(|| PathBuf::from(".")).join("fabled")
}
