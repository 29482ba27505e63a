//! Daemon command

use anyhow::{Context, Result};
use fabled::{Daemon, RuntimeConfig};

/// Run the daemon until its input closes or it is interrupted
pub async fn cmd_daemon(runtime_config: RuntimeConfig) -> Result<()> {
  Daemon::new(runtime_config).run().await.context("Failed to run daemon")?;
  Ok(())
}
