//! Client commands that talk to a socket daemon

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use fabled::{
  Daemon,
  ipc::{
    Client,
    compile::{CompileParams, InitParams, Outcome},
    system::PingParams,
  },
};

async fn connect(socket: Option<PathBuf>) -> Result<Client> {
  let socket = socket.unwrap_or_else(fabled::dirs::default_socket_path);
  Daemon::connect_or_start(socket)
    .await
    .context("Failed to connect to daemon")
}

/// Resolve a user-supplied path against our working directory, not the
/// daemon's.
fn absolute(path: &str) -> Result<String> {
  let resolved = std::path::absolute(Path::new(path)).with_context(|| format!("Invalid path: {path:?}"))?;
  Ok(resolved.to_string_lossy().into_owned())
}

/// Check that the daemon answers
pub async fn cmd_ping(socket: Option<PathBuf>, message: Option<String>) -> Result<()> {
  let client = connect(socket).await?;
  let result = client.call(PingParams { message }).await.context("Ping failed")?;
  println!("{}", result.message);
  Ok(())
}

/// Compile a whole project, replacing the daemon's session
pub async fn cmd_init(socket: Option<PathBuf>, project: String, fable_library: String, json: bool) -> Result<()> {
  let params = InitParams {
    project: absolute(&project)?,
    fable_library: absolute(&fable_library)?,
  };
  let client = connect(socket).await?;
  let outcome = client
    .call(params)
    .await
    .context("Init request failed")?;

  if json {
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    return exit_status(outcome.is_success());
  }

  match outcome {
    Outcome::Success { data } => {
      println!("Project: {}", data.project_options.project_file);
      println!("Compiled {} files", data.compiled_files.len());
      for path in data.compiled_files.keys() {
        println!("  {}", path);
      }
      Ok(())
    }
    Outcome::Error { error } => bail!("Init failed: {}", error),
  }
}

/// Recompile one file against the daemon's session
pub async fn cmd_compile(socket: Option<PathBuf>, file_name: String, json: bool) -> Result<()> {
  let params = CompileParams {
    file_name: absolute(&file_name)?,
  };
  let client = connect(socket).await?;
  let outcome = client
    .call(params)
    .await
    .context("Compile request failed")?;

  if json {
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    return exit_status(outcome.is_success());
  }

  match outcome {
    Outcome::Success { data } => {
      for (path, code) in &data.compiled_files {
        println!("// ---- {} ----", path);
        println!("{}", code);
      }
      Ok(())
    }
    Outcome::Error { error } => bail!("Compile failed: {}", error),
  }
}

fn exit_status(success: bool) -> Result<()> {
  if !success {
    std::process::exit(1);
  }
  Ok(())
}
