//! fabled CLI - warm incremental compilation daemon and its client

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use fabled::{RuntimeConfig, Transport, config::Config};

mod commands;
mod logging;

use commands::{cmd_compile, cmd_daemon, cmd_init, cmd_ping};
use logging::{init_cli_logging, init_daemon_logging};

#[derive(Parser)]
#[command(name = "fabled")]
#[command(about = "Keeps a project compiled in memory and recompiles files on request")]
#[command(after_help = "\
QUICK START:
  fabled daemon                           # Serve requests on stdin/stdout
  fabled daemon --socket --foreground     # Serve on the default Unix socket

CLIENT (socket daemon, started on demand):
  fabled init App.fsproj --fable-library fable_modules/fable-library
  fabled compile src/Main.fs
  fabled ping")]
struct Cli {
  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Run the daemon
  Daemon {
    /// Listen on a Unix socket instead of stdin/stdout (default path if no value)
    #[arg(long, value_name = "PATH")]
    socket: Option<Option<PathBuf>>,
    /// Log to the console (stderr) instead of the log file
    #[arg(long)]
    foreground: bool,
    /// Started by a client; implies file logging
    #[arg(long, hide = true)]
    background: bool,
  },
  /// Check that the daemon answers
  Ping {
    /// Message to echo back
    message: Option<String>,
    #[arg(long, value_name = "PATH")]
    socket: Option<PathBuf>,
  },
  /// Compile a whole project and make it the daemon's session
  Init {
    /// Project file
    project: String,
    /// Support library the emitted code imports from
    #[arg(long)]
    fable_library: String,
    #[arg(long, value_name = "PATH")]
    socket: Option<PathBuf>,
    /// Print the raw result as JSON
    #[arg(long)]
    json: bool,
  },
  /// Recompile one file against the current session
  Compile {
    /// Source file
    file: String,
    #[arg(long, value_name = "PATH")]
    socket: Option<PathBuf>,
    /// Print the raw result as JSON
    #[arg(long)]
    json: bool,
  },
}

#[tokio::main]
async fn main() -> Result<()> {
  let cli = Cli::parse();

  match cli.command {
    Commands::Daemon {
      socket,
      foreground,
      background,
    } => {
      let config = Config::load();
      let foreground = foreground && !background;
      // Keep the guard alive so buffered file logs are flushed on exit
      let _guard = init_daemon_logging(&config.daemon, foreground);

      let transport = match socket {
        None => Transport::Stdio,
        Some(path) => Transport::Socket(path.unwrap_or_else(fabled::dirs::default_socket_path)),
      };

      cmd_daemon(RuntimeConfig {
        transport,
        foreground,
        config,
      })
      .await
    }
    Commands::Ping { message, socket } => {
      init_cli_logging();
      cmd_ping(socket, message).await
    }
    Commands::Init {
      project,
      fable_library,
      socket,
      json,
    } => {
      init_cli_logging();
      cmd_init(socket, project, fable_library, json).await
    }
    Commands::Compile { file, socket, json } => {
      init_cli_logging();
      cmd_compile(socket, file, json).await
    }
  }
}
