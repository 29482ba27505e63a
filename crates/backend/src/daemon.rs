//! Daemon lifecycle management.
//!
//! The daemon owns one session actor and one front end feeding it. The front
//! end is either the process's own stdin/stdout (the editor spawned us) or a
//! Unix socket that any number of clients may connect to.
//!
//! # Architecture
//!
//! ```text
//! Daemon (Supervisor)
//!   ├── Front end: stdio `serve` loop, or `Server` (socket listener, task per connection)
//!   └── SessionActor (owns the session, one compile at a time)
//! ```
//!
//! # Lifecycle
//!
//! 1. Create master `CancellationToken`
//! 2. Spawn the `SessionActor` with a child token
//! 3. Run the front end until stdin closes, or until cancelled (ctrl-c)
//! 4. Send `Disconnect` so the compile in progress finishes and the rest of
//!    the mailbox is dropped
//! 5. Wait for the actor to stop

use std::{path::PathBuf, sync::Arc, time::Duration};

use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
  actor::{SessionActor, SessionActorConfig},
  compiler::{CompilerBackend, ExternalBackend, NoopPathResolver},
  config::Config,
  dirs,
  ipc::{Client, IpcError},
  server::{Server, ServerConfig, serve},
};

// ============================================================================
// Configuration
// ============================================================================

/// Where requests come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transport {
  /// Newline-delimited JSON on stdin, responses on stdout
  Stdio,
  /// Unix socket listener at this path
  Socket(PathBuf),
}

/// Daemon runtime configuration.
///
/// Built from the user config file plus command-line overrides.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
  pub transport: Transport,
  /// Log to the console instead of a log file
  pub foreground: bool,
  /// Full configuration (daemon, compiler)
  pub config: Config,
}

impl RuntimeConfig {
  pub fn load(transport: Transport) -> Self {
    Self {
      transport,
      foreground: false,
      config: Config::load(),
    }
  }
}

/// The fabled daemon - manages the application lifecycle.
///
/// # Usage
///
/// ```ignore
/// let daemon = Daemon::new(RuntimeConfig::load(Transport::Stdio));
/// daemon.run().await?;
/// ```
pub struct Daemon {
  runtime_config: RuntimeConfig,
}

impl Daemon {
  pub fn new(runtime_config: RuntimeConfig) -> Self {
    Self { runtime_config }
  }

  /// Connect to a socket daemon, starting one in the background if necessary.
  ///
  /// Polls for the socket to become available for up to five seconds.
  pub async fn connect_or_start(socket_path: PathBuf) -> Result<Client, IpcError> {
    if dirs::is_daemon_running(&socket_path) {
      debug!("Daemon is already running, connecting...");
      return Client::connect_to(&socket_path).await;
    }

    info!("Daemon is not running, starting in background...");
    let pid = Self::spawn_background(&socket_path)?;
    debug!("Spawned daemon with PID {}", pid);

    let delay = Duration::from_millis(500);
    let max_attempts = 10;

    for attempt in 1..=max_attempts {
      tokio::time::sleep(delay).await;
      if let Ok(client) = Client::connect_to(&socket_path).await {
        info!("Successfully connected to daemon");
        return Ok(client);
      }
      debug!("Waiting for daemon to start... (attempt {}/{})", attempt, max_attempts);
    }

    Err(IpcError::Connection("Failed to connect to daemon after startup".into()))
  }

  /// Spawn a detached socket daemon using the current executable.
  ///
  /// Re-executes the current binary with `daemon --socket <path> --background`,
  /// so the child gets its own Tokio runtime.
  pub fn spawn_background(socket_path: &std::path::Path) -> Result<u32, IpcError> {
    use std::process::{Command, Stdio};

    let exe = std::env::current_exe()?;

    let child = Command::new(&exe)
      .arg("daemon")
      .arg("--socket")
      .arg(socket_path)
      .arg("--background")
      .stdin(Stdio::null())
      .stdout(Stdio::null())
      .stderr(Stdio::null())
      .spawn()?;

    let pid = child.id();
    info!("Spawned daemon process with PID {}", pid);
    Ok(pid)
  }

  /// Run with the backend named by the `[compiler]` config section.
  pub async fn run(self) -> Result<(), IpcError> {
    let backend = Arc::new(ExternalBackend::new(self.runtime_config.config.compiler.clone()));
    self.run_with_backend(backend).await
  }

  /// Run the daemon (blocking until shutdown) around `backend`.
  pub async fn run_with_backend<B: CompilerBackend>(self, backend: Arc<B>) -> Result<(), IpcError> {
    let RuntimeConfig { transport, config, .. } = self.runtime_config;
    info!(transport = ?transport, "Starting fabled daemon");

    // Master cancellation token - propagates to all children
    let cancel = CancellationToken::new();

    let actor_config = SessionActorConfig {
      mailbox_capacity: config.daemon.mailbox_capacity,
      resolver: Arc::new(NoopPathResolver),
    };
    let (session, actor) = SessionActor::spawn(actor_config, backend, cancel.child_token());

    // Handle ctrl-c gracefully
    let cancel_for_signal = cancel.clone();
    tokio::spawn(async move {
      if let Err(e) = signal::ctrl_c().await {
        warn!("Failed to listen for ctrl-c: {}", e);
        return;
      }
      info!("Received ctrl-c, shutting down...");
      cancel_for_signal.cancel();
    });

    let result = match transport {
      Transport::Stdio => {
        tokio::select! {
          biased;

          _ = cancel.cancelled() => Ok(()),

          served = serve(tokio::io::stdin(), tokio::io::stdout(), session.clone()) => {
            served.map(|requests| info!(requests, "Input closed"))
          }
        }
      }
      Transport::Socket(socket_path) => {
        let server = Server::new(ServerConfig {
          socket_path,
          session: session.clone(),
        });
        server.run(cancel.child_token()).await
      }
    };

    if let Err(e) = &result {
      warn!("Front end error: {}", e);
    }

    info!("Shutting down...");
    if session.disconnect().await.is_err() {
      debug!("Session actor already stopped");
    }
    if let Err(e) = actor.await {
      warn!("Session actor task failed: {}", e);
    }
    cancel.cancel();

    info!("Daemon shutdown complete");
    result
  }
}
