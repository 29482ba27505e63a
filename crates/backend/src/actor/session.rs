//! SessionActor - serializes every compile against the one session
//!
//! The actor owns [`SessionState`] outright. Nothing outside the task can
//! read or write it, and because the loop awaits each compile before taking
//! the next message, no locking is needed around the session or checker.

use std::{
  any::Any,
  ops::ControlFlow,
  panic::AssertUnwindSafe,
  sync::Arc,
  time::Instant,
};

use futures::FutureExt;
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{
  handle::SessionHandle,
  message::{FileReply, ProjectReply, SessionMessage},
  state::{self, SessionState},
};
use crate::{
  compiler::{CompilerBackend, CompilerError, NoopPathResolver, PathResolver, normalize_file_path},
  ipc::compile::InitParams,
};

/// Failure message for a file compile that arrives before any project compile.
pub const NO_ACTIVE_SESSION: &str = "No active session";

/// Configuration for spawning a SessionActor
pub struct SessionActorConfig {
  /// Messages that may queue behind a running compile before senders wait
  pub mailbox_capacity: usize,
  /// Output path policy handed to every session
  pub resolver: Arc<dyn PathResolver>,
}

impl Default for SessionActorConfig {
  fn default() -> Self {
    Self {
      mailbox_capacity: 256,
      resolver: Arc::new(NoopPathResolver),
    }
  }
}

pub struct SessionActor<B: CompilerBackend> {
  backend: Arc<B>,
  state: SessionState<B>,
  resolver: Arc<dyn PathResolver>,
  inbox: mpsc::Receiver<SessionMessage>,
  cancel: CancellationToken,
}

impl<B: CompilerBackend> SessionActor<B> {
  /// Spawn the actor and return a handle to it.
  ///
  /// The returned join handle completes once the actor has stopped and every
  /// message still queued has been dropped.
  pub fn spawn(
    config: SessionActorConfig,
    backend: Arc<B>,
    cancel: CancellationToken,
  ) -> (SessionHandle, JoinHandle<()>) {
    let (tx, inbox) = mpsc::channel(config.mailbox_capacity.max(1));

    let actor = Self {
      backend,
      state: SessionState::Uninitialized,
      resolver: config.resolver,
      inbox,
      cancel,
    };

    let task = tokio::spawn(actor.run());
    (SessionHandle::new(tx), task)
  }

  /// Main actor event loop
  ///
  /// Processes messages until one of:
  /// - a `Disconnect` message is dequeued
  /// - the CancellationToken is cancelled
  /// - every handle has been dropped
  async fn run(mut self) {
    info!("Session actor started");

    loop {
      tokio::select! {
        biased;

        _ = self.cancel.cancelled() => {
          info!("Session actor shutting down (cancelled)");
          break;
        }

        msg = self.inbox.recv() => {
          let Some(msg) = msg else {
            info!("Session actor shutting down (channel closed)");
            break;
          };
          if self.handle_message(msg).await.is_break() {
            info!("Session actor shutting down (disconnect)");
            break;
          }
        }
      }
    }

    self.close();
    info!("Session actor stopped");
  }

  /// Close the mailbox and drop whatever is still queued.
  ///
  /// Dropping a message drops its reply slot, which wakes the waiting caller
  /// with a closed-channel error.
  fn close(&mut self) {
    self.inbox.close();

    let mut abandoned = 0usize;
    while let Ok(msg) = self.inbox.try_recv() {
      debug!(kind = msg.kind(), "Dropping queued message");
      abandoned += 1;
    }

    if abandoned > 0 {
      warn!(abandoned, "Dropped messages queued behind shutdown");
    }
  }

  async fn handle_message(&mut self, msg: SessionMessage) -> ControlFlow<()> {
    debug!(kind = msg.kind(), "Handling message");

    match msg {
      SessionMessage::ProjectChanged { params, reply } => {
        let result = self.project_changed(params).await;
        if reply.send(result).is_err() {
          debug!("Caller went away before project reply");
        }
      }
      SessionMessage::CompileFile { path, reply } => {
        let result = self.compile_file(&path).await;
        if reply.send(result).is_err() {
          debug!(path = %path, "Caller went away before file reply");
        }
      }
      SessionMessage::Disconnect => return ControlFlow::Break(()),
    }

    ControlFlow::Continue(())
  }

  async fn project_changed(&mut self, params: InitParams) -> ProjectReply {
    let started = Instant::now();
    let build = state::build_session(self.backend.as_ref(), &params, Arc::clone(&self.resolver));

    match settle(AssertUnwindSafe(build).catch_unwind().await) {
      Ok(session) => {
        info!(
          project = %session.config.project_file,
          files = session.output.len(),
          replaced = self.state.is_ready(),
          elapsed_ms = started.elapsed().as_millis() as u64,
          "Project compiled"
        );
        let reply = Ok((session.project.clone(), session.output.clone()));
        self.state = SessionState::Ready(session);
        reply
      }
      Err(error) => {
        warn!(
          project = %params.project,
          error = %error,
          kept_previous = self.state.is_ready(),
          "Project compile failed"
        );
        Err(error)
      }
    }
  }

  async fn compile_file(&self, path: &str) -> FileReply {
    let Some(session) = self.state.session() else {
      warn!(path, "File compile requested before any project compile");
      return Err(NO_ACTIVE_SESSION.to_string());
    };

    let started = Instant::now();
    let path = normalize_file_path(path);
    let compile = state::recompile_file(self.backend.as_ref(), session, &path);

    let result = settle(AssertUnwindSafe(compile).catch_unwind().await);
    match &result {
      Ok(output) => debug!(
        path = %path,
        files = output.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "File compiled"
      ),
      Err(error) => warn!(path = %path, error = %error, "File compile failed"),
    }
    result
  }
}

/// Collapse a compile result, including a panic, into a reply value.
fn settle<T>(result: Result<Result<T, CompilerError>, Box<dyn Any + Send>>) -> Result<T, String> {
  match result {
    Ok(Ok(value)) => Ok(value),
    Ok(Err(e)) => Err(e.to_string()),
    Err(payload) => Err(format!("Compiler panicked: {}", panic_message(payload.as_ref()))),
  }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
  if let Some(message) = payload.downcast_ref::<&str>() {
    message.to_string()
  } else if let Some(message) = payload.downcast_ref::<String>() {
    message.clone()
  } else {
    "unknown panic".to_string()
  }
}
