//! Handle for talking to the session actor
//!
//! Handles are cheap to clone and can be shared across connection tasks.
//! Each call creates its own reply slot, so any number of calls may be
//! awaiting at once; the actor still serves them one at a time.

use tokio::sync::{mpsc, oneshot};

use super::message::{FileReply, ProjectReply, SessionMessage};
use crate::ipc::compile::InitParams;

#[derive(Clone, Debug)]
pub struct SessionHandle {
  tx: mpsc::Sender<SessionMessage>,
}

impl SessionHandle {
  pub fn new(tx: mpsc::Sender<SessionMessage>) -> Self {
    Self { tx }
  }

  /// Rebuild the session for the given project and wait for the result.
  pub async fn project_changed(&self, params: InitParams) -> Result<ProjectReply, SessionError> {
    let (reply, rx) = oneshot::channel();
    self.send(SessionMessage::ProjectChanged { params, reply }).await?;
    rx.await.map_err(|_| SessionError::Disconnected)
  }

  /// Recompile one file against the current session and wait for the result.
  pub async fn compile_file(&self, path: impl Into<String>) -> Result<FileReply, SessionError> {
    let (reply, rx) = oneshot::channel();
    self
      .send(SessionMessage::CompileFile {
        path: path.into(),
        reply,
      })
      .await?;
    rx.await.map_err(|_| SessionError::Disconnected)
  }

  /// Ask the actor to stop once it reaches this message.
  pub async fn disconnect(&self) -> Result<(), SessionError> {
    self.send(SessionMessage::Disconnect).await
  }

  /// True once the actor has stopped accepting messages.
  pub fn is_closed(&self) -> bool {
    self.tx.is_closed()
  }

  async fn send(&self, msg: SessionMessage) -> Result<(), SessionError> {
    self.tx.send(msg).await.map_err(|_| SessionError::Disconnected)
  }
}

/// Error when the actor can no longer serve a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
  #[error("Session actor has disconnected")]
  Disconnected,
}
