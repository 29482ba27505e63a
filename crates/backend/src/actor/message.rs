//! Messages accepted by the session actor
//!
//! Every non-terminal message carries exactly one oneshot reply slot. The
//! actor resolves it at most once; if the actor stops first the slot is
//! dropped and the waiting caller observes the closed channel.

use tokio::sync::oneshot;

use crate::{
  compiler::{CompiledOutput, ResolvedProject},
  ipc::compile::InitParams,
};

/// Reply to a project compile: the resolved project and every emitted file.
pub type ProjectReply = Result<(ResolvedProject, CompiledOutput), String>;

/// Reply to a file compile: the file and any affected files.
pub type FileReply = Result<CompiledOutput, String>;

#[derive(Debug)]
pub enum SessionMessage {
  /// The project changed; rebuild the session from scratch
  ProjectChanged {
    params: InitParams,
    reply: oneshot::Sender<ProjectReply>,
  },
  /// One file changed; recompile it against the current session
  CompileFile {
    path: String,
    reply: oneshot::Sender<FileReply>,
  },
  /// Stop processing. Anything queued behind this is dropped.
  Disconnect,
}

impl SessionMessage {
  pub fn kind(&self) -> &'static str {
    match self {
      SessionMessage::ProjectChanged { .. } => "project_changed",
      SessionMessage::CompileFile { .. } => "compile_file",
      SessionMessage::Disconnect => "disconnect",
    }
  }
}
