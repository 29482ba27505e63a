//! Compilation backend contract
//!
//! The session actor never type-checks or emits code itself. It drives a
//! [`CompilerBackend`] through four operations and treats everything the
//! backend hands back as opaque data:
//!
//! ```text
//! ProjectConfig ──crack_project──▶ ResolvedProject ──create_checker──▶ Checker
//!                                        │
//!          SourceReader + PathResolver ──┼──compile_project──▶ CompiledOutput (all files)
//!                                        └──compile_file─────▶ CompiledOutput (file + affected)
//! ```
//!
//! [`ExternalBackend`] is the implementation the daemon ships with: it cracks
//! MSBuild project files and emits each file by running a configured compiler
//! command.

mod external;
mod msbuild;
mod project;
mod resolver;
mod source;

use std::collections::BTreeMap;

pub use external::{ExternalBackend, IncrementalChecker};
pub use project::{CompilerOptions, Language, ProjectConfig, ResolvedProject, Verbosity, normalize_file_path, normalize_path};
pub use resolver::{NoopPathResolver, PathResolver};
pub use source::SourceReader;

/// Emitted target-language text keyed by normalized source path.
pub type CompiledOutput = BTreeMap<String, String>;

/// The operations the session actor needs from a compiler.
///
/// A backend is shared (via `Arc`) for the daemon's lifetime. All mutable
/// incremental state lives in the associated [`Checker`](Self::Checker),
/// which is created per session and dropped with it.
#[async_trait::async_trait]
pub trait CompilerBackend: Send + Sync + 'static {
  /// Incremental type-checking state scoped to one resolved project.
  type Checker: Send + Sync + 'static;

  /// Derive the full option set and ordered source list from a project file.
  async fn crack_project(&self, config: &ProjectConfig) -> Result<ResolvedProject, CompilerError>;

  /// Create a fresh checker for `project`. Never reused across sessions.
  fn create_checker(&self, project: &ResolvedProject) -> Result<Self::Checker, CompilerError>;

  /// Compile every file of the project.
  async fn compile_project(
    &self,
    sources: &SourceReader,
    checker: &Self::Checker,
    resolver: &dyn PathResolver,
    config: &ProjectConfig,
    project: &ResolvedProject,
  ) -> Result<CompiledOutput, CompilerError>;

  /// Recompile `path`, returning its output plus that of any affected file.
  async fn compile_file(
    &self,
    sources: &SourceReader,
    checker: &Self::Checker,
    resolver: &dyn PathResolver,
    config: &ProjectConfig,
    project: &ResolvedProject,
    path: &str,
  ) -> Result<CompiledOutput, CompilerError>;
}

#[derive(Debug, thiserror::Error)]
pub enum CompilerError {
  #[error("Project file not found: {0}")]
  ProjectNotFound(String),
  #[error("Invalid project file {path}: {message}")]
  InvalidProject { path: String, message: String },
  #[error("Failed to read {path}: {source}")]
  Io {
    path: String,
    #[source]
    source: std::io::Error,
  },
  #[error("File is not part of the project: {0}")]
  NotInProject(String),
  #[error("No compiler command configured (set [compiler].command)")]
  NoCompilerCommand,
  #[error("Failed to compile {path}: {message}")]
  Emit { path: String, message: String },
  #[error("Internal error: {0}")]
  Internal(String),
}
