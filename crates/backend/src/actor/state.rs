//! Session data and the two compile operations that produce or use it

use std::sync::Arc;

use tracing::debug;

use crate::{
  compiler::{
    CompiledOutput, CompilerBackend, CompilerError, PathResolver, ProjectConfig, ResolvedProject, SourceReader,
  },
  ipc::compile::InitParams,
};

/// Everything one successful project compile produced.
///
/// Never mutated after construction; a later project compile replaces it
/// wholesale and the old checker is dropped with it.
pub struct Session<B: CompilerBackend> {
  pub config: ProjectConfig,
  pub project: ResolvedProject,
  pub checker: B::Checker,
  /// Output of the project compile; file compiles do not update it
  pub output: CompiledOutput,
  pub sources: SourceReader,
  pub resolver: Arc<dyn PathResolver>,
}

pub enum SessionState<B: CompilerBackend> {
  Uninitialized,
  Ready(Session<B>),
}

impl<B: CompilerBackend> SessionState<B> {
  pub fn session(&self) -> Option<&Session<B>> {
    match self {
      SessionState::Ready(session) => Some(session),
      SessionState::Uninitialized => None,
    }
  }

  pub fn is_ready(&self) -> bool {
    matches!(self, SessionState::Ready(_))
  }
}

/// Cold project compile: derive config, crack, fresh checker, compile all.
pub(crate) async fn build_session<B: CompilerBackend>(
  backend: &B,
  params: &InitParams,
  resolver: Arc<dyn PathResolver>,
) -> Result<Session<B>, CompilerError> {
  let config = ProjectConfig::from_init(&params.project, &params.fable_library)?;
  let project = backend.crack_project(&config).await?;
  let checker = backend.create_checker(&project)?;
  let sources = SourceReader::new(&project.source_files);

  let output = backend
    .compile_project(&sources, &checker, resolver.as_ref(), &config, &project)
    .await?;

  debug!(
    project = %config.project_file,
    sources = project.source_files.len(),
    emitted = output.len(),
    "Built session"
  );

  Ok(Session {
    config,
    project,
    checker,
    output,
    sources,
    resolver,
  })
}

/// Recompile `path` against `session` with a freshly built source reader.
pub(crate) async fn recompile_file<B: CompilerBackend>(
  backend: &B,
  session: &Session<B>,
  path: &str,
) -> Result<CompiledOutput, CompilerError> {
  let sources = SourceReader::new(session.sources.files());

  backend
    .compile_file(
      &sources,
      &session.checker,
      session.resolver.as_ref(),
      &session.config,
      &session.project,
      path,
    )
    .await
}
