//! Backend that shells out to a compiler command per file
//!
//! Each file is emitted by running the configured command with the file path
//! as its last argument and the file contents on stdin; whatever the command
//! prints on stdout is the emitted code. Project-wide options travel as
//! environment variables (`FABLE_LIBRARY`, `FABLE_DEFINES`, `FABLE_LANGUAGE`,
//! `FABLE_EXTENSION`).

use std::{process::Stdio, sync::Arc};

use dashmap::DashMap;
use sha2::{Digest, Sha256};
use tokio::{io::AsyncWriteExt, process::Command};
use tracing::{debug, trace};

use super::{
  CompiledOutput, CompilerBackend, CompilerError, PathResolver, ProjectConfig, ResolvedProject, SourceReader,
  msbuild,
};
use crate::domain::config::CompilerSettings;

/// Content fingerprints of the files last emitted in a session.
///
/// A file whose current content no longer matches its fingerprint is
/// considered affected and is re-emitted alongside the requested file.
#[derive(Debug, Default)]
pub struct IncrementalChecker {
  fingerprints: DashMap<String, String>,
}

impl IncrementalChecker {
  fn fingerprint(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
  }

  /// Mark a batch of files as delivered. Only called once a whole compile
  /// has succeeded, so files emitted by a failed compile stay affected.
  fn record_all(&self, emitted: &[(String, Arc<str>)]) {
    for (path, content) in emitted {
      self.fingerprints.insert(path.clone(), Self::fingerprint(content));
    }
  }

  fn is_stale(&self, path: &str, content: &str) -> bool {
    match self.fingerprints.get(path) {
      Some(known) => *known.value() != Self::fingerprint(content),
      None => true,
    }
  }

  pub fn tracked_files(&self) -> usize {
    self.fingerprints.len()
  }
}

pub struct ExternalBackend {
  settings: CompilerSettings,
}

impl ExternalBackend {
  pub fn new(settings: CompilerSettings) -> Self {
    Self { settings }
  }

  async fn emit(
    &self,
    path: &str,
    content: &str,
    resolver: &dyn PathResolver,
    config: &ProjectConfig,
    project: &ResolvedProject,
  ) -> Result<String, CompilerError> {
    if let Some(precompiled) = resolver.precompiled_output(path) {
      trace!(path, precompiled = %precompiled, "Using precompiled output");
      return tokio::fs::read_to_string(&precompiled)
        .await
        .map_err(|source| CompilerError::Io {
          path: precompiled,
          source,
        });
    }

    let command = self.settings.command.as_deref().ok_or(CompilerError::NoCompilerCommand)?;

    let mut child = Command::new(command)
      .args(&self.settings.args)
      .arg(path)
      .current_dir(&config.root_dir)
      .env("FABLE_LIBRARY", resolver.import_dir(&config.fable_library))
      .env("FABLE_DEFINES", project.defines.join(";"))
      .env("FABLE_LANGUAGE", config.compiler.language.as_str())
      .env("FABLE_EXTENSION", &config.compiler.file_extension)
      .envs(&self.settings.env)
      .stdin(Stdio::piped())
      .stdout(Stdio::piped())
      .stderr(Stdio::piped())
      .kill_on_drop(true)
      .spawn()
      .map_err(|e| CompilerError::Emit {
        path: path.to_string(),
        message: format!("failed to start `{command}`: {e}"),
      })?;

    // Feed stdin concurrently so a chatty compiler can't deadlock on a full stdout pipe
    let stdin = child.stdin.take();
    let input = content.as_bytes().to_vec();
    let feeder = tokio::spawn(async move {
      if let Some(mut stdin) = stdin {
        let _ = stdin.write_all(&input).await;
      }
    });

    let output = child.wait_with_output().await.map_err(|e| CompilerError::Emit {
      path: path.to_string(),
      message: e.to_string(),
    })?;
    let _ = feeder.await;

    if !output.status.success() {
      let stderr = String::from_utf8_lossy(&output.stderr);
      return Err(CompilerError::Emit {
        path: path.to_string(),
        message: format!("`{command}` exited with {}: {}", output.status, stderr.trim()),
      });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
  }
}

#[async_trait::async_trait]
impl CompilerBackend for ExternalBackend {
  type Checker = IncrementalChecker;

  async fn crack_project(&self, config: &ProjectConfig) -> Result<ResolvedProject, CompilerError> {
    msbuild::crack(config).await
  }

  fn create_checker(&self, _project: &ResolvedProject) -> Result<Self::Checker, CompilerError> {
    Ok(IncrementalChecker::default())
  }

  async fn compile_project(
    &self,
    sources: &SourceReader,
    checker: &Self::Checker,
    resolver: &dyn PathResolver,
    config: &ProjectConfig,
    project: &ResolvedProject,
  ) -> Result<CompiledOutput, CompilerError> {
    let mut output = CompiledOutput::new();
    let mut delivered = Vec::with_capacity(project.source_files.len());

    for file in &project.source_files {
      let content = sources.read(file).await?;
      let emitted = self.emit(file, &content, resolver, config, project).await?;
      output.insert(file.clone(), emitted);
      delivered.push((file.clone(), content));
    }

    checker.record_all(&delivered);
    debug!(files = output.len(), "Compiled project");
    Ok(output)
  }

  async fn compile_file(
    &self,
    sources: &SourceReader,
    checker: &Self::Checker,
    resolver: &dyn PathResolver,
    config: &ProjectConfig,
    project: &ResolvedProject,
    path: &str,
  ) -> Result<CompiledOutput, CompilerError> {
    if !project.contains(path) {
      return Err(CompilerError::NotInProject(path.to_string()));
    }

    let mut output = CompiledOutput::new();
    let mut delivered = Vec::new();

    for file in &project.source_files {
      let content = sources.read(file).await?;
      if file != path && !checker.is_stale(file, &content) {
        continue;
      }

      let emitted = self.emit(file, &content, resolver, config, project).await?;
      output.insert(file.clone(), emitted);
      delivered.push((file.clone(), content));
    }

    checker.record_all(&delivered);

    debug!(path, files = output.len(), "Compiled file");
    Ok(output)
  }
}
