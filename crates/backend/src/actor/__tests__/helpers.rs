//! Test helpers for session actor tests.
//!
//! Provides `FakeBackend`, an in-memory compiler that records how it is
//! driven (call order, concurrent entries, checker generations), and
//! `SessionTestContext`, which spawns a SessionActor around it.

use std::{
  collections::{HashMap, HashSet},
  sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
  },
  time::Duration,
};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{
  actor::{SessionActor, SessionActorConfig, SessionHandle},
  compiler::{
    CompiledOutput, CompilerBackend, CompilerError, PathResolver, ProjectConfig, ResolvedProject, SourceReader,
  },
  ipc::compile::InitParams,
};

/// Checker handed out by [`FakeBackend`]; `generation` counts creations.
#[derive(Debug)]
pub struct FakeChecker {
  pub generation: usize,
  pub project_file: String,
}

/// In-memory backend with instrumentation.
///
/// Projects are registered up front; cracking an unregistered project fails
/// with `ProjectNotFound`. Emitted text is derived from the path and the
/// checker generation so tests can tell sessions apart.
#[derive(Default)]
pub struct FakeBackend {
  projects: Mutex<HashMap<String, Vec<String>>>,
  broken: Mutex<HashSet<String>>,
  panicking: Mutex<HashSet<String>>,
  delay: Duration,
  active: AtomicUsize,
  max_active: AtomicUsize,
  checkers: AtomicUsize,
  pub project_compiles: AtomicUsize,
  pub file_compiles: AtomicUsize,
  calls: Mutex<Vec<String>>,
}

impl FakeBackend {
  pub fn new() -> Self {
    Self::default()
  }

  /// Every backend operation sleeps for `delay` while counted as active.
  pub fn with_delay(delay: Duration) -> Self {
    Self {
      delay,
      ..Self::default()
    }
  }

  pub fn add_project(&self, project_file: &str, sources: &[&str]) {
    self.projects.lock().unwrap().insert(
      project_file.to_string(),
      sources.iter().map(|s| s.to_string()).collect(),
    );
  }

  pub fn remove_project(&self, project_file: &str) {
    self.projects.lock().unwrap().remove(project_file);
  }

  /// Compiling `path` fails with an emit error.
  pub fn break_file(&self, path: &str) {
    self.broken.lock().unwrap().insert(path.to_string());
  }

  /// Compiling `path` panics.
  pub fn panic_on(&self, path: &str) {
    self.panicking.lock().unwrap().insert(path.to_string());
  }

  /// Highest number of backend operations observed running at once.
  pub fn max_active(&self) -> usize {
    self.max_active.load(Ordering::SeqCst)
  }

  pub fn checkers_created(&self) -> usize {
    self.checkers.load(Ordering::SeqCst)
  }

  /// Backend calls in the order they started, e.g. `compile_file:/p/A.fs`.
  pub fn calls(&self) -> Vec<String> {
    self.calls.lock().unwrap().clone()
  }

  async fn enter(&self, call: String) -> ActiveGuard<'_> {
    self.calls.lock().unwrap().push(call);
    let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
    self.max_active.fetch_max(now, Ordering::SeqCst);
    let guard = ActiveGuard(&self.active);
    if !self.delay.is_zero() {
      tokio::time::sleep(self.delay).await;
    }
    guard
  }

  fn emit(&self, path: &str, checker: &FakeChecker) -> Result<String, CompilerError> {
    if self.panicking.lock().unwrap().contains(path) {
      panic!("emitter crashed on {path}");
    }
    if self.broken.lock().unwrap().contains(path) {
      return Err(CompilerError::Emit {
        path: path.to_string(),
        message: "type mismatch".to_string(),
      });
    }
    Ok(format!("// generation {}\nexport const file = \"{path}\";", checker.generation))
  }
}

struct ActiveGuard<'a>(&'a AtomicUsize);

impl Drop for ActiveGuard<'_> {
  fn drop(&mut self) {
    self.0.fetch_sub(1, Ordering::SeqCst);
  }
}

#[async_trait::async_trait]
impl CompilerBackend for FakeBackend {
  type Checker = FakeChecker;

  async fn crack_project(&self, config: &ProjectConfig) -> Result<ResolvedProject, CompilerError> {
    let _active = self.enter(format!("crack_project:{}", config.project_file)).await;

    let sources = self
      .projects
      .lock()
      .unwrap()
      .get(&config.project_file)
      .cloned()
      .ok_or_else(|| CompilerError::ProjectNotFound(config.project_file.clone()))?;

    Ok(ResolvedProject {
      project_file: config.project_file.clone(),
      source_files: sources,
      defines: config.compiler.defines.clone(),
      target_framework: None,
      other_options: Vec::new(),
      references: Vec::new(),
    })
  }

  fn create_checker(&self, project: &ResolvedProject) -> Result<Self::Checker, CompilerError> {
    let generation = self.checkers.fetch_add(1, Ordering::SeqCst) + 1;
    Ok(FakeChecker {
      generation,
      project_file: project.project_file.clone(),
    })
  }

  async fn compile_project(
    &self,
    _sources: &SourceReader,
    checker: &Self::Checker,
    _resolver: &dyn PathResolver,
    _config: &ProjectConfig,
    project: &ResolvedProject,
  ) -> Result<CompiledOutput, CompilerError> {
    let _active = self.enter(format!("compile_project:{}", project.project_file)).await;
    self.project_compiles.fetch_add(1, Ordering::SeqCst);
    assert_eq!(checker.project_file, project.project_file, "checker from another project");

    let mut output = CompiledOutput::new();
    for file in &project.source_files {
      output.insert(file.clone(), self.emit(file, checker)?);
    }
    Ok(output)
  }

  async fn compile_file(
    &self,
    sources: &SourceReader,
    checker: &Self::Checker,
    _resolver: &dyn PathResolver,
    _config: &ProjectConfig,
    project: &ResolvedProject,
    path: &str,
  ) -> Result<CompiledOutput, CompilerError> {
    let _active = self.enter(format!("compile_file:{path}")).await;
    self.file_compiles.fetch_add(1, Ordering::SeqCst);
    assert_eq!(sources.files(), project.source_files.as_slice());

    if !project.contains(path) {
      return Err(CompilerError::NotInProject(path.to_string()));
    }

    let mut output = CompiledOutput::new();
    output.insert(path.to_string(), self.emit(path, checker)?);
    Ok(output)
  }
}

/// A running SessionActor around a shared [`FakeBackend`].
pub struct SessionTestContext {
  pub backend: Arc<FakeBackend>,
  pub handle: SessionHandle,
  pub cancel: CancellationToken,
  pub task: JoinHandle<()>,
}

impl SessionTestContext {
  pub fn new(backend: FakeBackend) -> Self {
    Self::with_config(backend, SessionActorConfig::default())
  }

  pub fn with_config(backend: FakeBackend, config: SessionActorConfig) -> Self {
    let backend = Arc::new(backend);
    let cancel = CancellationToken::new();
    let (handle, task) = SessionActor::spawn(config, Arc::clone(&backend), cancel.clone());

    Self {
      backend,
      handle,
      cancel,
      task,
    }
  }

  /// Backend with the canonical two-file project at `/p/App.fsproj`.
  pub fn with_app_project() -> Self {
    let backend = FakeBackend::new();
    backend.add_project(APP_PROJECT, &[APP_A, APP_B]);
    Self::new(backend)
  }

  /// Wait for the actor task to finish, failing the test after a timeout.
  pub async fn join(self) {
    tokio::time::timeout(Duration::from_secs(5), self.task)
      .await
      .expect("actor should stop")
      .expect("actor task should not panic");
  }
}

pub const APP_PROJECT: &str = "/p/App.fsproj";
pub const APP_A: &str = "/p/A.fs";
pub const APP_B: &str = "/p/B.fs";

pub fn init_params(project: &str) -> InitParams {
  InitParams {
    project: project.to_string(),
    fable_library: "/lib".to_string(),
  }
}
