//! Project configuration and the resolved project description

use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::CompilerError;

/// Defines every project is compiled with, ahead of the project's own.
const DEFAULT_DEFINES: &[&str] = &["FABLE_COMPILER", "FABLE_COMPILER_4", "FABLE_COMPILER_JAVASCRIPT"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
  #[default]
  JavaScript,
  TypeScript,
  Python,
  Rust,
}

impl Language {
  pub fn as_str(&self) -> &'static str {
    match self {
      Language::JavaScript => "javascript",
      Language::TypeScript => "typescript",
      Language::Python => "python",
      Language::Rust => "rust",
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verbosity {
  Silent,
  #[default]
  Normal,
  Verbose,
}

/// Code generation options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompilerOptions {
  pub language: Language,
  pub defines: Vec<String>,
  pub verbosity: Verbosity,
  pub debug_mode: bool,
  pub typed_arrays: bool,
  pub optimize_ast: bool,
  pub file_extension: String,
}

impl Default for CompilerOptions {
  fn default() -> Self {
    Self {
      language: Language::JavaScript,
      defines: DEFAULT_DEFINES.iter().map(|d| d.to_string()).collect(),
      verbosity: Verbosity::Normal,
      debug_mode: false,
      typed_arrays: true,
      optimize_ast: false,
      file_extension: ".fs.js".to_string(),
    }
  }
}

/// How to compile one project.
///
/// Built once per `init` and never mutated; the next `init` builds a new one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConfig {
  pub project_file: String,
  pub root_dir: String,
  pub out_dir: Option<String>,
  pub fable_library: String,
  pub configuration: String,
  pub no_restore: bool,
  pub no_cache: bool,
  pub no_parallel_type_check: bool,
  pub compiler: CompilerOptions,
}

impl ProjectConfig {
  /// Derive the configuration for an `init` request.
  ///
  /// Only the two paths come from the caller; everything else is daemon
  /// policy, so the same payload always yields the same config.
  pub fn from_init(project: &str, fable_library: &str) -> Result<Self, CompilerError> {
    let project_file = normalize_path(project.trim());
    if project_file.is_empty() {
      return Err(CompilerError::InvalidProject {
        path: project.to_string(),
        message: "project path is empty".to_string(),
      });
    }

    let root_dir = match project_file.rfind('/') {
      Some(0) => "/".to_string(),
      Some(idx) => project_file[..idx].to_string(),
      None => ".".to_string(),
    };

    Ok(Self {
      project_file,
      root_dir,
      out_dir: None,
      fable_library: normalize_path(fable_library.trim()),
      configuration: "Release".to_string(),
      no_restore: true,
      no_cache: true,
      no_parallel_type_check: false,
      compiler: CompilerOptions::default(),
    })
  }
}

/// Output of project cracking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedProject {
  pub project_file: String,
  /// Source files in compilation order; later files may depend on earlier ones.
  pub source_files: Vec<String>,
  /// Effective conditional-compilation symbols.
  pub defines: Vec<String>,
  pub target_framework: Option<String>,
  /// Extra compiler flags taken verbatim from the project.
  pub other_options: Vec<String>,
  /// Referenced project files, in the order they were cracked.
  pub references: Vec<String>,
}

impl ResolvedProject {
  pub fn contains(&self, path: &str) -> bool {
    self.source_files.iter().any(|f| f == path)
  }
}

/// Convert a path to the project convention (forward slashes).
pub fn normalize_path(path: &str) -> String {
  path.replace('\\', "/")
}

/// Spell a source path the way project cracking does: forward slashes,
/// `.` and `..` segments folded.
pub fn normalize_file_path(path: &str) -> String {
  resolve_relative("", path)
}

/// Join `relative` onto `base_dir` and fold `.`/`..` segments lexically.
pub(crate) fn resolve_relative(base_dir: &str, relative: &str) -> String {
  let relative = normalize_path(relative);
  let joined = if Path::new(&relative).is_absolute() {
    PathBuf::from(&relative)
  } else {
    Path::new(base_dir).join(&relative)
  };

  let mut parts: Vec<Component<'_>> = Vec::new();
  for component in joined.components() {
    match component {
      Component::CurDir => {}
      Component::ParentDir => match parts.last() {
        Some(Component::Normal(_)) => {
          parts.pop();
        }
        Some(Component::RootDir) => {}
        _ => parts.push(component),
      },
      other => parts.push(other),
    }
  }

  let cleaned: PathBuf = parts.iter().collect();
  normalize_path(&cleaned.to_string_lossy())
}
