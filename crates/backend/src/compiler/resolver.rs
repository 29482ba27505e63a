//! Output path resolution policy

/// Decides where emitted code and its imports point.
pub trait PathResolver: Send + Sync {
  /// Precompiled output to use instead of compiling `source`, if any.
  fn precompiled_output(&self, source: &str) -> Option<String>;

  /// Directory that imports of `dir` should be rewritten to.
  fn import_dir(&self, dir: &str) -> String;
}

/// Never redirects to precompiled output and leaves import directories as-is.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPathResolver;

impl PathResolver for NoopPathResolver {
  fn precompiled_output(&self, _source: &str) -> Option<String> {
    None
  }

  fn import_dir(&self, dir: &str) -> String {
    dir.to_string()
  }
}
