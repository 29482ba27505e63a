//! Source reader over a project's files
//!
//! Files are read lazily on first access and then held for the lifetime of
//! the reader. A reader is a snapshot: build a new one to observe edits made
//! on disk since the last one was used.

use std::sync::Arc;

use dashmap::DashMap;

use super::CompilerError;

#[derive(Debug, Default)]
pub struct SourceReader {
  files: Vec<String>,
  contents: DashMap<String, Arc<str>>,
}

impl SourceReader {
  pub fn new(files: &[String]) -> Self {
    Self {
      files: files.to_vec(),
      contents: DashMap::new(),
    }
  }

  /// Files this reader covers, in project order.
  pub fn files(&self) -> &[String] {
    &self.files
  }

  pub fn contains(&self, path: &str) -> bool {
    self.files.iter().any(|f| f == path)
  }

  /// Read a file, hitting the disk only the first time.
  pub async fn read(&self, path: &str) -> Result<Arc<str>, CompilerError> {
    if !self.contains(path) {
      return Err(CompilerError::NotInProject(path.to_string()));
    }

    if let Some(content) = self.contents.get(path) {
      return Ok(Arc::clone(content.value()));
    }

    let content: Arc<str> = tokio::fs::read_to_string(path)
      .await
      .map_err(|source| CompilerError::Io {
        path: path.to_string(),
        source,
      })?
      .into();

    self.contents.insert(path.to_string(), Arc::clone(&content));
    Ok(content)
  }
}
