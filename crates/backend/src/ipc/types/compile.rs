//! Compile IPC types - `init` (project changed) and `compile` (file changed)
//!
//! Both methods answer with an [`Outcome`]: compile failures are ordinary
//! results tagged `"type": "error"`, never RPC-level errors.

use serde::{Deserialize, Serialize};

use crate::{
  compiler::{CompiledOutput, ResolvedProject},
  impl_ipc_request,
  ipc::{RequestData, ResponseData},
};

// ============================================================================
// Request param types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitParams {
  /// Path to the project file
  pub project: String,
  /// Path to the support library emitted code imports from
  pub fable_library: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileParams {
  pub file_name: String,
}

// ============================================================================
// Results
// ============================================================================

/// Tagged success/failure of a compile operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Outcome<T> {
  Success { data: T },
  Error { error: String },
}

impl<T> Outcome<T> {
  pub fn is_success(&self) -> bool {
    matches!(self, Outcome::Success { .. })
  }

  pub fn into_result(self) -> Result<T, String> {
    match self {
      Outcome::Success { data } => Ok(data),
      Outcome::Error { error } => Err(error),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitResult {
  pub project_options: ResolvedProject,
  pub compiled_files: CompiledOutput,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileResult {
  pub compiled_files: CompiledOutput,
}

impl From<Result<(ResolvedProject, CompiledOutput), String>> for Outcome<InitResult> {
  fn from(reply: Result<(ResolvedProject, CompiledOutput), String>) -> Self {
    match reply {
      Ok((project_options, compiled_files)) => Outcome::Success {
        data: InitResult {
          project_options,
          compiled_files,
        },
      },
      Err(error) => Outcome::Error { error },
    }
  }
}

impl From<Result<CompiledOutput, String>> for Outcome<CompileResult> {
  fn from(reply: Result<CompiledOutput, String>) -> Self {
    match reply {
      Ok(compiled_files) => Outcome::Success {
        data: CompileResult { compiled_files },
      },
      Err(error) => Outcome::Error { error },
    }
  }
}

impl_ipc_request!(
  InitParams => Outcome<InitResult>,
  ResponseData::Init(v) => v,
  v => RequestData::Init(v),
  v => ResponseData::Init(v)
);
impl_ipc_request!(
  CompileParams => Outcome<CompileResult>,
  ResponseData::Compile(v) => v,
  v => RequestData::Compile(v),
  v => ResponseData::Compile(v)
);
