//! IPC module - client/server communication and type definitions
//!
//! One JSON object per line in each direction. Requests carry
//! `{"id", "method", "params"}`; responses echo the id and method and carry
//! either `"result"` or `"error"`.
use serde::{Deserialize, Serialize};

pub mod types;

pub mod client;

pub use client::{Client, IpcRequest};
pub use types::*;

/// Request line was not valid JSON or named an unknown method
pub const PARSE_ERROR: i32 = -32700;
/// The session actor is no longer accepting messages
pub const SESSION_GONE: i32 = -32000;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum IpcError {
  #[error("Ser/de error: {0}")]
  Serde(String),
  #[error("RPC error {code}: {message}")]
  Rpc { code: i32, message: String },
  #[error("No result in response")]
  NoResult,
  #[error("IO error: {0}")]
  Io(String),
  #[error("Connection error: {0}")]
  Connection(String),
  #[error("Codec error: {0}")]
  Codec(String),
}

impl From<serde_json::Error> for IpcError {
  fn from(err: serde_json::Error) -> Self {
    IpcError::Serde(err.to_string())
  }
}

impl From<std::io::Error> for IpcError {
  fn from(err: std::io::Error) -> Self {
    IpcError::Io(err.to_string())
  }
}

impl From<tokio_util::codec::LinesCodecError> for IpcError {
  fn from(err: tokio_util::codec::LinesCodecError) -> Self {
    IpcError::Codec(err.to_string())
  }
}

// ============================================================================
// Request/Response envelopes (top-level IPC protocol)
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
  pub id: String,
  #[serde(flatten)]
  pub data: RequestData,
}

impl Request {
  /// Parse one request line. A missing `params` is read as `{}`, so methods
  /// whose params are all optional can be called without them.
  pub fn parse(line: &str) -> Result<Self, serde_json::Error> {
    let mut value: serde_json::Value = serde_json::from_str(line)?;
    if let Some(object) = value.as_object_mut() {
      object
        .entry("params")
        .or_insert_with(|| serde_json::Value::Object(Default::default()));
    }
    serde_json::from_value(value)
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "method", content = "params")]
pub enum RequestData {
  Ping(system::PingParams),
  Init(compile::InitParams),
  Compile(compile::CompileParams),
}

impl RequestData {
  pub fn method(&self) -> &'static str {
    match self {
      RequestData::Ping(_) => "ping",
      RequestData::Init(_) => "init",
      RequestData::Compile(_) => "compile",
    }
  }
}

// ============================================================================
// Response envelope
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
  pub id: String,
  #[serde(flatten)]
  pub scenario: ResponseScenario,
}

impl Response {
  pub fn is_error(&self) -> bool {
    matches!(self.scenario, ResponseScenario::Error { .. })
  }

  pub fn get_data(&self) -> Option<&ResponseData> {
    match &self.scenario {
      ResponseScenario::Result { data } => Some(data),
      _ => None,
    }
  }

  pub fn get_error(&self) -> Option<&IpcError> {
    match &self.scenario {
      ResponseScenario::Error { error } => Some(error),
      _ => None,
    }
  }

  /// Create a success response with typed data
  pub fn success(id: impl Into<String>, data: ResponseData) -> Self {
    Self {
      id: id.into(),
      scenario: ResponseScenario::Result { data },
    }
  }

  /// Create an error response
  pub fn error(id: impl Into<String>, error: IpcError) -> Self {
    Self {
      id: id.into(),
      scenario: ResponseScenario::Error { error },
    }
  }

  /// Create an RPC error response with code and message
  pub fn rpc_error(id: impl Into<String>, code: i32, message: impl Into<String>) -> Self {
    Self::error(
      id,
      IpcError::Rpc {
        code,
        message: message.into(),
      },
    )
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseScenario {
  Error {
    error: IpcError,
  },
  Result {
    #[serde(flatten)]
    data: ResponseData,
  },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "method", content = "result")]
pub enum ResponseData {
  Ping(system::PingResult),
  Init(compile::Outcome<compile::InitResult>),
  Compile(compile::Outcome<compile::CompileResult>),
}
