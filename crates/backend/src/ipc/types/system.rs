//! System IPC types - liveness checks
use serde::{Deserialize, Serialize};

use crate::{
  impl_ipc_request,
  ipc::{RequestData, ResponseData},
};

#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PingParams {
  pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PingResult {
  pub message: String,
}

impl PingResult {
  pub fn pong() -> Self {
    Self {
      message: "pong".to_string(),
    }
  }

  /// Echo the caller's message, or `pong` when there is none.
  pub fn reply_to(params: &PingParams) -> Self {
    match &params.message {
      Some(message) => Self {
        message: message.clone(),
      },
      None => Self::pong(),
    }
  }
}

impl_ipc_request!(
  PingParams => PingResult,
  ResponseData::Ping(v) => v,
  v => RequestData::Ping(v),
  v => ResponseData::Ping(v)
);
