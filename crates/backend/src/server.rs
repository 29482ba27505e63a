//! RPC front end for the session actor.
//!
//! Every transport ends up in [`serve`]: it reads newline-delimited JSON
//! requests from one half of a duplex stream and writes responses to the
//! other. Each request runs in its own task, so a `ping` is answered while
//! a slow `init` is still queued at the actor, and responses may go out in
//! a different order than the requests came in. Callers match them up by id.
//!
//! The front end holds no compiler state. `init` and `compile` become one
//! message each to the [`SessionHandle`]; `ping` never touches the actor.
//!
//! # Example
//!
//! ```ignore
//! let server = Server::new(ServerConfig {
//!     socket_path: PathBuf::from("/tmp/fabled.sock"),
//!     session: handle.clone(),
//! });
//! server.run(cancel_token).await?;
//! ```

use std::{
  path::PathBuf,
  sync::atomic::{AtomicU64, Ordering},
  time::Instant,
};

use futures::{SinkExt, StreamExt};
use tokio::{
  io::{AsyncRead, AsyncWrite},
  net::UnixListener,
  sync::mpsc,
  task::JoinSet,
};
use tokio_util::{
  codec::{FramedRead, FramedWrite, LinesCodec},
  sync::CancellationToken,
};
use tracing::{debug, error, info, trace, warn};

use crate::{
  actor::SessionHandle,
  ipc::{IpcError, PARSE_ERROR, Request, RequestData, Response, ResponseData, SESSION_GONE, system::PingResult},
};

// ============================================================================
// Server Configuration
// ============================================================================

/// Configuration for the Unix socket server.
pub struct ServerConfig {
  /// Path to the Unix socket for IPC
  pub socket_path: PathBuf,

  /// Every connection talks to this one session
  pub session: SessionHandle,
}

// ============================================================================
// Server
// ============================================================================

/// Unix socket server; one task per connection, all sharing one session.
pub struct Server {
  config: ServerConfig,
  /// Total requests handled across all connections
  request_count: AtomicU64,
}

impl Server {
  pub fn new(config: ServerConfig) -> Self {
    Self {
      config,
      request_count: AtomicU64::new(0),
    }
  }

  pub fn request_count(&self) -> u64 {
    self.request_count.load(Ordering::Relaxed)
  }

  /// Run the server until the cancellation token is triggered.
  ///
  /// Removes a stale socket file first and removes the socket on the way out.
  pub async fn run(&self, cancel: CancellationToken) -> Result<(), IpcError> {
    if self.config.socket_path.exists() {
      tokio::fs::remove_file(&self.config.socket_path).await?;
    }

    if let Some(parent) = self.config.socket_path.parent() {
      tokio::fs::create_dir_all(parent).await?;
    }

    let listener = UnixListener::bind(&self.config.socket_path)?;
    info!("Server listening on {:?}", self.config.socket_path);

    let mut connections = JoinSet::new();

    loop {
      tokio::select! {
        biased;

        _ = cancel.cancelled() => {
          info!("Server shutting down (cancelled)");
          break;
        }

        result = listener.accept() => {
          match result {
            Ok((stream, _)) => {
              let session = self.config.session.clone();
              let (reader, writer) = stream.into_split();
              connections.spawn(async move {
                debug!("Client connected");
                match serve(reader, writer, session).await {
                  Ok(handled) => {
                    debug!(requests = handled, "Client disconnected");
                    handled
                  }
                  Err(e) => {
                    warn!(error = %e, "Connection ended with error");
                    0
                  }
                }
              });
            }
            Err(e) => {
              error!("Accept error: {}", e);
            }
          }
        }

        Some(done) = connections.join_next(), if !connections.is_empty() => {
          if let Ok(handled) = done {
            self.request_count.fetch_add(handled, Ordering::Relaxed);
          }
        }
      }
    }

    connections.shutdown().await;

    if self.config.socket_path.exists() {
      tokio::fs::remove_file(&self.config.socket_path).await?;
    }

    info!(requests = self.request_count(), "Server stopped");
    Ok(())
  }
}

// ============================================================================
// Connection Handler
// ============================================================================

/// Serve one connection until the reader reaches EOF.
///
/// # Protocol
///
/// - Requests: `{"id", "method", "params"}`, one JSON object per line
/// - Responses: `{"id", "method", "result"}` or `{"id", "error"}`, one per line
///
/// # Error Handling
///
/// - Unparseable lines get a parse error (-32700) but don't close the connection
/// - A stopped session actor turns into an RPC error (-32000) per request
/// - Read errors end the connection
///
/// Requests still in flight at EOF are abandoned. Returns the number of
/// requests read.
pub async fn serve<R, W>(reader: R, writer: W, session: SessionHandle) -> Result<u64, IpcError>
where
  R: AsyncRead + Unpin + Send + 'static,
  W: AsyncWrite + Unpin + Send + 'static,
{
  let mut lines = FramedRead::new(reader, LinesCodec::new());
  let (reply_tx, reply_rx) = mpsc::channel::<Response>(64);
  let writer = tokio::spawn(write_responses(FramedWrite::new(writer, LinesCodec::new()), reply_rx));

  let mut in_flight = JoinSet::new();
  let mut request_count = 0u64;

  while let Some(result) = lines.next().await {
    let line = match result {
      Ok(l) => l,
      Err(e) => {
        warn!(error = %e, "Error reading from client");
        break;
      }
    };

    let trimmed = line.trim();
    if trimmed.is_empty() {
      continue;
    }
    request_count += 1;

    let request = match Request::parse(trimmed) {
      Ok(r) => r,
      Err(e) => {
        warn!("Invalid request JSON: {}", e);
        let response = Response::rpc_error(request_id_of(trimmed), PARSE_ERROR, format!("Parse error: {}", e));
        if reply_tx.send(response).await.is_err() {
          break;
        }
        continue;
      }
    };

    let session = session.clone();
    let reply_tx = reply_tx.clone();
    in_flight.spawn(async move {
      let response = dispatch(request, &session).await;
      // Writer gone means the connection is gone
      let _ = reply_tx.send(response).await;
    });

    while in_flight.try_join_next().is_some() {}
  }

  if !in_flight.is_empty() {
    debug!(abandoned = in_flight.len(), "Input closed with requests in flight");
  }
  in_flight.shutdown().await;
  drop(reply_tx);

  writer
    .await
    .map_err(|e| IpcError::Connection(format!("writer task failed: {e}")))??;
  Ok(request_count)
}

async fn write_responses<W>(
  mut sink: FramedWrite<W, LinesCodec>,
  mut responses: mpsc::Receiver<Response>,
) -> Result<(), IpcError>
where
  W: AsyncWrite + Unpin,
{
  while let Some(response) = responses.recv().await {
    let json = serde_json::to_string(&response)?;
    sink.send(json).await?;
  }
  Ok(())
}

/// Best-effort id of a request that failed to parse.
fn request_id_of(line: &str) -> String {
  serde_json::from_str::<serde_json::Value>(line)
    .ok()
    .and_then(|v| v.get("id").and_then(|id| id.as_str()).map(str::to_string))
    .unwrap_or_else(|| "unknown".to_string())
}

async fn dispatch(request: Request, session: &SessionHandle) -> Response {
  let Request { id, data } = request;
  let method = data.method();
  let start = Instant::now();
  trace!(id = %id, method, "Processing request");

  let result = match data {
    RequestData::Ping(params) => Ok(ResponseData::Ping(PingResult::reply_to(&params))),
    RequestData::Init(params) => session
      .project_changed(params)
      .await
      .map(|reply| ResponseData::Init(reply.into())),
    RequestData::Compile(params) => session
      .compile_file(params.file_name)
      .await
      .map(|reply| ResponseData::Compile(reply.into())),
  };

  debug!(
    id = %id,
    method,
    elapsed_ms = start.elapsed().as_millis() as u64,
    ok = result.is_ok(),
    "Request complete"
  );

  match result {
    Ok(data) => Response::success(id, data),
    Err(e) => Response::rpc_error(id, SESSION_GONE, e.to_string()),
  }
}
