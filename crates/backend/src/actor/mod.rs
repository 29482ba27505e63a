//! Session actor
//!
//! One long-lived task owns the compiled [`Session`] and is the only thing
//! that ever touches it. Everyone else talks to it through a cloneable
//! [`SessionHandle`], posting a [`SessionMessage`] that carries a oneshot
//! reply slot and awaiting the reply.
//!
//! # Processing discipline
//!
//! - Messages are handled strictly one at a time, in mailbox (FIFO) order
//! - While a compile is running nothing else is dequeued, so at most one
//!   backend operation is ever in flight
//! - A failed project compile leaves the previous session in place
//! - After `Disconnect` (or cancellation) queued messages are dropped and
//!   their callers see [`SessionError::Disconnected`]
//!
//! ```text
//!                 ┌──────────────── SessionActor ────────────────┐
//! handle ──mpsc──▶│ Uninitialized ──ProjectChanged ok──▶ Ready(s) │
//! handle ──mpsc──▶│                  ◀─ProjectChanged ok (s')──┘  │
//!    ▲            └────────────────────────────────┬─────────────┘
//!    └──────────────────── oneshot reply ───────────┘
//! ```

pub mod handle;
pub mod message;
mod session;
mod state;

#[cfg(test)]
mod __tests__;

pub use handle::{SessionError, SessionHandle};
pub use message::{FileReply, ProjectReply, SessionMessage};
pub use session::{NO_ACTIVE_SESSION, SessionActor, SessionActorConfig};
pub use state::{Session, SessionState};
