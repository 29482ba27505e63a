//! CLI command implementations

mod daemon;
mod session;

pub use daemon::cmd_daemon;
pub use session::{cmd_compile, cmd_init, cmd_ping};
