pub mod actor;
pub mod compiler;
pub mod server;

mod domain;
pub use domain::config;

pub mod dirs;
pub mod ipc;

mod daemon;
pub use daemon::{Daemon, RuntimeConfig, Transport};
