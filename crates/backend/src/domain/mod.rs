//! Domain types - daemon configuration
//!
//! Project-level compiler types live in [`crate::compiler`]; this module only
//! holds what the daemon itself is configured with.

pub mod config;
