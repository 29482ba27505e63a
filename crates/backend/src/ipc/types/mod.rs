//! IPC types - request parameters and response payloads per method
//!
//! - [`system`]: liveness (`ping`)
//! - [`compile`]: project and file compilation (`init`, `compile`)

pub mod compile;
pub mod system;
