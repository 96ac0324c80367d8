//! Whitelist guard wired into the host's deauth hooks.

mod error;
mod hooks;
mod service;

pub use error::*;
pub use hooks::*;
pub use service::*;
