//! Whitelist data model, persistence and matching.
//!
//! Provides the entry model, the JSON-backed store with atomic writes and
//! backups, and the match engine that decides whether a target network is
//! protected.

mod backup;
mod bssid;
mod document;
mod entry;
mod error;
mod matcher;
mod policy;
mod store;
pub mod timestamp;

pub use backup::*;
pub use bssid::*;
pub use document::*;
pub use entry::*;
pub use error::*;
pub use matcher::*;
pub use policy::*;
pub use store::*;
