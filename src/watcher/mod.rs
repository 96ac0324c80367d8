//! Watcher module for the whitelist file.
//!
//! Reloads the store when the file is edited outside this process.

mod error;
mod file_watcher;

pub use error::WatcherError;
pub use file_watcher::{run_reloader, WatchEvent, WhitelistWatcher};
