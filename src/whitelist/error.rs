//! Whitelist error types.

use std::path::PathBuf;

/// Errors that can occur during whitelist store operations.
#[derive(thiserror::Error, Debug)]
pub enum WhitelistError {
    /// Entry failed validation and was not persisted.
    #[error("Invalid entry: {0}")]
    Validation(String),

    /// No entry with the given id or identifier.
    #[error("Network not found: {0}")]
    NotFound(String),

    /// An entry with the same BSSID and SSID already exists.
    #[error("Network already whitelisted: {0}")]
    DuplicateEntry(String),

    /// The store file exists but cannot be read or parsed.
    #[error("Whitelist store at {path} is corrupt: {reason}")]
    CorruptStore { path: PathBuf, reason: String },

    /// Writing the store to disk failed. The in-memory state is unchanged.
    #[error("Failed to persist whitelist to {path}: {source}")]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Serializing the document failed.
    #[error("JSON serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The store has no usable state (never loaded, or a lock was poisoned).
    #[error("Whitelist store unavailable: {0}")]
    Unavailable(String),
}

impl WhitelistError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn persistence(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Persistence {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn corrupt(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::CorruptStore {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
