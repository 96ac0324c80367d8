//! Watcher error types.

use std::path::PathBuf;

/// Errors that can occur while watching the whitelist file.
#[derive(thiserror::Error, Debug)]
pub enum WatcherError {
    /// The watched path has no usable parent directory.
    #[error("Cannot watch {0}: no parent directory")]
    NoParent(PathBuf),

    /// Notify watcher error.
    #[error("File watcher error: {0}")]
    Notify(#[from] notify::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_parent_display() {
        let err = WatcherError::NoParent(PathBuf::from("/"));
        assert_eq!(err.to_string(), "Cannot watch /: no parent directory");
    }

    #[test]
    fn test_io_display() {
        let err = WatcherError::from(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "missing",
        ));
        assert_eq!(err.to_string(), "I/O error: missing");
    }
}
