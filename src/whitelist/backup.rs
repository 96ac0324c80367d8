//! Timestamped backup copies of the whitelist file.
//!
//! Backups live next to the store as `<file>.backup.<YYYYmmdd_HHMMSS_micros>`
//! so a lexical sort is also a chronological one.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;

use super::error::WhitelistError;

const BACKUP_MARKER: &str = ".backup.";

fn backup_prefix(path: &Path) -> Option<String> {
    path.file_name()
        .map(|name| format!("{}{BACKUP_MARKER}", name.to_string_lossy()))
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// List existing backups of `path`, oldest first.
///
/// # Errors
///
/// Returns `WhitelistError::Persistence` if the directory cannot be read.
pub fn list_backups(path: &Path) -> Result<Vec<PathBuf>, WhitelistError> {
    let Some(prefix) = backup_prefix(path) else {
        return Ok(Vec::new());
    };
    let dir = parent_dir(path);
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut backups: Vec<PathBuf> = fs::read_dir(&dir)
        .map_err(|e| WhitelistError::persistence(&dir, e))?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|p| {
            p.file_name()
                .is_some_and(|name| name.to_string_lossy().starts_with(&prefix))
        })
        .collect();
    backups.sort();
    Ok(backups)
}

/// Copy `path` to a new timestamped backup and prune old ones down to
/// `max_backups`.
///
/// Returns `None` when there is nothing to back up or retention is zero.
///
/// # Errors
///
/// Returns `WhitelistError::Persistence` if the copy or pruning fails.
pub fn create_backup(path: &Path, max_backups: usize) -> Result<Option<PathBuf>, WhitelistError> {
    if max_backups == 0 || !path.exists() {
        return Ok(None);
    }
    let Some(prefix) = backup_prefix(path) else {
        return Ok(None);
    };

    let stamp = Utc::now().format("%Y%m%d_%H%M%S_%6f");
    let dir = parent_dir(path);
    let mut target = dir.join(format!("{prefix}{stamp}"));
    let mut attempt = 1;
    while target.exists() {
        target = dir.join(format!("{prefix}{stamp}-{attempt}"));
        attempt += 1;
    }

    fs::copy(path, &target).map_err(|e| WhitelistError::persistence(&target, e))?;
    tracing::info!(backup = %target.display(), "Whitelist backup created");

    prune_backups(path, max_backups)?;
    Ok(Some(target))
}

/// Delete the oldest backups so at most `keep` remain.
///
/// # Errors
///
/// Returns `WhitelistError::Persistence` if a backup cannot be removed.
pub fn prune_backups(path: &Path, keep: usize) -> Result<usize, WhitelistError> {
    let backups = list_backups(path)?;
    let excess = backups.len().saturating_sub(keep);
    for old in &backups[..excess] {
        fs::remove_file(old).map_err(|e| WhitelistError::persistence(old, e))?;
        tracing::debug!(backup = %old.display(), "Removed old whitelist backup");
    }
    Ok(excess)
}

/// Most recent backup, if any.
///
/// # Errors
///
/// Returns `WhitelistError::Persistence` if the directory cannot be read.
pub fn latest_backup(path: &Path) -> Result<Option<PathBuf>, WhitelistError> {
    Ok(list_backups(path)?.pop())
}
