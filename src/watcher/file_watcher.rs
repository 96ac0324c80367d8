//! Whitelist file watcher with notify integration.
//!
//! Watches the directory holding the whitelist file, because atomic saves
//! replace the file rather than modify it in place.

use std::path::{Path, PathBuf};
use std::sync::mpsc as std_mpsc;
use std::thread;
use std::time::Duration;

use notify_debouncer_full::{
    new_debouncer,
    notify::{EventKind, RecursiveMode},
    DebounceEventResult, DebouncedEvent,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::error::WatcherError;
use crate::guard::WhitelistGuard;

/// Debounce window for file system events.
const DEBOUNCE: Duration = Duration::from_millis(500);

/// Events emitted by the whitelist watcher.
#[derive(Debug)]
pub enum WatchEvent {
    /// The file was created, written or renamed into place.
    Changed(PathBuf),
    /// The file was removed.
    Removed(PathBuf),
    /// An error occurred during watching.
    Error(WatcherError),
}

/// Watches the whitelist file for external edits.
///
/// Uses notify-debouncer-full and bridges events to a tokio mpsc channel.
/// Dropping the watcher stops it.
pub struct WhitelistWatcher {
    path: PathBuf,
    stop_tx: std_mpsc::Sender<()>,
}

impl WhitelistWatcher {
    /// Start watching `path`.
    ///
    /// Returns the watcher and a receiver for watch events.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directory cannot be resolved or the
    /// file watcher cannot be created.
    pub fn new(path: &Path) -> Result<(Self, mpsc::UnboundedReceiver<WatchEvent>), WatcherError> {
        let path = resolve(path)?;
        let dir = path
            .parent()
            .ok_or_else(|| WatcherError::NoParent(path.clone()))?
            .to_path_buf();

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (stop_tx, stop_rx) = std_mpsc::channel();
        let (notify_tx, notify_rx) = std_mpsc::channel();

        let mut debouncer = new_debouncer(DEBOUNCE, None, move |result| {
            let _ = notify_tx.send(result);
        })?;
        debouncer.watch(&dir, RecursiveMode::NonRecursive)?;

        let watched = path.clone();
        thread::spawn(move || {
            loop {
                if stop_rx.try_recv().is_ok() {
                    break;
                }
                match notify_rx.recv_timeout(Duration::from_millis(100)) {
                    Ok(result) => {
                        if !forward(result, &watched, &event_tx) {
                            break;
                        }
                    }
                    Err(std_mpsc::RecvTimeoutError::Timeout) => {}
                    Err(std_mpsc::RecvTimeoutError::Disconnected) => break,
                }
            }

            // Keep debouncer alive until thread exits
            drop(debouncer);
        });

        tracing::debug!(path = %path.display(), "Watching whitelist file");
        Ok((Self { path, stop_tx }, event_rx))
    }

    /// The absolute path being watched.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for WhitelistWatcher {
    fn drop(&mut self) {
        let _ = self.stop_tx.send(());
    }
}

fn resolve(path: &Path) -> Result<PathBuf, WatcherError> {
    let file_name = path
        .file_name()
        .ok_or_else(|| WatcherError::NoParent(path.to_path_buf()))?;
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    Ok(parent.canonicalize()?.join(file_name))
}

/// Forward relevant events. Returns false once the receiver is gone.
fn forward(
    result: DebounceEventResult,
    watched: &Path,
    event_tx: &mpsc::UnboundedSender<WatchEvent>,
) -> bool {
    match result {
        Ok(events) => events
            .iter()
            .filter_map(|event| classify(event, watched))
            .all(|event| event_tx.send(event).is_ok()),
        Err(errors) => errors
            .into_iter()
            .all(|error| event_tx.send(WatchEvent::Error(error.into())).is_ok()),
    }
}

fn classify(event: &DebouncedEvent, watched: &Path) -> Option<WatchEvent> {
    if !event.paths.iter().any(|p| p == watched) {
        return None;
    }
    match event.kind {
        EventKind::Remove(_) => Some(WatchEvent::Removed(watched.to_path_buf())),
        EventKind::Create(_) | EventKind::Modify(_) if watched.exists() => {
            Some(WatchEvent::Changed(watched.to_path_buf()))
        }
        _ => None,
    }
}

/// Reload the guard's store on every change until `cancel` fires.
///
/// A reload that fails keeps the last-known-good whitelist.
pub async fn run_reloader(
    guard: WhitelistGuard,
    mut events: mpsc::UnboundedReceiver<WatchEvent>,
    cancel: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            () = cancel.cancelled() => break,
            event = events.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };

        match event {
            WatchEvent::Changed(path) => match guard.reload().await {
                Ok(doc) => tracing::info!(
                    path = %path.display(),
                    count = doc.networks.len(),
                    "Whitelist reloaded after external change"
                ),
                Err(e) => tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Whitelist reload failed, keeping previous entries"
                ),
            },
            WatchEvent::Removed(path) => {
                tracing::warn!(path = %path.display(), "Whitelist file removed, keeping entries in memory");
            }
            WatchEvent::Error(e) => tracing::warn!(error = %e, "Whitelist watcher error"),
        }
    }
    tracing::debug!("Whitelist reloader stopped");
}
