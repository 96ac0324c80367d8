//! JSON-backed whitelist store.
//!
//! The current document is published as an `Arc` snapshot: readers clone the
//! `Arc` and never see a half-applied mutation. All mutations run under a
//! single writer lock, work on a private copy, persist it atomically and only
//! then swap it in, so memory and disk never diverge.

use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use chrono::Utc;

use super::backup;
use super::document::{
    ExportDocument, ImportMode, ImportOptions, ImportSummary, WhitelistDocument, WhitelistStats,
};
use super::entry::{EntryUpdate, NewEntry, WhitelistEntry};
use super::error::WhitelistError;
use super::Bssid;

/// Behavior knobs for a store.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Copy the live file aside before every overwrite.
    pub auto_backup: bool,
    /// Number of backups retained.
    pub max_backups: usize,
    /// Entries seeded when the file does not exist yet.
    pub default_entries: Vec<NewEntry>,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            auto_backup: true,
            max_backups: 5,
            default_entries: Vec::new(),
        }
    }
}

#[derive(Debug)]
struct WriterState {
    next_id: u64,
}

/// Persistent, thread-safe whitelist collection.
#[derive(Debug)]
pub struct WhitelistStore {
    path: PathBuf,
    options: StoreOptions,
    current: RwLock<Option<Arc<WhitelistDocument>>>,
    writer: Mutex<WriterState>,
}

impl WhitelistStore {
    /// Create an unloaded store. The file is read on the first access.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, options: StoreOptions) -> Self {
        Self {
            path: path.into(),
            options,
            current: RwLock::new(None),
            writer: Mutex::new(WriterState { next_id: 1 }),
        }
    }

    /// Create a store and load it immediately.
    ///
    /// # Errors
    ///
    /// Returns `WhitelistError::CorruptStore` if the file exists but cannot be
    /// parsed, or `WhitelistError::Persistence` if a new file cannot be
    /// created.
    pub fn open(path: impl Into<PathBuf>, options: StoreOptions) -> Result<Self, WhitelistError> {
        let store = Self::new(path, options);
        store.load()?;
        Ok(store)
    }

    /// Path of the live file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Store options.
    #[must_use]
    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    /// True once a document has been loaded successfully.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.current.read().is_ok_and(|current| current.is_some())
    }

    /// Read the file from disk and publish it.
    ///
    /// A missing file is created with the configured default entries. A
    /// malformed file is reported and the last-known-good state, if any, is
    /// kept.
    ///
    /// # Errors
    ///
    /// Returns `WhitelistError::CorruptStore` for unreadable or unparsable
    /// files and `WhitelistError::Persistence` if a new file cannot be
    /// written.
    pub fn load(&self) -> Result<Arc<WhitelistDocument>, WhitelistError> {
        let mut writer = self.lock_writer()?;
        self.load_locked(&mut writer)
    }

    /// Current consistent view of the collection, loading it if needed.
    ///
    /// # Errors
    ///
    /// Returns the load error if the store was never loaded and loading
    /// fails now.
    pub fn snapshot(&self) -> Result<Arc<WhitelistDocument>, WhitelistError> {
        if let Some(current) = self.published()? {
            return Ok(current);
        }
        self.load()
    }

    /// All entries in insertion order.
    ///
    /// # Errors
    ///
    /// See [`WhitelistStore::snapshot`].
    pub fn list(&self) -> Result<Vec<WhitelistEntry>, WhitelistError> {
        Ok(self.snapshot()?.networks.clone())
    }

    /// Look up an entry by id.
    ///
    /// # Errors
    ///
    /// Returns `WhitelistError::NotFound` for an unknown id.
    pub fn get(&self, id: u64) -> Result<WhitelistEntry, WhitelistError> {
        self.snapshot()?
            .get(id)
            .cloned()
            .ok_or_else(|| WhitelistError::NotFound(format!("id {id}")))
    }

    /// Validate and append a new entry. Returns the assigned id.
    ///
    /// # Errors
    ///
    /// Returns `WhitelistError::Validation` for invalid fields,
    /// `WhitelistError::DuplicateEntry` if the same BSSID and SSID pair is
    /// already stored, or `WhitelistError::Persistence` if the write fails.
    pub fn add(&self, new: NewEntry) -> Result<u64, WhitelistError> {
        let mut entry = new.into_entry()?;
        let id = self.mutate(false, |doc, writer| {
            ensure_unique(doc, &entry, None)?;
            entry.id = writer.allocate_id();
            entry.added_date = Some(Utc::now());
            let id = entry.id;
            doc.networks.push(entry);
            Ok(id)
        })?;
        tracing::info!(id, "Added network to whitelist");
        Ok(id)
    }

    /// Add a bare BSSID or SSID string, sniffing which one it is.
    ///
    /// # Errors
    ///
    /// See [`WhitelistStore::add`].
    pub fn add_identifier(&self, identifier: &str) -> Result<u64, WhitelistError> {
        self.add(NewEntry::from_identifier(identifier))
    }

    /// Remove an entry by id and return it.
    ///
    /// # Errors
    ///
    /// Returns `WhitelistError::NotFound` for an unknown id or
    /// `WhitelistError::Persistence` if the write fails.
    pub fn remove(&self, id: u64) -> Result<WhitelistEntry, WhitelistError> {
        let removed = self.mutate(false, |doc, _| {
            let position = doc
                .position(id)
                .ok_or_else(|| WhitelistError::NotFound(format!("id {id}")))?;
            Ok(doc.networks.remove(position))
        })?;
        tracing::info!(id, network = %removed.label(), "Removed network from whitelist");
        Ok(removed)
    }

    /// Remove every entry whose BSSID or SSID equals `identifier`.
    ///
    /// # Errors
    ///
    /// Returns `WhitelistError::NotFound` when nothing matched.
    pub fn remove_identifier(&self, identifier: &str) -> Result<Vec<WhitelistEntry>, WhitelistError> {
        let identifier = identifier.trim();
        let target = identifier.parse::<Bssid>().ok();
        let removed = self.mutate(false, |doc, _| {
            let (removed, kept): (Vec<_>, Vec<_>) =
                std::mem::take(&mut doc.networks).into_iter().partition(|entry| {
                    let bssid_hit = match (target, entry.bssid.as_deref()) {
                        (Some(target), Some(stored)) => {
                            stored.parse::<Bssid>().is_ok_and(|stored| stored == target)
                        }
                        _ => false,
                    };
                    bssid_hit || entry.ssid.as_deref() == Some(identifier)
                });
            if removed.is_empty() {
                return Err(WhitelistError::NotFound(identifier.to_string()));
            }
            doc.networks = kept;
            Ok(removed)
        })?;
        tracing::info!(identifier, count = removed.len(), "Removed networks from whitelist");
        Ok(removed)
    }

    /// Merge `update` into an existing entry and re-validate it.
    ///
    /// # Errors
    ///
    /// Returns `WhitelistError::NotFound`, `WhitelistError::Validation`,
    /// `WhitelistError::DuplicateEntry` or `WhitelistError::Persistence`.
    pub fn update(&self, id: u64, update: EntryUpdate) -> Result<WhitelistEntry, WhitelistError> {
        let updated = self.mutate(false, |doc, _| {
            let position = doc
                .position(id)
                .ok_or_else(|| WhitelistError::NotFound(format!("id {id}")))?;
            let mut entry = doc.networks[position].clone();
            update.apply_to(&mut entry);
            entry.normalize()?;
            ensure_unique(doc, &entry, Some(id))?;
            entry.last_updated = Some(Utc::now());
            doc.networks[position] = entry.clone();
            Ok(entry)
        })?;
        tracing::info!(id, "Updated whitelist entry");
        Ok(updated)
    }

    /// Enable or disable an entry.
    ///
    /// # Errors
    ///
    /// Returns `WhitelistError::NotFound` or `WhitelistError::Persistence`.
    pub fn toggle(&self, id: u64, enabled: bool) -> Result<WhitelistEntry, WhitelistError> {
        let toggled = self.mutate(false, |doc, _| {
            let position = doc
                .position(id)
                .ok_or_else(|| WhitelistError::NotFound(format!("id {id}")))?;
            let entry = &mut doc.networks[position];
            entry.enabled = enabled;
            entry.last_updated = Some(Utc::now());
            Ok(entry.clone())
        })?;
        tracing::info!(id, enabled, "Toggled whitelist entry");
        Ok(toggled)
    }

    /// Full collection with a version tag, for external backup.
    ///
    /// # Errors
    ///
    /// See [`WhitelistStore::snapshot`].
    pub fn export(&self) -> Result<ExportDocument, WhitelistError> {
        let snapshot = self.snapshot()?;
        Ok(ExportDocument {
            networks: snapshot.networks.clone(),
            version: snapshot.version.clone(),
            exported_date: Some(Utc::now()),
        })
    }

    /// Import a document. Every entry is validated first; a single invalid
    /// entry rejects the whole import and leaves the store untouched.
    ///
    /// Imported entries receive fresh ids. In merge mode, entries whose BSSID
    /// and SSID pair is already stored are skipped.
    ///
    /// # Errors
    ///
    /// Returns `WhitelistError::Validation` for an invalid entry,
    /// `WhitelistError::DuplicateEntry` if the document repeats an entry, or
    /// `WhitelistError::Persistence` if the backup or write fails.
    pub fn import(
        &self,
        document: WhitelistDocument,
        options: ImportOptions,
    ) -> Result<ImportSummary, WhitelistError> {
        let mut incoming = Vec::with_capacity(document.networks.len());
        for (index, mut entry) in document.networks.into_iter().enumerate() {
            entry.normalize().map_err(|e| {
                WhitelistError::validation(format!("import entry {}: {e}", index + 1))
            })?;
            if incoming
                .iter()
                .any(|seen: &WhitelistEntry| seen.identity() == entry.identity())
            {
                return Err(WhitelistError::DuplicateEntry(format!(
                    "import entry {} repeats {}",
                    index + 1,
                    entry.label()
                )));
            }
            incoming.push(entry);
        }

        let summary = self.mutate(options.create_backup, |doc, writer| {
            if options.mode == ImportMode::Replace {
                doc.networks.clear();
            }
            let mut summary = ImportSummary::default();
            let now = Utc::now();
            for mut entry in incoming {
                if doc.networks.iter().any(|e| e.identity() == entry.identity()) {
                    summary.skipped += 1;
                    continue;
                }
                entry.id = writer.allocate_id();
                entry.added_date.get_or_insert(now);
                doc.networks.push(entry);
                summary.imported += 1;
            }
            summary.total = doc.networks.len();
            Ok(summary)
        })?;

        tracing::info!(
            imported = summary.imported,
            skipped = summary.skipped,
            total = summary.total,
            "Whitelist imported"
        );
        Ok(summary)
    }

    /// Import from raw JSON in either document form.
    ///
    /// # Errors
    ///
    /// Returns `WhitelistError::Validation` if the JSON cannot be parsed, and
    /// otherwise the errors of [`WhitelistStore::import`].
    pub fn import_json(
        &self,
        json: &str,
        options: ImportOptions,
    ) -> Result<ImportSummary, WhitelistError> {
        let document = WhitelistDocument::from_json(json)
            .map_err(|e| WhitelistError::validation(format!("Invalid import data: {e}")))?;
        self.import(document, options)
    }

    /// Aggregate counts over the current collection.
    ///
    /// # Errors
    ///
    /// See [`WhitelistStore::snapshot`].
    pub fn stats(&self) -> Result<WhitelistStats, WhitelistError> {
        Ok(WhitelistStats::from(self.snapshot()?.as_ref()))
    }

    /// Copy the live file to a new backup now.
    ///
    /// # Errors
    ///
    /// Returns `WhitelistError::Persistence` if the copy fails.
    pub fn create_backup(&self) -> Result<Option<PathBuf>, WhitelistError> {
        let _writer = self.lock_writer()?;
        backup::create_backup(&self.path, self.options.max_backups.max(1))
    }

    /// Existing backups, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `WhitelistError::Persistence` if the directory cannot be read.
    pub fn list_backups(&self) -> Result<Vec<PathBuf>, WhitelistError> {
        backup::list_backups(&self.path)
    }

    /// Replace the live file with the most recent backup and publish it.
    ///
    /// # Errors
    ///
    /// Returns `WhitelistError::NotFound` when there is no backup,
    /// `WhitelistError::CorruptStore` if the backup itself is unreadable, or
    /// `WhitelistError::Persistence` if the write fails.
    pub fn restore_latest_backup(&self) -> Result<PathBuf, WhitelistError> {
        let mut writer = self.lock_writer()?;
        let latest = backup::latest_backup(&self.path)?
            .ok_or_else(|| WhitelistError::NotFound("no whitelist backup".to_string()))?;

        let content =
            fs::read_to_string(&latest).map_err(|e| WhitelistError::corrupt(&latest, e))?;
        let mut doc =
            WhitelistDocument::from_json(&content).map_err(|e| WhitelistError::corrupt(&latest, e))?;
        assign_missing_ids(&mut doc);

        self.write_atomic(&doc)?;
        writer.observe(&doc);
        self.publish(doc)?;
        tracing::info!(backup = %latest.display(), "Whitelist restored from backup");
        Ok(latest)
    }

    fn load_locked(&self, writer: &mut WriterState) -> Result<Arc<WhitelistDocument>, WhitelistError> {
        let doc = match fs::read_to_string(&self.path) {
            Ok(content) => {
                let mut doc = WhitelistDocument::from_json(&content)
                    .map_err(|e| WhitelistError::corrupt(&self.path, e))?;
                assign_missing_ids(&mut doc);
                warn_invalid_entries(&doc);
                tracing::info!(
                    path = %self.path.display(),
                    count = doc.networks.len(),
                    "Loaded whitelisted networks"
                );
                doc
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                let doc = self.seed_document(writer);
                self.write_atomic(&doc)?;
                tracing::info!(
                    path = %self.path.display(),
                    count = doc.networks.len(),
                    "Created new whitelist file"
                );
                doc
            }
            Err(e) => return Err(WhitelistError::corrupt(&self.path, e)),
        };

        writer.observe(&doc);
        self.publish(doc)
    }

    fn seed_document(&self, writer: &mut WriterState) -> WhitelistDocument {
        let mut doc = WhitelistDocument {
            last_updated: Some(Utc::now()),
            ..WhitelistDocument::default()
        };
        for new in &self.options.default_entries {
            match new.clone().into_entry() {
                Ok(mut entry) if ensure_unique(&doc, &entry, None).is_ok() => {
                    entry.id = writer.allocate_id();
                    entry.added_date = Some(Utc::now());
                    tracing::info!(network = %entry.label(), "Added default whitelist entry");
                    doc.networks.push(entry);
                }
                Ok(entry) => {
                    tracing::warn!(network = %entry.label(), "Skipping duplicate default entry");
                }
                Err(e) => tracing::warn!(error = %e, "Skipping invalid default entry"),
            }
        }
        doc
    }

    fn mutate<T>(
        &self,
        force_backup: bool,
        apply: impl FnOnce(&mut WhitelistDocument, &mut WriterState) -> Result<T, WhitelistError>,
    ) -> Result<T, WhitelistError> {
        let mut writer = self.lock_writer()?;
        let current = match self.published()? {
            Some(current) => current,
            None => self.load_locked(&mut writer)?,
        };

        let mut doc = WhitelistDocument::clone(&current);
        let value = apply(&mut doc, &mut writer)?;
        doc.last_updated = Some(Utc::now());

        if force_backup || self.options.auto_backup {
            backup::create_backup(&self.path, self.options.max_backups.max(usize::from(force_backup)))?;
        }
        self.write_atomic(&doc)?;
        self.publish(doc)?;
        Ok(value)
    }

    /// Write to a sibling temp file, sync it, then rename over the live file.
    fn write_atomic(&self, doc: &WhitelistDocument) -> Result<(), WhitelistError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| WhitelistError::persistence(parent, e))?;
            }
        }

        let content = serde_json::to_string_pretty(doc)?;
        let temp_path = temp_path(&self.path);

        let written = File::create(&temp_path).and_then(|mut file| {
            file.write_all(content.as_bytes())?;
            file.sync_all()
        });
        if let Err(e) = written {
            let _ = fs::remove_file(&temp_path);
            return Err(WhitelistError::persistence(&temp_path, e));
        }

        if let Err(e) = fs::rename(&temp_path, &self.path) {
            let _ = fs::remove_file(&temp_path);
            return Err(WhitelistError::persistence(&self.path, e));
        }

        tracing::debug!(path = %self.path.display(), "Whitelist saved");
        Ok(())
    }

    fn published(&self) -> Result<Option<Arc<WhitelistDocument>>, WhitelistError> {
        self.current
            .read()
            .map(|current| current.clone())
            .map_err(|_| WhitelistError::Unavailable("snapshot lock poisoned".to_string()))
    }

    fn publish(&self, doc: WhitelistDocument) -> Result<Arc<WhitelistDocument>, WhitelistError> {
        let doc = Arc::new(doc);
        let mut current = self
            .current
            .write()
            .map_err(|_| WhitelistError::Unavailable("snapshot lock poisoned".to_string()))?;
        *current = Some(Arc::clone(&doc));
        Ok(doc)
    }

    fn lock_writer(&self) -> Result<MutexGuard<'_, WriterState>, WhitelistError> {
        self.writer
            .lock()
            .map_err(|_| WhitelistError::Unavailable("writer lock poisoned".to_string()))
    }
}

impl WriterState {
    fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Never hand out an id at or below one already present.
    fn observe(&mut self, doc: &WhitelistDocument) {
        self.next_id = self.next_id.max(doc.max_id() + 1);
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn ensure_unique(
    doc: &WhitelistDocument,
    entry: &WhitelistEntry,
    exclude: Option<u64>,
) -> Result<(), WhitelistError> {
    let identity = entry.identity();
    let clash = doc
        .networks
        .iter()
        .filter(|other| Some(other.id) != exclude)
        .any(|other| other.identity() == identity);
    if clash {
        return Err(WhitelistError::DuplicateEntry(entry.label().to_string()));
    }
    Ok(())
}

/// Give entries without an id (legacy files, hand edits) or with a repeated
/// id a fresh one, in document order.
fn assign_missing_ids(doc: &mut WhitelistDocument) {
    let mut next = doc.max_id() + 1;
    let mut seen = std::collections::HashSet::new();
    for entry in &mut doc.networks {
        if entry.id == 0 || !seen.insert(entry.id) {
            entry.id = next;
            seen.insert(next);
            next += 1;
        }
    }
}

fn warn_invalid_entries(doc: &WhitelistDocument) {
    for entry in &doc.networks {
        if let Err(e) = entry.clone().normalize() {
            tracing::warn!(id = entry.id, error = %e, "Stored whitelist entry is invalid");
        }
    }
}
