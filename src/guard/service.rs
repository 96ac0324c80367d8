//! The whitelist guard: deauth decisions plus an audited management surface.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::error::GuardError;
use super::hooks::DeauthHooks;
use crate::audit::{AuditEvent, AuditLog, AuditSummary, EventType};
use crate::config::WhitelistConfig;
use crate::whitelist::{
    AttackDecision, EnforcementMode, EntryUpdate, ExportDocument, ImportOptions, ImportSummary,
    MatchEngine, MatchedEntry, NewEntry, PatternFailure, WhitelistDocument, WhitelistEntry,
    WhitelistError, WhitelistStats, WhitelistStore,
};

/// Outcome of evaluating one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    /// Whether the target is treated as protected.
    pub whitelisted: bool,
    /// Entry that matched, if any.
    pub matched: Option<MatchedEntry>,
    /// Set when the verdict came from the enforcement mode after an error.
    pub fallback_reason: Option<String>,
    /// Regex entries skipped during the check.
    pub invalid_patterns: Vec<PatternFailure>,
}

impl Verdict {
    /// What the host should do with the pending frame.
    #[must_use]
    pub fn decision(&self) -> AttackDecision {
        if !self.whitelisted {
            return AttackDecision::Proceed;
        }
        let reason = match (&self.matched, &self.fallback_reason) {
            (Some(matched), _) => format!("Network is whitelisted ({})", matched.label),
            (None, Some(reason)) => format!("Enforcement fallback: {reason}"),
            (None, None) => "Network is whitelisted".to_string(),
        };
        AttackDecision::Suppress { reason }
    }
}

/// Protects whitelisted networks from the host's deauth attacks.
///
/// Cheap to clone; clones share the store, engine and audit log.
#[derive(Debug, Clone)]
pub struct WhitelistGuard {
    store: Arc<WhitelistStore>,
    engine: Arc<MatchEngine>,
    mode: EnforcementMode,
    audit: Option<AuditLog>,
}

impl WhitelistGuard {
    /// Create a guard over `store` with a default match engine and no audit log.
    #[must_use]
    pub fn new(store: Arc<WhitelistStore>, mode: EnforcementMode) -> Self {
        Self {
            store,
            engine: Arc::new(MatchEngine::new()),
            mode,
            audit: None,
        }
    }

    #[must_use]
    pub fn with_engine(mut self, engine: MatchEngine) -> Self {
        self.engine = Arc::new(engine);
        self
    }

    #[must_use]
    pub fn with_audit(mut self, audit: AuditLog) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Build a guard from configuration, loading the store and opening the
    /// audit log.
    ///
    /// A store that fails to load is left unloaded so decisions fall back to
    /// the enforcement mode; an audit log that fails to open is skipped.
    /// Neither prevents startup.
    pub async fn from_config(config: &WhitelistConfig) -> Self {
        let store = Arc::new(WhitelistStore::new(
            config.whitelist_file.clone(),
            config.store_options(),
        ));
        let engine = MatchEngine::new().with_regex_ignore_case(config.regex_ignore_case);
        let mut guard = Self::new(store, config.enforcement_mode).with_engine(engine);

        match AuditLog::open(&config.audit_log_file).await {
            Ok(audit) => guard.audit = Some(audit),
            Err(e) => tracing::warn!(error = %e, "Audit log unavailable, continuing without it"),
        }

        let networks = match guard.reload().await {
            Ok(doc) => Some(doc.networks.len()),
            Err(e) => {
                tracing::error!(error = %e, mode = %guard.mode, "Failed to load whitelist");
                None
            }
        };

        guard
            .record(
                AuditEvent::builder(EventType::GuardStarted)
                    .details(serde_json::json!({
                        "version": env!("CARGO_PKG_VERSION"),
                        "enforcement_mode": guard.mode,
                        "networks": networks,
                    }))
                    .build(),
            )
            .await;
        tracing::info!(mode = %guard.mode, ?networks, "Whitelist guard ready");
        guard
    }

    #[must_use]
    pub fn store(&self) -> &Arc<WhitelistStore> {
        &self.store
    }

    #[must_use]
    pub fn engine(&self) -> &MatchEngine {
        &self.engine
    }

    #[must_use]
    pub fn mode(&self) -> EnforcementMode {
        self.mode
    }

    #[must_use]
    pub fn audit(&self) -> Option<&AuditLog> {
        self.audit.as_ref()
    }

    /// Evaluate a target against the current snapshot.
    ///
    /// Never fails: store and match errors are resolved by the enforcement
    /// mode. May read the whitelist file if the store was never loaded.
    #[must_use]
    pub fn evaluate(&self, bssid: &str, ssid: &str) -> Verdict {
        let snapshot = match self.store.snapshot() {
            Ok(snapshot) => snapshot,
            Err(e) => return self.fallback(&e, Vec::new()),
        };

        let outcome = self.engine.check(bssid, ssid, &snapshot.networks);
        let invalid_patterns = outcome.invalid_patterns.clone();
        match outcome.into_result() {
            Ok(matched) => Verdict {
                whitelisted: matched.is_some(),
                matched,
                fallback_reason: None,
                invalid_patterns,
            },
            Err(e) => self.fallback(&e, invalid_patterns),
        }
    }

    /// True when the target should be spared.
    #[must_use]
    pub fn is_whitelisted(&self, bssid: &str, ssid: &str) -> bool {
        self.evaluate(bssid, ssid).whitelisted
    }

    fn fallback(
        &self,
        error: &dyn std::fmt::Display,
        invalid_patterns: Vec<PatternFailure>,
    ) -> Verdict {
        let reason = error.to_string();
        Verdict {
            whitelisted: self.mode.resolve(Err::<bool, _>(&reason)),
            matched: None,
            fallback_reason: Some(reason),
            invalid_patterns,
        }
    }

    async fn evaluate_blocking(&self, bssid: &str, ssid: &str) -> Verdict {
        let guard = self.clone();
        let (bssid_owned, ssid_owned) = (bssid.to_string(), ssid.to_string());
        match tokio::task::spawn_blocking(move || guard.evaluate(&bssid_owned, &ssid_owned)).await {
            Ok(verdict) => verdict,
            Err(_) => self.fallback(&GuardError::TaskCancelled, Vec::new()),
        }
    }

    /// Write an audit event. Failures are logged and never surface.
    async fn record(&self, event: AuditEvent) {
        let Some(audit) = &self.audit else {
            return;
        };
        if let Err(e) = audit.log_event(&event).await {
            tracing::warn!(error = %e, event_type = %event.event_type, "Failed to write audit event");
        }
    }

    async fn record_verdict(&self, bssid: &str, ssid: &str, verdict: &Verdict) {
        for failure in verdict.invalid_patterns.iter().filter(|f| f.first_seen) {
            self.record(
                AuditEvent::builder(EventType::InvalidPattern)
                    .entry_id(failure.id)
                    .ssid(failure.pattern.clone())
                    .reason(failure.error.clone())
                    .build(),
            )
            .await;
        }

        if let Some(reason) = &verdict.fallback_reason {
            self.record(
                AuditEvent::builder(EventType::EnforcementFallback)
                    .bssid(bssid)
                    .ssid(ssid)
                    .reason(reason.clone())
                    .details(serde_json::json!({
                        "mode": self.mode,
                        "whitelisted": verdict.whitelisted,
                    }))
                    .build(),
            )
            .await;
        }

        let event_type = if verdict.whitelisted {
            EventType::DeauthBlocked
        } else {
            EventType::DeauthAllowed
        };
        let mut event = AuditEvent::builder(event_type).bssid(bssid).ssid(ssid);
        if let Some(matched) = &verdict.matched {
            event = event
                .entry_id(matched.id)
                .details(serde_json::json!({ "rule": matched.rule, "entry": matched.label }));
        }
        if let AttackDecision::Suppress { reason } = verdict.decision() {
            event = event.reason(reason);
        }
        self.record(event.build()).await;
    }

    async fn blocking<T, F>(&self, op: F) -> Result<T, GuardError>
    where
        F: FnOnce(&WhitelistStore) -> Result<T, WhitelistError> + Send + 'static,
        T: Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || op(&store))
            .await
            .map_err(|_| GuardError::TaskCancelled)?
            .map_err(GuardError::from)
    }

    /// Reload the whitelist file.
    ///
    /// # Errors
    ///
    /// Returns the store's load error; the previous state is kept.
    pub async fn reload(&self) -> Result<Arc<WhitelistDocument>, GuardError> {
        self.blocking(WhitelistStore::load).await
    }

    /// All entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unavailable.
    pub async fn list(&self) -> Result<Vec<WhitelistEntry>, GuardError> {
        self.blocking(WhitelistStore::list).await
    }

    /// One entry by id.
    ///
    /// # Errors
    ///
    /// Returns `WhitelistError::NotFound` for an unknown id.
    pub async fn get(&self, id: u64) -> Result<WhitelistEntry, GuardError> {
        self.blocking(move |store| store.get(id)).await
    }

    /// Add an entry and audit it.
    ///
    /// # Errors
    ///
    /// Returns the store's validation, duplicate or persistence error.
    pub async fn add(&self, new: NewEntry) -> Result<u64, GuardError> {
        let id = self.blocking(move |store| store.add(new)).await?;
        self.record_entry(EventType::EntryAdded, id).await;
        Ok(id)
    }

    /// Add a bare BSSID or SSID string and audit it.
    ///
    /// # Errors
    ///
    /// See [`WhitelistGuard::add`].
    pub async fn add_identifier(&self, identifier: &str) -> Result<u64, GuardError> {
        self.add(NewEntry::from_identifier(identifier)).await
    }

    /// Remove an entry by id and audit it.
    ///
    /// # Errors
    ///
    /// Returns `WhitelistError::NotFound` or a persistence error.
    pub async fn remove(&self, id: u64) -> Result<WhitelistEntry, GuardError> {
        let removed = self.blocking(move |store| store.remove(id)).await?;
        self.record(entry_event(EventType::EntryRemoved, &removed).build())
            .await;
        Ok(removed)
    }

    /// Remove every entry with the given BSSID or SSID and audit each one.
    ///
    /// # Errors
    ///
    /// Returns `WhitelistError::NotFound` when nothing matched.
    pub async fn remove_identifier(
        &self,
        identifier: &str,
    ) -> Result<Vec<WhitelistEntry>, GuardError> {
        let identifier = identifier.to_string();
        let removed = self
            .blocking(move |store| store.remove_identifier(&identifier))
            .await?;
        for entry in &removed {
            self.record(entry_event(EventType::EntryRemoved, entry).build())
                .await;
        }
        Ok(removed)
    }

    /// Update an entry and audit it.
    ///
    /// # Errors
    ///
    /// Returns the store's not-found, validation, duplicate or persistence
    /// error.
    pub async fn update(&self, id: u64, update: EntryUpdate) -> Result<WhitelistEntry, GuardError> {
        let updated = self.blocking(move |store| store.update(id, update)).await?;
        self.record(entry_event(EventType::EntryUpdated, &updated).build())
            .await;
        Ok(updated)
    }

    /// Enable or disable an entry and audit it.
    ///
    /// # Errors
    ///
    /// Returns `WhitelistError::NotFound` or a persistence error.
    pub async fn toggle(&self, id: u64, enabled: bool) -> Result<WhitelistEntry, GuardError> {
        let toggled = self
            .blocking(move |store| store.toggle(id, enabled))
            .await?;
        self.record(
            entry_event(EventType::EntryToggled, &toggled)
                .details(serde_json::json!({ "enabled": enabled }))
                .build(),
        )
        .await;
        Ok(toggled)
    }

    /// Export the collection.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unavailable.
    pub async fn export(&self) -> Result<ExportDocument, GuardError> {
        self.blocking(WhitelistStore::export).await
    }

    /// Import a document and audit the result.
    ///
    /// # Errors
    ///
    /// Returns the store's validation, duplicate or persistence error. The
    /// store is unchanged on error.
    pub async fn import(
        &self,
        document: WhitelistDocument,
        options: ImportOptions,
    ) -> Result<ImportSummary, GuardError> {
        let summary = self
            .blocking(move |store| store.import(document, options))
            .await?;
        self.record(
            AuditEvent::builder(EventType::WhitelistImported)
                .details(serde_json::json!({
                    "mode": options.mode,
                    "imported": summary.imported,
                    "skipped": summary.skipped,
                    "total": summary.total,
                }))
                .build(),
        )
        .await;
        Ok(summary)
    }

    /// Aggregate counts.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unavailable.
    pub async fn stats(&self) -> Result<WhitelistStats, GuardError> {
        self.blocking(WhitelistStore::stats).await
    }

    /// Back up the whitelist file now and audit it.
    ///
    /// # Errors
    ///
    /// Returns a persistence error if the copy fails.
    pub async fn create_backup(&self) -> Result<Option<PathBuf>, GuardError> {
        let backup = self.blocking(WhitelistStore::create_backup).await?;
        if let Some(path) = &backup {
            self.record(
                AuditEvent::builder(EventType::BackupCreated)
                    .details(serde_json::json!({ "path": path }))
                    .build(),
            )
            .await;
        }
        Ok(backup)
    }

    /// Existing backups, oldest first.
    ///
    /// # Errors
    ///
    /// Returns a persistence error if the directory cannot be read.
    pub async fn list_backups(&self) -> Result<Vec<PathBuf>, GuardError> {
        self.blocking(WhitelistStore::list_backups).await
    }

    /// Restore the newest backup and audit it.
    ///
    /// # Errors
    ///
    /// Returns `WhitelistError::NotFound` when there is no backup.
    pub async fn restore_latest_backup(&self) -> Result<PathBuf, GuardError> {
        let restored = self
            .blocking(WhitelistStore::restore_latest_backup)
            .await?;
        self.record(
            AuditEvent::builder(EventType::BackupRestored)
                .details(serde_json::json!({ "path": restored }))
                .build(),
        )
        .await;
        Ok(restored)
    }

    /// Most recent audit events. Empty when no audit log is attached.
    ///
    /// # Errors
    ///
    /// Returns an audit error if the query fails.
    pub async fn recent_audit(
        &self,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<AuditEvent>, GuardError> {
        match &self.audit {
            Some(audit) => Ok(audit.recent_events(limit, offset).await?),
            None => Ok(Vec::new()),
        }
    }

    /// Decision counts. Zero when no audit log is attached.
    ///
    /// # Errors
    ///
    /// Returns an audit error if the query fails.
    pub async fn audit_summary(&self) -> Result<AuditSummary, GuardError> {
        match &self.audit {
            Some(audit) => Ok(audit.summary().await?),
            None => Ok(AuditSummary::default()),
        }
    }

    async fn record_entry(&self, event_type: EventType, id: u64) {
        match self.get(id).await {
            Ok(entry) => self.record(entry_event(event_type, &entry).build()).await,
            Err(_) => {
                self.record(AuditEvent::builder(event_type).entry_id(id).build())
                    .await;
            }
        }
    }
}

fn entry_event(event_type: EventType, entry: &WhitelistEntry) -> crate::audit::AuditEventBuilder {
    let mut builder = AuditEvent::builder(event_type).entry_id(entry.id);
    if let Some(bssid) = &entry.bssid {
        builder = builder.bssid(bssid.clone());
    }
    if let Some(ssid) = &entry.ssid {
        builder = builder.ssid(ssid.clone());
    }
    builder
}

#[async_trait]
impl DeauthHooks for WhitelistGuard {
    async fn on_deauth_attempt(&self, bssid: &str, ssid: &str) -> AttackDecision {
        let verdict = self.evaluate_blocking(bssid, ssid).await;
        if verdict.whitelisted {
            tracing::info!(bssid, ssid, "Blocked deauth attack on whitelisted network");
        } else {
            tracing::debug!(bssid, ssid, "Deauth allowed");
        }
        self.record_verdict(bssid, ssid, &verdict).await;
        verdict.decision()
    }

    async fn on_handshake(&self, bssid: &str, ssid: &str, filename: &str) {
        let verdict = self.evaluate_blocking(bssid, ssid).await;
        if verdict.matched.is_none() {
            return;
        }
        tracing::info!(bssid, ssid, filename, "Handshake captured from whitelisted network");
        self.record(
            AuditEvent::builder(EventType::HandshakeWhitelisted)
                .bssid(bssid)
                .ssid(ssid)
                .details(serde_json::json!({ "filename": filename }))
                .build(),
        )
        .await;
    }

    async fn on_internet_available(&self) {
        if !self.store.options().auto_backup {
            return;
        }
        if let Err(e) = self.create_backup().await {
            tracing::warn!(error = %e, "Failed to back up whitelist");
        }
    }
}
