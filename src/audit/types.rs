//! Audit event types for whitelist decisions and edits.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Type of audit event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// Guard initialized with a loaded whitelist.
    GuardStarted,
    /// Deauth suppressed because the target is whitelisted.
    DeauthBlocked,
    /// Deauth allowed to proceed.
    DeauthAllowed,
    /// Handshake captured from a whitelisted network.
    HandshakeWhitelisted,
    EntryAdded,
    EntryRemoved,
    EntryUpdated,
    EntryToggled,
    WhitelistImported,
    BackupCreated,
    BackupRestored,
    /// A regex entry failed to compile during a decision.
    InvalidPattern,
    /// A decision failed and the enforcement mode picked the verdict.
    EnforcementFallback,
}

impl EventType {
    /// All event types, in declaration order.
    pub const ALL: [Self; 13] = [
        Self::GuardStarted,
        Self::DeauthBlocked,
        Self::DeauthAllowed,
        Self::HandshakeWhitelisted,
        Self::EntryAdded,
        Self::EntryRemoved,
        Self::EntryUpdated,
        Self::EntryToggled,
        Self::WhitelistImported,
        Self::BackupCreated,
        Self::BackupRestored,
        Self::InvalidPattern,
        Self::EnforcementFallback,
    ];

    /// Returns the string representation for database storage.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GuardStarted => "guard_started",
            Self::DeauthBlocked => "deauth_blocked",
            Self::DeauthAllowed => "deauth_allowed",
            Self::HandshakeWhitelisted => "handshake_whitelisted",
            Self::EntryAdded => "entry_added",
            Self::EntryRemoved => "entry_removed",
            Self::EntryUpdated => "entry_updated",
            Self::EntryToggled => "entry_toggled",
            Self::WhitelistImported => "whitelist_imported",
            Self::BackupCreated => "backup_created",
            Self::BackupRestored => "backup_restored",
            Self::InvalidPattern => "invalid_pattern",
            Self::EnforcementFallback => "enforcement_fallback",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown event type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown audit event type: {0}")]
pub struct UnknownEventType(pub String);

impl FromStr for EventType {
    type Err = UnknownEventType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownEventType(s.to_string()))
    }
}

/// An audit event recording a guard decision or whitelist edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unique event ID.
    pub id: Uuid,
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
    /// Type of event.
    pub event_type: EventType,
    /// Target or entry BSSID, if any.
    pub bssid: Option<String>,
    /// Target or entry SSID, if any.
    pub ssid: Option<String>,
    /// Whitelist entry involved, if any.
    pub entry_id: Option<u64>,
    /// Human-readable reason.
    pub reason: Option<String>,
    /// Extra structured data.
    pub details: Option<serde_json::Value>,
}

impl AuditEvent {
    /// Create a new builder for an audit event.
    #[must_use]
    pub fn builder(event_type: EventType) -> AuditEventBuilder {
        AuditEventBuilder::new(event_type)
    }
}

/// Builder for creating audit events.
#[derive(Debug, Clone)]
pub struct AuditEventBuilder {
    timestamp: DateTime<Utc>,
    event_type: EventType,
    bssid: Option<String>,
    ssid: Option<String>,
    entry_id: Option<u64>,
    reason: Option<String>,
    details: Option<serde_json::Value>,
}

impl AuditEventBuilder {
    /// Create a new builder with required fields.
    pub fn new(event_type: EventType) -> Self {
        Self {
            timestamp: Utc::now(),
            event_type,
            bssid: None,
            ssid: None,
            entry_id: None,
            reason: None,
            details: None,
        }
    }

    /// Set a custom timestamp.
    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Set the BSSID. Empty strings are ignored.
    pub fn bssid(mut self, bssid: impl Into<String>) -> Self {
        self.bssid = Some(bssid.into()).filter(|s| !s.is_empty());
        self
    }

    /// Set the SSID. Empty strings are ignored.
    pub fn ssid(mut self, ssid: impl Into<String>) -> Self {
        self.ssid = Some(ssid.into()).filter(|s| !s.is_empty());
        self
    }

    pub fn entry_id(mut self, id: u64) -> Self {
        self.entry_id = Some(id);
        self
    }

    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Build the audit event.
    pub fn build(self) -> AuditEvent {
        AuditEvent {
            id: Uuid::new_v4(),
            timestamp: self.timestamp,
            event_type: self.event_type,
            bssid: self.bssid,
            ssid: self.ssid,
            entry_id: self.entry_id,
            reason: self.reason,
            details: self.details,
        }
    }
}

/// Event counts for a summary view.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditSummary {
    pub total: u64,
    pub deauth_blocked: u64,
    pub deauth_allowed: u64,
    pub enforcement_fallbacks: u64,
}
