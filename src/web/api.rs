//! Request and response types for the whitelist HTTP endpoints.

use serde::{Deserialize, Serialize};

use crate::audit::{AuditEvent, AuditSummary};
use crate::guard::Verdict;
use crate::whitelist::{
    AttackDecision, EnforcementMode, EntryUpdate, ImportMode, NewEntry, WhitelistEntry,
    WhitelistStats,
};

/// Response for mutating endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse {
    /// Whether the operation was successful.
    pub success: bool,
    /// Message describing the result.
    pub message: String,
    /// Error details on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Entry id the operation created or touched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
}

impl ApiResponse {
    /// Create a success response.
    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            error: None,
            id: None,
        }
    }

    /// Create an error response.
    #[must_use]
    pub fn error(message: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            error: Some(error.into()),
            id: None,
        }
    }

    /// Attach the entry id.
    #[must_use]
    pub fn with_id(mut self, id: u64) -> Self {
        self.id = Some(id);
        self
    }
}

/// Response for GET /api/stats.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub stats: WhitelistStats,
    pub enforcement_mode: EnforcementMode,
    /// False when the whitelist could not be loaded.
    pub ready: bool,
}

/// Response for GET /api/whitelist.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhitelistResponse {
    pub networks: Vec<WhitelistEntry>,
    pub stats: StatsResponse,
}

/// Body for POST /api/whitelist/add.
///
/// Either a full entry, or a bare `entry` string that is sniffed as a BSSID
/// or SSID.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AddRequest {
    #[serde(default, rename = "entry", skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    #[serde(flatten)]
    pub fields: NewEntry,
}

/// Body for PUT /api/whitelist/update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateRequest {
    pub id: u64,
    #[serde(flatten)]
    pub update: EntryUpdate,
}

/// Body for PUT /api/whitelist/toggle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToggleRequest {
    pub id: u64,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

const fn default_enabled() -> bool {
    true
}

/// Body for DELETE /api/whitelist/delete: an id, or a bare BSSID/SSID.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeleteRequest {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default, rename = "entry")]
    pub identifier: Option<String>,
}

/// Body for POST /api/whitelist/import.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportRequest {
    /// Document in either the rich or legacy form.
    pub data: serde_json::Value,
    #[serde(default = "default_create_backup")]
    pub create_backup: bool,
    #[serde(default)]
    pub mode: ImportMode,
}

const fn default_create_backup() -> bool {
    true
}

/// Query parameters for GET /api/check.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CheckQuery {
    #[serde(default)]
    pub bssid: String,
    #[serde(default)]
    pub ssid: String,
}

/// Response for GET /api/check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResponse {
    #[serde(flatten)]
    pub verdict: Verdict,
    pub decision: AttackDecision,
}

impl From<Verdict> for CheckResponse {
    fn from(verdict: Verdict) -> Self {
        let decision = verdict.decision();
        Self { verdict, decision }
    }
}

/// Query parameters for GET /api/audit.
#[derive(Debug, Clone, Deserialize)]
pub struct AuditQuery {
    /// Maximum number of events to return.
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Number of events to skip.
    #[serde(default)]
    pub offset: usize,
}

impl AuditQuery {
    /// Get the effective limit, capped at `MAX_EVENTS_LIMIT`.
    #[must_use]
    pub fn effective_limit(&self) -> usize {
        self.limit.min(MAX_EVENTS_LIMIT)
    }
}

impl Default for AuditQuery {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            offset: 0,
        }
    }
}

/// Maximum allowed limit for pagination.
pub const MAX_EVENTS_LIMIT: usize = 1000;

const fn default_limit() -> usize {
    100
}

/// Response for GET /api/audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditResponse {
    pub events: Vec<AuditEvent>,
    pub summary: AuditSummary,
}
