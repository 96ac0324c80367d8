//! On-disk whitelist document formats.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::entry::{NewEntry, WhitelistEntry};

/// Current document format version.
pub const FORMAT_VERSION: &str = "1.0";

fn default_version() -> String {
    FORMAT_VERSION.to_string()
}

/// The persisted whitelist collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhitelistDocument {
    /// Entries in insertion order.
    pub networks: Vec<WhitelistEntry>,
    /// Format version tag.
    #[serde(default = "default_version")]
    pub version: String,
    /// When the collection was last written.
    #[serde(default, with = "super::timestamp")]
    pub last_updated: Option<DateTime<Utc>>,
}

impl Default for WhitelistDocument {
    fn default() -> Self {
        Self {
            networks: Vec::new(),
            version: default_version(),
            last_updated: None,
        }
    }
}

impl WhitelistDocument {
    /// Parse a document in either the rich (`networks`) or legacy
    /// (`whitelist` string array) form.
    ///
    /// Legacy strings become BSSID entries when they look like a MAC address
    /// and exact SSID entries otherwise. A file carrying both forms keeps all
    /// entries, rich ones first.
    ///
    /// # Errors
    ///
    /// Returns the JSON error if the input is not a JSON object of either
    /// shape.
    pub fn from_json(input: &str) -> Result<Self, serde_json::Error> {
        let raw: RawDocument = serde_json::from_str(input)?;
        Ok(raw.into_document())
    }

    /// Highest id currently in use.
    #[must_use]
    pub fn max_id(&self) -> u64 {
        self.networks.iter().map(|e| e.id).max().unwrap_or(0)
    }

    /// Look up an entry by id.
    #[must_use]
    pub fn get(&self, id: u64) -> Option<&WhitelistEntry> {
        self.networks.iter().find(|e| e.id == id)
    }

    /// Find the position of an entry by id.
    #[must_use]
    pub fn position(&self, id: u64) -> Option<usize> {
        self.networks.iter().position(|e| e.id == id)
    }
}

/// Tolerant shape accepted on load and import.
#[derive(Debug, Default, Deserialize)]
struct RawDocument {
    #[serde(default)]
    networks: Option<Vec<WhitelistEntry>>,
    #[serde(default)]
    whitelist: Option<Vec<String>>,
    #[serde(default)]
    version: Option<String>,
    #[serde(default, with = "super::timestamp")]
    last_updated: Option<DateTime<Utc>>,
}

impl RawDocument {
    fn into_document(self) -> WhitelistDocument {
        let mut networks = self.networks.unwrap_or_default();
        networks.iter_mut().for_each(WhitelistEntry::clear_blank_fields);

        for identifier in self
            .whitelist
            .unwrap_or_default()
            .into_iter()
            .filter(|identifier| !identifier.trim().is_empty())
        {
            let new = NewEntry::from_identifier(&identifier);
            networks.push(WhitelistEntry {
                id: 0,
                bssid: new.bssid,
                ssid: new.ssid,
                description: String::new(),
                enabled: true,
                use_wildcard: false,
                use_regex: false,
                tags: Vec::new(),
                added_date: None,
                last_updated: None,
            });
        }

        WhitelistDocument {
            networks,
            version: self.version.unwrap_or_else(default_version),
            last_updated: self.last_updated,
        }
    }
}

/// Document returned by export, suitable for re-import.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportDocument {
    pub networks: Vec<WhitelistEntry>,
    pub version: String,
    #[serde(default, with = "super::timestamp")]
    pub exported_date: Option<DateTime<Utc>>,
}

/// How imported entries are combined with the existing collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportMode {
    /// Append new entries, skipping ones already present.
    #[default]
    Merge,
    /// Discard the existing collection.
    Replace,
}

/// Options for an import.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportOptions {
    pub mode: ImportMode,
    /// Snapshot the current file before applying.
    pub create_backup: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            mode: ImportMode::Merge,
            create_backup: true,
        }
    }
}

/// Result of a successful import.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    /// Entries added to the store.
    pub imported: usize,
    /// Entries skipped because an identical one already existed.
    pub skipped: usize,
    /// Entries in the store after the import.
    pub total: usize,
}

/// Aggregate counts over the collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhitelistStats {
    pub total_networks: usize,
    pub enabled_networks: usize,
    pub bssid_entries: usize,
    pub ssid_entries: usize,
    pub wildcard_entries: usize,
    pub regex_entries: usize,
    #[serde(default, with = "super::timestamp")]
    pub last_updated: Option<DateTime<Utc>>,
    pub version: String,
}

impl From<&WhitelistDocument> for WhitelistStats {
    fn from(doc: &WhitelistDocument) -> Self {
        let networks = &doc.networks;
        Self {
            total_networks: networks.len(),
            enabled_networks: networks.iter().filter(|e| e.enabled).count(),
            bssid_entries: networks.iter().filter(|e| e.bssid.is_some()).count(),
            ssid_entries: networks.iter().filter(|e| e.ssid.is_some()).count(),
            wildcard_entries: networks
                .iter()
                .filter(|e| e.use_wildcard && !e.use_regex)
                .count(),
            regex_entries: networks.iter().filter(|e| e.use_regex).count(),
            last_updated: doc.last_updated,
            version: doc.version.clone(),
        }
    }
}
