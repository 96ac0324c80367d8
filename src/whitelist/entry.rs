//! Whitelist entries and their validation rules.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::bssid::Bssid;
use super::error::WhitelistError;
use super::matcher::build_regex;

/// Maximum SSID length allowed by 802.11.
pub const MAX_SSID_LEN: usize = 32;

/// Maximum length of a regular-expression SSID pattern.
pub const MAX_PATTERN_LEN: usize = 256;

fn default_enabled() -> bool {
    true
}

/// A single protected network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhitelistEntry {
    /// Store-assigned identifier. Zero means "not yet assigned".
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub bssid: Option<String>,
    #[serde(default)]
    pub ssid: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub use_wildcard: bool,
    #[serde(default)]
    pub use_regex: bool,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, with = "super::timestamp")]
    pub added_date: Option<DateTime<Utc>>,
    #[serde(default, with = "super::timestamp")]
    pub last_updated: Option<DateTime<Utc>>,
}

/// How an entry's SSID is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SsidMode {
    Exact,
    Wildcard,
    Regex,
}

impl WhitelistEntry {
    /// SSID interpretation. Regex wins when both flags are set.
    #[must_use]
    pub fn ssid_mode(&self) -> SsidMode {
        if self.use_regex {
            SsidMode::Regex
        } else if self.use_wildcard {
            SsidMode::Wildcard
        } else {
            SsidMode::Exact
        }
    }

    /// Human-readable label, SSID first.
    #[must_use]
    pub fn label(&self) -> &str {
        self.ssid
            .as_deref()
            .or(self.bssid.as_deref())
            .unwrap_or("<empty>")
    }

    /// Key used for duplicate detection: normalized BSSID plus exact SSID.
    #[must_use]
    pub fn identity(&self) -> (Option<String>, Option<String>) {
        let bssid = self
            .bssid
            .as_deref()
            .map(|b| Bssid::canonical(b).unwrap_or_else(|_| b.to_uppercase()));
        (bssid, self.ssid.clone())
    }

    /// Check the entry invariants and normalize its fields in place.
    ///
    /// Empty strings become `None`, the BSSID is rewritten in canonical form
    /// and blank tags are dropped.
    ///
    /// # Errors
    ///
    /// Returns `WhitelistError::Validation` if the entry has neither BSSID nor
    /// SSID, the BSSID is malformed, the SSID is too long, or a regex SSID
    /// does not compile.
    pub fn normalize(&mut self) -> Result<(), WhitelistError> {
        self.clear_blank_fields();
        self.tags = std::mem::take(&mut self.tags)
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();

        if self.bssid.is_none() && self.ssid.is_none() {
            return Err(WhitelistError::validation(
                "Either BSSID or SSID must be provided",
            ));
        }

        if let Some(bssid) = &self.bssid {
            let canonical = Bssid::canonical(bssid)
                .map_err(|e| WhitelistError::validation(e.to_string()))?;
            self.bssid = Some(canonical);
        }

        if let Some(ssid) = &self.ssid {
            validate_ssid(ssid, self.ssid_mode())?;
        }

        Ok(())
    }

    /// Treat blank BSSID and SSID values as absent.
    pub(crate) fn clear_blank_fields(&mut self) {
        self.bssid = non_empty(self.bssid.take());
        self.ssid = non_empty(self.ssid.take());
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn validate_ssid(ssid: &str, mode: SsidMode) -> Result<(), WhitelistError> {
    let len = ssid.chars().count();
    match mode {
        SsidMode::Regex => {
            if len > MAX_PATTERN_LEN {
                return Err(WhitelistError::validation(format!(
                    "Regex pattern cannot be longer than {MAX_PATTERN_LEN} characters"
                )));
            }
            build_regex(SsidMode::Regex, ssid, false)
                .map_err(|e| WhitelistError::validation(format!("Invalid regex pattern: {e}")))?;
        }
        SsidMode::Exact | SsidMode::Wildcard => {
            if len > MAX_SSID_LEN {
                return Err(WhitelistError::validation(format!(
                    "SSID cannot be longer than {MAX_SSID_LEN} characters"
                )));
            }
        }
    }
    Ok(())
}

/// Fields accepted when creating an entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NewEntry {
    pub bssid: Option<String>,
    pub ssid: Option<String>,
    pub description: String,
    pub enabled: Option<bool>,
    pub use_wildcard: bool,
    pub use_regex: bool,
    pub tags: Vec<String>,
}

impl NewEntry {
    /// Entry protecting a single access point.
    #[must_use]
    pub fn bssid(bssid: impl Into<String>) -> Self {
        Self {
            bssid: Some(bssid.into()),
            ..Self::default()
        }
    }

    /// Entry protecting a network name.
    #[must_use]
    pub fn ssid(ssid: impl Into<String>) -> Self {
        Self {
            ssid: Some(ssid.into()),
            ..Self::default()
        }
    }

    /// Entry from a bare identifier: MAC-shaped strings become BSSIDs,
    /// everything else an exact SSID.
    #[must_use]
    pub fn from_identifier(identifier: &str) -> Self {
        let identifier = identifier.trim();
        if Bssid::looks_like(identifier) {
            Self::bssid(identifier)
        } else {
            Self::ssid(identifier)
        }
    }

    /// Interpret the SSID as a glob.
    #[must_use]
    pub fn wildcard(mut self) -> Self {
        self.use_wildcard = true;
        self
    }

    /// Interpret the SSID as a regular expression.
    #[must_use]
    pub fn regex(mut self) -> Self {
        self.use_regex = true;
        self
    }

    /// Set the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Add a tag.
    #[must_use]
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Create the entry disabled.
    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.enabled = Some(false);
        self
    }

    /// Build an unassigned, validated entry.
    ///
    /// # Errors
    ///
    /// Returns `WhitelistError::Validation` if the fields violate the entry
    /// invariants.
    pub fn into_entry(self) -> Result<WhitelistEntry, WhitelistError> {
        let mut entry = WhitelistEntry {
            id: 0,
            bssid: self.bssid,
            ssid: self.ssid,
            description: self.description,
            enabled: self.enabled.unwrap_or(true),
            use_wildcard: self.use_wildcard,
            use_regex: self.use_regex,
            tags: self.tags,
            added_date: None,
            last_updated: None,
        };
        entry.normalize()?;
        Ok(entry)
    }
}

/// Partial update of an existing entry.
///
/// `None` leaves a field unchanged. An empty `bssid` or `ssid` string clears
/// that field.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EntryUpdate {
    pub bssid: Option<String>,
    pub ssid: Option<String>,
    pub description: Option<String>,
    pub enabled: Option<bool>,
    pub use_wildcard: Option<bool>,
    pub use_regex: Option<bool>,
    pub tags: Option<Vec<String>>,
}

impl EntryUpdate {
    /// True when no field would change.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bssid.is_none()
            && self.ssid.is_none()
            && self.description.is_none()
            && self.enabled.is_none()
            && self.use_wildcard.is_none()
            && self.use_regex.is_none()
            && self.tags.is_none()
    }

    /// Merge the provided fields into `entry`.
    pub fn apply_to(self, entry: &mut WhitelistEntry) {
        if let Some(bssid) = self.bssid {
            entry.bssid = Some(bssid);
        }
        if let Some(ssid) = self.ssid {
            entry.ssid = Some(ssid);
        }
        if let Some(description) = self.description {
            entry.description = description;
        }
        if let Some(enabled) = self.enabled {
            entry.enabled = enabled;
        }
        if let Some(use_wildcard) = self.use_wildcard {
            entry.use_wildcard = use_wildcard;
        }
        if let Some(use_regex) = self.use_regex {
            entry.use_regex = use_regex;
        }
        if let Some(tags) = self.tags {
            entry.tags = tags;
        }
    }
}
