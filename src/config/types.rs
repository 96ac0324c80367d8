//! Configuration types.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::whitelist::{EnforcementMode, NewEntry, StoreOptions};

use super::ConfigError;

/// Upper bound on retained backups.
pub const MAX_BACKUPS_LIMIT: usize = 100;

fn default_whitelist_file() -> PathBuf {
    PathBuf::from("/etc/pwnagotchi/whitelist.json")
}

fn default_audit_log_file() -> PathBuf {
    PathBuf::from("/var/log/pwnagotchi_whitelist.db")
}

/// Configuration for the whitelist guard.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WhitelistConfig {
    /// What to do when a decision cannot be made.
    pub enforcement_mode: EnforcementMode,
    /// Path of the JSON whitelist file.
    pub whitelist_file: PathBuf,
    /// Path of the SQLite audit database.
    pub audit_log_file: PathBuf,
    /// Back up the whitelist before every overwrite.
    pub auto_backup: bool,
    /// Backups retained per whitelist file.
    pub max_backups: usize,
    /// Match regex SSID patterns case-insensitively.
    ///
    /// Off by default, so `^home$` does not match `HOME`. The Python plugin
    /// always ignored case for regex entries; set this to keep that behavior
    /// for an existing whitelist.
    pub regex_ignore_case: bool,
    /// Reload the whitelist when the file changes on disk.
    pub watch_file: bool,
    /// Entries seeded when the whitelist file is first created.
    pub default_entries: Vec<NewEntry>,
    /// Web API settings.
    pub web: WebConfig,
}

impl Default for WhitelistConfig {
    fn default() -> Self {
        Self {
            enforcement_mode: EnforcementMode::Strict,
            whitelist_file: default_whitelist_file(),
            audit_log_file: default_audit_log_file(),
            auto_backup: true,
            max_backups: 5,
            regex_ignore_case: false,
            watch_file: true,
            default_entries: Vec::new(),
            web: WebConfig::default(),
        }
    }
}

impl WhitelistConfig {
    /// Check the configuration once at startup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.whitelist_file.as_os_str().is_empty() {
            return Err(ConfigError::invalid("whitelist_file", "must not be empty"));
        }
        if self.audit_log_file.as_os_str().is_empty() {
            return Err(ConfigError::invalid("audit_log_file", "must not be empty"));
        }
        if self.max_backups > MAX_BACKUPS_LIMIT {
            return Err(ConfigError::invalid(
                "max_backups",
                format!("must be at most {MAX_BACKUPS_LIMIT}, got {}", self.max_backups),
            ));
        }
        if self.web.port == 0 {
            return Err(ConfigError::invalid("web.port", "must not be 0"));
        }
        for (index, entry) in self.default_entries.iter().enumerate() {
            entry.clone().into_entry().map_err(|e| {
                ConfigError::invalid(format!("default_entries[{index}]"), e.to_string())
            })?;
        }
        Ok(())
    }

    /// Store options derived from this configuration.
    #[must_use]
    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            auto_backup: self.auto_backup,
            max_backups: self.max_backups,
            default_entries: self.default_entries.clone(),
        }
    }
}

/// Web API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    /// Address to bind.
    pub host: String,
    /// Port to bind.
    pub port: u16,
    /// Allow cross-origin requests.
    pub cors: bool,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8088,
            cors: false,
        }
    }
}

impl WebConfig {
    /// `host:port` string for binding.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
