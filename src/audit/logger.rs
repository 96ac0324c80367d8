//! Audit log implementation with async `SQLite` operations.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, Row};
use tokio::sync::{broadcast, Mutex};
use uuid::Uuid;

use super::error::AuditError;
use super::schema::{SCHEMA, SCHEMA_VERSION};
use super::types::{AuditEvent, AuditSummary, EventType};

/// Capacity of the live event channel.
const BROADCAST_CAPACITY: usize = 256;

/// Returns the default path for the audit database.
///
/// This is `~/.local/share/deauth-whitelist/audit.db` on Unix systems.
#[must_use]
pub fn default_audit_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("deauth-whitelist")
        .join("audit.db")
}

/// Audit log for recording guard decisions and whitelist edits.
///
/// Uses `SQLite` for persistent storage with async operations via
/// `spawn_blocking`. Every stored event is also broadcast to live
/// subscribers.
#[derive(Debug, Clone)]
pub struct AuditLog {
    conn: Arc<Mutex<Connection>>,
    path: Option<PathBuf>,
    events: broadcast::Sender<AuditEvent>,
}

impl AuditLog {
    /// Open an audit log at the specified path.
    ///
    /// Creates parent directories if they don't exist and initializes the schema.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or the schema cannot be applied.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, AuditError> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                tokio::fs::create_dir_all(parent).await.map_err(|source| {
                    AuditError::CreateDir {
                        path: parent.to_path_buf(),
                        source,
                    }
                })?;
            }
        }

        let path_clone = path.clone();
        let conn = tokio::task::spawn_blocking(move || -> Result<Connection, AuditError> {
            let conn =
                Connection::open(&path_clone).map_err(|source| AuditError::DatabaseOpen {
                    path: path_clone,
                    source,
                })?;
            init_schema(&conn)?;
            Ok(conn)
        })
        .await
        .map_err(|_| AuditError::TaskCancelled)??;

        tracing::debug!(path = %path.display(), "Audit log opened");
        Ok(Self::from_connection(conn, Some(path)))
    }

    /// Open an in-memory audit log for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be created or the schema cannot be applied.
    pub async fn open_in_memory() -> Result<Self, AuditError> {
        let conn = tokio::task::spawn_blocking(|| -> Result<Connection, AuditError> {
            let conn = Connection::open_in_memory()?;
            init_schema(&conn)?;
            Ok(conn)
        })
        .await
        .map_err(|_| AuditError::TaskCancelled)??;

        Ok(Self::from_connection(conn, None))
    }

    fn from_connection(conn: Connection, path: Option<PathBuf>) -> Self {
        let (events, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            conn: Arc::new(Mutex::new(conn)),
            path,
            events,
        }
    }

    /// Returns the path to the database, if opened from a file.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Subscribe to events as they are logged.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<AuditEvent> {
        self.events.subscribe()
    }

    /// Log an audit event and broadcast it.
    ///
    /// # Errors
    ///
    /// Returns an error if the event cannot be inserted.
    pub async fn log_event(&self, event: &AuditEvent) -> Result<(), AuditError> {
        let id = event.id.to_string();
        let timestamp = format_timestamp(event.timestamp);
        let event_type = event.event_type.as_str();
        let bssid = event.bssid.clone();
        let ssid = event.ssid.clone();
        let entry_id = event.entry_id;
        let reason = event.reason.clone();
        let details = event
            .details
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || -> Result<(), AuditError> {
            let conn = conn.blocking_lock();
            conn.execute(
                "INSERT INTO events (id, timestamp, event_type, bssid, ssid, entry_id, reason, details)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![id, timestamp, event_type, bssid, ssid, entry_id, reason, details],
            )?;
            Ok(())
        })
        .await
        .map_err(|_| AuditError::TaskCancelled)??;

        // No subscribers is not an error.
        let _ = self.events.send(event.clone());
        Ok(())
    }

    /// Most recent events first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a row cannot be decoded.
    pub async fn recent_events(
        &self,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<AuditEvent>, AuditError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let offset = i64::try_from(offset).unwrap_or(i64::MAX);

        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || -> Result<Vec<AuditEvent>, AuditError> {
            let conn = conn.blocking_lock();
            let mut stmt = conn.prepare(
                "SELECT id, timestamp, event_type, bssid, ssid, entry_id, reason, details
                 FROM events ORDER BY timestamp DESC, rowid DESC LIMIT ?1 OFFSET ?2",
            )?;

            let rows = stmt
                .query_map(params![limit, offset], RawEvent::from_row)?
                .collect::<Result<Vec<_>, _>>()?;

            rows.into_iter().map(RawEvent::into_event).collect()
        })
        .await
        .map_err(|_| AuditError::TaskCancelled)?
    }

    /// Count total events in the database.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn count_events(&self) -> Result<u64, AuditError> {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || -> Result<u64, AuditError> {
            let conn = conn.blocking_lock();
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))?;
            Ok(count.unsigned_abs())
        })
        .await
        .map_err(|_| AuditError::TaskCancelled)?
    }

    /// Count events of one type.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn count_by_type(&self, event_type: EventType) -> Result<u64, AuditError> {
        let event_type = event_type.as_str();

        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || -> Result<u64, AuditError> {
            let conn = conn.blocking_lock();
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM events WHERE event_type = ?1",
                params![event_type],
                |row| row.get(0),
            )?;
            Ok(count.unsigned_abs())
        })
        .await
        .map_err(|_| AuditError::TaskCancelled)?
    }

    /// Totals for the decision event types.
    ///
    /// # Errors
    ///
    /// Returns an error if any count query fails.
    pub async fn summary(&self) -> Result<AuditSummary, AuditError> {
        Ok(AuditSummary {
            total: self.count_events().await?,
            deauth_blocked: self.count_by_type(EventType::DeauthBlocked).await?,
            deauth_allowed: self.count_by_type(EventType::DeauthAllowed).await?,
            enforcement_fallbacks: self.count_by_type(EventType::EnforcementFallback).await?,
        })
    }
}

fn init_schema(conn: &Connection) -> Result<(), AuditError> {
    conn.execute_batch(SCHEMA)?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        params![SCHEMA_VERSION],
    )?;
    Ok(())
}

/// Fixed-width UTC timestamps so lexical order matches time order.
fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
}

struct RawEvent {
    id: String,
    timestamp: String,
    event_type: String,
    bssid: Option<String>,
    ssid: Option<String>,
    entry_id: Option<u64>,
    reason: Option<String>,
    details: Option<String>,
}

impl RawEvent {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            timestamp: row.get(1)?,
            event_type: row.get(2)?,
            bssid: row.get(3)?,
            ssid: row.get(4)?,
            entry_id: row.get(5)?,
            reason: row.get(6)?,
            details: row.get(7)?,
        })
    }

    fn into_event(self) -> Result<AuditEvent, AuditError> {
        let corrupt = |reason: String| AuditError::CorruptRow {
            id: self.id.clone(),
            reason,
        };

        let id = Uuid::parse_str(&self.id).map_err(|e| corrupt(e.to_string()))?;
        let timestamp = DateTime::parse_from_rfc3339(&self.timestamp)
            .map_err(|e| corrupt(e.to_string()))?
            .with_timezone(&Utc);
        let event_type = self
            .event_type
            .parse::<EventType>()
            .map_err(|e| corrupt(e.to_string()))?;
        let details = self
            .details
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(|e| corrupt(e.to_string()))?;

        Ok(AuditEvent {
            id,
            timestamp,
            event_type,
            bssid: self.bssid,
            ssid: self.ssid,
            entry_id: self.entry_id,
            reason: self.reason,
            details,
        })
    }
}
