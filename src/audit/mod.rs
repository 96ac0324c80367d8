//! Audit logging for guard decisions and whitelist edits.

mod error;
mod logger;
mod schema;
mod types;

pub use error::AuditError;
pub use logger::{default_audit_path, AuditLog};
pub use schema::{SCHEMA, SCHEMA_VERSION};
pub use types::{AuditEvent, AuditEventBuilder, AuditSummary, EventType, UnknownEventType};
