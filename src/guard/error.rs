//! Guard error types.

use crate::audit::AuditError;
use crate::whitelist::WhitelistError;

/// Errors surfaced by the guard's management operations.
///
/// Deauth decisions never return these; they are resolved by the
/// enforcement mode instead.
#[derive(thiserror::Error, Debug)]
pub enum GuardError {
    #[error(transparent)]
    Whitelist(#[from] WhitelistError),

    #[error("Audit log error: {0}")]
    Audit(#[from] AuditError),

    /// Blocking task was cancelled.
    #[error("Blocking task cancelled")]
    TaskCancelled,
}
