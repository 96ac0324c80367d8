//! Enforcement policy applied when a match decision cannot be made.

use std::fmt;

use serde::{Deserialize, Serialize};

/// How errors during a match decision are resolved.
///
/// `Strict` treats the target as not whitelisted, so the host's default
/// attack proceeds unless an entry explicitly matched. `Lenient` treats the
/// target as whitelisted and suppresses the attack.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnforcementMode {
    #[default]
    Strict,
    Lenient,
}

impl EnforcementMode {
    /// Whitelist verdict used when the decision failed.
    #[must_use]
    pub fn fallback_whitelisted(self) -> bool {
        match self {
            Self::Strict => false,
            Self::Lenient => true,
        }
    }

    /// Resolve a decision, substituting the fallback on error.
    pub fn resolve<E: fmt::Display>(self, decision: Result<bool, E>) -> bool {
        match decision {
            Ok(whitelisted) => whitelisted,
            Err(e) => {
                let fallback = self.fallback_whitelisted();
                tracing::warn!(
                    mode = %self,
                    error = %e,
                    whitelisted = fallback,
                    "Whitelist decision failed, applying enforcement fallback"
                );
                fallback
            }
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::Lenient => "lenient",
        }
    }
}

impl fmt::Display for EnforcementMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the host should do with a pending deauth frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum AttackDecision {
    /// Target is not protected; the attack may go ahead.
    Proceed,
    /// Target is protected; skip the attack.
    Suppress { reason: String },
}

impl AttackDecision {
    /// True when the host may send the frame.
    #[must_use]
    pub fn allows_attack(&self) -> bool {
        matches!(self, Self::Proceed)
    }
}
