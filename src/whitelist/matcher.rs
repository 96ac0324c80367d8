//! Match engine deciding whether an access point is whitelisted.
//!
//! Entries are visited in stored order and the first enabled entry whose
//! BSSID or SSID rule holds wins. BSSIDs are compared exactly after
//! normalization; SSIDs are compared exactly, as a glob, or as a regular
//! expression depending on the entry flags.

use std::collections::HashMap;
use std::sync::RwLock;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use super::bssid::Bssid;
use super::entry::{SsidMode, WhitelistEntry};

/// Compiled patterns kept before the cache is flushed.
const MAX_CACHED_PATTERNS: usize = 1024;

/// Which rule of an entry produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchRule {
    Bssid,
    Ssid(SsidMode),
}

/// The entry that matched a target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchedEntry {
    pub id: u64,
    pub label: String,
    pub rule: MatchRule,
}

/// A pattern that failed to compile during a check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternFailure {
    pub id: u64,
    pub pattern: String,
    pub error: String,
    /// True the first time the engine saw this pattern fail.
    pub first_seen: bool,
}

/// Malformed input or state encountered while matching.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MatchError {
    /// Neither a BSSID nor an SSID was supplied.
    #[error("No BSSID or SSID supplied")]
    MissingTarget,

    /// The supplied BSSID is not a MAC address.
    #[error("Malformed target BSSID: {0:?}")]
    MalformedTarget(String),

    /// A stored entry violates the entry invariants.
    #[error("Malformed whitelist entry {id}: {reason}")]
    MalformedEntry { id: u64, reason: String },
}

/// Result of checking a target against the entry set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchOutcome {
    /// The first matching entry, if any.
    pub matched: Option<MatchedEntry>,
    /// Regex entries skipped because their pattern does not compile.
    pub invalid_patterns: Vec<PatternFailure>,
    /// Malformed input or entries seen before a match was found.
    pub errors: Vec<MatchError>,
}

impl MatchOutcome {
    /// A match wins over any error; otherwise the first error is returned.
    ///
    /// # Errors
    ///
    /// Returns the first `MatchError` when nothing matched and the input or
    /// an entry was malformed.
    pub fn into_result(self) -> Result<Option<MatchedEntry>, MatchError> {
        match (self.matched, self.errors.into_iter().next()) {
            (Some(matched), _) => Ok(Some(matched)),
            (None, Some(error)) => Err(error),
            (None, None) => Ok(None),
        }
    }
}

/// Decides whether a BSSID/SSID pair is covered by a set of entries.
#[derive(Debug, Default)]
pub struct MatchEngine {
    regex_ignore_case: bool,
    cache: RwLock<HashMap<(SsidMode, String), Result<Regex, String>>>,
}

impl MatchEngine {
    /// Create an engine with case-sensitive regex matching.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set whether regex SSID patterns ignore case.
    #[must_use]
    pub fn with_regex_ignore_case(mut self, ignore_case: bool) -> Self {
        self.regex_ignore_case = ignore_case;
        self
    }

    /// Check a target against `entries` and report what matched.
    #[must_use]
    pub fn check(&self, bssid: &str, ssid: &str, entries: &[WhitelistEntry]) -> MatchOutcome {
        let mut outcome = MatchOutcome::default();
        let bssid = bssid.trim();

        if bssid.is_empty() && ssid.is_empty() {
            outcome.errors.push(MatchError::MissingTarget);
            return outcome;
        }

        let target = if bssid.is_empty() {
            None
        } else if let Ok(parsed) = bssid.parse::<Bssid>() {
            Some(parsed)
        } else {
            outcome
                .errors
                .push(MatchError::MalformedTarget(bssid.to_string()));
            None
        };

        for entry in entries.iter().filter(|e| e.enabled) {
            // Files written by older plugin versions store absent fields as "".
            let stored_bssid = entry.bssid.as_deref().filter(|b| !b.trim().is_empty());
            let stored_ssid = entry.ssid.as_deref().filter(|s| !s.is_empty());
            if stored_bssid.is_none() && stored_ssid.is_none() {
                outcome.errors.push(MatchError::MalformedEntry {
                    id: entry.id,
                    reason: "entry has neither BSSID nor SSID".to_string(),
                });
                continue;
            }

            if let (Some(target), Some(stored)) = (target, stored_bssid) {
                match stored.parse::<Bssid>() {
                    Ok(stored) if stored == target => {
                        outcome.matched = Some(MatchedEntry {
                            id: entry.id,
                            label: entry.label().to_string(),
                            rule: MatchRule::Bssid,
                        });
                        return outcome;
                    }
                    Ok(_) => {}
                    Err(e) => outcome.errors.push(MatchError::MalformedEntry {
                        id: entry.id,
                        reason: e.to_string(),
                    }),
                }
            }

            if ssid.is_empty() {
                continue;
            }
            if let Some(pattern) = stored_ssid {
                if self.ssid_matches(entry, pattern, ssid, &mut outcome.invalid_patterns) {
                    outcome.matched = Some(MatchedEntry {
                        id: entry.id,
                        label: entry.label().to_string(),
                        rule: MatchRule::Ssid(entry.ssid_mode()),
                    });
                    return outcome;
                }
            }
        }

        outcome
    }

    /// True when the target matches an enabled entry.
    ///
    /// # Errors
    ///
    /// Returns a `MatchError` when nothing matched and the input or an entry
    /// was malformed. Invalid regex patterns are not errors.
    pub fn is_whitelisted(
        &self,
        bssid: &str,
        ssid: &str,
        entries: &[WhitelistEntry],
    ) -> Result<bool, MatchError> {
        self.check(bssid, ssid, entries)
            .into_result()
            .map(|matched| matched.is_some())
    }

    /// Drop all compiled patterns.
    pub fn clear_cache(&self) {
        if let Ok(mut cache) = self.cache.write() {
            cache.clear();
        }
    }

    /// Number of cached pattern compilations.
    #[must_use]
    pub fn cached_patterns(&self) -> usize {
        self.cache.read().map_or(0, |cache| cache.len())
    }

    fn ssid_matches(
        &self,
        entry: &WhitelistEntry,
        pattern: &str,
        ssid: &str,
        failures: &mut Vec<PatternFailure>,
    ) -> bool {
        let mode = entry.ssid_mode();
        if mode == SsidMode::Exact {
            return pattern == ssid;
        }

        let (compiled, first_seen) = self.compiled(mode, pattern);
        match compiled {
            Ok(regex) => regex.is_match(ssid),
            Err(error) => {
                if first_seen {
                    tracing::warn!(
                        id = entry.id,
                        pattern = %pattern,
                        error = %error,
                        "Invalid SSID pattern, entry will never match"
                    );
                }
                failures.push(PatternFailure {
                    id: entry.id,
                    pattern: pattern.to_string(),
                    error,
                    first_seen,
                });
                false
            }
        }
    }

    /// Fetch or compile a pattern. The flag is true on a fresh compilation.
    fn compiled(&self, mode: SsidMode, pattern: &str) -> (Result<Regex, String>, bool) {
        let key = (mode, pattern.to_string());
        if let Ok(cache) = self.cache.read() {
            if let Some(hit) = cache.get(&key) {
                return (hit.clone(), false);
            }
        }

        let compiled = build_regex(mode, pattern, self.regex_ignore_case).map_err(|e| e.to_string());
        if let Ok(mut cache) = self.cache.write() {
            if cache.len() >= MAX_CACHED_PATTERNS {
                cache.clear();
            }
            cache.insert(key, compiled.clone());
        }
        (compiled, true)
    }
}

/// Compile a stored SSID pattern exactly as matching will use it.
pub(crate) fn build_regex(
    mode: SsidMode,
    pattern: &str,
    ignore_case: bool,
) -> Result<Regex, regex::Error> {
    let compile = |source: &str, case_insensitive: bool| {
        RegexBuilder::new(source)
            .case_insensitive(case_insensitive)
            .build()
    };
    match mode {
        SsidMode::Wildcard | SsidMode::Exact => compile(&glob_to_regex(pattern), false),
        SsidMode::Regex => match compile(&anchor_pattern(pattern), ignore_case) {
            Ok(regex) => Ok(regex),
            Err(anchored_error) => {
                // A valid pattern only breaks when wrapped if a trailing
                // verbose-mode comment swallowed the closing group. Ending the
                // comment with a newline, ignored under `x`, restores it.
                compile(pattern, ignore_case)?;
                compile(&format!("^(?:{pattern}\n)$"), ignore_case).map_err(|_| anchored_error)
            }
        },
    }
}

/// Wrap a pattern for whole-string matching unless it carries its own
/// anchors.
#[must_use]
pub fn anchor_pattern(pattern: &str) -> String {
    if has_explicit_anchor(pattern) {
        pattern.to_string()
    } else {
        format!("^(?:{pattern})$")
    }
}

fn has_explicit_anchor(pattern: &str) -> bool {
    pattern.starts_with('^')
        || pattern.starts_with("\\A")
        || ends_with_unescaped(pattern, "$")
        || ends_with_unescaped(pattern, "\\z")
}

/// True when `pattern` ends with `suffix` and no odd run of backslashes
/// escapes its first character.
fn ends_with_unescaped(pattern: &str, suffix: &str) -> bool {
    pattern.strip_suffix(suffix).is_some_and(|head| {
        head.chars().rev().take_while(|&c| c == '\\').count() % 2 == 0
    })
}

/// Translate a glob (`*`, `?`) into an anchored regular expression. Every
/// other character is literal.
#[must_use]
pub fn glob_to_regex(glob: &str) -> String {
    let mut out = String::with_capacity(glob.len() + 8);
    out.push_str("(?s)^");
    let mut buf = [0u8; 4];
    for c in glob.chars() {
        match c {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            other => out.push_str(&regex::escape(other.encode_utf8(&mut buf))),
        }
    }
    out.push('$');
    out
}
