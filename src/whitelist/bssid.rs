//! BSSID parsing and normalization.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A MAC address identifying an access point radio.
///
/// Parsing accepts `:`, `-` and `.` as octet separators in any case; display
/// always uses the canonical upper-case, colon-separated form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Bssid([u8; 6]);

/// Error returned when a string is not a valid BSSID.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid BSSID format: {0:?}")]
pub struct BssidParseError(pub String);

impl Bssid {
    /// Create a BSSID from raw octets.
    #[must_use]
    pub const fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    /// Raw octets.
    #[must_use]
    pub const fn octets(&self) -> [u8; 6] {
        self.0
    }

    /// Check whether a string parses as a BSSID.
    #[must_use]
    pub fn looks_like(value: &str) -> bool {
        value.parse::<Self>().is_ok()
    }

    /// Canonical string form (`AA:BB:CC:DD:EE:FF`).
    #[must_use]
    pub fn canonical(value: &str) -> Result<String, BssidParseError> {
        value.parse::<Self>().map(|b| b.to_string())
    }
}

impl FromStr for Bssid {
    type Err = BssidParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().replace(['-', '.'], ":");
        let mut octets = [0u8; 6];
        let mut parts = normalized.split(':');

        for octet in &mut octets {
            let part = parts.next().ok_or_else(|| BssidParseError(s.to_string()))?;
            if part.len() != 2 || !part.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(BssidParseError(s.to_string()));
            }
            *octet = u8::from_str_radix(part, 16).map_err(|_| BssidParseError(s.to_string()))?;
        }

        if parts.next().is_some() {
            return Err(BssidParseError(s.to_string()));
        }

        Ok(Self(octets))
    }
}

impl fmt::Display for Bssid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02X}:{b:02X}:{c:02X}:{d:02X}:{e:02X}:{g:02X}")
    }
}

impl TryFrom<String> for Bssid {
    type Error = BssidParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Bssid> for String {
    fn from(value: Bssid) -> Self {
        value.to_string()
    }
}
