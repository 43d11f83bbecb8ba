//! Tenant Identifier Module
//!
//! Defines the validated tenant identifier that partitions every record and
//! every cache entry.

use std::fmt;

use serde::{Deserialize, Serialize};

// == Public Constants ==
/// Maximum allowed tenant identifier length in bytes
pub const MAX_TENANT_ID_LENGTH: usize = 64;

// == Tenant Id ==
/// Opaque tenant identifier, the unit of isolation.
///
/// Only ASCII letters, digits, `-` and `_` are accepted, so an identifier can
/// never contain the `:` separator used when rendering cache keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TenantId(String);

impl TenantId {
    // == Constructor ==
    /// Parses and validates a tenant identifier.
    ///
    /// Returns `None` if the identifier is empty, too long, or contains
    /// characters outside `[A-Za-z0-9_-]`.
    pub fn parse(raw: &str) -> Option<Self> {
        let valid = !raw.is_empty()
            && raw.len() <= MAX_TENANT_ID_LENGTH
            && raw
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');

        valid.then(|| Self(raw.to_string()))
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for TenantId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| format!("invalid tenant id: {:?}", value))
    }
}

impl From<TenantId> for String {
    fn from(id: TenantId) -> Self {
        id.0
    }
}
