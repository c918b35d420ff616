//! Identifier and access-scope primitives.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque unique record identifier.
///
/// The 32-character lowercase simple form of a UUIDv4, so it can be embedded
/// in cache keys and bearer secrets without escaping.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    /// Generate a fresh identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for RecordId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Display for RecordId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Operations a credential permits, as a read/write bitmask.
///
/// Stored as an integer in `access_tokens.access`; password authentication
/// always grants [`AccessScope::READ_WRITE`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessScope(i32);

impl AccessScope {
    pub const NONE: AccessScope = AccessScope(0);
    pub const READ: AccessScope = AccessScope(1);
    pub const WRITE: AccessScope = AccessScope(2);
    pub const READ_WRITE: AccessScope = AccessScope(3);

    pub fn bits(self) -> i32 {
        self.0
    }

    /// Reconstruct a scope from its stored integer form, masking unknown bits.
    pub fn from_bits(bits: i32) -> Self {
        Self(bits & Self::READ_WRITE.0)
    }

    /// Whether this scope covers every bit of `needed`.
    pub fn allows(self, needed: AccessScope) -> bool {
        needed.0 != 0 && self.0 & needed.0 == needed.0
    }
}

impl Display for AccessScope {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let label = match self.0 {
            0 => "none",
            1 => "read",
            2 => "write",
            _ => "read-write",
        };
        f.write_str(label)
    }
}
