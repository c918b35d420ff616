//! Cache key derivation.

use sha2::{Digest, Sha256};

use crate::domain::types::RecordId;

const QUERY_PREFIX: &str = "query.";
const INDEX_PREFIX: &str = "rkeys.";

/// Derive the cache key for one query execution.
///
/// The digest covers the SQL text and every argument, each preceded by a NUL
/// separator so adjacent arguments can never collapse into the same digest
/// input. The same query with the same arguments always maps to the same key,
/// across processes and restarts.
pub fn query_key(sql: &str, args: &[&str]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(sql.as_bytes());
    for arg in args {
        hasher.update([0u8]);
        hasher.update(arg.as_bytes());
    }
    let digest = hasher.finalize();
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    format!("{QUERY_PREFIX}{}", u64::from_be_bytes(head))
}

/// Scope under which a cache entry is registered and invalidated.
///
/// Every hint carries the owning user; `resource_id` narrows it to a single
/// feed. A resource-scoped entry joins both its feed index and the user-level
/// index, so invalidating at either granularity reaches it: a feed write
/// drains list documents registered without a resource, and a user-level
/// write drains every per-feed document too.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheHint {
    user_id: RecordId,
    resource_id: Option<RecordId>,
}

impl CacheHint {
    /// Scope covering everything the user owns.
    pub fn user(user_id: RecordId) -> Self {
        Self {
            user_id,
            resource_id: None,
        }
    }

    /// Scope narrowed to one feed of the user.
    pub fn resource(user_id: RecordId, resource_id: RecordId) -> Self {
        Self {
            user_id,
            resource_id: Some(resource_id),
        }
    }

    /// Every index set an entry under this hint joins, and a write under
    /// this hint drains. Always includes the user-level index.
    pub fn reverse_index_keys(&self) -> Vec<String> {
        let broad = format!("{INDEX_PREFIX}{}.", self.user_id);
        match &self.resource_id {
            Some(resource) => vec![format!("{INDEX_PREFIX}{}.{resource}", self.user_id), broad],
            None => vec![broad],
        }
    }
}
