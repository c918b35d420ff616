//! Key-value store adapters.
//!
//! The cache tier and the token mirror both sit on [`KeyValueStore`]: a small
//! set of primitives (hash read/write with TTL, set membership, deletion) plus
//! one composite operation, [`KeyValueStore::purge_indexed`], which drains a
//! group of index sets and every entry they reference as a single indivisible
//! operation. [`RedisKv`] backs production; [`MemoryKv`] is the in-process
//! reference implementation used by the test suite.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

mod memory;
mod redis;

pub use memory::MemoryKv;
pub use redis::RedisKv;

#[derive(Debug, Error)]
pub enum KvError {
    #[error("key-value store unavailable: {0}")]
    Unavailable(String),
    #[error("corrupt entry under key `{key}`: {message}")]
    Corrupt { key: String, message: String },
}

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read all fields of a hash. `None` when the key is absent or expired.
    async fn hash_get(&self, key: &str) -> Result<Option<HashMap<String, String>>, KvError>;

    /// Write hash fields, optionally bounding the key's lifetime. A `ttl` of
    /// zero or less never stores an immortal entry; implementations round up
    /// to the smallest representable lifetime.
    async fn hash_set(
        &self,
        key: &str,
        fields: &[(&str, &str)],
        ttl: Option<Duration>,
    ) -> Result<(), KvError>;

    async fn set_add(&self, key: &str, member: &str) -> Result<(), KvError>;

    async fn set_remove(&self, key: &str, member: &str) -> Result<(), KvError>;

    async fn set_members(&self, key: &str) -> Result<Vec<String>, KvError>;

    /// Delete keys outright. Missing keys are not an error.
    async fn delete(&self, keys: &[String]) -> Result<(), KvError>;

    /// For each index key: read its members, delete every member entry, then
    /// delete the index itself, all as one indivisible operation relative to
    /// concurrent readers and writers. Returns the number of member entries
    /// that actually existed and were removed.
    async fn purge_indexed(&self, index_keys: &[String]) -> Result<u64, KvError>;
}
