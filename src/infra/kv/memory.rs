//! In-process key-value store.
//!
//! Single-mutex implementation with lazy TTL expiry. Because every operation
//! holds the one lock, [`MemoryKv::purge_indexed`] is trivially indivisible,
//! which makes this the reference implementation for the adapter contract.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::warn;

use super::{KeyValueStore, KvError};

#[derive(Debug, Clone)]
enum Value {
    Hash(HashMap<String, String>),
    Set(HashSet<String>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        matches!(self.expires_at, Some(at) if at <= now)
    }
}

#[derive(Default)]
pub struct MemoryKv {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self, op: &'static str) -> MutexGuard<'_, HashMap<String, Entry>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!(
                    op,
                    lock_kind = "mutex.lock",
                    result = "poisoned_recovered",
                    "Recovered from poisoned in-memory store lock"
                );
                poisoned.into_inner()
            }
        }
    }
}

/// Remove the entry when expired, returning whether it is still live.
fn prune(entries: &mut HashMap<String, Entry>, key: &str, now: Instant) -> bool {
    match entries.get(key) {
        Some(entry) if entry.is_expired(now) => {
            entries.remove(key);
            false
        }
        Some(_) => true,
        None => false,
    }
}

#[async_trait]
impl KeyValueStore for MemoryKv {
    async fn hash_get(&self, key: &str) -> Result<Option<HashMap<String, String>>, KvError> {
        let mut entries = self.lock("hash_get");
        if !prune(&mut entries, key, Instant::now()) {
            return Ok(None);
        }
        match &entries[key].value {
            Value::Hash(fields) => Ok(Some(fields.clone())),
            Value::Set(_) => Err(KvError::Corrupt {
                key: key.to_string(),
                message: "expected hash, found set".to_string(),
            }),
        }
    }

    async fn hash_set(
        &self,
        key: &str,
        fields: &[(&str, &str)],
        ttl: Option<Duration>,
    ) -> Result<(), KvError> {
        let mut entries = self.lock("hash_set");
        let expires_at = ttl.map(|ttl| Instant::now() + ttl.max(Duration::from_millis(1)));
        let map = fields
            .iter()
            .map(|(field, value)| (field.to_string(), value.to_string()))
            .collect();
        entries.insert(
            key.to_string(),
            Entry {
                value: Value::Hash(map),
                expires_at,
            },
        );
        Ok(())
    }

    async fn set_add(&self, key: &str, member: &str) -> Result<(), KvError> {
        let mut entries = self.lock("set_add");
        let now = Instant::now();
        prune(&mut entries, key, now);
        let entry = entries.entry(key.to_string()).or_insert_with(|| Entry {
            value: Value::Set(HashSet::new()),
            expires_at: None,
        });
        match &mut entry.value {
            Value::Set(members) => {
                members.insert(member.to_string());
                Ok(())
            }
            Value::Hash(_) => Err(KvError::Corrupt {
                key: key.to_string(),
                message: "expected set, found hash".to_string(),
            }),
        }
    }

    async fn set_remove(&self, key: &str, member: &str) -> Result<(), KvError> {
        let mut entries = self.lock("set_remove");
        if let Some(entry) = entries.get_mut(key)
            && let Value::Set(members) = &mut entry.value
        {
            members.remove(member);
        }
        Ok(())
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>, KvError> {
        let mut entries = self.lock("set_members");
        if !prune(&mut entries, key, Instant::now()) {
            return Ok(Vec::new());
        }
        match &entries[key].value {
            Value::Set(members) => Ok(members.iter().cloned().collect()),
            Value::Hash(_) => Err(KvError::Corrupt {
                key: key.to_string(),
                message: "expected set, found hash".to_string(),
            }),
        }
    }

    async fn delete(&self, keys: &[String]) -> Result<(), KvError> {
        let mut entries = self.lock("delete");
        for key in keys {
            entries.remove(key);
        }
        Ok(())
    }

    async fn purge_indexed(&self, index_keys: &[String]) -> Result<u64, KvError> {
        // One lock hold for the whole sweep: nothing can register into an
        // index between reading its members and deleting them.
        let mut entries = self.lock("purge_indexed");
        let now = Instant::now();
        let mut removed = 0u64;
        for index_key in index_keys {
            let members = match entries.remove(index_key) {
                Some(entry) if !entry.is_expired(now) => match entry.value {
                    Value::Set(members) => members,
                    Value::Hash(_) => {
                        return Err(KvError::Corrupt {
                            key: index_key.clone(),
                            message: "expected set, found hash".to_string(),
                        });
                    }
                },
                _ => continue,
            };
            for member in members {
                if let Some(entry) = entries.remove(&member)
                    && !entry.is_expired(now)
                {
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hash_roundtrip_and_delete() {
        let kv = MemoryKv::new();
        assert!(kv.hash_get("h").await.expect("get").is_none());

        kv.hash_set("h", &[("data", "payload"), ("etag", "e1")], None)
            .await
            .expect("set");
        let fields = kv.hash_get("h").await.expect("get").expect("present");
        assert_eq!(fields.get("data").map(String::as_str), Some("payload"));

        kv.delete(&["h".to_string()]).await.expect("delete");
        assert!(kv.hash_get("h").await.expect("get").is_none());
    }

    #[tokio::test]
    async fn hash_ttl_expires() {
        let kv = MemoryKv::new();
        kv.hash_set("h", &[("data", "x")], Some(Duration::from_millis(20)))
            .await
            .expect("set");
        assert!(kv.hash_get("h").await.expect("get").is_some());

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(kv.hash_get("h").await.expect("get").is_none());
    }

    #[tokio::test]
    async fn purge_removes_members_and_indices() {
        let kv = MemoryKv::new();
        kv.hash_set("e1", &[("data", "1")], None).await.expect("set");
        kv.hash_set("e2", &[("data", "2")], None).await.expect("set");
        kv.hash_set("e3", &[("data", "3")], None).await.expect("set");
        kv.set_add("idx.a", "e1").await.expect("add");
        kv.set_add("idx.a", "e2").await.expect("add");
        kv.set_add("idx.b", "e3").await.expect("add");

        let removed = kv
            .purge_indexed(&["idx.a".to_string()])
            .await
            .expect("purge");
        assert_eq!(removed, 2);
        assert!(kv.hash_get("e1").await.expect("get").is_none());
        assert!(kv.hash_get("e2").await.expect("get").is_none());
        // Unrelated index untouched.
        assert!(kv.hash_get("e3").await.expect("get").is_some());
        assert!(kv.set_members("idx.a").await.expect("members").is_empty());
        assert_eq!(kv.set_members("idx.b").await.expect("members").len(), 1);
    }

    #[tokio::test]
    async fn purge_of_missing_index_is_a_noop() {
        let kv = MemoryKv::new();
        let removed = kv
            .purge_indexed(&["idx.missing".to_string()])
            .await
            .expect("purge");
        assert_eq!(removed, 0);
    }

    #[tokio::test]
    async fn set_remove_is_idempotent() {
        let kv = MemoryKv::new();
        kv.set_add("s", "m").await.expect("add");
        kv.set_remove("s", "m").await.expect("remove");
        kv.set_remove("s", "m").await.expect("remove again");
        assert!(kv.set_members("s").await.expect("members").is_empty());
    }
}
