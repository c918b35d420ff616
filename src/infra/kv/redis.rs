//! Redis-backed key-value store.

use std::collections::HashMap;
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, RedisError, Script};

use super::{KeyValueStore, KvError};

/// Drains each index set and every entry it references. Runs server-side so
/// the whole sweep is one indivisible operation: no concurrent fetch can
/// re-register into an index mid-deletion.
const PURGE_SCRIPT: &str = r#"
local removed = 0
for i = 1, #KEYS do
  local members = redis.call('SMEMBERS', KEYS[i])
  if #members > 0 then
    removed = removed + redis.call('DEL', unpack(members))
  end
  redis.call('DEL', KEYS[i])
end
return removed
"#;

static PURGE: LazyLock<Script> = LazyLock::new(|| Script::new(PURGE_SCRIPT));

#[derive(Clone)]
pub struct RedisKv {
    conn: ConnectionManager,
}

impl RedisKv {
    /// Connect with automatic reconnection handling.
    pub async fn connect(url: &str) -> Result<Self, KvError> {
        let client = Client::open(url).map_err(kv_err)?;
        let conn = ConnectionManager::new(client).await.map_err(kv_err)?;
        Ok(Self { conn })
    }

    pub fn from_manager(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

fn kv_err(err: RedisError) -> KvError {
    KvError::Unavailable(err.to_string())
}

fn ttl_seconds(ttl: Duration) -> i64 {
    (ttl.as_secs() as i64).max(1)
}

#[async_trait]
impl KeyValueStore for RedisKv {
    async fn hash_get(&self, key: &str) -> Result<Option<HashMap<String, String>>, KvError> {
        let mut conn = self.conn.clone();
        let fields: HashMap<String, String> = conn.hgetall(key).await.map_err(kv_err)?;
        // HGETALL on a missing key yields an empty map, never nil.
        if fields.is_empty() {
            Ok(None)
        } else {
            Ok(Some(fields))
        }
    }

    async fn hash_set(
        &self,
        key: &str,
        fields: &[(&str, &str)],
        ttl: Option<Duration>,
    ) -> Result<(), KvError> {
        let mut conn = self.conn.clone();
        let mut pipe = redis::pipe();
        pipe.hset_multiple(key, fields).ignore();
        if let Some(ttl) = ttl {
            pipe.expire(key, ttl_seconds(ttl)).ignore();
        }
        let _: () = pipe.query_async(&mut conn).await.map_err(kv_err)?;
        Ok(())
    }

    async fn set_add(&self, key: &str, member: &str) -> Result<(), KvError> {
        let mut conn = self.conn.clone();
        conn.sadd::<_, _, ()>(key, member).await.map_err(kv_err)
    }

    async fn set_remove(&self, key: &str, member: &str) -> Result<(), KvError> {
        let mut conn = self.conn.clone();
        conn.srem::<_, _, ()>(key, member).await.map_err(kv_err)
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>, KvError> {
        let mut conn = self.conn.clone();
        conn.smembers(key).await.map_err(kv_err)
    }

    async fn delete(&self, keys: &[String]) -> Result<(), KvError> {
        if keys.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(keys).await.map_err(kv_err)
    }

    async fn purge_indexed(&self, index_keys: &[String]) -> Result<u64, KvError> {
        if index_keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn.clone();
        let mut invocation = PURGE.prepare_invoke();
        for key in index_keys {
            invocation.key(key.as_str());
        }
        let removed: i64 = invocation.invoke_async(&mut conn).await.map_err(kv_err)?;
        Ok(removed.max(0) as u64)
    }
}
