//! Group invalidation over the reverse indexes.

use std::sync::Arc;

use metrics::counter;
use tracing::debug;

use super::keys::CacheHint;
use crate::infra::kv::{KeyValueStore, KvError};

/// Drains every cache entry registered under a hint's reverse indexes.
#[derive(Clone)]
pub struct CacheInvalidator {
    kv: Arc<dyn KeyValueStore>,
}

impl CacheInvalidator {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    /// Remove all entries the hint's indexes reference, and the indexes
    /// themselves, as one indivisible operation. Returns how many live
    /// entries were removed; indexes that do not exist contribute zero.
    pub async fn invalidate(&self, hint: &CacheHint) -> Result<u64, KvError> {
        let index_keys = hint.reverse_index_keys();
        let removed = self.kv.purge_indexed(&index_keys).await?;
        counter!("feedloom_cache_invalidated_entries_total").increment(removed);
        debug!(indexes = ?index_keys, removed, "cache group invalidated");
        Ok(removed)
    }
}
