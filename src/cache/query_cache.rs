//! Read-through cache over rendered feed documents.

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tracing::{debug, warn};

use super::keys::{CacheHint, query_key};
use crate::application::error::AppError;
use crate::application::repos::DocumentSource;
use crate::domain::entities::FeedDocument;
use crate::domain::types::RecordId;
use crate::infra::kv::KeyValueStore;

const FIELD_DATA: &str = "data";
const FIELD_ETAG: &str = "etag";

/// Read-through cache keyed by [`query_key`].
///
/// Each entry is a hash of `data` (the rendered payload) and `etag` (minted
/// at population time), bounded by one TTL. Entries register into the reverse
/// index named by their [`CacheHint`] so [`super::CacheInvalidator`] can drain
/// them in groups.
#[derive(Clone)]
pub struct QueryCache {
    kv: Arc<dyn KeyValueStore>,
    source: Arc<dyn DocumentSource>,
    ttl: Duration,
}

impl QueryCache {
    pub fn new(kv: Arc<dyn KeyValueStore>, source: Arc<dyn DocumentSource>, ttl: Duration) -> Self {
        Self { kv, source, ttl }
    }

    /// Fetch a single document. Zero rows is [`AppError::NotFound`] and is
    /// never cached, so a later insert under the same key is visible
    /// immediately.
    pub async fn fetch_one(
        &self,
        sql: &str,
        args: &[&str],
        hint: &CacheHint,
    ) -> Result<FeedDocument, AppError> {
        let key = query_key(sql, args);
        if let Some(doc) = self.lookup(&key).await? {
            return Ok(doc);
        }
        let payload = self
            .source
            .fetch_payload(sql, args)
            .await?
            .ok_or(AppError::NotFound)?;
        self.populate(key, payload, hint).await
    }

    /// Fetch a list document. Zero rows renders as `empty` and is cached like
    /// any other result, since an empty collection is a valid answer.
    pub async fn fetch_list(
        &self,
        sql: &str,
        args: &[&str],
        hint: &CacheHint,
        empty: &str,
    ) -> Result<FeedDocument, AppError> {
        let key = query_key(sql, args);
        if let Some(doc) = self.lookup(&key).await? {
            return Ok(doc);
        }
        let payload = self
            .source
            .fetch_payload(sql, args)
            .await?
            .unwrap_or_else(|| empty.to_string());
        self.populate(key, payload, hint).await
    }

    async fn lookup(&self, key: &str) -> Result<Option<FeedDocument>, AppError> {
        let Some(mut fields) = self.kv.hash_get(key).await? else {
            counter!("feedloom_query_cache_miss_total").increment(1);
            return Ok(None);
        };
        let Some(payload) = fields.remove(FIELD_DATA) else {
            // Entry without a data field cannot be served; treat as a miss
            // and let population overwrite it.
            warn!(key, "cache entry missing data field, refetching");
            counter!("feedloom_query_cache_miss_total").increment(1);
            return Ok(None);
        };
        counter!("feedloom_query_cache_hit_total").increment(1);
        debug!(key, "query cache hit");
        Ok(Some(FeedDocument {
            payload,
            etag: fields.remove(FIELD_ETAG),
        }))
    }

    /// Store the document and register it in every index set its hint
    /// names. An entry must never outlive its registrations, so when one
    /// fails the entry is removed again and the document is served uncached.
    async fn populate(
        &self,
        key: String,
        payload: String,
        hint: &CacheHint,
    ) -> Result<FeedDocument, AppError> {
        let etag = RecordId::generate().to_string();
        // Value and TTL land in one store call so a crash in between can
        // never leave an immortal entry.
        self.kv
            .hash_set(
                &key,
                &[(FIELD_DATA, &payload), (FIELD_ETAG, &etag)],
                Some(self.ttl),
            )
            .await?;
        let index_keys = hint.reverse_index_keys();
        for index_key in &index_keys {
            if let Err(err) = self.kv.set_add(index_key, &key).await {
                warn!(%key, index = %index_key, error = %err, "cache index registration failed, dropping entry");
                self.kv.delete(std::slice::from_ref(&key)).await?;
                return Ok(FeedDocument {
                    payload,
                    etag: None,
                });
            }
        }
        debug!(%key, indexes = ?index_keys, "query cache populated");
        Ok(FeedDocument {
            payload,
            etag: Some(etag),
        })
    }
}
