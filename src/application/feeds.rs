//! Owner-scoped feed operations, reads served through the query cache.
//!
//! Every read and write carries the caller's user id into the query itself,
//! so a feed someone else owns is indistinguishable from one that does not
//! exist. The database renders the documents (JSON views, `feed_xml` for
//! RSS); this layer only caches and invalidates them.

use std::sync::Arc;

use tracing::{info, warn};

use super::error::AppError;
use super::repos::{CreateFeedParams, FeedsRepo, UpdateFeedParams};
use crate::cache::{CacheHint, CacheInvalidator, QueryCache};
use crate::domain::entities::{FeedDocument, FeedItemRecord, FeedRecord};
use crate::domain::types::RecordId;

pub const SQL_FEED_JSON: &str = "SELECT json FROM feed_json WHERE id = $1 AND owner_id = $2";
pub const SQL_FEEDS_JSON: &str = "SELECT json FROM feeds_json WHERE owner_id = $1";
pub const SQL_FEED_RSS: &str = "SELECT feed_xml($1, $2)";

/// Item fields as supplied by a caller; ids and ownership are assigned here.
#[derive(Debug, Clone)]
pub struct NewFeedItem {
    pub link: String,
    pub title: String,
    pub description: String,
}

#[derive(Clone)]
pub struct FeedService {
    repo: Arc<dyn FeedsRepo>,
    cache: QueryCache,
    invalidator: CacheInvalidator,
    public_url: String,
}

impl FeedService {
    pub fn new(
        repo: Arc<dyn FeedsRepo>,
        cache: QueryCache,
        invalidator: CacheInvalidator,
        public_url: impl Into<String>,
    ) -> Self {
        Self {
            repo,
            cache,
            invalidator,
            public_url: public_url.into(),
        }
    }

    /// All feeds of `owner` as one JSON array. A user with no feeds gets
    /// `[]`, which is cached like any other result.
    pub async fn get_all_json(&self, owner_id: &RecordId) -> Result<FeedDocument, AppError> {
        self.cache
            .fetch_list(
                SQL_FEEDS_JSON,
                &[owner_id.as_str()],
                &CacheHint::user(owner_id.clone()),
                "[]",
            )
            .await
    }

    /// One feed as a JSON object. Missing and foreign feeds both surface as
    /// [`AppError::NotFound`].
    pub async fn get_json(
        &self,
        owner_id: &RecordId,
        feed_id: &RecordId,
    ) -> Result<FeedDocument, AppError> {
        self.cache
            .fetch_one(
                SQL_FEED_JSON,
                &[feed_id.as_str(), owner_id.as_str()],
                &CacheHint::resource(owner_id.clone(), feed_id.clone()),
            )
            .await
    }

    /// One feed rendered as RSS XML.
    pub async fn get_rss(
        &self,
        owner_id: &RecordId,
        feed_id: &RecordId,
    ) -> Result<FeedDocument, AppError> {
        self.cache
            .fetch_one(
                SQL_FEED_RSS,
                &[feed_id.as_str(), owner_id.as_str()],
                &CacheHint::resource(owner_id.clone(), feed_id.clone()),
            )
            .await
    }

    /// Create a feed. `poll_secret` is a read-scoped token secret embedded in
    /// the feed's public link so a feed reader can poll it unattended.
    pub async fn create(
        &self,
        owner_id: &RecordId,
        title: &str,
        description: &str,
        poll_secret: &str,
    ) -> Result<FeedRecord, AppError> {
        if title.trim().is_empty() {
            return Err(AppError::Validation("feed title must not be empty".into()));
        }
        let id = RecordId::generate();
        let link = format!("{}/feeds/{id}/rss?_tok={poll_secret}", self.public_url);
        let feed = self
            .repo
            .create_feed(CreateFeedParams {
                id,
                owner_id: owner_id.clone(),
                title: title.to_string(),
                description: description.to_string(),
                link,
            })
            .await?;
        info!(feed_id = %feed.id, "feed created");
        self.invalidate_after_write(&CacheHint::user(owner_id.clone()))
            .await;
        Ok(feed)
    }

    /// Rename a feed and, when `items` is given, replace its item set.
    pub async fn update(
        &self,
        owner_id: &RecordId,
        feed_id: &RecordId,
        title: &str,
        items: Option<Vec<NewFeedItem>>,
    ) -> Result<(), AppError> {
        if title.trim().is_empty() {
            return Err(AppError::Validation("feed title must not be empty".into()));
        }
        let items = items.map(|items| self.build_items(owner_id, feed_id, items));
        self.repo
            .update_feed(UpdateFeedParams {
                owner_id: owner_id.clone(),
                feed_id: feed_id.clone(),
                title: title.to_string(),
                items,
            })
            .await?;
        info!(%feed_id, "feed updated");
        self.invalidate_after_write(&CacheHint::resource(owner_id.clone(), feed_id.clone()))
            .await;
        Ok(())
    }

    /// Delete a feed and everything in it.
    pub async fn delete(&self, owner_id: &RecordId, feed_id: &RecordId) -> Result<(), AppError> {
        self.repo.delete_feed(owner_id, feed_id).await?;
        info!(%feed_id, "feed deleted");
        self.invalidate_after_write(&CacheHint::resource(owner_id.clone(), feed_id.clone()))
            .await;
        Ok(())
    }

    /// Append items to a feed the caller owns.
    pub async fn add_items(
        &self,
        owner_id: &RecordId,
        feed_id: &RecordId,
        items: Vec<NewFeedItem>,
    ) -> Result<Vec<FeedItemRecord>, AppError> {
        if items.is_empty() {
            return Err(AppError::Validation("no items to add".into()));
        }
        let records = self.build_items(owner_id, feed_id, items);
        self.repo.add_items(owner_id, feed_id, &records).await?;
        info!(%feed_id, count = records.len(), "feed items added");
        self.invalidate_after_write(&CacheHint::resource(owner_id.clone(), feed_id.clone()))
            .await;
        Ok(records)
    }

    pub async fn update_item(
        &self,
        owner_id: &RecordId,
        item: &FeedItemRecord,
    ) -> Result<(), AppError> {
        self.repo.update_item(owner_id, item).await?;
        info!(item_id = %item.id, "feed item updated");
        self.invalidate_after_write(&CacheHint::resource(owner_id.clone(), item.feed_id.clone()))
            .await;
        Ok(())
    }

    pub async fn delete_item(
        &self,
        owner_id: &RecordId,
        feed_id: &RecordId,
        item_id: &RecordId,
    ) -> Result<(), AppError> {
        self.repo.delete_item(owner_id, feed_id, item_id).await?;
        info!(%item_id, "feed item deleted");
        self.invalidate_after_write(&CacheHint::resource(owner_id.clone(), feed_id.clone()))
            .await;
        Ok(())
    }

    fn build_items(
        &self,
        owner_id: &RecordId,
        feed_id: &RecordId,
        items: Vec<NewFeedItem>,
    ) -> Vec<FeedItemRecord> {
        items
            .into_iter()
            .map(|item| FeedItemRecord {
                id: RecordId::generate(),
                feed_id: feed_id.clone(),
                owner_id: owner_id.clone(),
                link: item.link,
                title: item.title,
                description: item.description,
            })
            .collect()
    }

    /// Invalidation runs after the durable write succeeded. A failure here
    /// leaves stale entries behind but they still age out via the cache TTL,
    /// so the write itself is not rolled back.
    async fn invalidate_after_write(&self, hint: &CacheHint) {
        if let Err(err) = self.invalidator.invalidate(hint).await {
            warn!(error = %err, "cache invalidation failed after write");
        }
    }
}
