//! Persistence ports used by the application services.
//!
//! Every service depends on these traits rather than on a concrete database;
//! `infra::db` implements them over Postgres and the test suite substitutes
//! in-memory fakes.

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;

use crate::domain::entities::{FeedItemRecord, FeedRecord, UserRecord};
use crate::domain::tokens::TokenRecord;
use crate::domain::types::RecordId;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("duplicate value violates `{constraint}`")]
    Duplicate { constraint: String },
    #[error("record not found")]
    NotFound,
    #[error("integrity violation: {message}")]
    Integrity { message: String },
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct CreateUserParams {
    pub id: RecordId,
    pub email: String,
    pub password_hash: String,
}

#[async_trait]
pub trait UsersRepo: Send + Sync {
    async fn create_user(&self, params: CreateUserParams) -> Result<UserRecord, RepoError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, RepoError>;

    async fn find_by_id(&self, id: &RecordId) -> Result<Option<UserRecord>, RepoError>;
}

#[derive(Debug, Clone)]
pub struct CreateFeedParams {
    pub id: RecordId,
    pub owner_id: RecordId,
    pub title: String,
    pub description: String,
    pub link: String,
}

#[derive(Debug, Clone)]
pub struct UpdateFeedParams {
    pub owner_id: RecordId,
    pub feed_id: RecordId,
    pub title: String,
    /// `None` leaves the item set untouched; `Some` replaces it wholesale.
    pub items: Option<Vec<FeedItemRecord>>,
}

#[async_trait]
pub trait FeedsRepo: Send + Sync {
    async fn create_feed(&self, params: CreateFeedParams) -> Result<FeedRecord, RepoError>;

    async fn update_feed(&self, params: UpdateFeedParams) -> Result<(), RepoError>;

    async fn delete_feed(&self, owner_id: &RecordId, feed_id: &RecordId) -> Result<(), RepoError>;

    /// Insert items into a feed the owner actually owns. Fails with
    /// [`RepoError::NotFound`] when the feed does not exist or belongs to
    /// someone else; the two cases are indistinguishable to the caller.
    async fn add_items(
        &self,
        owner_id: &RecordId,
        feed_id: &RecordId,
        items: &[FeedItemRecord],
    ) -> Result<(), RepoError>;

    async fn update_item(&self, owner_id: &RecordId, item: &FeedItemRecord)
    -> Result<(), RepoError>;

    async fn delete_item(
        &self,
        owner_id: &RecordId,
        feed_id: &RecordId,
        item_id: &RecordId,
    ) -> Result<(), RepoError>;
}

/// Read-side port the query cache populates itself from.
///
/// One row, one column, already rendered: the database produces the final
/// payload (JSON via the `*_json` views, RSS via `feed_xml`), so a cache miss
/// is exactly one round trip.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    async fn fetch_payload(&self, sql: &str, args: &[&str]) -> Result<Option<String>, RepoError>;
}

#[async_trait]
pub trait TokensRepo: Send + Sync {
    async fn insert_token(&self, token: &TokenRecord) -> Result<(), RepoError>;

    /// Resolve a secret to its owner, filtering expired tokens in the query
    /// itself so a stale mirror can never out-vote the durable store.
    async fn find_live(
        &self,
        secret: &str,
        now: OffsetDateTime,
    ) -> Result<Option<(UserRecord, TokenRecord)>, RepoError>;

    async fn delete_token(&self, user_id: &RecordId, secret: &str) -> Result<(), RepoError>;

    async fn delete_all_tokens(&self, user_id: &RecordId) -> Result<(), RepoError>;

    /// Remove every token whose expiry has passed, returning how many rows
    /// went away.
    async fn delete_expired(&self, now: OffsetDateTime) -> Result<u64, RepoError>;
}
