//! In-memory repositories backing the integration tests.
//!
//! These mirror the Postgres semantics the services rely on: owner-scoped
//! writes report missing and foreign records identically, the document source
//! renders the same shapes the database views produce, and every document
//! fetch is counted so tests can assert on cache behavior.

use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde_json::json;
use time::OffsetDateTime;

use feedloom::application::feeds::{SQL_FEED_JSON, SQL_FEED_RSS, SQL_FEEDS_JSON};
use feedloom::application::repos::{
    CreateFeedParams, CreateUserParams, DocumentSource, FeedsRepo, RepoError, TokensRepo,
    UpdateFeedParams, UsersRepo,
};
use feedloom::domain::entities::{FeedItemRecord, FeedRecord, UserRecord};
use feedloom::domain::tokens::TokenRecord;
use feedloom::domain::types::RecordId;

#[derive(Default)]
struct State {
    users: Vec<UserRecord>,
    feeds: Vec<FeedRecord>,
    tokens: Vec<TokenRecord>,
}

#[derive(Default)]
pub struct MemoryRepositories {
    state: Mutex<State>,
    fetches: AtomicU64,
    token_lookups: AtomicU64,
}

impl MemoryRepositories {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Number of document renders served from storage, i.e. cache misses.
    pub fn fetch_calls(&self) -> u64 {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Number of token resolutions that reached storage.
    pub fn token_lookups(&self) -> u64 {
        self.token_lookups.load(Ordering::SeqCst)
    }

    pub fn token_count(&self) -> usize {
        self.state.lock().expect("state lock").tokens.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().expect("state lock")
    }
}

fn feed_json(feed: &FeedRecord) -> serde_json::Value {
    json!({
        "id": feed.id.as_str(),
        "title": feed.title,
        "description": feed.description,
        "link": feed.link,
        "items": feed
            .items
            .iter()
            .map(|item| {
                json!({
                    "id": item.id.as_str(),
                    "link": item.link,
                    "title": item.title,
                    "description": item.description,
                })
            })
            .collect::<Vec<_>>(),
    })
}

fn feed_rss(feed: &FeedRecord) -> String {
    let items: String = feed
        .items
        .iter()
        .map(|item| {
            format!(
                "<item><title>{}</title><link>{}</link><guid>{}</guid></item>",
                item.title, item.link, item.id
            )
        })
        .collect();
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
         <rss version=\"2.0\"><channel><title>{}</title><link>{}</link>{items}</channel></rss>",
        feed.title, feed.link
    )
}

#[async_trait]
impl DocumentSource for MemoryRepositories {
    async fn fetch_payload(&self, sql: &str, args: &[&str]) -> Result<Option<String>, RepoError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let state = self.lock();
        match sql {
            SQL_FEED_JSON => {
                let [feed_id, owner_id] = args else {
                    return Err(RepoError::Persistence("bad argument count".into()));
                };
                Ok(state
                    .feeds
                    .iter()
                    .find(|f| f.id.as_str() == *feed_id && f.owner_id.as_str() == *owner_id)
                    .map(|f| feed_json(f).to_string()))
            }
            SQL_FEEDS_JSON => {
                let [owner_id] = args else {
                    return Err(RepoError::Persistence("bad argument count".into()));
                };
                let feeds: Vec<_> = state
                    .feeds
                    .iter()
                    .filter(|f| f.owner_id.as_str() == *owner_id)
                    .map(feed_json)
                    .collect();
                // An owner with no feeds produces no row, like the view.
                if feeds.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(serde_json::Value::Array(feeds).to_string()))
                }
            }
            SQL_FEED_RSS => {
                let [feed_id, owner_id] = args else {
                    return Err(RepoError::Persistence("bad argument count".into()));
                };
                Ok(state
                    .feeds
                    .iter()
                    .find(|f| f.id.as_str() == *feed_id && f.owner_id.as_str() == *owner_id)
                    .map(feed_rss))
            }
            other => Err(RepoError::Persistence(format!("unknown query: {other}"))),
        }
    }
}

#[async_trait]
impl UsersRepo for MemoryRepositories {
    async fn create_user(&self, params: CreateUserParams) -> Result<UserRecord, RepoError> {
        let mut state = self.lock();
        if state.users.iter().any(|u| u.email == params.email) {
            return Err(RepoError::Duplicate {
                constraint: "users_email_key".to_string(),
            });
        }
        let user = UserRecord {
            id: params.id,
            email: params.email,
            password_hash: params.password_hash,
        };
        state.users.push(user.clone());
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, RepoError> {
        Ok(self.lock().users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: &RecordId) -> Result<Option<UserRecord>, RepoError> {
        Ok(self.lock().users.iter().find(|u| &u.id == id).cloned())
    }
}

#[async_trait]
impl FeedsRepo for MemoryRepositories {
    async fn create_feed(&self, params: CreateFeedParams) -> Result<FeedRecord, RepoError> {
        let feed = FeedRecord {
            id: params.id,
            owner_id: params.owner_id,
            title: params.title,
            description: params.description,
            link: params.link,
            items: Vec::new(),
        };
        self.lock().feeds.push(feed.clone());
        Ok(feed)
    }

    async fn update_feed(&self, params: UpdateFeedParams) -> Result<(), RepoError> {
        let mut state = self.lock();
        let feed = state
            .feeds
            .iter_mut()
            .find(|f| f.id == params.feed_id && f.owner_id == params.owner_id)
            .ok_or(RepoError::NotFound)?;
        feed.title = params.title;
        if let Some(items) = params.items {
            feed.items = items;
        }
        Ok(())
    }

    async fn delete_feed(&self, owner_id: &RecordId, feed_id: &RecordId) -> Result<(), RepoError> {
        let mut state = self.lock();
        let before = state.feeds.len();
        state
            .feeds
            .retain(|f| !(&f.id == feed_id && &f.owner_id == owner_id));
        if state.feeds.len() == before {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn add_items(
        &self,
        owner_id: &RecordId,
        feed_id: &RecordId,
        items: &[FeedItemRecord],
    ) -> Result<(), RepoError> {
        let mut state = self.lock();
        let feed = state
            .feeds
            .iter_mut()
            .find(|f| &f.id == feed_id && &f.owner_id == owner_id)
            .ok_or(RepoError::NotFound)?;
        feed.items.extend_from_slice(items);
        Ok(())
    }

    async fn update_item(
        &self,
        owner_id: &RecordId,
        item: &FeedItemRecord,
    ) -> Result<(), RepoError> {
        let mut state = self.lock();
        let feed = state
            .feeds
            .iter_mut()
            .find(|f| f.id == item.feed_id && &f.owner_id == owner_id)
            .ok_or(RepoError::NotFound)?;
        let existing = feed
            .items
            .iter_mut()
            .find(|i| i.id == item.id)
            .ok_or(RepoError::NotFound)?;
        *existing = item.clone();
        Ok(())
    }

    async fn delete_item(
        &self,
        owner_id: &RecordId,
        feed_id: &RecordId,
        item_id: &RecordId,
    ) -> Result<(), RepoError> {
        let mut state = self.lock();
        let feed = state
            .feeds
            .iter_mut()
            .find(|f| &f.id == feed_id && &f.owner_id == owner_id)
            .ok_or(RepoError::NotFound)?;
        let before = feed.items.len();
        feed.items.retain(|i| &i.id != item_id);
        if feed.items.len() == before {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl TokensRepo for MemoryRepositories {
    async fn insert_token(&self, token: &TokenRecord) -> Result<(), RepoError> {
        let mut state = self.lock();
        if state.tokens.iter().any(|t| t.secret == token.secret) {
            return Err(RepoError::Duplicate {
                constraint: "access_tokens_pkey".to_string(),
            });
        }
        state.tokens.push(token.clone());
        Ok(())
    }

    async fn find_live(
        &self,
        secret: &str,
        now: OffsetDateTime,
    ) -> Result<Option<(UserRecord, TokenRecord)>, RepoError> {
        self.token_lookups.fetch_add(1, Ordering::SeqCst);
        let state = self.lock();
        let Some(token) = state
            .tokens
            .iter()
            .find(|t| t.secret == secret && t.is_live_at(now))
        else {
            return Ok(None);
        };
        let user = state
            .users
            .iter()
            .find(|u| u.id == token.user_id)
            .cloned()
            .ok_or(RepoError::Integrity {
                message: "token without user".to_string(),
            })?;
        Ok(Some((user, token.clone())))
    }

    async fn delete_token(&self, user_id: &RecordId, secret: &str) -> Result<(), RepoError> {
        self.lock()
            .tokens
            .retain(|t| !(t.secret == secret && &t.user_id == user_id));
        Ok(())
    }

    async fn delete_all_tokens(&self, user_id: &RecordId) -> Result<(), RepoError> {
        self.lock().tokens.retain(|t| &t.user_id != user_id);
        Ok(())
    }

    async fn delete_expired(&self, now: OffsetDateTime) -> Result<u64, RepoError> {
        let mut state = self.lock();
        let before = state.tokens.len();
        state.tokens.retain(|t| t.is_live_at(now));
        Ok((before - state.tokens.len()) as u64)
    }
}
