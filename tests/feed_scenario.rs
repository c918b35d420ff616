//! End-to-end walk through the service layer: sign up, mint a poll token,
//! publish a feed, and read it back the way a feed reader would.

mod support;

use std::sync::Arc;
use std::time::Duration;

use feedloom::application::auth::{Authenticator, parse_credentials};
use feedloom::application::error::AppError;
use feedloom::application::feeds::{FeedService, NewFeedItem};
use feedloom::application::tokens::TokenService;
use feedloom::application::users::UserService;
use feedloom::cache::{CacheInvalidator, QueryCache};
use feedloom::domain::types::AccessScope;
use feedloom::infra::kv::{KeyValueStore, MemoryKv};

use support::MemoryRepositories;

struct App {
    users: Arc<UserService>,
    tokens: Arc<TokenService>,
    feeds: FeedService,
    auth: Authenticator,
}

fn setup() -> App {
    let repos = MemoryRepositories::new();
    let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryKv::new());
    let users = Arc::new(UserService::new(repos.clone()));
    let tokens = Arc::new(TokenService::new(repos.clone(), kv.clone()));
    let cache = QueryCache::new(kv.clone(), repos.clone(), Duration::from_secs(2 * 60 * 60));
    let invalidator = CacheInvalidator::new(kv);
    let feeds = FeedService::new(repos, cache, invalidator, "https://feeds.example.net");
    let auth = Authenticator::new(users.clone(), tokens.clone());
    App {
        users,
        tokens,
        feeds,
        auth,
    }
}

#[tokio::test]
async fn publish_and_poll_a_feed() {
    let app = setup();

    let alice = app
        .users
        .create("alice@example.com", "s3kret")
        .await
        .expect("sign up");
    let poll_token = app
        .tokens
        .create(&alice, AccessScope::READ, None)
        .await
        .expect("mint poll token");

    let feed = app
        .feeds
        .create(&alice.id, "Daily links", "Worth reading", &poll_token.secret)
        .await
        .expect("create feed");
    assert_eq!(
        feed.link,
        format!(
            "https://feeds.example.net/feeds/{}/rss?_tok={}",
            feed.id, poll_token.secret
        )
    );

    app.feeds
        .add_items(
            &alice.id,
            &feed.id,
            vec![
                NewFeedItem {
                    link: "https://example.com/one".to_string(),
                    title: "First".to_string(),
                    description: "the first item".to_string(),
                },
                NewFeedItem {
                    link: "https://example.com/two".to_string(),
                    title: "Second".to_string(),
                    description: String::new(),
                },
            ],
        )
        .await
        .expect("add items");

    // A feed reader polls with the `_tok` query parameter only.
    let credentials = parse_credentials(None, Some(&poll_token.secret)).expect("parse");
    let identity = app
        .auth
        .authenticate(credentials)
        .await
        .expect("authenticate")
        .expect("identity");
    identity.require(AccessScope::READ).expect("read allowed");

    let rss = app
        .feeds
        .get_rss(&identity.user.id, &feed.id)
        .await
        .expect("poll rss");
    assert!(rss.payload.contains("<rss"));
    assert!(rss.payload.contains("First"));
    assert!(rss.payload.contains("Second"));
}

#[tokio::test]
async fn foreign_feeds_are_invisible_and_immutable() {
    let app = setup();
    let alice = app
        .users
        .create("alice@example.com", "s3kret")
        .await
        .expect("alice");
    let mallory = app
        .users
        .create("mallory@example.com", "evil")
        .await
        .expect("mallory");

    let feed = app
        .feeds
        .create(&alice.id, "Private", "", "poll-secret")
        .await
        .expect("create feed");

    let err = app
        .feeds
        .get_json(&mallory.id, &feed.id)
        .await
        .expect_err("invisible");
    assert!(matches!(err, AppError::NotFound));

    let err = app
        .feeds
        .add_items(
            &mallory.id,
            &feed.id,
            vec![NewFeedItem {
                link: "https://evil.example".to_string(),
                title: "Injected".to_string(),
                description: String::new(),
            }],
        )
        .await
        .expect_err("immutable");
    assert!(matches!(err, AppError::NotFound));

    // Alice's feed is untouched.
    let doc = app.feeds.get_json(&alice.id, &feed.id).await.expect("read");
    assert!(!doc.payload.contains("Injected"));
}

#[tokio::test]
async fn replacing_items_via_update_shows_up_in_reads() {
    let app = setup();
    let alice = app
        .users
        .create("alice@example.com", "s3kret")
        .await
        .expect("alice");
    let feed = app
        .feeds
        .create(&alice.id, "Links", "", "poll-secret")
        .await
        .expect("create feed");
    app.feeds
        .add_items(
            &alice.id,
            &feed.id,
            vec![NewFeedItem {
                link: "https://example.com/old".to_string(),
                title: "Old".to_string(),
                description: String::new(),
            }],
        )
        .await
        .expect("seed item");

    app.feeds
        .update(
            &alice.id,
            &feed.id,
            "Links, curated",
            Some(vec![NewFeedItem {
                link: "https://example.com/new".to_string(),
                title: "New".to_string(),
                description: String::new(),
            }]),
        )
        .await
        .expect("replace items");

    let doc = app.feeds.get_json(&alice.id, &feed.id).await.expect("read");
    assert!(doc.payload.contains("Links, curated"));
    assert!(doc.payload.contains("New"));
    assert!(!doc.payload.contains("Old"));
}

#[tokio::test]
async fn item_edits_and_deletes_are_owner_scoped() {
    let app = setup();
    let alice = app
        .users
        .create("alice@example.com", "s3kret")
        .await
        .expect("alice");
    let feed = app
        .feeds
        .create(&alice.id, "Links", "", "poll-secret")
        .await
        .expect("create feed");
    let items = app
        .feeds
        .add_items(
            &alice.id,
            &feed.id,
            vec![NewFeedItem {
                link: "https://example.com/post".to_string(),
                title: "Post".to_string(),
                description: String::new(),
            }],
        )
        .await
        .expect("add item");
    let mut item = items.into_iter().next().expect("one item");

    item.title = "Post, revised".to_string();
    app.feeds
        .update_item(&alice.id, &item)
        .await
        .expect("edit item");
    let doc = app.feeds.get_json(&alice.id, &feed.id).await.expect("read");
    assert!(doc.payload.contains("Post, revised"));

    app.feeds
        .delete_item(&alice.id, &feed.id, &item.id)
        .await
        .expect("delete item");
    let doc = app.feeds.get_json(&alice.id, &feed.id).await.expect("read");
    assert!(!doc.payload.contains("Post, revised"));

    let err = app
        .feeds
        .delete_item(&alice.id, &feed.id, &item.id)
        .await
        .expect_err("already gone");
    assert!(matches!(err, AppError::NotFound));
}
