//! Feedloom backend core.
//!
//! Personal feed-aggregation service internals: owner-scoped feeds and feed
//! items persisted in Postgres, read-through caching of rendered feed
//! documents (JSON/RSS) in a key-value store with reverse-index group
//! invalidation, and bearer-token credentials mirrored across both stores.
//!
//! The HTTP surface (routing, request validation, CORS) lives outside this
//! crate; everything here is reachable through the `application` services.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
