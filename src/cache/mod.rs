//! Deterministic query cache with group invalidation.
//!
//! Rendered feed documents are cached under a key derived from the exact
//! query that produced them, and every cached entry is registered into
//! reverse-index sets scoped to its owner (and optionally one feed). Write
//! paths then invalidate whole groups at once instead of guessing which
//! queries a mutation affected.

pub mod invalidator;
pub mod keys;
pub mod query_cache;

pub use invalidator::CacheInvalidator;
pub use keys::{CacheHint, query_key};
pub use query_cache::QueryCache;
