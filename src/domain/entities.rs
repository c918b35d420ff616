//! User, feed and feed-item records.

use serde::{Deserialize, Serialize};

use super::types::RecordId;

/// An account owning feeds and tokens.
///
/// The password hash never leaves the crate: it is skipped during
/// serialization so the record can be mirrored into the cache store as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: RecordId,
    pub email: String,
    #[serde(skip)]
    pub password_hash: String,
}

/// A feed owned by a single user.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedRecord {
    pub id: RecordId,
    pub owner_id: RecordId,
    pub title: String,
    pub description: String,
    /// Public polling URL, token included, composed at creation time.
    pub link: String,
    pub items: Vec<FeedItemRecord>,
}

/// A single entry inside a feed. `owner_id` always equals the parent feed's
/// owner; the write path enforces this.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedItemRecord {
    pub id: RecordId,
    pub feed_id: RecordId,
    pub owner_id: RecordId,
    pub link: String,
    pub title: String,
    pub description: String,
}

/// A rendered feed document as served to clients: the raw payload (JSON array,
/// JSON object or RSS XML) plus the ETag minted when it was cached.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedDocument {
    pub payload: String,
    pub etag: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_serialization_omits_password_hash() {
        let user = UserRecord {
            id: RecordId::from("u1"),
            email: "a@example.com".to_string(),
            password_hash: "$argon2id$secret".to_string(),
        };
        let json = serde_json::to_string(&user).expect("serialize user");
        assert!(json.contains("a@example.com"));
        assert!(!json.contains("argon2id"));

        let back: UserRecord = serde_json::from_str(&json).expect("deserialize user");
        assert_eq!(back.id, user.id);
        assert!(back.password_hash.is_empty());
    }
}
