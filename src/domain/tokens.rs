//! Bearer-token record and validity rules.

use time::OffsetDateTime;

use super::types::{AccessScope, RecordId};

/// A bearer token bound to one user and an access scope.
///
/// The secret is the credential itself; it is stored verbatim as the primary
/// key in the durable store and as part of the mirror key in the cache store.
/// `expires_at == None` means the token never expires.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenRecord {
    pub secret: String,
    pub user_id: RecordId,
    pub access: AccessScope,
    pub expires_at: Option<OffsetDateTime>,
}

impl TokenRecord {
    /// Whether the token is still usable at `now`.
    ///
    /// This check is authoritative: the background sweep and the mirror TTL
    /// only reclaim storage, they are never relied on for authorization.
    pub fn is_live_at(&self, now: OffsetDateTime) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at > now,
            None => true,
        }
    }
}
