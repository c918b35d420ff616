//! Bearer-token lifecycle across the durable store and its cache mirror.
//!
//! The database is authoritative for every token; the cache store carries a
//! best-effort mirror so the hot path of request authentication rarely
//! touches Postgres. Mirror writes that fail are logged and skipped, never
//! fatal, and a read that misses the mirror repairs it from the database.

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use metrics::counter;
use rand::RngCore;
use rand::rngs::OsRng;
use time::OffsetDateTime;
use tracing::{info, warn};

use super::error::AppError;
use super::repos::TokensRepo;
use crate::domain::entities::UserRecord;
use crate::domain::tokens::TokenRecord;
use crate::domain::types::{AccessScope, RecordId};
use crate::infra::kv::KeyValueStore;

const MIRROR_PREFIX: &str = "token.";
const LIST_PREFIX: &str = "tokenlist.";
const FIELD_USER: &str = "user";
const FIELD_ACCESS: &str = "access";
const SECRET_RANDOM_BYTES: usize = 32;

fn mirror_key(secret: &str) -> String {
    format!("{MIRROR_PREFIX}{secret}")
}

fn list_key(user_id: &RecordId) -> String {
    format!("{LIST_PREFIX}{user_id}")
}

#[derive(Clone)]
pub struct TokenService {
    repo: Arc<dyn TokensRepo>,
    kv: Arc<dyn KeyValueStore>,
}

impl TokenService {
    pub fn new(repo: Arc<dyn TokensRepo>, kv: Arc<dyn KeyValueStore>) -> Self {
        Self { repo, kv }
    }

    /// Mint a token for `user`. `lifetime == None` means it never expires.
    ///
    /// The secret embeds the owning user id ahead of 32 random bytes, so a
    /// presented secret alone names whose token it claims to be; the random
    /// tail is what makes the claim unforgeable.
    pub async fn create(
        &self,
        user: &UserRecord,
        access: AccessScope,
        lifetime: Option<time::Duration>,
    ) -> Result<TokenRecord, AppError> {
        let mut random = [0u8; SECRET_RANDOM_BYTES];
        OsRng
            .try_fill_bytes(&mut random)
            .map_err(|err| AppError::Unexpected(format!("random source failed: {err}")))?;
        let mut raw = Vec::with_capacity(user.id.as_str().len() + 1 + SECRET_RANDOM_BYTES);
        raw.extend_from_slice(user.id.as_str().as_bytes());
        raw.push(b':');
        raw.extend_from_slice(&random);
        let secret = URL_SAFE_NO_PAD.encode(raw);

        let now = OffsetDateTime::now_utc();
        let token = TokenRecord {
            secret,
            user_id: user.id.clone(),
            access,
            expires_at: lifetime.map(|lifetime| now + lifetime),
        };
        self.repo.insert_token(&token).await?;
        if token.is_live_at(now) {
            self.write_mirror(user, &token, now).await;
        }
        info!(user_id = %user.id, access = %access, "token created");
        Ok(token)
    }

    /// Resolve a presented secret to its owner and scope.
    ///
    /// Mirror first; on a miss (or a cache-store outage, or a mirror entry
    /// that will not parse) the durable store answers and a fresh mirror
    /// entry is written back. `Ok(None)` means the secret is unknown or
    /// expired.
    pub async fn resolve(
        &self,
        secret: &str,
    ) -> Result<Option<(UserRecord, AccessScope)>, AppError> {
        match self.kv.hash_get(&mirror_key(secret)).await {
            Ok(Some(fields)) => {
                if let Some(resolved) = decode_mirror(secret, &fields) {
                    counter!("feedloom_token_mirror_hit_total").increment(1);
                    return Ok(Some(resolved));
                }
                warn!("token mirror entry unreadable, falling back to database");
            }
            Ok(None) => {}
            Err(err) => {
                warn!(error = %err, "token mirror unavailable, falling back to database");
            }
        }
        counter!("feedloom_token_mirror_miss_total").increment(1);

        let now = OffsetDateTime::now_utc();
        let Some((user, token)) = self.repo.find_live(secret, now).await? else {
            return Ok(None);
        };
        self.write_mirror(&user, &token, now).await;
        Ok(Some((user, token.access)))
    }

    /// Revoke one token. Unknown secrets revoke cleanly.
    ///
    /// The mirror entry goes first and that removal must succeed, otherwise
    /// a revoked token would stay honored until its mirror TTL runs out.
    pub async fn revoke(&self, user_id: &RecordId, secret: &str) -> Result<(), AppError> {
        let key = mirror_key(secret);
        self.kv.delete(std::slice::from_ref(&key)).await?;
        if let Err(err) = self.kv.set_remove(&list_key(user_id), &key).await {
            warn!(error = %err, "failed to unregister token from mirror list");
        }
        self.repo.delete_token(user_id, secret).await?;
        info!(%user_id, "token revoked");
        Ok(())
    }

    /// Revoke every token the user holds, draining the whole mirror list in
    /// one indivisible operation before touching the durable store.
    pub async fn revoke_all(&self, user_id: &RecordId) -> Result<(), AppError> {
        self.kv.purge_indexed(&[list_key(user_id)]).await?;
        self.repo.delete_all_tokens(user_id).await?;
        info!(%user_id, "all tokens revoked");
        Ok(())
    }

    /// Delete expired rows from the durable store. Mirror entries reclaim
    /// themselves through their TTL and need no sweeping.
    pub async fn sweep_expired(&self) -> Result<u64, AppError> {
        let deleted = self
            .repo
            .delete_expired(OffsetDateTime::now_utc())
            .await?;
        counter!("feedloom_token_sweep_deleted_total").increment(deleted);
        if deleted > 0 {
            info!(deleted, "swept expired tokens");
        }
        Ok(deleted)
    }

    async fn write_mirror(&self, user: &UserRecord, token: &TokenRecord, now: OffsetDateTime) {
        let ttl = match token.expires_at {
            Some(expires_at) => match (expires_at - now).try_into() {
                Ok(remaining) => Some(remaining),
                // Already expired, nothing worth mirroring.
                Err(_) => return,
            },
            None => None,
        };
        let user_json = match serde_json::to_string(user) {
            Ok(json) => json,
            Err(err) => {
                warn!(error = %err, "failed to encode user for token mirror");
                return;
            }
        };
        let access = token.access.bits().to_string();
        let key = mirror_key(&token.secret);
        let fields = [(FIELD_USER, user_json.as_str()), (FIELD_ACCESS, access.as_str())];
        if let Err(err) = self.kv.hash_set(&key, &fields, ttl).await {
            warn!(error = %err, "failed to write token mirror entry");
            return;
        }
        if let Err(err) = self.kv.set_add(&list_key(&token.user_id), &key).await {
            warn!(error = %err, "failed to register token in mirror list");
        }
    }
}

fn decode_mirror(
    secret: &str,
    fields: &std::collections::HashMap<String, String>,
) -> Option<(UserRecord, AccessScope)> {
    let user: UserRecord = serde_json::from_str(fields.get(FIELD_USER)?).ok()?;
    let bits: i32 = fields.get(FIELD_ACCESS)?.parse().ok()?;
    // The mirror never stores the hash; refuse entries claiming another user.
    if !secret_belongs_to(secret, &user.id) {
        return None;
    }
    Some((user, AccessScope::from_bits(bits)))
}

/// Check the user id embedded in the secret against the record it resolved
/// to.
fn secret_belongs_to(secret: &str, user_id: &RecordId) -> bool {
    let Ok(raw) = URL_SAFE_NO_PAD.decode(secret) else {
        return false;
    };
    raw.strip_prefix(user_id.as_str().as_bytes())
        .is_some_and(|rest| rest.first() == Some(&b':'))
}
