use async_trait::async_trait;
use sqlx::{query, query_as};
use time::OffsetDateTime;

use crate::application::repos::{RepoError, TokensRepo};
use crate::domain::entities::UserRecord;
use crate::domain::tokens::TokenRecord;
use crate::domain::types::{AccessScope, RecordId};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(Debug, sqlx::FromRow)]
struct TokenJoinRow {
    id: String,
    email: String,
    password_hash: String,
    secret: String,
    access: i32,
    expires_at: Option<OffsetDateTime>,
}

#[async_trait]
impl TokensRepo for PostgresRepositories {
    async fn insert_token(&self, token: &TokenRecord) -> Result<(), RepoError> {
        query(
            "INSERT INTO access_tokens (secret, user_id, access, expires_at) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(&token.secret)
        .bind(token.user_id.as_str())
        .bind(token.access.bits())
        .bind(token.expires_at)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn find_live(
        &self,
        secret: &str,
        now: OffsetDateTime,
    ) -> Result<Option<(UserRecord, TokenRecord)>, RepoError> {
        let row: Option<TokenJoinRow> = query_as(
            "SELECT u.id, u.email, u.password_hash, t.secret, t.access, t.expires_at \
             FROM access_tokens t \
             JOIN users u ON u.id = t.user_id \
             WHERE t.secret = $1 AND (t.expires_at IS NULL OR t.expires_at > $2)",
        )
        .bind(secret)
        .bind(now)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(|row| {
            let user = UserRecord {
                id: RecordId::from(row.id),
                email: row.email,
                password_hash: row.password_hash,
            };
            let token = TokenRecord {
                secret: row.secret,
                user_id: user.id.clone(),
                access: AccessScope::from_bits(row.access),
                expires_at: row.expires_at,
            };
            (user, token)
        }))
    }

    async fn delete_token(&self, user_id: &RecordId, secret: &str) -> Result<(), RepoError> {
        query("DELETE FROM access_tokens WHERE secret = $1 AND user_id = $2")
            .bind(secret)
            .bind(user_id.as_str())
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn delete_all_tokens(&self, user_id: &RecordId) -> Result<(), RepoError> {
        query("DELETE FROM access_tokens WHERE user_id = $1")
            .bind(user_id.as_str())
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn delete_expired(&self, now: OffsetDateTime) -> Result<u64, RepoError> {
        let result =
            query("DELETE FROM access_tokens WHERE expires_at IS NOT NULL AND expires_at <= $1")
                .bind(now)
                .execute(self.pool())
                .await
                .map_err(map_sqlx_error)?;
        Ok(result.rows_affected())
    }
}
