use async_trait::async_trait;
use sqlx::{query, query_as};

use crate::application::repos::{CreateUserParams, RepoError, UsersRepo};
use crate::domain::entities::UserRecord;
use crate::domain::types::RecordId;

use super::{PostgresRepositories, map_sqlx_error};

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: String,
    email: String,
    password_hash: String,
}

impl From<UserRow> for UserRecord {
    fn from(row: UserRow) -> Self {
        UserRecord {
            id: RecordId::from(row.id),
            email: row.email,
            password_hash: row.password_hash,
        }
    }
}

#[async_trait]
impl UsersRepo for PostgresRepositories {
    async fn create_user(&self, params: CreateUserParams) -> Result<UserRecord, RepoError> {
        query("INSERT INTO users (id, email, password_hash) VALUES ($1, $2, $3)")
            .bind(params.id.as_str())
            .bind(&params.email)
            .bind(&params.password_hash)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(UserRecord {
            id: params.id,
            email: params.email,
            password_hash: params.password_hash,
        })
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, RepoError> {
        let row: Option<UserRow> =
            query_as("SELECT id, email, password_hash FROM users WHERE email = $1")
                .bind(email)
                .fetch_optional(self.pool())
                .await
                .map_err(map_sqlx_error)?;
        Ok(row.map(Into::into))
    }

    async fn find_by_id(&self, id: &RecordId) -> Result<Option<UserRecord>, RepoError> {
        let row: Option<UserRow> =
            query_as("SELECT id, email, password_hash FROM users WHERE id = $1")
                .bind(id.as_str())
                .fetch_optional(self.pool())
                .await
                .map_err(map_sqlx_error)?;
        Ok(row.map(Into::into))
    }
}
