//! Postgres-backed repository implementations.
//!
//! Queries are bound at runtime so the crate builds without a live database;
//! the schema they assume lives under `migrations/`.

mod feeds;
mod tokens;
mod users;
mod util;

pub use util::map_sqlx_error;

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction, query, query_scalar};

use crate::application::repos::{DocumentSource, RepoError};

#[derive(Clone)]
pub struct PostgresRepositories {
    pool: Arc<PgPool>,
}

impl PostgresRepositories {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn begin(&self) -> Result<Transaction<'_, Postgres>, sqlx::Error> {
        self.pool.begin().await
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
        PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
    }

    pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations")
            .run(pool)
            .await
            .map_err(Into::into)
    }

    pub async fn health_check(&self) -> Result<(), sqlx::Error> {
        query("SELECT 1").execute(self.pool()).await.map(|_| ())
    }
}

#[async_trait]
impl DocumentSource for PostgresRepositories {
    async fn fetch_payload(&self, sql: &str, args: &[&str]) -> Result<Option<String>, RepoError> {
        let mut stmt = query_scalar::<_, Option<String>>(sql);
        for arg in args {
            stmt = stmt.bind(*arg);
        }
        // Absent row and NULL scalar both mean "no document".
        let payload = stmt
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(payload.flatten())
    }
}
