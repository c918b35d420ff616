use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder, query};

use crate::application::repos::{CreateFeedParams, FeedsRepo, RepoError, UpdateFeedParams};
use crate::domain::entities::{FeedItemRecord, FeedRecord};
use crate::domain::types::RecordId;

use super::{PostgresRepositories, map_sqlx_error};

/// Multi-row item insert gated on ownership. Each row selects from the
/// `owned_feed` CTE, so when the feed is missing or foreign the statement
/// inserts nothing and the caller sees zero affected rows.
fn push_item_insert<'q>(
    qb: &mut QueryBuilder<'q, Postgres>,
    owner_id: &'q RecordId,
    feed_id: &'q RecordId,
    items: &'q [FeedItemRecord],
) {
    qb.push("WITH owned_feed AS (SELECT id, owner_id FROM feeds WHERE id = ");
    qb.push_bind(feed_id.as_str());
    qb.push(" AND owner_id = ");
    qb.push_bind(owner_id.as_str());
    qb.push(") INSERT INTO feed_items (id, feed_id, owner_id, link, title, description) ");
    for (index, item) in items.iter().enumerate() {
        if index > 0 {
            qb.push(" UNION ALL ");
        }
        qb.push("SELECT ");
        qb.push_bind(item.id.as_str());
        qb.push(", owned_feed.id, owned_feed.owner_id, ");
        qb.push_bind(item.link.as_str());
        qb.push(", ");
        qb.push_bind(item.title.as_str());
        qb.push(", ");
        qb.push_bind(item.description.as_str());
        qb.push(" FROM owned_feed");
    }
}

#[async_trait]
impl FeedsRepo for PostgresRepositories {
    async fn create_feed(&self, params: CreateFeedParams) -> Result<FeedRecord, RepoError> {
        query(
            "INSERT INTO feeds (id, owner_id, title, description, link) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(params.id.as_str())
        .bind(params.owner_id.as_str())
        .bind(&params.title)
        .bind(&params.description)
        .bind(&params.link)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(FeedRecord {
            id: params.id,
            owner_id: params.owner_id,
            title: params.title,
            description: params.description,
            link: params.link,
            items: Vec::new(),
        })
    }

    async fn update_feed(&self, params: UpdateFeedParams) -> Result<(), RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        let result = query("UPDATE feeds SET title = $1 WHERE id = $2 AND owner_id = $3")
            .bind(&params.title)
            .bind(params.feed_id.as_str())
            .bind(params.owner_id.as_str())
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }

        if let Some(items) = &params.items {
            query("DELETE FROM feed_items WHERE feed_id = $1 AND owner_id = $2")
                .bind(params.feed_id.as_str())
                .bind(params.owner_id.as_str())
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;

            if !items.is_empty() {
                let mut qb = QueryBuilder::new("");
                push_item_insert(&mut qb, &params.owner_id, &params.feed_id, items);
                qb.build()
                    .execute(&mut *tx)
                    .await
                    .map_err(map_sqlx_error)?;
            }
        }

        tx.commit().await.map_err(map_sqlx_error)
    }

    async fn delete_feed(&self, owner_id: &RecordId, feed_id: &RecordId) -> Result<(), RepoError> {
        let result = query("DELETE FROM feeds WHERE id = $1 AND owner_id = $2")
            .bind(feed_id.as_str())
            .bind(owner_id.as_str())
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        if result.rows_affected() == 0 {
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
        if items.is_empty() {
            return Ok(());
        }
        let mut qb = QueryBuilder::new("");
        push_item_insert(&mut qb, owner_id, feed_id, items);
        let result = qb
            .build()
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        if result.rows_affected() != items.len() as u64 {
            return Err(RepoError::Integrity {
                message: format!(
                    "expected to insert {} items, inserted {}",
                    items.len(),
                    result.rows_affected()
                ),
            });
        }
        Ok(())
    }

    async fn update_item(
        &self,
        owner_id: &RecordId,
        item: &FeedItemRecord,
    ) -> Result<(), RepoError> {
        let result = query(
            "UPDATE feed_items SET link = $1, title = $2, description = $3 \
             WHERE id = $4 AND feed_id = $5 AND owner_id = $6",
        )
        .bind(&item.link)
        .bind(&item.title)
        .bind(&item.description)
        .bind(item.id.as_str())
        .bind(item.feed_id.as_str())
        .bind(owner_id.as_str())
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn delete_item(
        &self,
        owner_id: &RecordId,
        feed_id: &RecordId,
        item_id: &RecordId,
    ) -> Result<(), RepoError> {
        let result =
            query("DELETE FROM feed_items WHERE id = $1 AND feed_id = $2 AND owner_id = $3")
                .bind(item_id.as_str())
                .bind(feed_id.as_str())
                .bind(owner_id.as_str())
                .execute(self.pool())
                .await
                .map_err(map_sqlx_error)?;
        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}
