use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::{CounterField, CounterRepository};
use crate::error::Result;

/// Durable store for likes.
///
/// The guarded insert/delete and the paired counter mutation commit
/// together; a conflict comes back as `None` and the toggle treats it as
/// the idempotent no-op path.
#[async_trait]
pub trait LikeStore: Send + Sync {
    /// Insert the like and bump the counter in one transaction. Returns
    /// the new like count, or `None` when the like already existed.
    async fn like(&self, user_id: Uuid, content_type: &str, content_id: Uuid)
        -> Result<Option<i64>>;

    /// Remove the like and decrement the counter in one transaction.
    /// Returns the new like count, or `None` when there was no like row.
    async fn unlike(
        &self,
        user_id: Uuid,
        content_type: &str,
        content_id: Uuid,
    ) -> Result<Option<i64>>;

    async fn check_user_liked(
        &self,
        user_id: Uuid,
        content_type: &str,
        content_id: Uuid,
    ) -> Result<bool>;

    async fn batch_check_liked(
        &self,
        user_id: Uuid,
        content_type: &str,
        content_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, bool>>;
}

/// Repository for Like operations
///
/// The `(content_type, content_id, user_id)` uniqueness constraint is the
/// real guard against double-taps and retried requests: a losing insert
/// rolls the transaction back without touching the counter.
#[derive(Clone)]
pub struct LikeRepository {
    pool: PgPool,
}

impl LikeRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LikeStore for LikeRepository {
    async fn like(
        &self,
        user_id: Uuid,
        content_type: &str,
        content_id: Uuid,
    ) -> Result<Option<i64>> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            INSERT INTO likes (content_type, content_id, user_id)
            VALUES ($1, $2, $3)
            ON CONFLICT (content_type, content_id, user_id) DO NOTHING
            "#,
        )
        .bind(content_type)
        .bind(content_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        let count =
            CounterRepository::increment(&mut tx, CounterField::Like, content_type, content_id)
                .await?;
        tx.commit().await?;

        Ok(Some(count))
    }

    async fn unlike(
        &self,
        user_id: Uuid,
        content_type: &str,
        content_id: Uuid,
    ) -> Result<Option<i64>> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            DELETE FROM likes
            WHERE content_type = $1 AND content_id = $2 AND user_id = $3
            "#,
        )
        .bind(content_type)
        .bind(content_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        let count = CounterRepository::decrement_floored(
            &mut tx,
            CounterField::Like,
            content_type,
            content_id,
        )
        .await?;
        tx.commit().await?;

        Ok(Some(count))
    }

    /// Check if a user has liked a content item
    async fn check_user_liked(
        &self,
        user_id: Uuid,
        content_type: &str,
        content_id: Uuid,
    ) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM likes
                WHERE content_type = $1 AND content_id = $2 AND user_id = $3
            )
            "#,
        )
        .bind(content_type)
        .bind(content_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    /// Batch check which of the given content items the user has liked.
    async fn batch_check_liked(
        &self,
        user_id: Uuid,
        content_type: &str,
        content_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, bool>> {
        if content_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let liked: Vec<Uuid> = sqlx::query_scalar(
            r#"
            SELECT content_id
            FROM likes
            WHERE user_id = $1 AND content_type = $2 AND content_id = ANY($3)
            "#,
        )
        .bind(user_id)
        .bind(content_type)
        .bind(content_ids)
        .fetch_all(&self.pool)
        .await?;

        let liked_set: HashSet<Uuid> = liked.into_iter().collect();
        Ok(content_ids
            .iter()
            .map(|id| (*id, liked_set.contains(id)))
            .collect())
    }
}
