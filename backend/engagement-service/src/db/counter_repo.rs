use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::error::Result;
use crate::models::ContentCounts;

/// Which denormalized counter a mutation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterField {
    Like,
    View,
    Comment,
    Share,
    Bookmark,
}

impl CounterField {
    /// Column name on content_counters. Fixed set, safe to splice into SQL.
    pub fn column(&self) -> &'static str {
        match self {
            CounterField::Like => "like_count",
            CounterField::View => "view_count",
            CounterField::Comment => "comment_count",
            CounterField::Share => "share_count",
            CounterField::Bookmark => "bookmark_count",
        }
    }

    /// Suffix used for cache keys and fan-out payload fields.
    pub fn key_suffix(&self) -> &'static str {
        match self {
            CounterField::Like => "likes",
            CounterField::View => "views",
            CounterField::Comment => "comments",
            CounterField::Share => "shares",
            CounterField::Bookmark => "bookmarks",
        }
    }
}

/// Read access to the durable Counter Store.
#[async_trait]
pub trait CounterStore: Send + Sync {
    async fn get_counts(&self, content_type: &str, content_id: Uuid) -> Result<ContentCounts>;

    async fn batch_get_counts(
        &self,
        content_type: &str,
        content_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, ContentCounts>>;
}

/// Repository for the durable Counter Store.
///
/// Counters are the single source of truth and are never read-modified-
/// written: every mutation is a single atomic SQL statement that returns
/// the new authoritative value. The mutation helpers take a connection so
/// the like/view repositories can run them inside the same transaction as
/// the guarded insert they pair with.
#[derive(Clone)]
pub struct CounterRepository {
    pool: PgPool,
}

impl CounterRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Atomically increment one counter, creating the row on first touch.
    /// Returns the new authoritative value.
    pub async fn increment(
        conn: &mut PgConnection,
        field: CounterField,
        content_type: &str,
        content_id: Uuid,
    ) -> Result<i64> {
        let column = field.column();
        let sql = format!(
            r#"
            INSERT INTO content_counters (content_type, content_id, {column})
            VALUES ($1, $2, 1)
            ON CONFLICT (content_type, content_id)
            DO UPDATE SET {column} = content_counters.{column} + 1, updated_at = NOW()
            RETURNING {column}
            "#,
        );

        let count: i64 = sqlx::query_scalar(&sql)
            .bind(content_type)
            .bind(content_id)
            .fetch_one(&mut *conn)
            .await?;

        Ok(count)
    }

    /// Atomically decrement one counter, floored at zero. Returns the new
    /// authoritative value (0 when no counter row exists yet).
    pub async fn decrement_floored(
        conn: &mut PgConnection,
        field: CounterField,
        content_type: &str,
        content_id: Uuid,
    ) -> Result<i64> {
        let column = field.column();
        let sql = format!(
            r#"
            UPDATE content_counters
            SET {column} = GREATEST({column} - 1, 0), updated_at = NOW()
            WHERE content_type = $1 AND content_id = $2
            RETURNING {column}
            "#,
        );

        let count: Option<i64> = sqlx::query_scalar(&sql)
            .bind(content_type)
            .bind(content_id)
            .fetch_optional(&mut *conn)
            .await?;

        Ok(count.unwrap_or(0))
    }
}

#[async_trait]
impl CounterStore for CounterRepository {
    /// Load all counters for one content item (cache-miss fallback).
    async fn get_counts(&self, content_type: &str, content_id: Uuid) -> Result<ContentCounts> {
        let counts: Option<ContentCounts> = sqlx::query_as(
            r#"
            SELECT like_count, view_count, comment_count, share_count, bookmark_count
            FROM content_counters
            WHERE content_type = $1 AND content_id = $2
            "#,
        )
        .bind(content_type)
        .bind(content_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(counts.unwrap_or_default())
    }

    /// Batch load counters for multiple content items.
    async fn batch_get_counts(
        &self,
        content_type: &str,
        content_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, ContentCounts>> {
        if content_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows: Vec<(Uuid, i64, i64, i64, i64, i64)> = sqlx::query_as(
            r#"
            SELECT content_id, like_count, view_count, comment_count, share_count, bookmark_count
            FROM content_counters
            WHERE content_type = $1 AND content_id = ANY($2)
            "#,
        )
        .bind(content_type)
        .bind(content_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut result = HashMap::new();
        for (content_id, like_count, view_count, comment_count, share_count, bookmark_count) in rows
        {
            result.insert(
                content_id,
                ContentCounts {
                    like_count,
                    view_count,
                    comment_count,
                    share_count,
                    bookmark_count,
                },
            );
        }

        Ok(result)
    }
}
