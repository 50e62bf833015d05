use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::{CounterField, CounterRepository};
use crate::error::Result;
use crate::models::{ViewSignal, ViewerIdentity};

/// Durable store for view events and legacy watch interactions.
///
/// The counting inserts pair the guarded event row with the view-counter
/// increment in one transaction, so a crash can never leave a dedup row
/// behind without its count.
#[async_trait]
pub trait ViewStore: Send + Sync {
    /// Insert a view event for this window and bump the view counter in
    /// one transaction. Returns the new view count, or `None` when the
    /// identity was already counted in this window.
    async fn insert_event_counting(
        &self,
        identity: &ViewerIdentity,
        content_type: &str,
        content_id: Uuid,
        window_key: i64,
        signal: &ViewSignal,
    ) -> Result<Option<i64>>;

    /// Fold a repeated signal into the existing window row, monotonically.
    async fn merge_engagement(
        &self,
        identity: &ViewerIdentity,
        content_type: &str,
        content_id: Uuid,
        window_key: i64,
        signal: &ViewSignal,
    ) -> Result<()>;

    async fn has_viewed(
        &self,
        identity: &ViewerIdentity,
        content_type: &str,
        content_id: Uuid,
    ) -> Result<bool>;

    async fn batch_check_viewed(
        &self,
        user_id: Uuid,
        content_type: &str,
        content_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, bool>>;

    /// Record a legacy threshold-path watch and bump the view counter in
    /// one transaction. Returns the new view count, or `None` when the
    /// user's watch was already counted for this content.
    async fn insert_watch_counting(
        &self,
        user_id: Uuid,
        content_type: &str,
        content_id: Uuid,
        duration_secs: f64,
        is_complete: bool,
    ) -> Result<Option<i64>>;
}

/// Repository for view events and legacy watch interactions.
///
/// One partial unique index per identity kind backs the "at most one view
/// event per identity per content per window" invariant; the ON CONFLICT
/// targets below must name the matching index predicate.
#[derive(Clone)]
pub struct ViewEventRepository {
    pool: PgPool,
}

impl ViewEventRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ViewStore for ViewEventRepository {
    async fn insert_event_counting(
        &self,
        identity: &ViewerIdentity,
        content_type: &str,
        content_id: Uuid,
        window_key: i64,
        signal: &ViewSignal,
    ) -> Result<Option<i64>> {
        let mut tx = self.pool.begin().await?;

        let result = match identity {
            ViewerIdentity::User(user_id) => {
                sqlx::query(
                    r#"
                    INSERT INTO view_events
                        (content_type, content_id, user_id, window_key,
                         duration_ms, progress_pct, is_complete, source)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                    ON CONFLICT (user_id, content_type, content_id, window_key)
                        WHERE user_id IS NOT NULL
                    DO NOTHING
                    "#,
                )
                .bind(content_type)
                .bind(content_id)
                .bind(user_id)
                .bind(window_key)
                .bind(signal.duration_ms)
                .bind(signal.progress_pct)
                .bind(signal.is_complete)
                .bind(signal.source.as_deref())
                .execute(&mut *tx)
                .await?
            }
            ViewerIdentity::Device(device_id) => {
                sqlx::query(
                    r#"
                    INSERT INTO view_events
                        (content_type, content_id, device_id, window_key,
                         duration_ms, progress_pct, is_complete, source)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                    ON CONFLICT (device_id, content_type, content_id, window_key)
                        WHERE user_id IS NULL AND device_id IS NOT NULL
                    DO NOTHING
                    "#,
                )
                .bind(content_type)
                .bind(content_id)
                .bind(device_id)
                .bind(window_key)
                .bind(signal.duration_ms)
                .bind(signal.progress_pct)
                .bind(signal.is_complete)
                .bind(signal.source.as_deref())
                .execute(&mut *tx)
                .await?
            }
            ViewerIdentity::Session(session_id) => {
                sqlx::query(
                    r#"
                    INSERT INTO view_events
                        (content_type, content_id, session_id, window_key,
                         duration_ms, progress_pct, is_complete, source)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                    ON CONFLICT (session_id, content_type, content_id, window_key)
                        WHERE user_id IS NULL AND device_id IS NULL AND session_id IS NOT NULL
                    DO NOTHING
                    "#,
                )
                .bind(content_type)
                .bind(content_id)
                .bind(session_id)
                .bind(window_key)
                .bind(signal.duration_ms)
                .bind(signal.progress_pct)
                .bind(signal.is_complete)
                .bind(signal.source.as_deref())
                .execute(&mut *tx)
                .await?
            }
        };

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        let count =
            CounterRepository::increment(&mut tx, CounterField::View, content_type, content_id)
                .await?;
        tx.commit().await?;

        Ok(Some(count))
    }

    /// Merge a repeated signal into the existing window row, monotonically:
    /// longer duration and higher progress win, completion is sticky.
    /// GREATEST skips NULL arguments, so a field nobody ever reported stays
    /// NULL instead of collapsing to zero.
    async fn merge_engagement(
        &self,
        identity: &ViewerIdentity,
        content_type: &str,
        content_id: Uuid,
        window_key: i64,
        signal: &ViewSignal,
    ) -> Result<()> {
        let (predicate, key): (&str, String) = match identity {
            ViewerIdentity::User(id) => ("user_id = $1::uuid", id.to_string()),
            ViewerIdentity::Device(id) => {
                ("user_id IS NULL AND device_id = $1", id.clone())
            }
            ViewerIdentity::Session(id) => (
                "user_id IS NULL AND device_id IS NULL AND session_id = $1",
                id.clone(),
            ),
        };

        let sql = format!(
            r#"
            UPDATE view_events
            SET duration_ms = GREATEST(duration_ms, $5),
                progress_pct = GREATEST(progress_pct, $6),
                is_complete = is_complete OR $7
            WHERE {predicate}
              AND content_type = $2 AND content_id = $3 AND window_key = $4
            "#,
        );

        sqlx::query(&sql)
            .bind(key)
            .bind(content_type)
            .bind(content_id)
            .bind(window_key)
            .bind(signal.duration_ms)
            .bind(signal.progress_pct)
            .bind(signal.is_complete)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Whether any view event exists for this identity + content in any
    /// window ("already viewed" UI state).
    async fn has_viewed(
        &self,
        identity: &ViewerIdentity,
        content_type: &str,
        content_id: Uuid,
    ) -> Result<bool> {
        let (predicate, key): (&str, String) = match identity {
            ViewerIdentity::User(id) => ("user_id = $1::uuid", id.to_string()),
            ViewerIdentity::Device(id) => ("device_id = $1", id.clone()),
            ViewerIdentity::Session(id) => ("session_id = $1", id.clone()),
        };

        let sql = format!(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM view_events
                WHERE {predicate} AND content_type = $2 AND content_id = $3
            )
            "#,
        );

        let exists: bool = sqlx::query_scalar(&sql)
            .bind(key)
            .bind(content_type)
            .bind(content_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(exists)
    }

    /// Batch check which of the given content items the user has viewed.
    async fn batch_check_viewed(
        &self,
        user_id: Uuid,
        content_type: &str,
        content_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, bool>> {
        use std::collections::HashSet;

        if content_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let viewed: Vec<Uuid> = sqlx::query_scalar(
            r#"
            SELECT DISTINCT content_id
            FROM view_events
            WHERE user_id = $1 AND content_type = $2 AND content_id = ANY($3)
            "#,
        )
        .bind(user_id)
        .bind(content_type)
        .bind(content_ids)
        .fetch_all(&self.pool)
        .await?;

        let viewed_set: HashSet<Uuid> = viewed.into_iter().collect();
        Ok(content_ids
            .iter()
            .map(|id| (*id, viewed_set.contains(id)))
            .collect())
    }

    async fn insert_watch_counting(
        &self,
        user_id: Uuid,
        content_type: &str,
        content_id: Uuid,
        duration_secs: f64,
        is_complete: bool,
    ) -> Result<Option<i64>> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            INSERT INTO watch_interactions
                (user_id, content_type, content_id, duration_secs, is_complete)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_id, content_type, content_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(content_type)
        .bind(content_id)
        .bind(duration_secs)
        .bind(is_complete)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        let count =
            CounterRepository::increment(&mut tx, CounterField::View, content_type, content_id)
                .await?;
        tx.commit().await?;

        Ok(Some(count))
    }
}
