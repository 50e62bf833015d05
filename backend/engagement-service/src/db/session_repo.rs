use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::Result;
use crate::models::PlaybackSession;

const SESSION_COLUMNS: &str = "id, user_id, media_id, started_at, last_progress_at, \
     current_position, duration, progress_percentage, is_active, is_paused, \
     paused_at, ended_at, total_watch_time";

/// Durable store for playback sessions. Every transition is a conditional
/// update returning `None` when the session is not in the required state.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn force_pause_active(&self, user_id: Uuid) -> Result<Option<PlaybackSession>>;

    async fn try_create(
        &self,
        user_id: Uuid,
        media_id: Uuid,
        duration: f64,
        position: f64,
    ) -> Result<Option<PlaybackSession>>;

    async fn find_own(&self, session_id: Uuid, user_id: Uuid)
        -> Result<Option<PlaybackSession>>;

    async fn apply_progress(
        &self,
        session_id: Uuid,
        user_id: Uuid,
        position: f64,
        reported_at: DateTime<Utc>,
    ) -> Result<Option<PlaybackSession>>;

    async fn pause(&self, session_id: Uuid, user_id: Uuid) -> Result<Option<PlaybackSession>>;

    async fn resume(&self, session_id: Uuid, user_id: Uuid) -> Result<Option<PlaybackSession>>;

    async fn end(&self, session_id: Uuid, user_id: Uuid) -> Result<Option<PlaybackSession>>;
}

/// Repository for playback sessions.
///
/// The `playback_sessions_one_active` partial unique index guarantees at
/// most one `is_active` row per user at the store level; the service layer
/// force-pauses the previous session before inserting a new one, and the
/// index is the backstop when two starts race.
#[derive(Clone)]
pub struct SessionRepository {
    pool: PgPool,
}

impl SessionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for SessionRepository {
    /// Pause whatever session is currently active for this user (any media),
    /// capturing its position. Returns the paused session, if there was one.
    async fn force_pause_active(&self, user_id: Uuid) -> Result<Option<PlaybackSession>> {
        let sql = format!(
            r#"
            UPDATE playback_sessions
            SET is_active = FALSE, is_paused = TRUE, paused_at = NOW()
            WHERE user_id = $1 AND is_active
            RETURNING {SESSION_COLUMNS}
            "#,
        );

        let session = sqlx::query_as::<_, PlaybackSession>(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(session)
    }

    /// Insert a new active session. Returns None when another active session
    /// for this user won the race (the partial unique index fired).
    async fn try_create(
        &self,
        user_id: Uuid,
        media_id: Uuid,
        duration: f64,
        position: f64,
    ) -> Result<Option<PlaybackSession>> {
        let sql = format!(
            r#"
            INSERT INTO playback_sessions
                (user_id, media_id, duration, current_position, progress_percentage)
            VALUES ($1, $2, $3, $4,
                    CASE WHEN $3 > 0 THEN LEAST($4 / $3, 1.0)::real ELSE 0 END)
            ON CONFLICT (user_id) WHERE is_active DO NOTHING
            RETURNING {SESSION_COLUMNS}
            "#,
        );

        let session = sqlx::query_as::<_, PlaybackSession>(&sql)
            .bind(user_id)
            .bind(media_id)
            .bind(duration)
            .bind(position)
            .fetch_optional(&self.pool)
            .await?;

        Ok(session)
    }

    async fn find_own(
        &self,
        session_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<PlaybackSession>> {
        let sql = format!(
            r#"
            SELECT {SESSION_COLUMNS}
            FROM playback_sessions
            WHERE id = $1 AND user_id = $2
            "#,
        );

        let session = sqlx::query_as::<_, PlaybackSession>(&sql)
            .bind(session_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(session)
    }

    /// Apply a progress ping in one atomic statement.
    ///
    /// Stale or out-of-order pings (reported_at older than last_progress_at)
    /// are accepted: the position still updates, but elapsed time clamps to
    /// zero so total_watch_time never regresses, and last_progress_at keeps
    /// its maximum.
    async fn apply_progress(
        &self,
        session_id: Uuid,
        user_id: Uuid,
        position: f64,
        reported_at: DateTime<Utc>,
    ) -> Result<Option<PlaybackSession>> {
        let sql = format!(
            r#"
            UPDATE playback_sessions
            SET current_position = $3,
                progress_percentage =
                    CASE WHEN duration > 0 THEN LEAST($3 / duration, 1.0)::real ELSE 0 END,
                total_watch_time = total_watch_time
                    + GREATEST(EXTRACT(EPOCH FROM ($4 - last_progress_at)), 0),
                last_progress_at = GREATEST(last_progress_at, $4)
            WHERE id = $1 AND user_id = $2 AND is_active AND ended_at IS NULL
            RETURNING {SESSION_COLUMNS}
            "#,
        );

        let session = sqlx::query_as::<_, PlaybackSession>(&sql)
            .bind(session_id)
            .bind(user_id)
            .bind(position)
            .bind(reported_at)
            .fetch_optional(&self.pool)
            .await?;

        Ok(session)
    }

    /// Active -> Paused. Returns None when the session is not active.
    async fn pause(&self, session_id: Uuid, user_id: Uuid) -> Result<Option<PlaybackSession>> {
        let sql = format!(
            r#"
            UPDATE playback_sessions
            SET is_active = FALSE, is_paused = TRUE, paused_at = NOW()
            WHERE id = $1 AND user_id = $2 AND is_active AND ended_at IS NULL
            RETURNING {SESSION_COLUMNS}
            "#,
        );

        let session = sqlx::query_as::<_, PlaybackSession>(&sql)
            .bind(session_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(session)
    }

    /// Paused -> Active. Returns None when the session is not paused (ended,
    /// unknown, or already active).
    async fn resume(&self, session_id: Uuid, user_id: Uuid) -> Result<Option<PlaybackSession>> {
        let sql = format!(
            r#"
            UPDATE playback_sessions
            SET is_active = TRUE, is_paused = FALSE, paused_at = NULL,
                last_progress_at = NOW()
            WHERE id = $1 AND user_id = $2 AND is_paused AND ended_at IS NULL
            RETURNING {SESSION_COLUMNS}
            "#,
        );

        let session = sqlx::query_as::<_, PlaybackSession>(&sql)
            .bind(session_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(session)
    }

    /// {Active, Paused} -> Ended. Terminal; returns None when already ended
    /// or unknown.
    async fn end(&self, session_id: Uuid, user_id: Uuid) -> Result<Option<PlaybackSession>> {
        let sql = format!(
            r#"
            UPDATE playback_sessions
            SET is_active = FALSE, is_paused = FALSE, ended_at = NOW()
            WHERE id = $1 AND user_id = $2 AND ended_at IS NULL
            RETURNING {SESSION_COLUMNS}
            "#,
        );

        let session = sqlx::query_as::<_, PlaybackSession>(&sql)
            .bind(session_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(session)
    }
}
