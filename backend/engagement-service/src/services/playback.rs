use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::db::{ContentRepository, ContentStore, SessionRepository, SessionStore};
use crate::error::{AppError, Result};
use crate::metrics;
use crate::models::PlaybackSession;
use crate::services::views::{ViewOutcome, ViewService, WatchSink};

/// Content type under which playback media is registered.
const MEDIA_CONTENT_TYPE: &str = "media";

/// Result of starting playback: the new session, plus the session that was
/// force-paused (if any) and its resumable position.
#[derive(Debug, Clone, Serialize)]
pub struct StartOutcome {
    pub session: PlaybackSession,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_session_paused: Option<PlaybackSession>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resume_from: Option<f64>,
}

/// Result of ending playback: the terminal session and what the View Dedup
/// Engine decided about it.
#[derive(Debug, Clone, Serialize)]
pub struct EndOutcome {
    pub session: PlaybackSession,
    pub view: ViewOutcome,
}

/// Final engagement derived from an ended session, submitted to the legacy
/// threshold path.
pub fn derive_final_watch(
    session: &PlaybackSession,
    completion_threshold: f32,
) -> (f64, bool) {
    let is_complete = session.progress_percentage >= completion_threshold;
    (session.total_watch_time, is_complete)
}

/// Playback Session State Machine.
///
/// States: Idle -> Active -> {Paused, Ended}; Paused -> {Active, Ended};
/// Ended terminal. At most one active session per user, enforced by
/// force-pause at start plus the store-level partial unique index.
#[derive(Clone)]
pub struct PlaybackService<S = SessionRepository, W = ViewService, T = ContentRepository> {
    sessions: S,
    views: W,
    content: T,
    stale_after: Duration,
    completion_threshold: f32,
}

impl<S, W, T> PlaybackService<S, W, T>
where
    S: SessionStore,
    W: WatchSink,
    T: ContentStore,
{
    pub fn new(
        sessions: S,
        views: W,
        content: T,
        stale_after: Duration,
        completion_threshold: f32,
    ) -> Self {
        Self {
            sessions,
            views,
            content,
            stale_after,
            completion_threshold,
        }
    }

    /// Start playback. Any currently active session for this user (on any
    /// media) is force-paused first, and its position is offered back for
    /// "resume where you left off".
    pub async fn start(
        &self,
        user_id: Uuid,
        media_id: Uuid,
        duration: f64,
        position: f64,
    ) -> Result<StartOutcome> {
        if duration < 0.0 || position < 0.0 {
            return Err(AppError::BadRequest(
                "duration and position must be non-negative".into(),
            ));
        }

        if !self.content.exists(MEDIA_CONTENT_TYPE, media_id).await? {
            return Err(AppError::NotFound(format!("media {media_id} not found")));
        }

        let mut previous = self.sessions.force_pause_active(user_id).await?;

        let session = match self
            .sessions
            .try_create(user_id, media_id, duration, position)
            .await?
        {
            Some(session) => session,
            None => {
                // A concurrent start slipped in between the pause and the
                // insert; pause it too and try once more
                if let Some(raced) = self.sessions.force_pause_active(user_id).await? {
                    previous.get_or_insert(raced);
                }
                self.sessions
                    .try_create(user_id, media_id, duration, position)
                    .await?
                    .ok_or_else(|| {
                        AppError::Internal("could not obtain the active session slot".into())
                    })?
            }
        };

        metrics::observe_session("start");
        if previous.is_some() {
            metrics::observe_session("force_pause");
        }

        let resume_from = previous
            .as_ref()
            .filter(|p| !p.is_stale(Utc::now(), self.stale_after))
            .map(|p| p.current_position);

        Ok(StartOutcome {
            session,
            previous_session_paused: previous,
            resume_from,
        })
    }

    /// Progress ping for the caller's own active session. Stale timestamps
    /// are accepted but never regress accumulated watch time.
    pub async fn progress(
        &self,
        user_id: Uuid,
        session_id: Uuid,
        position: f64,
        reported_at: Option<DateTime<Utc>>,
    ) -> Result<PlaybackSession> {
        if position < 0.0 {
            return Err(AppError::BadRequest("position must be non-negative".into()));
        }

        let reported_at = reported_at.unwrap_or_else(Utc::now);

        match self
            .sessions
            .apply_progress(session_id, user_id, position, reported_at)
            .await?
        {
            Some(session) => Ok(session),
            None => Err(self.explain_rejection(session_id, user_id, "progress").await?),
        }
    }

    /// Active -> Paused.
    pub async fn pause(&self, user_id: Uuid, session_id: Uuid) -> Result<PlaybackSession> {
        match self.sessions.pause(session_id, user_id).await? {
            Some(session) => {
                metrics::observe_session("pause");
                Ok(session)
            }
            None => Err(self.explain_rejection(session_id, user_id, "pause").await?),
        }
    }

    /// Paused -> Active. The target is validated first; only a resumable
    /// session may displace whatever is currently active. A rejected resume
    /// leaves every other session exactly as it was.
    pub async fn resume(&self, user_id: Uuid, session_id: Uuid) -> Result<PlaybackSession> {
        match self.sessions.find_own(session_id, user_id).await? {
            None => {
                return Err(AppError::NotFound(format!("session {session_id} not found")));
            }
            Some(session) if session.ended_at.is_some() => {
                return Err(AppError::BadRequest(format!(
                    "cannot resume: session {session_id} already ended"
                )));
            }
            Some(session) if !session.is_paused => {
                return Err(AppError::BadRequest(format!(
                    "cannot resume: session {session_id} is not in a valid state"
                )));
            }
            Some(_) => {}
        }

        self.sessions.force_pause_active(user_id).await?;

        match self.sessions.resume(session_id, user_id).await? {
            Some(session) => {
                metrics::observe_session("resume");
                Ok(session)
            }
            // The target changed state between the check and the flip
            None => Err(self.explain_rejection(session_id, user_id, "resume").await?),
        }
    }

    /// {Active, Paused} -> Ended. The accumulated session data is forwarded
    /// to the View Dedup Engine's threshold path, so an abandoned or
    /// completed session becomes at most one counted view.
    pub async fn end(&self, user_id: Uuid, session_id: Uuid) -> Result<EndOutcome> {
        let session = match self.sessions.end(session_id, user_id).await? {
            Some(session) => session,
            None => return Err(self.explain_rejection(session_id, user_id, "end").await?),
        };

        metrics::observe_session("end");

        let (watch_secs, is_complete) = derive_final_watch(&session, self.completion_threshold);
        let view = self
            .views
            .record_watch(
                user_id,
                MEDIA_CONTENT_TYPE,
                session.media_id,
                watch_secs,
                is_complete,
            )
            .await?;

        Ok(EndOutcome { session, view })
    }

    /// Turn a rejected transition into the right error: unknown session vs
    /// wrong state.
    async fn explain_rejection(
        &self,
        session_id: Uuid,
        user_id: Uuid,
        transition: &str,
    ) -> Result<AppError> {
        match self.sessions.find_own(session_id, user_id).await? {
            None => Ok(AppError::NotFound(format!("session {session_id} not found"))),
            Some(session) if session.ended_at.is_some() => Ok(AppError::BadRequest(format!(
                "cannot {transition}: session {session_id} already ended"
            ))),
            Some(_) => Ok(AppError::BadRequest(format!(
                "cannot {transition}: session {session_id} is not in a valid state"
            ))),
        }
    }
}
