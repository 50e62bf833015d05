/// Data structures for the engagement subsystem
///
/// Row types mirror the migration schema; the enums here are the vocabulary
/// shared by repositories, services, and handlers.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A like row. Created on first like, destroyed on unlike, never updated.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Like {
    pub id: Uuid,
    pub content_type: String,
    pub content_id: Uuid,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// A deduplicated view event within one window.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ViewEvent {
    pub id: Uuid,
    pub content_type: String,
    pub content_id: Uuid,
    pub user_id: Option<Uuid>,
    pub device_id: Option<String>,
    pub session_id: Option<String>,
    pub window_key: i64,
    pub viewed_at: DateTime<Utc>,
    pub duration_ms: Option<i64>,
    pub progress_pct: Option<f32>,
    pub is_complete: bool,
    pub source: Option<String>,
}

/// An in-progress (or finished) playback session for one (user, media) pair.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PlaybackSession {
    pub id: Uuid,
    pub user_id: Uuid,
    pub media_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub last_progress_at: DateTime<Utc>,
    pub current_position: f64,
    pub duration: f64,
    pub progress_percentage: f32,
    pub is_active: bool,
    pub is_paused: bool,
    pub paused_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub total_watch_time: f64,
}

impl PlaybackSession {
    /// A session that stopped reporting progress is treated as implicitly
    /// ended for reporting purposes; there is no background sweeper.
    pub fn is_stale(&self, now: DateTime<Utc>, stale_after: chrono::Duration) -> bool {
        now - self.last_progress_at > stale_after
    }
}

/// Denormalized counters for one content item.
#[derive(Debug, Clone, Default, Serialize, sqlx::FromRow)]
pub struct ContentCounts {
    pub like_count: i64,
    pub view_count: i64,
    pub comment_count: i64,
    pub share_count: i64,
    pub bookmark_count: i64,
}

/// Registry projection row for content owned by the content module.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ContentItem {
    pub content_type: String,
    pub content_id: Uuid,
    pub owner_id: Option<Uuid>,
    pub view_threshold_secs: Option<i32>,
}

/// The dedup key for a view: user id, device id, or session id, in
/// preference order. Anonymous identities dedup independently from
/// authenticated ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewerIdentity {
    User(Uuid),
    Device(String),
    Session(String),
}

impl ViewerIdentity {
    /// Resolve the identity from request parts, preferring user over device
    /// over session. Returns None when no identity was supplied at all.
    pub fn from_parts(
        user_id: Option<Uuid>,
        device_id: Option<String>,
        session_id: Option<String>,
    ) -> Option<Self> {
        if let Some(user_id) = user_id {
            return Some(ViewerIdentity::User(user_id));
        }
        if let Some(device_id) = device_id.filter(|d| !d.is_empty()) {
            return Some(ViewerIdentity::Device(device_id));
        }
        session_id
            .filter(|s| !s.is_empty())
            .map(ViewerIdentity::Session)
    }

    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            ViewerIdentity::User(id) => Some(*id),
            _ => None,
        }
    }
}

/// Coarse time bucket bounding "one counted view per identity per content".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowGranularity {
    #[default]
    Day,
    Hour,
}

impl WindowGranularity {
    /// Bucket number since the Unix epoch for the given instant.
    pub fn window_key(&self, at: DateTime<Utc>) -> i64 {
        match self {
            WindowGranularity::Day => at.timestamp().div_euclid(86_400),
            WindowGranularity::Hour => at.timestamp().div_euclid(3_600),
        }
    }
}

/// Raw engagement carried by a view signal.
#[derive(Debug, Clone, Default)]
pub struct ViewSignal {
    pub duration_ms: Option<i64>,
    pub progress_pct: Option<f32>,
    pub is_complete: bool,
    pub source: Option<String>,
    pub window: WindowGranularity,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn window_key_buckets_by_calendar_day() {
        let morning = Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap();
        let evening = Utc.with_ymd_and_hms(2025, 3, 1, 23, 59, 59).unwrap();
        let next_day = Utc.with_ymd_and_hms(2025, 3, 2, 0, 0, 0).unwrap();

        let day = WindowGranularity::Day;
        assert_eq!(day.window_key(morning), day.window_key(evening));
        assert_eq!(day.window_key(next_day), day.window_key(morning) + 1);
    }

    #[test]
    fn window_key_hourly_is_finer_than_daily() {
        let a = Utc.with_ymd_and_hms(2025, 3, 1, 8, 59, 0).unwrap();
        let b = Utc.with_ymd_and_hms(2025, 3, 1, 9, 1, 0).unwrap();

        assert_ne!(
            WindowGranularity::Hour.window_key(a),
            WindowGranularity::Hour.window_key(b)
        );
        assert_eq!(
            WindowGranularity::Day.window_key(a),
            WindowGranularity::Day.window_key(b)
        );
    }

    #[test]
    fn identity_prefers_user_then_device_then_session() {
        let user = Uuid::new_v4();
        assert_eq!(
            ViewerIdentity::from_parts(Some(user), Some("d".into()), Some("s".into())),
            Some(ViewerIdentity::User(user))
        );
        assert_eq!(
            ViewerIdentity::from_parts(None, Some("d".into()), Some("s".into())),
            Some(ViewerIdentity::Device("d".into()))
        );
        assert_eq!(
            ViewerIdentity::from_parts(None, None, Some("s".into())),
            Some(ViewerIdentity::Session("s".into()))
        );
        assert_eq!(ViewerIdentity::from_parts(None, None, None), None);
        // Empty strings are not identities
        assert_eq!(
            ViewerIdentity::from_parts(None, Some(String::new()), None),
            None
        );
    }

    #[test]
    fn stale_session_detection() {
        let now = Utc::now();
        let mut session = PlaybackSession {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            media_id: Uuid::new_v4(),
            started_at: now - chrono::Duration::hours(2),
            last_progress_at: now - chrono::Duration::minutes(45),
            current_position: 120.0,
            duration: 300.0,
            progress_percentage: 0.4,
            is_active: true,
            is_paused: false,
            paused_at: None,
            ended_at: None,
            total_watch_time: 120.0,
        };

        assert!(session.is_stale(now, chrono::Duration::minutes(30)));
        session.last_progress_at = now - chrono::Duration::minutes(5);
        assert!(!session.is_stale(now, chrono::Duration::minutes(30)));
    }
}
