//! In-memory store fakes mirroring the SQL-level semantics, used by the
//! service-layer tests. Locks are std mutexes and are never held across an
//! await point.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::db::{ContentStore, CounterField, CounterStore, LikeStore, SessionStore, ViewStore};
use crate::error::Result;
use crate::models::{ContentCounts, ContentItem, PlaybackSession, ViewSignal, ViewerIdentity};
use crate::services::counter_cache::CounterMirror;
use crate::services::views::{ViewOutcome, WatchSink};

fn identity_key(identity: &ViewerIdentity) -> String {
    match identity {
        ViewerIdentity::User(id) => format!("u:{id}"),
        ViewerIdentity::Device(id) => format!("d:{id}"),
        ViewerIdentity::Session(id) => format!("s:{id}"),
    }
}

/// Counter table fake, shared between the like and view store fakes the
/// same way the real stores share content_counters.
#[derive(Clone, Default)]
pub struct MemCounterStore {
    counts: Arc<Mutex<HashMap<(String, Uuid), ContentCounts>>>,
}

impl MemCounterStore {
    fn bump(&self, content_type: &str, content_id: Uuid, field: CounterField, delta: i64) -> i64 {
        let mut counts = self.counts.lock().unwrap();
        let entry = counts
            .entry((content_type.to_string(), content_id))
            .or_default();
        let slot = match field {
            CounterField::Like => &mut entry.like_count,
            CounterField::View => &mut entry.view_count,
            CounterField::Comment => &mut entry.comment_count,
            CounterField::Share => &mut entry.share_count,
            CounterField::Bookmark => &mut entry.bookmark_count,
        };
        *slot = (*slot + delta).max(0);
        *slot
    }
}

#[async_trait]
impl CounterStore for MemCounterStore {
    async fn get_counts(&self, content_type: &str, content_id: Uuid) -> Result<ContentCounts> {
        let counts = self.counts.lock().unwrap();
        Ok(counts
            .get(&(content_type.to_string(), content_id))
            .cloned()
            .unwrap_or_default())
    }

    async fn batch_get_counts(
        &self,
        content_type: &str,
        content_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, ContentCounts>> {
        let counts = self.counts.lock().unwrap();
        Ok(content_ids
            .iter()
            .map(|id| {
                (
                    *id,
                    counts
                        .get(&(content_type.to_string(), *id))
                        .cloned()
                        .unwrap_or_default(),
                )
            })
            .collect())
    }
}

#[derive(Clone)]
pub struct MemLikeStore {
    rows: Arc<Mutex<HashSet<(Uuid, String, Uuid)>>>,
    counters: MemCounterStore,
}

impl MemLikeStore {
    pub fn new(counters: MemCounterStore) -> Self {
        Self {
            rows: Arc::new(Mutex::new(HashSet::new())),
            counters,
        }
    }
}

#[async_trait]
impl LikeStore for MemLikeStore {
    async fn like(
        &self,
        user_id: Uuid,
        content_type: &str,
        content_id: Uuid,
    ) -> Result<Option<i64>> {
        let inserted = self
            .rows
            .lock()
            .unwrap()
            .insert((user_id, content_type.to_string(), content_id));
        if !inserted {
            return Ok(None);
        }
        Ok(Some(self.counters.bump(content_type, content_id, CounterField::Like, 1)))
    }

    async fn unlike(
        &self,
        user_id: Uuid,
        content_type: &str,
        content_id: Uuid,
    ) -> Result<Option<i64>> {
        let removed = self
            .rows
            .lock()
            .unwrap()
            .remove(&(user_id, content_type.to_string(), content_id));
        if !removed {
            return Ok(None);
        }
        Ok(Some(self.counters.bump(content_type, content_id, CounterField::Like, -1)))
    }

    async fn check_user_liked(
        &self,
        user_id: Uuid,
        content_type: &str,
        content_id: Uuid,
    ) -> Result<bool> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .contains(&(user_id, content_type.to_string(), content_id)))
    }

    async fn batch_check_liked(
        &self,
        user_id: Uuid,
        content_type: &str,
        content_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, bool>> {
        let rows = self.rows.lock().unwrap();
        Ok(content_ids
            .iter()
            .map(|id| {
                (
                    *id,
                    rows.contains(&(user_id, content_type.to_string(), *id)),
                )
            })
            .collect())
    }
}

/// Per-window engagement held by the view store fake.
#[derive(Debug, Clone, Default)]
pub struct MemEngagement {
    pub duration_ms: Option<i64>,
    pub progress_pct: Option<f32>,
    pub is_complete: bool,
}

impl MemEngagement {
    fn merge(&mut self, signal: &ViewSignal) {
        self.duration_ms = match (self.duration_ms, signal.duration_ms) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        self.progress_pct = match (self.progress_pct, signal.progress_pct) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        self.is_complete = self.is_complete || signal.is_complete;
    }
}

#[derive(Clone)]
pub struct MemViewStore {
    events: Arc<Mutex<HashMap<(String, String, Uuid, i64), MemEngagement>>>,
    watches: Arc<Mutex<HashSet<(Uuid, String, Uuid)>>>,
    counters: MemCounterStore,
}

impl MemViewStore {
    pub fn new(counters: MemCounterStore) -> Self {
        Self {
            events: Arc::new(Mutex::new(HashMap::new())),
            watches: Arc::new(Mutex::new(HashSet::new())),
            counters,
        }
    }

    /// Merged engagement for this identity + content, across windows.
    pub fn engagement(
        &self,
        identity: &ViewerIdentity,
        content_type: &str,
        content_id: Uuid,
    ) -> Option<MemEngagement> {
        let key = identity_key(identity);
        let events = self.events.lock().unwrap();
        events
            .iter()
            .find(|((k, ct, id, _), _)| *k == key && ct == content_type && *id == content_id)
            .map(|(_, engagement)| engagement.clone())
    }
}

#[async_trait]
impl ViewStore for MemViewStore {
    async fn insert_event_counting(
        &self,
        identity: &ViewerIdentity,
        content_type: &str,
        content_id: Uuid,
        window_key: i64,
        signal: &ViewSignal,
    ) -> Result<Option<i64>> {
        let key = (
            identity_key(identity),
            content_type.to_string(),
            content_id,
            window_key,
        );
        {
            let mut events = self.events.lock().unwrap();
            if events.contains_key(&key) {
                return Ok(None);
            }
            events.insert(
                key,
                MemEngagement {
                    duration_ms: signal.duration_ms,
                    progress_pct: signal.progress_pct,
                    is_complete: signal.is_complete,
                },
            );
        }
        Ok(Some(self.counters.bump(content_type, content_id, CounterField::View, 1)))
    }

    async fn merge_engagement(
        &self,
        identity: &ViewerIdentity,
        content_type: &str,
        content_id: Uuid,
        window_key: i64,
        signal: &ViewSignal,
    ) -> Result<()> {
        let key = (
            identity_key(identity),
            content_type.to_string(),
            content_id,
            window_key,
        );
        if let Some(engagement) = self.events.lock().unwrap().get_mut(&key) {
            engagement.merge(signal);
        }
        Ok(())
    }

    async fn has_viewed(
        &self,
        identity: &ViewerIdentity,
        content_type: &str,
        content_id: Uuid,
    ) -> Result<bool> {
        let key = identity_key(identity);
        let events = self.events.lock().unwrap();
        Ok(events
            .keys()
            .any(|(k, ct, id, _)| *k == key && ct == content_type && *id == content_id))
    }

    async fn batch_check_viewed(
        &self,
        user_id: Uuid,
        content_type: &str,
        content_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, bool>> {
        let key = identity_key(&ViewerIdentity::User(user_id));
        let events = self.events.lock().unwrap();
        Ok(content_ids
            .iter()
            .map(|id| {
                (
                    *id,
                    events
                        .keys()
                        .any(|(k, ct, eid, _)| *k == key && ct == content_type && eid == id),
                )
            })
            .collect())
    }

    async fn insert_watch_counting(
        &self,
        user_id: Uuid,
        content_type: &str,
        content_id: Uuid,
        _duration_secs: f64,
        _is_complete: bool,
    ) -> Result<Option<i64>> {
        let inserted = self
            .watches
            .lock()
            .unwrap()
            .insert((user_id, content_type.to_string(), content_id));
        if !inserted {
            return Ok(None);
        }
        Ok(Some(self.counters.bump(content_type, content_id, CounterField::View, 1)))
    }
}

#[derive(Clone, Default)]
pub struct MemSessionStore {
    sessions: Arc<Mutex<HashMap<Uuid, PlaybackSession>>>,
}

impl MemSessionStore {
    pub fn active_session_ids(&self, user_id: Uuid) -> Vec<Uuid> {
        let sessions = self.sessions.lock().unwrap();
        sessions
            .values()
            .filter(|s| s.user_id == user_id && s.is_active)
            .map(|s| s.id)
            .collect()
    }
}

#[async_trait]
impl SessionStore for MemSessionStore {
    async fn force_pause_active(&self, user_id: Uuid) -> Result<Option<PlaybackSession>> {
        let mut sessions = self.sessions.lock().unwrap();
        let active = sessions
            .values_mut()
            .find(|s| s.user_id == user_id && s.is_active);
        Ok(active.map(|s| {
            s.is_active = false;
            s.is_paused = true;
            s.paused_at = Some(Utc::now());
            s.clone()
        }))
    }

    async fn try_create(
        &self,
        user_id: Uuid,
        media_id: Uuid,
        duration: f64,
        position: f64,
    ) -> Result<Option<PlaybackSession>> {
        let mut sessions = self.sessions.lock().unwrap();
        if sessions.values().any(|s| s.user_id == user_id && s.is_active) {
            return Ok(None);
        }
        let now = Utc::now();
        let session = PlaybackSession {
            id: Uuid::new_v4(),
            user_id,
            media_id,
            started_at: now,
            last_progress_at: now,
            current_position: position,
            duration,
            progress_percentage: if duration > 0.0 {
                (position / duration).min(1.0) as f32
            } else {
                0.0
            },
            is_active: true,
            is_paused: false,
            paused_at: None,
            ended_at: None,
            total_watch_time: 0.0,
        };
        sessions.insert(session.id, session.clone());
        Ok(Some(session))
    }

    async fn find_own(
        &self,
        session_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<PlaybackSession>> {
        let sessions = self.sessions.lock().unwrap();
        Ok(sessions
            .get(&session_id)
            .filter(|s| s.user_id == user_id)
            .cloned())
    }

    async fn apply_progress(
        &self,
        session_id: Uuid,
        user_id: Uuid,
        position: f64,
        reported_at: DateTime<Utc>,
    ) -> Result<Option<PlaybackSession>> {
        let mut sessions = self.sessions.lock().unwrap();
        let session = sessions
            .get_mut(&session_id)
            .filter(|s| s.user_id == user_id && s.is_active && s.ended_at.is_none());
        Ok(session.map(|s| {
            s.current_position = position;
            s.progress_percentage = if s.duration > 0.0 {
                (position / s.duration).min(1.0) as f32
            } else {
                0.0
            };
            let elapsed =
                (reported_at - s.last_progress_at).num_milliseconds() as f64 / 1000.0;
            s.total_watch_time += elapsed.max(0.0);
            s.last_progress_at = s.last_progress_at.max(reported_at);
            s.clone()
        }))
    }

    async fn pause(&self, session_id: Uuid, user_id: Uuid) -> Result<Option<PlaybackSession>> {
        let mut sessions = self.sessions.lock().unwrap();
        let session = sessions
            .get_mut(&session_id)
            .filter(|s| s.user_id == user_id && s.is_active && s.ended_at.is_none());
        Ok(session.map(|s| {
            s.is_active = false;
            s.is_paused = true;
            s.paused_at = Some(Utc::now());
            s.clone()
        }))
    }

    async fn resume(&self, session_id: Uuid, user_id: Uuid) -> Result<Option<PlaybackSession>> {
        let mut sessions = self.sessions.lock().unwrap();
        let session = sessions
            .get_mut(&session_id)
            .filter(|s| s.user_id == user_id && s.is_paused && s.ended_at.is_none());
        Ok(session.map(|s| {
            s.is_active = true;
            s.is_paused = false;
            s.paused_at = None;
            s.last_progress_at = Utc::now();
            s.clone()
        }))
    }

    async fn end(&self, session_id: Uuid, user_id: Uuid) -> Result<Option<PlaybackSession>> {
        let mut sessions = self.sessions.lock().unwrap();
        let session = sessions
            .get_mut(&session_id)
            .filter(|s| s.user_id == user_id && s.ended_at.is_none());
        Ok(session.map(|s| {
            s.is_active = false;
            s.is_paused = false;
            s.ended_at = Some(Utc::now());
            s.clone()
        }))
    }
}

#[derive(Clone, Default)]
pub struct MemContentStore {
    items: Arc<Mutex<HashMap<(String, Uuid), ContentItem>>>,
}

impl MemContentStore {
    pub fn add(&self, content_type: &str, content_id: Uuid) {
        self.items.lock().unwrap().insert(
            (content_type.to_string(), content_id),
            ContentItem {
                content_type: content_type.to_string(),
                content_id,
                owner_id: None,
                view_threshold_secs: None,
            },
        );
    }

    pub fn add_with_threshold(&self, content_type: &str, content_id: Uuid, threshold_secs: i32) {
        self.items.lock().unwrap().insert(
            (content_type.to_string(), content_id),
            ContentItem {
                content_type: content_type.to_string(),
                content_id,
                owner_id: None,
                view_threshold_secs: Some(threshold_secs),
            },
        );
    }
}

#[async_trait]
impl ContentStore for MemContentStore {
    async fn find(&self, content_type: &str, content_id: Uuid) -> Result<Option<ContentItem>> {
        Ok(self
            .items
            .lock()
            .unwrap()
            .get(&(content_type.to_string(), content_id))
            .cloned())
    }

    async fn exists(&self, content_type: &str, content_id: Uuid) -> Result<bool> {
        Ok(self
            .items
            .lock()
            .unwrap()
            .contains_key(&(content_type.to_string(), content_id)))
    }
}

#[derive(Clone, Default)]
pub struct MemCounterMirror {
    writes: Arc<Mutex<Vec<(String, Uuid, CounterField, i64)>>>,
}

impl MemCounterMirror {
    #[allow(dead_code)]
    pub fn writes(&self) -> Vec<(String, Uuid, CounterField, i64)> {
        self.writes.lock().unwrap().clone()
    }
}

#[async_trait]
impl CounterMirror for MemCounterMirror {
    async fn write_through(
        &self,
        content_type: &str,
        content_id: Uuid,
        field: CounterField,
        value: i64,
    ) -> Result<()> {
        self.writes
            .lock()
            .unwrap()
            .push((content_type.to_string(), content_id, field, value));
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct MemWatchSink {
    calls: Arc<Mutex<Vec<(Uuid, String, Uuid, f64, bool)>>>,
}

impl MemWatchSink {
    pub fn calls(&self) -> Vec<(Uuid, String, Uuid, f64, bool)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl WatchSink for MemWatchSink {
    async fn record_watch(
        &self,
        user_id: Uuid,
        content_type: &str,
        content_id: Uuid,
        duration_secs: f64,
        is_complete: bool,
    ) -> Result<ViewOutcome> {
        self.calls.lock().unwrap().push((
            user_id,
            content_type.to_string(),
            content_id,
            duration_secs,
            is_complete,
        ));
        Ok(ViewOutcome {
            view_count: 1,
            has_viewed: true,
            counted: true,
        })
    }
}
