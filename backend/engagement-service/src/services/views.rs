use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::db::{
    ContentRepository, ContentStore, CounterField, CounterRepository, CounterStore,
    ViewEventRepository, ViewStore,
};
use crate::error::{AppError, Result};
use crate::metrics;
use crate::models::{ViewSignal, ViewerIdentity};
use crate::services::counter_cache::{CounterCache, CounterMirror};
use crate::ws::{ConnectionRegistry, CounterDelta};

/// Result of a view submission. `view_count` is the authoritative value;
/// `counted` says whether this call incremented it.
#[derive(Debug, Clone, Serialize)]
pub struct ViewOutcome {
    pub view_count: i64,
    pub has_viewed: bool,
    pub counted: bool,
}

/// Whether a raw watch passes the legacy counting rule: enough watch time,
/// or an explicit completion.
pub fn passes_watch_threshold(duration_secs: f64, is_complete: bool, threshold_secs: u32) -> bool {
    is_complete || duration_secs >= f64::from(threshold_secs)
}

/// Derived-watch consumer. The playback service reports finished sessions
/// through this seam instead of holding a concrete view service.
#[async_trait]
pub trait WatchSink: Send + Sync {
    async fn record_watch(
        &self,
        user_id: Uuid,
        content_type: &str,
        content_id: Uuid,
        duration_secs: f64,
        is_complete: bool,
    ) -> Result<ViewOutcome>;
}

/// View Dedup Engine: decides, per deduplication window, whether a raw
/// view/listen/read signal increments the durable view counter.
#[derive(Clone)]
pub struct ViewService<
    V = ViewEventRepository,
    C = CounterRepository,
    T = ContentRepository,
    M = CounterCache,
> {
    views: V,
    counters: C,
    content: T,
    cache: M,
    registry: ConnectionRegistry,
    /// Fallback threshold for the legacy duration path (seconds)
    default_threshold_secs: u32,
}

impl<V, C, T, M> ViewService<V, C, T, M>
where
    V: ViewStore,
    C: CounterStore,
    T: ContentStore,
    M: CounterMirror,
{
    pub fn new(
        views: V,
        counters: C,
        content: T,
        cache: M,
        registry: ConnectionRegistry,
        default_threshold_secs: u32,
    ) -> Self {
        Self {
            views,
            counters,
            content,
            cache,
            registry,
            default_threshold_secs,
        }
    }

    /// Record a view for this identity, counting it at most once per window.
    pub async fn record_view(
        &self,
        identity: &ViewerIdentity,
        content_type: &str,
        content_id: Uuid,
        signal: ViewSignal,
    ) -> Result<ViewOutcome> {
        if !self.content.exists(content_type, content_id).await? {
            return Err(AppError::NotFound(format!(
                "content {content_type}/{content_id} not found"
            )));
        }

        let window_key = signal.window.window_key(Utc::now());

        let counted_result = self
            .views
            .insert_event_counting(identity, content_type, content_id, window_key, &signal)
            .await?;

        let (view_count, counted) = match counted_result {
            Some(count) => {
                metrics::observe_view("counted");
                (count, true)
            }
            None => {
                // Already viewed this window: fold in the richer engagement
                // but do not count again
                self.views
                    .merge_engagement(identity, content_type, content_id, window_key, &signal)
                    .await?;
                metrics::observe_view("deduplicated");
                let count = self
                    .counters
                    .get_counts(content_type, content_id)
                    .await?
                    .view_count;
                (count, false)
            }
        };

        // A counted view implies the identity has viewed; the dedup branch
        // already proved an earlier event exists this window
        let has_viewed = true;

        self.finish_view_mutation(content_type, content_id, view_count, identity.user_id(), counted)
            .await;

        Ok(ViewOutcome {
            view_count,
            has_viewed,
            counted,
        })
    }

    /// Legacy duration-threshold path used by older playback flows: counts
    /// at most once per user per content, window-independent.
    pub async fn record_watch(
        &self,
        user_id: Uuid,
        content_type: &str,
        content_id: Uuid,
        duration_secs: f64,
        is_complete: bool,
    ) -> Result<ViewOutcome> {
        let item = self
            .content
            .find(content_type, content_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("content {content_type}/{content_id} not found"))
            })?;

        let threshold = item
            .view_threshold_secs
            .and_then(|t| u32::try_from(t).ok())
            .unwrap_or(self.default_threshold_secs);

        if !passes_watch_threshold(duration_secs, is_complete, threshold) {
            metrics::observe_view("below_threshold");
            let view_count = self
                .counters
                .get_counts(content_type, content_id)
                .await?
                .view_count;
            let has_viewed = self
                .views
                .has_viewed(&ViewerIdentity::User(user_id), content_type, content_id)
                .await?;
            return Ok(ViewOutcome {
                view_count,
                has_viewed,
                counted: false,
            });
        }

        let counted_result = self
            .views
            .insert_watch_counting(user_id, content_type, content_id, duration_secs, is_complete)
            .await?;

        let (view_count, counted) = match counted_result {
            Some(count) => {
                metrics::observe_view("counted");
                (count, true)
            }
            None => {
                metrics::observe_view("deduplicated");
                let count = self
                    .counters
                    .get_counts(content_type, content_id)
                    .await?
                    .view_count;
                (count, false)
            }
        };

        self.finish_view_mutation(content_type, content_id, view_count, Some(user_id), counted)
            .await;

        Ok(ViewOutcome {
            view_count,
            has_viewed: true,
            counted,
        })
    }

    /// "Already viewed" UI state, independent of window.
    pub async fn has_viewed(
        &self,
        identity: &ViewerIdentity,
        content_type: &str,
        content_id: Uuid,
    ) -> Result<bool> {
        self.views.has_viewed(identity, content_type, content_id).await
    }

    /// Batch viewed-flags for the metadata endpoints.
    pub async fn batch_has_viewed(
        &self,
        user_id: Uuid,
        content_type: &str,
        content_ids: &[Uuid],
    ) -> Result<std::collections::HashMap<Uuid, bool>> {
        self.views
            .batch_check_viewed(user_id, content_type, content_ids)
            .await
    }

    async fn finish_view_mutation(
        &self,
        content_type: &str,
        content_id: Uuid,
        view_count: i64,
        acting_user_id: Option<Uuid>,
        counted: bool,
    ) {
        if let Err(err) = self
            .cache
            .write_through(content_type, content_id, CounterField::View, view_count)
            .await
        {
            tracing::warn!(
                content_type,
                %content_id,
                error = %err,
                "view count cache write-through failed"
            );
        }

        if counted {
            self.registry
                .publish_delta(&CounterDelta::new(
                    content_type,
                    content_id,
                    CounterField::View,
                    view_count,
                    acting_user_id,
                ))
                .await;
        }
    }
}

#[async_trait]
impl<V, C, T, M> WatchSink for ViewService<V, C, T, M>
where
    V: ViewStore,
    C: CounterStore,
    T: ContentStore,
    M: CounterMirror,
{
    async fn record_watch(
        &self,
        user_id: Uuid,
        content_type: &str,
        content_id: Uuid,
        duration_secs: f64,
        is_complete: bool,
    ) -> Result<ViewOutcome> {
        ViewService::record_watch(self, user_id, content_type, content_id, duration_secs, is_complete)
            .await
    }
}
