use serde::Serialize;
use uuid::Uuid;

use crate::db::{
    ContentRepository, ContentStore, CounterField, CounterRepository, CounterStore,
    LikeRepository, LikeStore,
};
use crate::error::{AppError, Result};
use crate::metrics;
use crate::services::counter_cache::{CounterCache, CounterMirror};
use crate::ws::{ConnectionRegistry, CounterDelta};

/// Result of a like toggle. `like_count` is the authoritative value read
/// back from the Counter Store, never computed client-side.
#[derive(Debug, Clone, Serialize)]
pub struct LikeToggle {
    pub liked: bool,
    pub like_count: i64,
}

/// Like Engine: enforces at-most-one-like-per-(user, content) and toggles
/// it atomically.
///
/// The store-level uniqueness constraint is the real concurrency guard; a
/// losing insert degrades to the idempotent "already liked" outcome instead
/// of an error.
#[derive(Clone)]
pub struct LikeService<
    L = LikeRepository,
    C = CounterRepository,
    T = ContentRepository,
    M = CounterCache,
> {
    likes: L,
    counters: C,
    content: T,
    cache: M,
    registry: ConnectionRegistry,
}

impl<L, C, T, M> LikeService<L, C, T, M>
where
    L: LikeStore,
    C: CounterStore,
    T: ContentStore,
    M: CounterMirror,
{
    pub fn new(likes: L, counters: C, content: T, cache: M, registry: ConnectionRegistry) -> Self {
        Self {
            likes,
            counters,
            content,
            cache,
            registry,
        }
    }

    pub async fn toggle_like(
        &self,
        user_id: Uuid,
        content_type: &str,
        content_id: Uuid,
    ) -> Result<LikeToggle> {
        let item = self
            .content
            .find(content_type, content_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("content {content_type}/{content_id} not found"))
            })?;

        // Self-likes are permitted, logged for analytics only
        if item.owner_id == Some(user_id) {
            tracing::debug!(%user_id, content_type, %content_id, "self-like toggle");
        }

        let already_liked = self
            .likes
            .check_user_liked(user_id, content_type, content_id)
            .await?;

        let toggle = if !already_liked {
            match self.likes.like(user_id, content_type, content_id).await? {
                Some(like_count) => {
                    metrics::observe_toggle("liked");
                    LikeToggle {
                        liked: true,
                        like_count,
                    }
                }
                None => {
                    // Lost the race to a concurrent like from the same user:
                    // already in the desired state, report the current count
                    metrics::observe_toggle("noop");
                    LikeToggle {
                        liked: true,
                        like_count: self.current_like_count(content_type, content_id).await?,
                    }
                }
            }
        } else {
            match self.likes.unlike(user_id, content_type, content_id).await? {
                Some(like_count) => {
                    metrics::observe_toggle("unliked");
                    LikeToggle {
                        liked: false,
                        like_count,
                    }
                }
                None => {
                    // Row vanished between check and delete (concurrent unlike)
                    metrics::observe_toggle("noop");
                    LikeToggle {
                        liked: false,
                        like_count: self.current_like_count(content_type, content_id).await?,
                    }
                }
            }
        };

        // Cache write-through only after the durable mutation committed
        if let Err(err) = self
            .cache
            .write_through(content_type, content_id, CounterField::Like, toggle.like_count)
            .await
        {
            tracing::warn!(
                content_type,
                %content_id,
                error = %err,
                "like count cache write-through failed"
            );
        }

        self.registry
            .publish_delta(&CounterDelta::new(
                content_type,
                content_id,
                CounterField::Like,
                toggle.like_count,
                Some(user_id),
            ))
            .await;

        Ok(toggle)
    }

    /// Whether the user has liked this content (metadata flag).
    pub async fn has_liked(
        &self,
        user_id: Uuid,
        content_type: &str,
        content_id: Uuid,
    ) -> Result<bool> {
        self.likes
            .check_user_liked(user_id, content_type, content_id)
            .await
    }

    /// Batch liked-flags for the metadata endpoints.
    pub async fn batch_has_liked(
        &self,
        user_id: Uuid,
        content_type: &str,
        content_ids: &[Uuid],
    ) -> Result<std::collections::HashMap<Uuid, bool>> {
        self.likes
            .batch_check_liked(user_id, content_type, content_ids)
            .await
    }

    async fn current_like_count(&self, content_type: &str, content_id: Uuid) -> Result<i64> {
        Ok(self
            .counters
            .get_counts(content_type, content_id)
            .await?
            .like_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::{
        MemContentStore, MemCounterMirror, MemCounterStore, MemLikeStore,
    };

    fn service(
        content_type: &str,
        content_id: Uuid,
    ) -> LikeService<MemLikeStore, MemCounterStore, MemContentStore, MemCounterMirror> {
        let counters = MemCounterStore::default();
        let content = MemContentStore::default();
        content.add(content_type, content_id);
        LikeService::new(
            MemLikeStore::new(counters.clone()),
            counters,
            content,
            MemCounterMirror::default(),
            ConnectionRegistry::new(),
        )
    }

    #[tokio::test]
    async fn toggle_alternates_and_count_tracks_state() {
        let content_id = Uuid::new_v4();
        let svc = service("post", content_id);
        let user = Uuid::new_v4();

        let first = svc.toggle_like(user, "post", content_id).await.unwrap();
        assert!(first.liked);
        assert_eq!(first.like_count, 1);

        let second = svc.toggle_like(user, "post", content_id).await.unwrap();
        assert!(!second.liked);
        assert_eq!(second.like_count, 0);

        let third = svc.toggle_like(user, "post", content_id).await.unwrap();
        assert!(third.liked);
        assert_eq!(third.like_count, 1);
    }

    #[tokio::test]
    async fn users_accumulate_independent_likes() {
        let content_id = Uuid::new_v4();
        let svc = service("song", content_id);
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        assert_eq!(
            svc.toggle_like(alice, "song", content_id).await.unwrap().like_count,
            1
        );
        assert_eq!(
            svc.toggle_like(bob, "song", content_id).await.unwrap().like_count,
            2
        );

        // Alice unliking does not disturb Bob's like
        let after = svc.toggle_like(alice, "song", content_id).await.unwrap();
        assert!(!after.liked);
        assert_eq!(after.like_count, 1);
        assert!(svc.has_liked(bob, "song", content_id).await.unwrap());
        assert!(!svc.has_liked(alice, "song", content_id).await.unwrap());
    }

    #[tokio::test]
    async fn toggle_on_unknown_content_is_not_found() {
        let svc = service("post", Uuid::new_v4());
        let err = svc
            .toggle_like(Uuid::new_v4(), "post", Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
