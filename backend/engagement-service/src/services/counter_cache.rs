use std::collections::HashMap;

use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands};
use uuid::Uuid;

use crate::db::{CounterField, CounterRepository, CounterStore};
use crate::error::Result;
use crate::metrics;
use crate::models::ContentCounts;

/// Write-through seam the mutation services publish authoritative counts
/// into after a durable write.
#[async_trait]
pub trait CounterMirror: Send + Sync {
    async fn write_through(
        &self,
        content_type: &str,
        content_id: Uuid,
        field: CounterField,
        value: i64,
    ) -> Result<()>;
}

/// Redis key for one counter: `content:{type}:{id}:{suffix}`.
fn counter_key(content_type: &str, content_id: Uuid, field: CounterField) -> String {
    format!(
        "content:{}:{}:{}",
        content_type,
        content_id,
        field.key_suffix()
    )
}

const ALL_FIELDS: [CounterField; 5] = [
    CounterField::Like,
    CounterField::View,
    CounterField::Comment,
    CounterField::Share,
    CounterField::Bookmark,
];

/// Fast Cache Tier for hot counters.
///
/// Write-through, read-preferred, never authoritative: every durable
/// mutation writes the RETURNING value here afterwards, reads prefer Redis
/// and fall back to PostgreSQL (warming the cache), and a periodic
/// reconciliation pass rewrites drifted keys from the durable store.
/// Cache failures are downgraded to the durable path and never fail a
/// request.
#[derive(Clone)]
pub struct CounterCache {
    redis: ConnectionManager,
    counters: CounterRepository,
}

impl CounterCache {
    /// TTL for counter keys (7 days) - for set_ex (u64)
    const COUNTER_TTL_U64: u64 = 604_800;

    /// Set of `{content_type}:{content_id}` pairs touched since the last
    /// reconciliation pass.
    const DIRTY_SET_KEY: &'static str = "engagement:counters:dirty";

    pub fn new(redis: ConnectionManager, counters: CounterRepository) -> Self {
        Self { redis, counters }
    }

    /// Mirror an authoritative value into Redis after a durable mutation,
    /// and mark the counter for the next reconciliation sample.
    pub async fn write_through(
        &self,
        content_type: &str,
        content_id: Uuid,
        field: CounterField,
        value: i64,
    ) -> Result<()> {
        let key = counter_key(content_type, content_id, field);
        let _: () = self
            .redis
            .clone()
            .set_ex(&key, value, Self::COUNTER_TTL_U64)
            .await?;

        let member = format!("{}:{}", content_type, content_id);
        let _: () = self
            .redis
            .clone()
            .sadd(Self::DIRTY_SET_KEY, member)
            .await?;

        Ok(())
    }

    /// Get all counters for one content item, Redis first with PostgreSQL
    /// fallback and cache warming.
    pub async fn get_counts(&self, content_type: &str, content_id: Uuid) -> Result<ContentCounts> {
        let keys: Vec<String> = ALL_FIELDS
            .iter()
            .map(|f| counter_key(content_type, content_id, *f))
            .collect();

        let redis_result: std::result::Result<Vec<Option<i64>>, _> =
            self.redis.clone().get(&keys).await;

        match redis_result {
            Ok(values) if values.iter().all(|v| v.is_some()) => {
                metrics::observe_cache_lookup("hit");
                Ok(ContentCounts {
                    like_count: values[0].unwrap_or(0),
                    view_count: values[1].unwrap_or(0),
                    comment_count: values[2].unwrap_or(0),
                    share_count: values[3].unwrap_or(0),
                    bookmark_count: values[4].unwrap_or(0),
                })
            }
            Ok(_) => {
                metrics::observe_cache_lookup("miss");
                let counts = self.counters.get_counts(content_type, content_id).await?;
                if let Err(err) = self.warm(content_type, content_id, &counts).await {
                    tracing::warn!(
                        content_type,
                        %content_id,
                        error = %err,
                        "failed to warm counter cache"
                    );
                }
                Ok(counts)
            }
            Err(redis_err) => {
                metrics::observe_cache_lookup("error");
                tracing::warn!(
                    content_type,
                    %content_id,
                    error = %redis_err,
                    "Redis unavailable, falling back to PostgreSQL"
                );
                self.counters.get_counts(content_type, content_id).await
            }
        }
    }

    /// Batch get counters for multiple content items (Redis MGET with
    /// PostgreSQL fallback for misses).
    pub async fn batch_get_counts(
        &self,
        content_type: &str,
        content_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, ContentCounts>> {
        if content_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let mut keys = Vec::with_capacity(content_ids.len() * ALL_FIELDS.len());
        for content_id in content_ids {
            for field in ALL_FIELDS {
                keys.push(counter_key(content_type, *content_id, field));
            }
        }

        let redis_result: std::result::Result<Vec<Option<i64>>, _> =
            self.redis.clone().get(&keys).await;

        let values = match redis_result {
            Ok(values) => values,
            Err(redis_err) => {
                metrics::observe_cache_lookup("error");
                tracing::warn!(
                    content_type,
                    ids = content_ids.len(),
                    error = %redis_err,
                    "Redis MGET failed, falling back to PostgreSQL"
                );
                return self
                    .counters
                    .batch_get_counts(content_type, content_ids)
                    .await;
            }
        };

        let mut result = HashMap::new();
        let mut missing = Vec::new();
        for (i, content_id) in content_ids.iter().enumerate() {
            let slice = &values[i * ALL_FIELDS.len()..(i + 1) * ALL_FIELDS.len()];
            if slice.iter().all(|v| v.is_some()) {
                metrics::observe_cache_lookup("hit");
                result.insert(
                    *content_id,
                    ContentCounts {
                        like_count: slice[0].unwrap_or(0),
                        view_count: slice[1].unwrap_or(0),
                        comment_count: slice[2].unwrap_or(0),
                        share_count: slice[3].unwrap_or(0),
                        bookmark_count: slice[4].unwrap_or(0),
                    },
                );
            } else {
                metrics::observe_cache_lookup("miss");
                missing.push(*content_id);
            }
        }

        if !missing.is_empty() {
            let from_pg = self.counters.batch_get_counts(content_type, &missing).await?;
            for content_id in &missing {
                let counts = from_pg.get(content_id).cloned().unwrap_or_default();
                if let Err(err) = self.warm(content_type, *content_id, &counts).await {
                    tracing::warn!(
                        content_type,
                        %content_id,
                        error = %err,
                        "failed to warm counter cache"
                    );
                }
                result.insert(*content_id, counts);
            }
        }

        Ok(result)
    }

    /// Pop up to `limit` dirty `{content_type}:{content_id}` members.
    pub async fn pop_dirty(&self, limit: usize) -> Result<Vec<(String, Uuid)>> {
        let members: Vec<String> = redis::cmd("SPOP")
            .arg(Self::DIRTY_SET_KEY)
            .arg(limit)
            .query_async(&mut self.redis.clone())
            .await?;

        let mut parsed = Vec::with_capacity(members.len());
        for member in members {
            if let Some((content_type, id)) = member.rsplit_once(':') {
                if let Ok(content_id) = Uuid::parse_str(id) {
                    parsed.push((content_type.to_string(), content_id));
                    continue;
                }
            }
            tracing::warn!(member, "unparseable dirty counter key, dropping");
        }

        Ok(parsed)
    }

    /// Reconciliation: rewrite Redis from the durable Counter Store for the
    /// given content items. Returns how many items were refreshed.
    pub async fn reconcile(&self, items: &[(String, Uuid)]) -> Result<usize> {
        if items.is_empty() {
            return Ok(0);
        }

        let mut pipe = redis::pipe();
        let mut refreshed = 0;
        for (content_type, content_id) in items {
            let counts = self.counters.get_counts(content_type, *content_id).await?;
            for (field, value) in [
                (CounterField::Like, counts.like_count),
                (CounterField::View, counts.view_count),
                (CounterField::Comment, counts.comment_count),
                (CounterField::Share, counts.share_count),
                (CounterField::Bookmark, counts.bookmark_count),
            ] {
                pipe.set_ex(
                    counter_key(content_type, *content_id, field),
                    value,
                    Self::COUNTER_TTL_U64,
                )
                .ignore();
            }
            refreshed += 1;
        }

        pipe.query_async::<_, ()>(&mut self.redis.clone()).await?;

        tracing::info!(refreshed, "reconciled counters from PostgreSQL to Redis");
        Ok(refreshed)
    }
}

impl CounterCache {
    async fn warm(
        &self,
        content_type: &str,
        content_id: Uuid,
        counts: &ContentCounts,
    ) -> Result<()> {
        let mut pipe = redis::pipe();
        for (field, value) in [
            (CounterField::Like, counts.like_count),
            (CounterField::View, counts.view_count),
            (CounterField::Comment, counts.comment_count),
            (CounterField::Share, counts.share_count),
            (CounterField::Bookmark, counts.bookmark_count),
        ] {
            pipe.set_ex(
                counter_key(content_type, content_id, field),
                value,
                Self::COUNTER_TTL_U64,
            )
            .ignore();
        }
        pipe.query_async::<_, ()>(&mut self.redis.clone()).await?;
        Ok(())
    }
}

#[async_trait]
impl CounterMirror for CounterCache {
    async fn write_through(
        &self,
        content_type: &str,
        content_id: Uuid,
        field: CounterField,
        value: i64,
    ) -> Result<()> {
        CounterCache::write_through(self, content_type, content_id, field, value).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_keys_are_scoped_per_content_and_field() {
        let id = Uuid::nil();
        assert_eq!(
            counter_key("media", id, CounterField::Like),
            format!("content:media:{}:likes", id)
        );
        assert_eq!(
            counter_key("post", id, CounterField::View),
            format!("content:post:{}:views", id)
        );
    }
}
