//! Periodic counter reconciliation
//!
//! Drains the dirty-counter set and rewrites those keys in Redis from the
//! durable Counter Store, correcting any drift the write-through path may
//! have left behind (crashed requests, evictions, lost writes). The cache
//! is advisory, so a failed pass only delays convergence.

use std::time::Duration;

use crate::services::CounterCache;

/// Maximum dirty counters refreshed per pass.
const RECONCILE_BATCH: usize = 256;

pub async fn run(cache: CounterCache, interval_secs: u64) {
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
    // First tick fires immediately; skip it so startup isn't a reconcile storm
    ticker.tick().await;

    loop {
        ticker.tick().await;

        let items = match cache.pop_dirty(RECONCILE_BATCH).await {
            Ok(items) => items,
            Err(err) => {
                tracing::warn!(error = %err, "failed to sample dirty counters");
                continue;
            }
        };

        if items.is_empty() {
            continue;
        }

        match cache.reconcile(&items).await {
            Ok(refreshed) => {
                tracing::debug!(refreshed, "counter reconciliation pass completed");
            }
            Err(err) => {
                tracing::warn!(error = %err, "counter reconciliation pass failed");
            }
        }
    }
}
