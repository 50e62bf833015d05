/// Business logic layer
///
/// Each engine owns one invariant: `LikeService` the at-most-one-like rule,
/// `ViewService` dedup windows and thresholds, `PlaybackService` the session
/// state machine, `CounterCache` the write-through mirror of the durable
/// Counter Store.
pub mod counter_cache;
pub mod likes;
pub mod playback;
#[cfg(test)]
pub(crate) mod testing;
pub mod views;

pub use counter_cache::{CounterCache, CounterMirror};
pub use likes::{LikeService, LikeToggle};
pub use playback::{EndOutcome, PlaybackService, StartOutcome};
pub use views::{ViewOutcome, ViewService, WatchSink};
