use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{
    mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender},
    RwLock,
};
use uuid::Uuid;

use crate::db::CounterField;

pub mod session;

/// Room key for a content item: `content:{content_type}:{content_id}`.
pub fn room_key(content_type: &str, content_id: Uuid) -> String {
    format!("content:{}:{}", content_type, content_id)
}

/// Counter delta pushed to live subscribers after a mutation. Carries the
/// authoritative count read back from the Counter Store, never a
/// client-computed delta.
#[derive(Debug, Clone, Serialize)]
pub struct CounterDelta {
    pub content_id: Uuid,
    pub content_type: String,
    pub counter: &'static str,
    pub count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acting_user_id: Option<Uuid>,
    pub timestamp: DateTime<Utc>,
}

impl CounterDelta {
    pub fn new(
        content_type: &str,
        content_id: Uuid,
        field: CounterField,
        count: i64,
        acting_user_id: Option<Uuid>,
    ) -> Self {
        Self {
            content_id,
            content_type: content_type.to_string(),
            counter: field.key_suffix(),
            count,
            acting_user_id,
            timestamp: Utc::now(),
        }
    }
}

/// Unique identifier for a fan-out subscriber.
///
/// Each websocket connection gets one when it joins a room, so cleanup on
/// disconnect removes exactly that subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(Uuid);

impl SubscriberId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

struct Subscriber {
    id: SubscriberId,
    sender: UnboundedSender<String>,
}

/// Fan-out registry: room key -> live subscribers.
///
/// Delivery is best-effort: dead senders are dropped during broadcast, no
/// ordering is guaranteed across subscribers, and nothing is replayed.
#[derive(Default, Clone)]
pub struct ConnectionRegistry {
    inner: Arc<RwLock<HashMap<String, Vec<Subscriber>>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to a room. Returns the subscriber id (for cleanup) and the
    /// channel on which broadcasts arrive.
    pub async fn subscribe(&self, room: &str) -> (SubscriberId, UnboundedReceiver<String>) {
        let (tx, rx) = unbounded_channel();
        let subscriber_id = SubscriberId::new();

        let mut guard = self.inner.write().await;
        guard.entry(room.to_string()).or_default().push(Subscriber {
            id: subscriber_id,
            sender: tx,
        });

        tracing::debug!(
            room,
            subscribers = guard.get(room).map(|v| v.len()).unwrap_or(0),
            "fan-out subscriber added"
        );

        (subscriber_id, rx)
    }

    /// Remove one subscriber from a room. Must be called when the websocket
    /// closes, or the sender lingers until the next broadcast prunes it.
    pub async fn unsubscribe(&self, room: &str, subscriber_id: SubscriberId) {
        let mut guard = self.inner.write().await;

        if let Some(subscribers) = guard.get_mut(room) {
            subscribers.retain(|s| s.id != subscriber_id);
            if subscribers.is_empty() {
                guard.remove(room);
            }
        }
    }

    /// Broadcast a message to every subscriber of a room, pruning dead
    /// senders as it goes.
    pub async fn broadcast(&self, room: &str, msg: String) {
        let mut guard = self.inner.write().await;
        if let Some(subscribers) = guard.get_mut(room) {
            let before = subscribers.len();
            subscribers.retain(|subscriber| subscriber.sender.send(msg.clone()).is_ok());

            if subscribers.len() != before {
                tracing::debug!(
                    room,
                    pruned = before - subscribers.len(),
                    active = subscribers.len(),
                    "pruned dead fan-out senders"
                );
            }
        }
    }

    /// Serialize and broadcast a counter delta. Fire-and-forget: publish
    /// failures are logged and never propagated to the mutating caller.
    pub async fn publish_delta(&self, delta: &CounterDelta) {
        let room = room_key(&delta.content_type, delta.content_id);
        match serde_json::to_string(delta) {
            Ok(json) => self.broadcast(&room, json).await,
            Err(err) => {
                tracing::warn!(room, error = %err, "failed to serialize counter delta")
            }
        }
    }

    pub async fn subscriber_count(&self, room: &str) -> usize {
        let guard = self.inner.read().await;
        guard.get(room).map(|v| v.len()).unwrap_or(0)
    }
}
