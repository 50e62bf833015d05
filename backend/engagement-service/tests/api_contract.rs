//! JSON contract of the engagement API
//!
//! Mobile clients pin these field names and defaults; the shapes below are
//! the wire contract, independent of any backing store.

use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use engagement_service::db::CounterField;
use engagement_service::handlers::content::RecordViewRequest;
use engagement_service::models::{PlaybackSession, WindowGranularity};
use engagement_service::services::{LikeToggle, StartOutcome, ViewOutcome};
use engagement_service::ws::CounterDelta;

#[test]
fn record_view_request_defaults() {
    let req: RecordViewRequest = serde_json::from_value(json!({})).expect("empty body is valid");
    assert_eq!(req.duration_ms, None);
    assert_eq!(req.progress_pct, None);
    assert!(!req.is_complete);
    assert_eq!(req.window_granularity, WindowGranularity::Day);
}

#[test]
fn record_view_request_accepts_hourly_window() {
    let req: RecordViewRequest = serde_json::from_value(json!({
        "duration_ms": 45000,
        "progress_pct": 0.8,
        "is_complete": false,
        "device_id": "ios-abc",
        "window_granularity": "hour"
    }))
    .expect("body is valid");
    assert_eq!(req.window_granularity, WindowGranularity::Hour);
    assert_eq!(req.duration_ms, Some(45000));
    assert_eq!(req.device_id.as_deref(), Some("ios-abc"));
}

#[test]
fn like_toggle_serializes_expected_fields() {
    let value = serde_json::to_value(LikeToggle {
        liked: true,
        like_count: 7,
    })
    .expect("serializes");
    assert_eq!(value, json!({"liked": true, "like_count": 7}));
}

#[test]
fn view_outcome_serializes_expected_fields() {
    let value = serde_json::to_value(ViewOutcome {
        view_count: 42,
        has_viewed: true,
        counted: false,
    })
    .expect("serializes");
    assert_eq!(
        value,
        json!({"view_count": 42, "has_viewed": true, "counted": false})
    );
}

#[test]
fn counter_delta_omits_absent_actor() {
    let delta = CounterDelta::new("media", Uuid::nil(), CounterField::View, 10, None);
    let value = serde_json::to_value(&delta).expect("serializes");

    assert_eq!(value["counter"], "views");
    assert_eq!(value["count"], 10);
    assert_eq!(value["content_type"], "media");
    assert!(value.get("acting_user_id").is_none());
}

#[test]
fn counter_delta_carries_acting_user() {
    let actor = Uuid::new_v4();
    let delta = CounterDelta::new("post", Uuid::nil(), CounterField::Like, 3, Some(actor));
    let value = serde_json::to_value(&delta).expect("serializes");

    assert_eq!(value["counter"], "likes");
    assert_eq!(value["acting_user_id"], actor.to_string());
}

#[test]
fn start_outcome_omits_absent_previous_session() {
    let now = Utc::now();
    let session = PlaybackSession {
        id: Uuid::new_v4(),
        user_id: Uuid::new_v4(),
        media_id: Uuid::new_v4(),
        started_at: now,
        last_progress_at: now,
        current_position: 0.0,
        duration: 180.0,
        progress_percentage: 0.0,
        is_active: true,
        is_paused: false,
        paused_at: None,
        ended_at: None,
        total_watch_time: 0.0,
    };

    let value = serde_json::to_value(StartOutcome {
        session,
        previous_session_paused: None,
        resume_from: None,
    })
    .expect("serializes");

    assert!(value.get("previous_session_paused").is_none());
    assert!(value.get("resume_from").is_none());
    assert_eq!(value["session"]["is_active"], true);
}
