/// Content engagement handlers - like toggle, view recording, metadata
use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::handlers::{parse_content_type, parse_id, AppState};
use crate::middleware::{MaybeUserId, UserId};
use crate::models::{ViewSignal, ViewerIdentity, WindowGranularity};

#[derive(Debug, Deserialize, Default)]
pub struct RecordViewRequest {
    pub duration_ms: Option<i64>,
    pub progress_pct: Option<f32>,
    #[serde(default)]
    pub is_complete: bool,
    pub device_id: Option<String>,
    pub session_id: Option<String>,
    pub source: Option<String>,
    #[serde(default)]
    pub window_granularity: WindowGranularity,
}

#[derive(Debug, Deserialize)]
pub struct MetadataQuery {
    /// Anonymous viewers can pass their device id for the viewed flag
    pub device_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BatchMetadataRequest {
    pub content_type: String,
    pub content_ids: Vec<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct ContentMetadataResponse {
    pub content_id: Uuid,
    pub content_type: String,
    pub like_count: i64,
    pub view_count: i64,
    pub comment_count: i64,
    pub share_count: i64,
    pub bookmark_count: i64,
    pub liked: bool,
    pub viewed: bool,
}

/// Toggle a like for the authenticated user. Always returns the current
/// authoritative count, even when the toggle was a no-op under a race.
pub async fn toggle_like(
    state: web::Data<AppState>,
    path: web::Path<(String, String)>,
    user: UserId,
) -> Result<HttpResponse> {
    let (content_type, content_id) = path.into_inner();
    let content_type = parse_content_type(&content_type)?;
    let content_id = parse_id(&content_id, "content id")?;

    let toggle = state
        .likes
        .toggle_like(user.0, &content_type, content_id)
        .await?;

    Ok(HttpResponse::Ok().json(toggle))
}

/// Record a view/listen/read signal. Authenticated calls dedup on the user
/// id; anonymous calls fall back to the device or session id in the body.
pub async fn record_view(
    state: web::Data<AppState>,
    path: web::Path<(String, String)>,
    identity: MaybeUserId,
    req: web::Json<RecordViewRequest>,
) -> Result<HttpResponse> {
    let (content_type, content_id) = path.into_inner();
    let content_type = parse_content_type(&content_type)?;
    let content_id = parse_id(&content_id, "content id")?;
    let req = req.into_inner();

    if let Some(pct) = req.progress_pct {
        if !(0.0..=1.0).contains(&pct) {
            return Err(AppError::BadRequest(
                "progress_pct must be between 0 and 1".into(),
            ));
        }
    }
    if req.duration_ms.is_some_and(|d| d < 0) {
        return Err(AppError::BadRequest("duration_ms must be non-negative".into()));
    }

    let viewer = ViewerIdentity::from_parts(identity.0, req.device_id.clone(), req.session_id.clone())
        .ok_or_else(|| {
            AppError::BadRequest("a user, device, or session identity is required".into())
        })?;

    let signal = ViewSignal {
        duration_ms: req.duration_ms,
        progress_pct: req.progress_pct,
        is_complete: req.is_complete,
        source: req.source,
        window: req.window_granularity,
    };

    let outcome = state
        .views
        .record_view(&viewer, &content_type, content_id, signal)
        .await?;

    Ok(HttpResponse::Ok().json(outcome))
}

/// Counts plus per-user interaction flags for one content item.
pub async fn get_metadata(
    state: web::Data<AppState>,
    path: web::Path<(String, String)>,
    identity: MaybeUserId,
    query: web::Query<MetadataQuery>,
) -> Result<HttpResponse> {
    let (content_type, content_id) = path.into_inner();
    let content_type = parse_content_type(&content_type)?;
    let content_id = parse_id(&content_id, "content id")?;

    let counts = state.cache.get_counts(&content_type, content_id).await?;

    let (liked, viewed) = match identity.0 {
        Some(user_id) => {
            let liked = state.likes.has_liked(user_id, &content_type, content_id).await?;
            let viewed = state
                .views
                .has_viewed(&ViewerIdentity::User(user_id), &content_type, content_id)
                .await?;
            (liked, viewed)
        }
        None => {
            let viewed = match query
                .into_inner()
                .device_id
                .filter(|d| !d.is_empty())
            {
                Some(device_id) => {
                    state
                        .views
                        .has_viewed(
                            &ViewerIdentity::Device(device_id),
                            &content_type,
                            content_id,
                        )
                        .await?
                }
                None => false,
            };
            (false, viewed)
        }
    };

    Ok(HttpResponse::Ok().json(ContentMetadataResponse {
        content_id,
        content_type,
        like_count: counts.like_count,
        view_count: counts.view_count,
        comment_count: counts.comment_count,
        share_count: counts.share_count,
        bookmark_count: counts.bookmark_count,
        liked,
        viewed,
    }))
}

/// Batch counts/flags for a list of content ids of one type.
pub async fn batch_metadata(
    state: web::Data<AppState>,
    identity: MaybeUserId,
    req: web::Json<BatchMetadataRequest>,
) -> Result<HttpResponse> {
    let req = req.into_inner();
    let content_type = parse_content_type(&req.content_type)?;

    const MAX_BATCH: usize = 100;
    if req.content_ids.len() > MAX_BATCH {
        return Err(AppError::BadRequest(format!(
            "at most {MAX_BATCH} content ids per request"
        )));
    }

    let counts = state
        .cache
        .batch_get_counts(&content_type, &req.content_ids)
        .await?;

    let (liked_map, viewed_map) = match identity.0 {
        Some(user_id) => (
            state
                .likes
                .batch_has_liked(user_id, &content_type, &req.content_ids)
                .await?,
            state
                .views
                .batch_has_viewed(user_id, &content_type, &req.content_ids)
                .await?,
        ),
        None => Default::default(),
    };

    let items: Vec<ContentMetadataResponse> = req
        .content_ids
        .iter()
        .map(|content_id| {
            let c = counts.get(content_id).cloned().unwrap_or_default();
            ContentMetadataResponse {
                content_id: *content_id,
                content_type: content_type.clone(),
                like_count: c.like_count,
                view_count: c.view_count,
                comment_count: c.comment_count,
                share_count: c.share_count,
                bookmark_count: c.bookmark_count,
                liked: liked_map.get(content_id).copied().unwrap_or(false),
                viewed: viewed_map.get(content_id).copied().unwrap_or(false),
            }
        })
        .collect();

    Ok(HttpResponse::Ok().json(items))
}
