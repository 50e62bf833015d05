/// Playback session handlers - start, progress, pause, resume, end
use actix_web::{web, HttpResponse};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::Result;
use crate::handlers::{parse_id, AppState};
use crate::middleware::UserId;

#[derive(Debug, Deserialize)]
pub struct StartPlaybackRequest {
    /// Total media duration in seconds
    pub duration: f64,
    /// Starting position in seconds (e.g., resuming a bookmark)
    #[serde(default)]
    pub position: f64,
    /// Free-form client/device descriptor, logged only
    pub device_info: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ProgressRequest {
    pub session_id: Uuid,
    /// Current position in seconds
    pub position: f64,
    /// Client-side timestamp of the ping; out-of-order values are tolerated
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct SessionRequest {
    pub session_id: Uuid,
}

pub async fn start_playback(
    state: web::Data<AppState>,
    path: web::Path<String>,
    user: UserId,
    req: web::Json<StartPlaybackRequest>,
) -> Result<HttpResponse> {
    let media_id = parse_id(&path.into_inner(), "media id")?;
    let req = req.into_inner();

    if let Some(device_info) = &req.device_info {
        tracing::debug!(user_id = %user.0, %media_id, device_info, "playback start");
    }

    let outcome = state
        .playback
        .start(user.0, media_id, req.duration, req.position)
        .await?;

    Ok(HttpResponse::Created().json(outcome))
}

pub async fn progress_playback(
    state: web::Data<AppState>,
    user: UserId,
    req: web::Json<ProgressRequest>,
) -> Result<HttpResponse> {
    let req = req.into_inner();
    let session = state
        .playback
        .progress(user.0, req.session_id, req.position, req.timestamp)
        .await?;

    Ok(HttpResponse::Ok().json(session))
}

pub async fn pause_playback(
    state: web::Data<AppState>,
    user: UserId,
    req: web::Json<SessionRequest>,
) -> Result<HttpResponse> {
    let session = state.playback.pause(user.0, req.session_id).await?;
    Ok(HttpResponse::Ok().json(session))
}

pub async fn resume_playback(
    state: web::Data<AppState>,
    user: UserId,
    req: web::Json<SessionRequest>,
) -> Result<HttpResponse> {
    let session = state.playback.resume(user.0, req.session_id).await?;
    Ok(HttpResponse::Ok().json(session))
}

pub async fn end_playback(
    state: web::Data<AppState>,
    user: UserId,
    req: web::Json<SessionRequest>,
) -> Result<HttpResponse> {
    let outcome = state.playback.end(user.0, req.session_id).await?;
    Ok(HttpResponse::Ok().json(outcome))
}
