//! Video routes.
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | GET | `/api/videos` | List videos, newest first |
//! | POST | `/api/videos` | Register a stored upload |
//! | GET | `/api/videos/{id}` | Get a single video |
//! | PATCH | `/api/videos/{id}` | Attach probed metadata |
//! | DELETE | `/api/videos/{id}` | Delete a video (409 while in use) |
//! | POST | `/api/videos/split` | Submit a split job |
//! | POST | `/api/videos/merge` | Submit a merge job |

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use shared::{JobError, JobKind, JobOptions, NewVideo, VideoFile, VideoPatch};
use tracing::info;

use super::error::ApiResult;
use super::jobs::JobCreated;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/videos", get(list_videos).post(register_video))
        .route("/api/videos/split", post(split_video))
        .route("/api/videos/merge", post(merge_videos))
        .route(
            "/api/videos/{id}",
            get(get_video).patch(update_video).delete(delete_video),
        )
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitRequest {
    pub video_id: String,
    pub segment_duration: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeRequest {
    pub video_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResponse {
    pub success: bool,
    pub id: String,
    pub media_deleted: bool,
}

async fn list_videos(State(state): State<AppState>) -> Json<Vec<VideoFile>> {
    Json(state.query.list_videos())
}

async fn register_video(
    State(state): State<AppState>,
    payload: Result<Json<NewVideo>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<VideoFile>)> {
    let Json(new) = payload?;
    let video = state.manager.register_video(new)?;
    Ok((StatusCode::CREATED, Json(video)))
}

async fn get_video(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<VideoFile>> {
    let video = state
        .query
        .get_video(&id)
        .ok_or_else(|| JobError::video_not_found(id))?;
    Ok(Json(video))
}

async fn update_video(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<VideoPatch>, JsonRejection>,
) -> ApiResult<Json<VideoFile>> {
    let Json(patch) = payload?;
    Ok(Json(state.manager.update_video(&id, patch)?))
}

async fn delete_video(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<DeleteResponse>> {
    let video = state.manager.delete_video(&id)?;
    let media_deleted = state.remove_media(vec![video.path]).await > 0;
    info!(video_id = %id, media_deleted, "Video deleted via API");
    Ok(Json(DeleteResponse {
        success: true,
        id,
        media_deleted,
    }))
}

async fn split_video(
    State(state): State<AppState>,
    payload: Result<Json<SplitRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<JobCreated>)> {
    let Json(req) = payload?;
    let job = state.manager.create_job(
        JobKind::Split,
        vec![req.video_id],
        JobOptions {
            segment_duration: Some(req.segment_duration),
            ..Default::default()
        },
    )?;
    Ok((StatusCode::CREATED, Json(JobCreated::from(job))))
}

async fn merge_videos(
    State(state): State<AppState>,
    payload: Result<Json<MergeRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<JobCreated>)> {
    let Json(req) = payload?;
    let job = state
        .manager
        .create_job(JobKind::Merge, req.video_ids, JobOptions::default())?;
    Ok((StatusCode::CREATED, Json(JobCreated::from(job))))
}
