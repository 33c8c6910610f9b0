//! Cleanup trigger, client configuration and health.

use axum::{extract::State, routing::get, routing::post, Json, Router};
use serde::Serialize;
use shared::RetentionPolicy;
use tracing::info;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/cleanup", post(cleanup))
        .route("/api/config/polling", get(polling_config))
        .route("/health", get(health))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupResponse {
    pub success: bool,
    pub removed_jobs: usize,
    pub removed_videos: usize,
    pub media_deleted: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollingResponse {
    pub interval_ms: u64,
}

/// Explicit cleanup: drops every terminal job and unreferenced video.
/// Active jobs, their videos and the stats survive.
async fn cleanup(State(state): State<AppState>) -> Json<CleanupResponse> {
    let report = RetentionPolicy::sweep_all(state.manager.store());
    let files = report
        .removed_videos
        .iter()
        .map(|v| v.path.clone())
        .collect();
    let media_deleted = state.remove_media(files).await;
    state.persist().await;

    info!(
        jobs = report.removed_jobs.len(),
        videos = report.removed_videos.len(),
        media_deleted,
        "Cleanup completed"
    );
    Json(CleanupResponse {
        success: true,
        removed_jobs: report.removed_jobs.len(),
        removed_videos: report.removed_videos.len(),
        media_deleted,
    })
}

async fn polling_config(State(state): State<AppState>) -> Json<PollingResponse> {
    Json(PollingResponse {
        interval_ms: state.config.polling.interval_ms,
    })
}

async fn health() -> &'static str {
    "ok"
}
