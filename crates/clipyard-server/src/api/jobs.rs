//! Job routes: submission, polling, and the worker-facing lifecycle calls.
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | GET | `/api/jobs` | List jobs, newest first |
//! | POST | `/api/jobs` | Submit a job of any kind |
//! | GET | `/api/jobs/{id}` | Get a single job |
//! | POST | `/api/jobs/claim` | Claim the oldest pending job (204 if none) |
//! | POST | `/api/jobs/{id}/claim` | Claim a specific job |
//! | POST | `/api/jobs/{id}/progress` | Report progress |
//! | POST | `/api/jobs/{id}/complete` | Complete with outputs |
//! | POST | `/api/jobs/{id}/fail` | Record a failure |

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use shared::{Job, JobError, JobKind, JobOptions};

use super::error::ApiResult;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/jobs", get(list_jobs).post(create_job))
        .route("/api/jobs/claim", post(claim_next))
        .route("/api/jobs/{id}", get(get_job))
        .route("/api/jobs/{id}/claim", post(claim_job))
        .route("/api/jobs/{id}/progress", post(report_progress))
        .route("/api/jobs/{id}/complete", post(complete_job))
        .route("/api/jobs/{id}/fail", post(fail_job))
}

/// Response to a job submission: the job plus its id under `jobId`
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobCreated {
    pub job_id: String,
    #[serde(flatten)]
    pub job: Job,
}

impl From<Job> for JobCreated {
    fn from(job: Job) -> Self {
        Self {
            job_id: job.id.clone(),
            job,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateJobRequest {
    #[serde(rename = "type")]
    pub kind: JobKind,
    #[serde(default)]
    pub input_videos: Vec<String>,
    #[serde(flatten)]
    pub options: JobOptions,
}

#[derive(Debug, Default, Deserialize)]
pub struct ClaimQuery {
    /// Only claim jobs of this kind
    pub kind: Option<JobKind>,
}

#[derive(Debug, Deserialize)]
pub struct ProgressRequest {
    pub progress: u8,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteRequest {
    pub output_videos: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct FailRequest {
    pub error: String,
}

async fn list_jobs(State(state): State<AppState>) -> Json<Vec<Job>> {
    Json(state.query.list_jobs())
}

async fn create_job(
    State(state): State<AppState>,
    payload: Result<Json<CreateJobRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<JobCreated>)> {
    let Json(req) = payload?;
    let job = state
        .manager
        .create_job(req.kind, req.input_videos, req.options)?;
    Ok((StatusCode::CREATED, Json(JobCreated::from(job))))
}

async fn get_job(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Job>> {
    let job = state
        .query
        .get_job(&id)
        .ok_or_else(|| JobError::job_not_found(id))?;
    Ok(Json(job))
}

async fn claim_next(
    State(state): State<AppState>,
    query: Result<Query<ClaimQuery>, QueryRejection>,
) -> ApiResult<Response> {
    let Query(query) = query?;
    let kinds: Vec<JobKind> = query.kind.into_iter().collect();
    Ok(match state.manager.claim_next(&kinds) {
        Some(job) => Json(job).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    })
}

async fn claim_job(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Job>> {
    Ok(Json(state.manager.claim(&id)?))
}

async fn report_progress(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<ProgressRequest>, JsonRejection>,
) -> ApiResult<Json<Job>> {
    let Json(req) = payload?;
    Ok(Json(state.manager.report_progress(&id, req.progress)?))
}

async fn complete_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<CompleteRequest>, JsonRejection>,
) -> ApiResult<Json<Job>> {
    let Json(req) = payload?;
    Ok(Json(state.manager.complete(&id, req.output_videos)?))
}

async fn fail_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<FailRequest>, JsonRejection>,
) -> ApiResult<Json<Job>> {
    let Json(req) = payload?;
    Ok(Json(state.manager.fail(&id, &req.error)?))
}
