//! Error taxonomy for the job lifecycle core.
//!
//! Lifecycle and store operations return [`JobError`] so that callers (HTTP
//! handlers, workers) can match on the failure kind. Processing failures are
//! not represented here: a worker reports them through `fail`, and the
//! message lives on the job record.

use crate::models::JobStatus;
use std::fmt;
use thiserror::Error;

/// Result type for lifecycle and store operations.
pub type JobResult<T> = std::result::Result<T, JobError>;

/// Kind of record an operation was looking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Video,
    Job,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Entity::Video => write!(f, "video"),
            Entity::Job => write!(f, "job"),
        }
    }
}

/// Errors returned by the entity store and the job lifecycle manager.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JobError {
    /// Bad arity or parameters; no job record is created.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Operation on an unknown identifier.
    #[error("{entity} not found: {id}")]
    NotFound { entity: Entity, id: String },

    /// Another worker already owns the job. Back off, do not retry the claim.
    #[error("Job {0} has already been claimed")]
    AlreadyClaimed(String),

    /// Progress update lower than the last recorded value.
    #[error("Stale progress for job {id}: {requested}% is below {last}%")]
    StaleProgress { id: String, last: u8, requested: u8 },

    /// Operation not allowed in the job's current state.
    #[error("Job {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: String,
        from: JobStatus,
        to: JobStatus,
    },

    /// Video still referenced by a pending or processing job.
    #[error("Video {video_id} is in use by active job {job_id}")]
    VideoInUse { video_id: String, job_id: String },
}

impl JobError {
    /// Create an invalid request error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// Create a not-found error for a job.
    pub fn job_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: Entity::Job,
            id: id.into(),
        }
    }

    /// Create a not-found error for a video.
    pub fn video_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: Entity::Video,
            id: id.into(),
        }
    }

    /// Short machine-readable code, used on the wire.
    pub fn code(&self) -> &'static str {
        match self {
            JobError::InvalidRequest(_) => "INVALID_REQUEST",
            JobError::NotFound { .. } => "NOT_FOUND",
            JobError::AlreadyClaimed(_) => "ALREADY_CLAIMED",
            JobError::StaleProgress { .. } => "STALE_PROGRESS",
            JobError::InvalidTransition { .. } => "INVALID_TRANSITION",
            JobError::VideoInUse { .. } => "VIDEO_IN_USE",
        }
    }
}
