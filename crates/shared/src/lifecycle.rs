//! Job lifecycle management.
//!
//! This module owns job creation, state transitions, progress updates and
//! completion/failure, on top of the [`Store`]. Every transition is one short
//! atomic store write, so two workers racing to claim the same job can never
//! both succeed, and a job's move to `completed` lands together with its
//! stats update.
//!
//! The manager performs no retries. A caller observing `error` submits a new
//! job.

use crate::config::LimitsConfig;
use crate::error::{JobError, JobResult};
use crate::models::*;
use crate::stats;
use crate::store::{Store, StoreSnapshot, StoreTxn};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Message recorded on jobs that were processing when the process stopped
pub const INTERRUPTED_MESSAGE: &str = "Interrupted by restart";

/// Job lifecycle manager
#[derive(Debug, Clone)]
pub struct JobManager {
    store: Arc<Store>,
    limits: LimitsConfig,
}

impl JobManager {
    /// Create a manager over the given store
    pub fn new(store: Arc<Store>, limits: LimitsConfig) -> Self {
        Self { store, limits }
    }

    /// Rebuild state from a persisted snapshot.
    ///
    /// Jobs that were `processing` lost their worker with the previous
    /// process; they are finalized as `error` rather than resurrected.
    /// Pending jobs stay pending.
    pub fn restore(snapshot: StoreSnapshot, limits: LimitsConfig) -> Self {
        let now = now_millis();
        let mut interrupted = 0usize;
        let jobs = snapshot
            .jobs
            .into_iter()
            .map(|mut job| {
                if job.status == JobStatus::Processing {
                    job.status = JobStatus::Error;
                    job.error = Some(INTERRUPTED_MESSAGE.to_string());
                    job.updated_at = now;
                    interrupted += 1;
                }
                job
            })
            .collect();

        if interrupted > 0 {
            warn!(count = interrupted, "Marked interrupted jobs as failed");
        }

        let store = Store::from_snapshot(StoreSnapshot { jobs, ..snapshot });
        Self::new(Arc::new(store), limits)
    }

    /// Shared handle to the underlying store
    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn limits(&self) -> &LimitsConfig {
        &self.limits
    }

    // ========== Videos ==========

    /// Register a stored media file as a video
    pub fn register_video(&self, new: NewVideo) -> JobResult<VideoFile> {
        if new.filename.trim().is_empty() || new.path.trim().is_empty() {
            return Err(JobError::invalid("filename and path are required"));
        }
        self.limits
            .validate_extension(&new.original_name)
            .map_err(JobError::InvalidRequest)?;
        self.limits
            .validate_size(new.size)
            .map_err(JobError::InvalidRequest)?;
        if let Some(duration) = new.duration {
            validate_duration(duration)?;
        }

        let video = VideoFile {
            id: Uuid::new_v4().to_string(),
            filename: new.filename,
            original_name: new.original_name,
            size: new.size,
            duration: new.duration,
            path: new.path,
            codec: new.codec,
            resolution: new.resolution,
            bitrate: new.bitrate,
            created_at: now_millis(),
        };
        self.store.put_video(video.clone())?;

        info!(
            video_id = %video.id,
            original_name = %video.original_name,
            size = video.size,
            "Registered video"
        );
        Ok(video)
    }

    /// Attach probed metadata (duration, codec, ...) to a video
    pub fn update_video(&self, id: &str, patch: VideoPatch) -> JobResult<VideoFile> {
        if patch.is_empty() {
            return Err(JobError::invalid("no fields to update"));
        }
        if let Some(duration) = patch.duration {
            validate_duration(duration)?;
        }
        let video = self.store.update_video(id, |video| {
            patch.apply(video);
            Ok(())
        })?;
        debug!(video_id = %id, duration = ?video.duration, "Updated video metadata");
        Ok(video)
    }

    /// Delete a video record.
    ///
    /// Fails with [`JobError::VideoInUse`] while a pending or processing job
    /// references the video. The check and the removal happen under the same
    /// write lock. Returns the removed record so the caller can drop its
    /// backing media outside the lock.
    pub fn delete_video(&self, id: &str) -> JobResult<VideoFile> {
        let removed = self.store.write(|txn| {
            if txn.video(id).is_none() {
                return Err(JobError::video_not_found(id));
            }
            if let Some(job) = active_job_referencing(txn, id) {
                return Err(JobError::VideoInUse {
                    video_id: id.to_string(),
                    job_id: job.id.clone(),
                });
            }
            txn.remove_video(id).ok_or_else(|| JobError::video_not_found(id))
        })?;

        info!(video_id = %id, "Deleted video");
        Ok(removed)
    }

    // ========== Jobs ==========

    /// Validate and insert a new job in `pending`; returns immediately.
    ///
    /// Arity: split takes exactly one input, merge at least two, download
    /// none, extract-frames exactly one. Invalid requests never produce a
    /// job record.
    pub fn create_job(
        &self,
        kind: JobKind,
        input_videos: Vec<String>,
        options: JobOptions,
    ) -> JobResult<Job> {
        validate_arity(kind, &input_videos, &options, &self.limits)?;

        let job = self.store.write(|txn| {
            for video_id in &input_videos {
                let video = txn
                    .video(video_id)
                    .ok_or_else(|| JobError::video_not_found(video_id.as_str()))?;

                if kind == JobKind::Split {
                    if let (Some(duration), Some(segment)) =
                        (video.duration, options.segment_duration)
                    {
                        if f64::from(segment) > duration {
                            return Err(JobError::invalid(
                                "Segment duration exceeds video length",
                            ));
                        }
                    }
                }
            }

            let job = Job::new(
                Uuid::new_v4().to_string(),
                kind,
                input_videos,
                options,
                now_millis(),
            );
            txn.insert_job(job.clone())?;
            Ok(job)
        })?;

        info!(
            job_id = %job.id,
            kind = %job.kind,
            inputs = job.input_videos.len(),
            "Created job"
        );
        Ok(job)
    }

    /// Take ownership of a pending job: `pending -> processing`.
    ///
    /// At most one concurrent claim succeeds; the others get
    /// [`JobError::AlreadyClaimed`].
    pub fn claim(&self, id: &str) -> JobResult<Job> {
        let now = now_millis();
        let job = self
            .store
            .update_job(id, |job| start(job, now))
            .inspect_err(|e| debug!(job_id = %id, error = %e, "Claim rejected"))?;

        info!(job_id = %id, kind = %job.kind, "Job claimed");
        Ok(job)
    }

    /// Claim the oldest pending job, optionally restricted to some kinds.
    ///
    /// Returns `None` when nothing is pending.
    pub fn claim_next(&self, kinds: &[JobKind]) -> Option<Job> {
        let now = now_millis();
        let claimed = self.store.write(|txn| {
            let next_id = txn
                .oldest_job(|j| {
                    j.status == JobStatus::Pending
                        && (kinds.is_empty() || kinds.contains(&j.kind))
                })
                .map(|j| j.id.clone())?;
            txn.update_job(&next_id, |job| start(job, now)).ok()
        });

        match &claimed {
            Some(job) => info!(job_id = %job.id, kind = %job.kind, "Dequeued job"),
            None => debug!("No pending jobs"),
        }
        claimed
    }

    /// Record worker progress. Only valid while `processing`.
    ///
    /// `percent` must be in `0..=99` (100 is reserved for completion) and not
    /// below the last recorded value. Lower values are rejected with
    /// [`JobError::StaleProgress`] and leave the job untouched.
    pub fn report_progress(&self, id: &str, percent: u8) -> JobResult<Job> {
        if percent >= 100 {
            return Err(JobError::invalid(
                "progress must be below 100; use complete to finish a job",
            ));
        }
        let now = now_millis();

        let result = self.store.update_job(id, |job| {
            if job.status != JobStatus::Processing {
                return Err(JobError::InvalidTransition {
                    id: job.id.clone(),
                    from: job.status,
                    to: JobStatus::Processing,
                });
            }
            if percent < job.progress {
                return Err(JobError::StaleProgress {
                    id: job.id.clone(),
                    last: job.progress,
                    requested: percent,
                });
            }
            job.progress = percent;
            job.updated_at = now;
            Ok(())
        });

        match result {
            Ok(job) => {
                debug!(job_id = %id, progress = job.progress, "Updated job progress");
                Ok(job)
            }
            Err(e @ JobError::StaleProgress { .. }) => {
                warn!(job_id = %id, error = %e, "Ignoring stale progress update");
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// Finish a job: `processing -> completed`, progress 100.
    ///
    /// The stats update is applied in the same write as the transition, so no
    /// reader sees a completed job with stale stats. Output ids need not be
    /// registered yet, but an output that was registered and has since been
    /// removed is rejected.
    pub fn complete(&self, id: &str, output_videos: Vec<String>) -> JobResult<Job> {
        if output_videos.is_empty() {
            return Err(JobError::invalid("a completed job needs at least one output"));
        }
        let now = now_millis();

        let (job, delta) = self.store.write(|txn| {
            let current = txn.job(id).ok_or_else(|| JobError::job_not_found(id))?;
            if current.status != JobStatus::Processing {
                return Err(JobError::InvalidTransition {
                    id: id.to_string(),
                    from: current.status,
                    to: JobStatus::Completed,
                });
            }

            if let Some(gone) = output_videos.iter().find(|o| txn.video_was_removed(o)) {
                return Err(JobError::invalid(format!(
                    "output video {} was removed before completion",
                    gone
                )));
            }

            let durations: Vec<Option<f64>> = current
                .input_videos
                .iter()
                .map(|v| txn.video(v).and_then(|video| video.duration))
                .collect();
            let delta = stats::completion_delta(current, &durations, output_videos.len());

            let job = txn.update_job(id, |job| {
                job.status = JobStatus::Completed;
                job.progress = 100;
                job.output_videos = output_videos;
                job.completed_at = Some(now);
                job.updated_at = now;
                Ok(())
            })?;
            txn.stats_mut().apply(&delta);
            Ok((job, delta))
        })?;

        info!(
            job_id = %id,
            kind = %job.kind,
            outputs = job.output_videos.len(),
            segments = delta.segments_created,
            seconds = delta.time_saved,
            "Job completed"
        );
        Ok(job)
    }

    /// Record a failure: `processing -> error`, or `pending -> error` when
    /// the job never got claimed. Stats are left untouched.
    pub fn fail(&self, id: &str, message: &str) -> JobResult<Job> {
        let message = match message.trim() {
            "" => "Unknown error".to_string(),
            m => m.to_string(),
        };
        let now = now_millis();

        let job = self.store.update_job(id, |job| {
            if job.status.is_terminal() {
                return Err(JobError::InvalidTransition {
                    id: job.id.clone(),
                    from: job.status,
                    to: JobStatus::Error,
                });
            }
            job.status = JobStatus::Error;
            job.error = Some(message.clone());
            job.updated_at = now;
            Ok(())
        })?;

        warn!(job_id = %id, error = %message, "Job failed");
        Ok(job)
    }

    /// Processing jobs with no update for longer than `timeout`.
    ///
    /// Stalls are reported only; the worker owns its own timeout policy.
    pub fn stalled_jobs(&self, now: i64, timeout: Duration) -> Vec<Job> {
        let cutoff = now.saturating_sub(timeout.as_millis() as i64);
        self.store
            .list_jobs()
            .into_iter()
            .filter(|j| j.status == JobStatus::Processing && j.updated_at < cutoff)
            .collect()
    }
}

/// `pending -> processing`
fn start(job: &mut Job, now: i64) -> JobResult<()> {
    match job.status {
        JobStatus::Pending => {
            job.status = JobStatus::Processing;
            job.progress = 0;
            job.started_at = Some(now);
            job.updated_at = now;
            Ok(())
        }
        JobStatus::Processing => Err(JobError::AlreadyClaimed(job.id.clone())),
        terminal => Err(JobError::InvalidTransition {
            id: job.id.clone(),
            from: terminal,
            to: JobStatus::Processing,
        }),
    }
}

fn active_job_referencing<'a>(txn: &'a StoreTxn<'_>, video_id: &str) -> Option<&'a Job> {
    txn.jobs()
        .find(|j| j.status.is_active() && j.references(video_id))
}

fn validate_duration(duration: f64) -> JobResult<()> {
    if duration.is_finite() && duration >= 0.0 {
        Ok(())
    } else {
        Err(JobError::invalid("duration must be a non-negative number of seconds"))
    }
}

fn validate_arity(
    kind: JobKind,
    inputs: &[String],
    options: &JobOptions,
    limits: &LimitsConfig,
) -> JobResult<()> {
    match kind {
        JobKind::Split => {
            if inputs.len() != 1 {
                return Err(JobError::invalid(format!(
                    "split requires exactly 1 input video, got {}",
                    inputs.len()
                )));
            }
            match options.segment_duration {
                Some(s) if s >= 1 && s <= limits.max_segment_duration_seconds => Ok(()),
                Some(_) => Err(JobError::invalid(format!(
                    "segmentDuration must be between 1 and {} seconds",
                    limits.max_segment_duration_seconds
                ))),
                None => Err(JobError::invalid("segmentDuration is required for split")),
            }
        }
        JobKind::Merge => {
            if inputs.len() < 2 {
                return Err(JobError::invalid("Need at least 2 videos to merge"));
            }
            Ok(())
        }
        JobKind::Download => {
            if !inputs.is_empty() {
                return Err(JobError::invalid("download takes no input videos"));
            }
            match options.source_url.as_deref().map(str::trim) {
                Some(url) if url.starts_with("http://") || url.starts_with("https://") => Ok(()),
                Some(_) => Err(JobError::invalid("sourceUrl must be an http(s) URL")),
                None => Err(JobError::invalid("sourceUrl is required for download")),
            }
        }
        JobKind::ExtractFrames => {
            if inputs.len() != 1 {
                return Err(JobError::invalid(format!(
                    "extract-frames requires exactly 1 input video, got {}",
                    inputs.len()
                )));
            }
            if options.frame_interval == Some(0) {
                return Err(JobError::invalid("frameInterval must be at least 1 second"));
            }
            Ok(())
        }
    }
}
