//! Retention / cleanup policy.
//!
//! A sweep removes terminal jobs past the retention window, then videos that
//! no remaining job references. Anything referenced by a pending or
//! processing job is never touched, and stats are never reset. Videos
//! registered while a job is processing may be that job's not-yet-reported
//! outputs, so they are kept until the job finishes. Removal of
//! backing media is left to the caller (see [`crate::paths::DataPaths`]), so
//! no file I/O happens while the store lock is held.

use crate::config::RetentionConfig;
use crate::models::{Job, JobStatus, VideoFile};
use crate::store::{Store, StoreTxn};
use serde::Serialize;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info};

/// Age windows applied by a time-based sweep
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// Terminal jobs older than this are removed
    pub job_retention: Duration,
    /// Unreferenced videos younger than this are kept
    pub orphan_grace: Duration,
}

/// Records removed by one sweep
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupReport {
    pub removed_jobs: Vec<String>,
    pub removed_videos: Vec<VideoFile>,
}

impl CleanupReport {
    pub fn is_empty(&self) -> bool {
        self.removed_jobs.is_empty() && self.removed_videos.is_empty()
    }
}

impl RetentionPolicy {
    pub fn from_config(config: &RetentionConfig) -> Self {
        Self {
            job_retention: Duration::from_secs(config.job_retention_hours.saturating_mul(3600)),
            orphan_grace: Duration::from_secs(config.orphan_grace_minutes.saturating_mul(60)),
        }
    }

    /// Time-based sweep as of `now` (ms since epoch)
    pub fn sweep(&self, store: &Store, now: i64) -> CleanupReport {
        let job_cutoff = now.saturating_sub(millis(self.job_retention));
        let video_cutoff = now.saturating_sub(millis(self.orphan_grace));
        let report = store.write(|txn| purge(txn, job_cutoff, video_cutoff));
        log_report("Retention sweep", &report);
        report
    }

    /// Explicit cleanup: ignores the age windows.
    ///
    /// Removes every terminal job and every video left unreferenced. Active
    /// jobs, the videos they use and videos registered since the oldest
    /// processing job started all survive.
    pub fn sweep_all(store: &Store) -> CleanupReport {
        let report = store.write(|txn| purge(txn, i64::MAX, i64::MAX));
        log_report("Explicit cleanup", &report);
        report
    }
}

fn millis(d: Duration) -> i64 {
    i64::try_from(d.as_millis()).unwrap_or(i64::MAX)
}

/// Age of a terminal job for retention purposes
fn finished_at(job: &Job) -> i64 {
    job.completed_at.unwrap_or(job.updated_at)
}

fn purge(txn: &mut StoreTxn<'_>, job_cutoff: i64, video_cutoff: i64) -> CleanupReport {
    let expired: Vec<String> = txn
        .jobs()
        .filter(|j| j.status.is_terminal() && finished_at(j) <= job_cutoff)
        .map(|j| j.id.clone())
        .collect();
    for id in &expired {
        txn.remove_job(id);
    }

    // Computed after job removal: videos of purged jobs become orphans.
    let referenced: HashSet<String> = txn
        .jobs()
        .flat_map(|j| j.input_videos.iter().chain(j.output_videos.iter()))
        .cloned()
        .collect();

    let in_flight_since = txn
        .jobs()
        .filter(|j| j.status == JobStatus::Processing)
        .map(|j| j.started_at.unwrap_or(j.created_at))
        .min()
        .unwrap_or(i64::MAX);
    let video_cutoff = video_cutoff.min(in_flight_since.saturating_sub(1));

    let orphans: Vec<String> = txn
        .videos()
        .filter(|v| !referenced.contains(&v.id) && v.created_at <= video_cutoff)
        .map(|v| v.id.clone())
        .collect();
    let removed_videos = orphans
        .iter()
        .filter_map(|id| txn.remove_video(id))
        .collect();

    CleanupReport {
        removed_jobs: expired,
        removed_videos,
    }
}

fn log_report(what: &str, report: &CleanupReport) {
    if report.is_empty() {
        debug!("{}: nothing to remove", what);
    } else {
        info!(
            jobs = report.removed_jobs.len(),
            videos = report.removed_videos.len(),
            "{} removed records",
            what
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LimitsConfig;
    use crate::error::JobResult;
    use crate::lifecycle::JobManager;
    use crate::models::*;
    use std::sync::Arc;

    const HOUR: i64 = 3600 * 1000;

    fn setup() -> JobManager {
        JobManager::new(Arc::new(Store::new()), LimitsConfig::default())
    }

    fn upload(m: &JobManager, name: &str) -> VideoFile {
        m.register_video(NewVideo {
            filename: format!("{}.mp4", name),
            original_name: format!("{}.mp4", name),
            size: 2048,
            duration: Some(30.0),
            path: format!("/data/uploads/{}.mp4", name),
            ..Default::default()
        })
        .expect("register video")
    }

    fn policy() -> RetentionPolicy {
        RetentionPolicy::from_config(&RetentionConfig::default())
    }

    fn split(m: &JobManager, video: &VideoFile) -> JobResult<Job> {
        m.create_job(
            JobKind::Split,
            vec![video.id.clone()],
            JobOptions {
                segment_duration: Some(10),
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_from_config() {
        let p = policy();
        assert_eq!(p.job_retention, Duration::from_secs(24 * 3600));
        assert_eq!(p.orphan_grace, Duration::from_secs(3600));
    }

    #[test]
    fn test_recent_records_survive() -> JobResult<()> {
        let m = setup();
        let video = upload(&m, "fresh");
        let job = split(&m, &video)?;
        m.claim(&job.id)?;
        m.complete(&job.id, vec!["seg".into()])?;

        let report = policy().sweep(m.store(), now_millis());
        assert!(report.is_empty());
        assert_eq!(m.store().counts(), (1, 1));
        Ok(())
    }

    #[test]
    fn test_expired_jobs_then_orphans_removed() -> JobResult<()> {
        let m = setup();
        let video = upload(&m, "old");
        let job = split(&m, &video)?;
        m.claim(&job.id)?;
        m.complete(&job.id, vec!["seg".into()])?;
        let stats_before = m.store().get_stats();

        let report = policy().sweep(m.store(), now_millis() + 25 * HOUR);
        assert_eq!(report.removed_jobs, vec![job.id.clone()]);
        assert_eq!(report.removed_videos.len(), 1);
        assert_eq!(report.removed_videos[0].id, video.id);
        assert_eq!(m.store().counts(), (0, 0));
        assert_eq!(m.store().get_stats(), stats_before);
        Ok(())
    }

    #[test]
    fn test_active_references_are_never_removed() -> JobResult<()> {
        let m = setup();
        let pending_input = upload(&m, "pending");
        let processing_input = upload(&m, "processing");
        split(&m, &pending_input)?;
        let running = split(&m, &processing_input)?;
        m.claim(&running.id)?;

        let far_future = now_millis() + 1000 * HOUR;
        let report = policy().sweep(m.store(), far_future);
        assert!(report.is_empty());

        let report = RetentionPolicy::sweep_all(m.store());
        assert!(report.is_empty());
        assert!(m.store().get_video(&pending_input.id).is_some());
        assert!(m.store().get_video(&processing_input.id).is_some());
        Ok(())
    }

    #[test]
    fn test_orphan_grace_window() {
        let m = setup();
        let video = upload(&m, "orphan");

        let report = policy().sweep(m.store(), now_millis() + HOUR / 2);
        assert!(report.is_empty());

        let report = policy().sweep(m.store(), now_millis() + 2 * HOUR);
        assert_eq!(report.removed_videos.len(), 1);
        assert_eq!(report.removed_videos[0].id, video.id);
    }

    #[test]
    fn test_outputs_registered_during_processing_survive() -> JobResult<()> {
        let m = setup();
        let input = upload(&m, "input");
        let job = split(&m, &input)?;
        m.claim(&job.id)?;
        let output = upload(&m, "seg1");

        let report = RetentionPolicy::sweep_all(m.store());
        assert!(report.is_empty());
        let report = policy().sweep(m.store(), now_millis() + 1000 * HOUR);
        assert!(report.is_empty());

        let done = m.complete(&job.id, vec![output.id.clone()])?;
        assert_eq!(done.output_videos, vec![output.id.clone()]);
        assert!(m.store().get_video(&output.id).is_some());
        Ok(())
    }

    #[test]
    fn test_huge_windows_saturate() {
        let p = RetentionPolicy::from_config(&RetentionConfig {
            job_retention_hours: u64::MAX,
            orphan_grace_minutes: u64::MAX,
            ..Default::default()
        });
        assert_eq!(p.job_retention, Duration::from_secs(u64::MAX));

        let m = setup();
        upload(&m, "kept");
        assert!(p.sweep(m.store(), now_millis()).is_empty());
    }

    #[test]
    fn test_sweep_all_ignores_age() -> JobResult<()> {
        let m = setup();
        let a = upload(&m, "a");
        let b = upload(&m, "b");
        let failed = split(&m, &a)?;
        m.fail(&failed.id, "probe failed")?;
        let active = split(&m, &b)?;

        let report = RetentionPolicy::sweep_all(m.store());
        assert_eq!(report.removed_jobs, vec![failed.id]);
        assert_eq!(report.removed_videos.len(), 1);
        assert_eq!(report.removed_videos[0].id, a.id);
        assert!(m.store().get_job(&active.id).is_some());
        assert!(m.store().get_video(&b.id).is_some());
        Ok(())
    }
}
