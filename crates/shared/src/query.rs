//! Read-only polling surface over the entity store.
//!
//! Clients re-fetch at the configured polling interval; every call returns
//! copies taken under a short read lock, ordered newest first.

use crate::models::{Job, Stats, VideoFile};
use crate::stats::{self, AchievementStatus};
use crate::store::Store;
use serde::Serialize;
use std::sync::Arc;

/// Everything a dashboard needs in one consistent read
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Overview {
    pub videos: Vec<VideoFile>,
    pub jobs: Vec<Job>,
    pub stats: Stats,
    pub achievements: Vec<AchievementStatus>,
}

#[derive(Debug, Clone)]
pub struct PollingQuery {
    store: Arc<Store>,
}

impl PollingQuery {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    pub fn list_videos(&self) -> Vec<VideoFile> {
        self.store.list_videos()
    }

    pub fn list_jobs(&self) -> Vec<Job> {
        self.store.list_jobs()
    }

    pub fn get_video(&self, id: &str) -> Option<VideoFile> {
        self.store.get_video(id)
    }

    pub fn get_job(&self, id: &str) -> Option<Job> {
        self.store.get_job(id)
    }

    pub fn get_stats(&self) -> Stats {
        self.store.get_stats()
    }

    /// Achievements evaluated against the current stats
    pub fn achievements(&self) -> Vec<AchievementStatus> {
        stats::achievements(&self.store.get_stats())
    }

    /// Videos, jobs and stats from a single snapshot
    pub fn overview(&self) -> Overview {
        let snapshot = self.store.snapshot();
        Overview {
            achievements: stats::achievements(&snapshot.stats),
            videos: snapshot.videos,
            jobs: snapshot.jobs,
            stats: snapshot.stats,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LimitsConfig;
    use crate::error::JobResult;
    use crate::lifecycle::JobManager;
    use crate::models::*;
    use std::thread;

    #[test]
    fn test_reads_reflect_completion_atomically() -> JobResult<()> {
        let store = Arc::new(Store::new());
        let manager = JobManager::new(Arc::clone(&store), LimitsConfig::default());
        let query = PollingQuery::new(Arc::clone(&store));

        let video = manager.register_video(NewVideo {
            filename: "talk.mp4".into(),
            original_name: "talk.mp4".into(),
            size: 1 << 20,
            duration: Some(95.0),
            path: "/data/uploads/talk.mp4".into(),
            ..Default::default()
        })?;
        let job = manager.create_job(
            JobKind::Split,
            vec![video.id],
            JobOptions {
                segment_duration: Some(10),
                ..Default::default()
            },
        )?;
        manager.claim(&job.id)?;

        let reader = {
            let query = query.clone();
            thread::spawn(move || {
                for _ in 0..500 {
                    let overview = query.overview();
                    let completed = overview
                        .jobs
                        .iter()
                        .any(|j| j.status == JobStatus::Completed);
                    assert_eq!(completed, overview.stats.total_videos_split == 1);
                }
            })
        };

        let outputs: Vec<String> = (0..10).map(|i| format!("part-{}", i)).collect();
        manager.complete(&job.id, outputs)?;
        reader.join().expect("reader thread panicked");

        assert_eq!(query.get_stats().total_segments_created, 10);
        assert!(query
            .achievements()
            .iter()
            .any(|a| a.id == "segment-pro" && a.unlocked));
        Ok(())
    }

    #[test]
    fn test_unknown_ids_are_none() {
        let query = PollingQuery::new(Arc::new(Store::new()));
        assert!(query.get_job("missing").is_none());
        assert!(query.get_video("missing").is_none());
        assert!(query.list_jobs().is_empty());
        assert_eq!(query.get_stats(), Stats::default());
    }
}
