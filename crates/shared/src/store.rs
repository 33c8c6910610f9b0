//! In-memory entity store for videos, jobs and stats.
//!
//! The store is the single shared mutable resource. Every mutation runs under
//! one write lock, so a record is never observed half-updated and a job
//! transition can be applied together with its stats update. Callers always
//! receive clones; no reference escapes the lock.

use crate::error::{JobError, JobResult};
use crate::models::{Job, Stats, VideoFile};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Point-in-time copy of the whole store
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub videos: Vec<VideoFile>,
    pub jobs: Vec<Job>,
    pub stats: Stats,
}

/// Record plus its insertion sequence, used to break `created_at` ties.
#[derive(Debug)]
struct Entry<T> {
    seq: u64,
    record: T,
}

#[derive(Debug, Default)]
struct Tables {
    videos: HashMap<String, Entry<VideoFile>>,
    jobs: HashMap<String, Entry<Job>>,
    stats: Stats,
    next_seq: u64,
    /// Ids of videos removed while this process ran
    removed_videos: HashSet<String>,
}

impl Tables {
    fn bump_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }
}

/// Newest first; among equal timestamps, the later insert wins.
fn sorted_newest_first<T: Clone>(
    entries: &HashMap<String, Entry<T>>,
    created_at: impl Fn(&T) -> i64,
) -> Vec<T> {
    let mut refs: Vec<&Entry<T>> = entries.values().collect();
    refs.sort_by_key(|e| Reverse((created_at(&e.record), e.seq)));
    refs.into_iter().map(|e| e.record.clone()).collect()
}

/// Mutable view of the store, valid for the duration of one [`Store::write`] call.
pub struct StoreTxn<'a> {
    tables: &'a mut Tables,
}

impl StoreTxn<'_> {
    pub fn video(&self, id: &str) -> Option<&VideoFile> {
        self.tables.videos.get(id).map(|e| &e.record)
    }

    pub fn job(&self, id: &str) -> Option<&Job> {
        self.tables.jobs.get(id).map(|e| &e.record)
    }

    pub fn videos(&self) -> impl Iterator<Item = &VideoFile> {
        self.tables.videos.values().map(|e| &e.record)
    }

    pub fn jobs(&self) -> impl Iterator<Item = &Job> {
        self.tables.jobs.values().map(|e| &e.record)
    }

    /// Oldest job matching `pred`; equal timestamps resolve in insertion order.
    pub fn oldest_job(&self, pred: impl Fn(&Job) -> bool) -> Option<&Job> {
        self.tables
            .jobs
            .values()
            .filter(|e| pred(&e.record))
            .min_by_key(|e| (e.record.created_at, e.seq))
            .map(|e| &e.record)
    }

    /// Whether a video with this id existed and has since been removed
    pub fn video_was_removed(&self, id: &str) -> bool {
        self.tables.removed_videos.contains(id)
    }

    pub fn stats(&self) -> &Stats {
        &self.tables.stats
    }

    pub fn stats_mut(&mut self) -> &mut Stats {
        &mut self.tables.stats
    }

    /// Insert a new video; identifiers are never reused.
    pub fn insert_video(&mut self, video: VideoFile) -> JobResult<()> {
        if self.tables.videos.contains_key(&video.id) {
            return Err(JobError::invalid(format!("duplicate video id {}", video.id)));
        }
        let seq = self.tables.bump_seq();
        self.tables
            .videos
            .insert(video.id.clone(), Entry { seq, record: video });
        Ok(())
    }

    /// Insert a new job; identifiers are never reused.
    pub fn insert_job(&mut self, job: Job) -> JobResult<()> {
        if self.tables.jobs.contains_key(&job.id) {
            return Err(JobError::invalid(format!("duplicate job id {}", job.id)));
        }
        let seq = self.tables.bump_seq();
        self.tables.jobs.insert(job.id.clone(), Entry { seq, record: job });
        Ok(())
    }

    /// Apply `f` to a copy of the video and store it only if `f` succeeds.
    pub fn update_video<F>(&mut self, id: &str, f: F) -> JobResult<VideoFile>
    where
        F: FnOnce(&mut VideoFile) -> JobResult<()>,
    {
        let entry = self
            .tables
            .videos
            .get_mut(id)
            .ok_or_else(|| JobError::video_not_found(id))?;
        let mut draft = entry.record.clone();
        f(&mut draft)?;
        entry.record = draft.clone();
        Ok(draft)
    }

    /// Apply `f` to a copy of the job and store it only if `f` succeeds.
    pub fn update_job<F>(&mut self, id: &str, f: F) -> JobResult<Job>
    where
        F: FnOnce(&mut Job) -> JobResult<()>,
    {
        let entry = self
            .tables
            .jobs
            .get_mut(id)
            .ok_or_else(|| JobError::job_not_found(id))?;
        let mut draft = entry.record.clone();
        f(&mut draft)?;
        entry.record = draft.clone();
        Ok(draft)
    }

    pub fn remove_video(&mut self, id: &str) -> Option<VideoFile> {
        let removed = self.tables.videos.remove(id)?;
        self.tables.removed_videos.insert(removed.record.id.clone());
        Some(removed.record)
    }

    pub fn remove_job(&mut self, id: &str) -> Option<Job> {
        self.tables.jobs.remove(id).map(|e| e.record)
    }
}

/// Entity store holding videos, jobs and the singleton stats record
#[derive(Debug, Default)]
pub struct Store {
    tables: RwLock<Tables>,
}

impl Store {
    /// Create an empty store with zeroed stats
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a store from a snapshot. Snapshot lists are newest first;
    /// records are re-inserted oldest first so ties keep their order.
    pub fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        let StoreSnapshot {
            mut videos,
            mut jobs,
            stats,
        } = snapshot;
        videos.reverse();
        videos.sort_by_key(|v| v.created_at);
        jobs.reverse();
        jobs.sort_by_key(|j| j.created_at);

        let mut tables = Tables {
            stats,
            ..Default::default()
        };
        for video in videos {
            let seq = tables.bump_seq();
            tables.videos.insert(video.id.clone(), Entry { seq, record: video });
        }
        for job in jobs {
            let seq = tables.bump_seq();
            tables.jobs.insert(job.id.clone(), Entry { seq, record: job });
        }

        debug!(
            videos = tables.videos.len(),
            jobs = tables.jobs.len(),
            "Store rebuilt from snapshot"
        );

        Self {
            tables: RwLock::new(tables),
        }
    }

    /// Run `f` with exclusive access. Keep `f` short: no I/O under the lock.
    pub fn write<R>(&self, f: impl FnOnce(&mut StoreTxn<'_>) -> R) -> R {
        let mut guard = self.tables.write();
        let mut txn = StoreTxn { tables: &mut *guard };
        f(&mut txn)
    }

    /// Copy of every record, taken under one read lock
    pub fn snapshot(&self) -> StoreSnapshot {
        let tables = self.tables.read();
        StoreSnapshot {
            videos: sorted_newest_first(&tables.videos, |v| v.created_at),
            jobs: sorted_newest_first(&tables.jobs, |j| j.created_at),
            stats: tables.stats,
        }
    }

    // ========== Videos ==========

    pub fn put_video(&self, video: VideoFile) -> JobResult<()> {
        self.write(|txn| txn.insert_video(video))
    }

    pub fn get_video(&self, id: &str) -> Option<VideoFile> {
        self.tables.read().videos.get(id).map(|e| e.record.clone())
    }

    /// All videos, most recently created first
    pub fn list_videos(&self) -> Vec<VideoFile> {
        sorted_newest_first(&self.tables.read().videos, |v| v.created_at)
    }

    pub fn update_video<F>(&self, id: &str, f: F) -> JobResult<VideoFile>
    where
        F: FnOnce(&mut VideoFile) -> JobResult<()>,
    {
        self.write(|txn| txn.update_video(id, f))
    }

    /// Remove a video record unconditionally; returns whether it existed.
    pub fn delete_video(&self, id: &str) -> bool {
        self.write(|txn| txn.remove_video(id)).is_some()
    }

    // ========== Jobs ==========

    pub fn put_job(&self, job: Job) -> JobResult<()> {
        self.write(|txn| txn.insert_job(job))
    }

    pub fn get_job(&self, id: &str) -> Option<Job> {
        self.tables.read().jobs.get(id).map(|e| e.record.clone())
    }

    /// All jobs, most recently created first
    pub fn list_jobs(&self) -> Vec<Job> {
        sorted_newest_first(&self.tables.read().jobs, |j| j.created_at)
    }

    pub fn update_job<F>(&self, id: &str, f: F) -> JobResult<Job>
    where
        F: FnOnce(&mut Job) -> JobResult<()>,
    {
        self.write(|txn| txn.update_job(id, f))
    }

    pub fn delete_job(&self, id: &str) -> bool {
        self.write(|txn| txn.remove_job(id)).is_some()
    }

    // ========== Stats ==========

    pub fn get_stats(&self) -> Stats {
        self.tables.read().stats
    }

    pub fn update_stats(&self, f: impl FnOnce(&mut Stats)) -> Stats {
        self.write(|txn| {
            f(txn.stats_mut());
            *txn.stats()
        })
    }

    /// Number of (videos, jobs) currently held
    pub fn counts(&self) -> (usize, usize) {
        let tables = self.tables.read();
        (tables.videos.len(), tables.jobs.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{JobKind, JobOptions, JobStatus};

    fn video(id: &str, created_at: i64) -> VideoFile {
        VideoFile {
            id: id.to_string(),
            filename: format!("{}.mp4", id),
            original_name: format!("{}.mp4", id),
            size: 1024,
            duration: None,
            path: format!("/data/uploads/{}.mp4", id),
            codec: None,
            resolution: None,
            bitrate: None,
            created_at,
        }
    }

    fn job(id: &str, created_at: i64) -> Job {
        Job::new(
            id.to_string(),
            JobKind::Merge,
            vec!["a".into(), "b".into()],
            JobOptions::default(),
            created_at,
        )
    }

    #[test]
    fn test_list_is_newest_first() -> JobResult<()> {
        let store = Store::new();
        store.put_video(video("old", 100))?;
        store.put_video(video("new", 300))?;
        store.put_video(video("mid", 200))?;

        let ids: Vec<String> = store.list_videos().into_iter().map(|v| v.id).collect();
        assert_eq!(ids, vec!["new", "mid", "old"]);

        // Stable across repeated reads
        let again: Vec<String> = store.list_videos().into_iter().map(|v| v.id).collect();
        assert_eq!(ids, again);
        Ok(())
    }

    #[test]
    fn test_equal_timestamps_order_by_insertion() -> JobResult<()> {
        let store = Store::new();
        store.put_job(job("first", 500))?;
        store.put_job(job("second", 500))?;
        store.put_job(job("third", 500))?;

        let ids: Vec<String> = store.list_jobs().into_iter().map(|j| j.id).collect();
        assert_eq!(ids, vec!["third", "second", "first"]);
        Ok(())
    }

    #[test]
    fn test_oldest_job_breaks_ties_by_insertion() -> JobResult<()> {
        let store = Store::new();
        for id in ["zeta", "alpha", "mid"] {
            store.put_job(job(id, 500))?;
        }
        store.put_job(job("later", 900))?;

        let oldest = store.write(|txn| txn.oldest_job(|_| true).map(|j| j.id.clone()));
        assert_eq!(oldest.as_deref(), Some("zeta"));

        let oldest = store.write(|txn| {
            txn.oldest_job(|j| j.id != "zeta").map(|j| j.id.clone())
        });
        assert_eq!(oldest.as_deref(), Some("alpha"));
        Ok(())
    }

    #[test]
    fn test_removed_videos_are_remembered() -> JobResult<()> {
        let store = Store::new();
        store.put_video(video("gone", 1))?;
        assert!(store.delete_video("gone"));

        store.write(|txn| {
            assert!(txn.video_was_removed("gone"));
            assert!(!txn.video_was_removed("never-registered"));
        });
        Ok(())
    }

    #[test]
    fn test_update_missing_is_not_found() {
        let store = Store::new();
        let result = store.update_job("missing", |j| {
            j.progress = 10;
            Ok(())
        });
        assert_eq!(result, Err(JobError::job_not_found("missing")));
    }

    #[test]
    fn test_failed_update_leaves_record_untouched() -> JobResult<()> {
        let store = Store::new();
        store.put_job(job("j", 1))?;

        let result = store.update_job("j", |j| {
            j.status = JobStatus::Processing;
            j.progress = 42;
            Err(JobError::invalid("rejected halfway"))
        });
        assert!(result.is_err());

        let stored = store.get_job("j").ok_or_else(|| JobError::job_not_found("j"))?;
        assert_eq!(stored.status, JobStatus::Pending);
        assert_eq!(stored.progress, 0);
        Ok(())
    }

    #[test]
    fn test_duplicate_ids_rejected() -> JobResult<()> {
        let store = Store::new();
        store.put_video(video("v", 1))?;
        assert!(store.put_video(video("v", 2)).is_err());
        assert_eq!(store.counts(), (1, 0));
        Ok(())
    }

    #[test]
    fn test_snapshot_round_trip_keeps_order() -> JobResult<()> {
        let store = Store::new();
        store.put_job(job("a", 10))?;
        store.put_job(job("b", 10))?;
        store.put_video(video("v", 5))?;
        store.update_stats(|s| s.total_videos_merged = 3);

        let snapshot = store.snapshot();
        let rebuilt = Store::from_snapshot(snapshot.clone());
        assert_eq!(rebuilt.snapshot(), snapshot);
        assert_eq!(rebuilt.get_stats().total_videos_merged, 3);
        Ok(())
    }

    #[test]
    fn test_concurrent_updates_do_not_tear() -> JobResult<()> {
        use std::sync::Arc;
        use std::thread;

        let store = Arc::new(Store::new());
        store.put_job(job("j", 1))?;

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for _ in 0..100 {
                        let _ = store.update_job("j", |j| {
                            j.output_videos = vec![format!("out-{}", i); 3];
                            j.error = Some(format!("out-{}", i));
                            Ok(())
                        });
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("writer thread panicked");
        }

        let stored = store.get_job("j").ok_or_else(|| JobError::job_not_found("j"))?;
        let writer = stored.error.clone().unwrap_or_default();
        assert!(stored.output_videos.iter().all(|o| *o == writer));
        Ok(())
    }
}
