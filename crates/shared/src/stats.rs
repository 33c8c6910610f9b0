//! Stats aggregation and achievements.
//!
//! Pure functions: given a job about to complete and the durations of its
//! inputs, compute the counter deltas to apply. Achievements are evaluated
//! from a stats snapshot on every query and never stored.

use crate::models::{Job, JobKind, Stats};
use serde::{Deserialize, Serialize};

/// Counter increments produced by one completed job
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsDelta {
    pub videos_split: u64,
    pub videos_merged: u64,
    pub segments_created: u64,
    pub time_saved: u64,
    pub downloads: u64,
}

impl Stats {
    /// Add a delta. Counters only ever grow.
    pub fn apply(&mut self, delta: &StatsDelta) {
        self.total_videos_split = self.total_videos_split.saturating_add(delta.videos_split);
        self.total_videos_merged = self.total_videos_merged.saturating_add(delta.videos_merged);
        self.total_segments_created = self
            .total_segments_created
            .saturating_add(delta.segments_created);
        self.total_time_saved = self.total_time_saved.saturating_add(delta.time_saved);
        self.total_downloads = self.total_downloads.saturating_add(delta.downloads);
    }
}

/// Number of segments a split produces: `ceil(duration / segment_duration)`.
///
/// A segment length that evenly divides the duration yields exactly that many
/// segments, never an extra empty one.
pub fn segment_count(duration: f64, segment_duration: u32) -> u64 {
    if segment_duration == 0 || !duration.is_finite() || duration <= 0.0 {
        return 0;
    }
    (duration / f64::from(segment_duration)).ceil() as u64
}

/// One output chunk of a split
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub index: u64,
    /// Offset into the input, seconds
    pub start: f64,
    /// Length in seconds; only the last segment may be shorter
    pub duration: f64,
}

/// Segment boundaries for splitting `duration` seconds into `segment_duration` chunks
pub fn segment_plan(duration: f64, segment_duration: u32) -> Vec<Segment> {
    let count = segment_count(duration, segment_duration);
    let step = f64::from(segment_duration);
    (0..count)
        .map(|index| {
            let start = index as f64 * step;
            Segment {
                index,
                start,
                duration: step.min(duration - start),
            }
        })
        .collect()
}

fn whole_seconds(seconds: f64) -> u64 {
    if seconds.is_finite() && seconds > 0.0 {
        seconds.round() as u64
    } else {
        0
    }
}

/// Deltas for a job transitioning to `completed`.
///
/// `input_durations` lines up with `job.input_videos`; unknown durations
/// count as zero seconds. When a split input's duration is unknown the
/// segment count falls back to the number of outputs the worker reported.
pub fn completion_delta(
    job: &Job,
    input_durations: &[Option<f64>],
    output_count: usize,
) -> StatsDelta {
    let total_duration: f64 = input_durations.iter().flatten().sum();

    match job.kind {
        JobKind::Split => {
            let first_duration = input_durations.first().copied().flatten();
            let segments = match (first_duration, job.options.segment_duration) {
                (Some(duration), Some(segment)) => segment_count(duration, segment),
                _ => output_count as u64,
            };
            StatsDelta {
                videos_split: 1,
                segments_created: segments,
                time_saved: whole_seconds(total_duration),
                ..Default::default()
            }
        }
        JobKind::Merge => StatsDelta {
            videos_merged: 1,
            time_saved: whole_seconds(total_duration),
            ..Default::default()
        },
        JobKind::Download => StatsDelta {
            downloads: 1,
            ..Default::default()
        },
        JobKind::ExtractFrames => StatsDelta::default(),
    }
}

// ========== Achievements ==========

/// Stats counter an achievement is measured against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    VideosSplit,
    VideosMerged,
    SegmentsCreated,
    TimeSaved,
}

impl Metric {
    pub fn read(self, stats: &Stats) -> u64 {
        match self {
            Metric::VideosSplit => stats.total_videos_split,
            Metric::VideosMerged => stats.total_videos_merged,
            Metric::SegmentsCreated => stats.total_segments_created,
            Metric::TimeSaved => stats.total_time_saved,
        }
    }
}

/// Threshold-based achievement definition
#[derive(Debug, Clone, Copy)]
pub struct Achievement {
    pub id: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub metric: Metric,
    pub threshold: u64,
}

impl Achievement {
    pub fn is_unlocked(&self, stats: &Stats) -> bool {
        self.metric.read(stats) >= self.threshold
    }
}

pub const ACHIEVEMENTS: &[Achievement] = &[
    Achievement {
        id: "first-split",
        title: "First Cut",
        description: "Split your first video",
        metric: Metric::VideosSplit,
        threshold: 1,
    },
    Achievement {
        id: "first-merge",
        title: "Fusion Master",
        description: "Merge your first videos",
        metric: Metric::VideosMerged,
        threshold: 1,
    },
    Achievement {
        id: "segment-pro",
        title: "Segment Pro",
        description: "Create 10+ segments",
        metric: Metric::SegmentsCreated,
        threshold: 10,
    },
    Achievement {
        id: "time-saver",
        title: "Time Saver",
        description: "Process 5 minutes of video",
        metric: Metric::TimeSaved,
        threshold: 300,
    },
    Achievement {
        id: "power-user",
        title: "Power User",
        description: "Split 5 videos",
        metric: Metric::VideosSplit,
        threshold: 5,
    },
    Achievement {
        id: "merge-master",
        title: "Merge Master",
        description: "Merge 5 projects",
        metric: Metric::VideosMerged,
        threshold: 5,
    },
];

/// Evaluated achievement, as served to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AchievementStatus {
    pub id: String,
    pub title: String,
    pub description: String,
    pub unlocked: bool,
    pub progress: u64,
    pub total: u64,
}

/// Evaluate every achievement against a stats snapshot
pub fn achievements(stats: &Stats) -> Vec<AchievementStatus> {
    ACHIEVEMENTS
        .iter()
        .map(|a| AchievementStatus {
            id: a.id.to_string(),
            title: a.title.to_string(),
            description: a.description.to_string(),
            unlocked: a.is_unlocked(stats),
            progress: a.metric.read(stats),
            total: a.threshold,
        })
        .collect()
}

/// Identifiers of unlocked achievements, in table order
pub fn unlocked_ids(stats: &Stats) -> Vec<&'static str> {
    ACHIEVEMENTS
        .iter()
        .filter(|a| a.is_unlocked(stats))
        .map(|a| a.id)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::JobOptions;

    fn split_job(segment: u32) -> Job {
        Job::new(
            "s".into(),
            JobKind::Split,
            vec!["v".into()],
            JobOptions {
                segment_duration: Some(segment),
                ..Default::default()
            },
            0,
        )
    }

    #[test]
    fn test_segment_count_ceiling() {
        assert_eq!(segment_count(95.0, 10), 10);
        assert_eq!(segment_count(100.0, 10), 10);
        assert_eq!(segment_count(100.5, 10), 11);
        assert_eq!(segment_count(5.0, 10), 1);
        assert_eq!(segment_count(0.0, 10), 0);
        assert_eq!(segment_count(10.0, 0), 0);
    }

    #[test]
    fn test_segment_plan_last_segment_shorter() {
        let plan = segment_plan(95.0, 10);
        assert_eq!(plan.len(), 10);
        assert_eq!(plan[0].start, 0.0);
        assert_eq!(plan[9].start, 90.0);
        assert_eq!(plan[9].duration, 5.0);
        assert!(plan[..9].iter().all(|s| s.duration == 10.0));
    }

    #[test]
    fn test_split_delta() {
        let delta = completion_delta(&split_job(10), &[Some(95.0)], 10);
        assert_eq!(
            delta,
            StatsDelta {
                videos_split: 1,
                segments_created: 10,
                time_saved: 95,
                ..Default::default()
            }
        );
    }

    #[test]
    fn test_split_without_duration_uses_output_count() {
        let delta = completion_delta(&split_job(10), &[None], 4);
        assert_eq!(delta.segments_created, 4);
        assert_eq!(delta.time_saved, 0);
    }

    #[test]
    fn test_merge_delta_sums_inputs() {
        let job = Job::new(
            "m".into(),
            JobKind::Merge,
            vec!["a".into(), "b".into(), "c".into()],
            JobOptions::default(),
            0,
        );
        let delta = completion_delta(&job, &[Some(60.4), Some(30.3), None], 1);
        assert_eq!(delta.videos_merged, 1);
        assert_eq!(delta.time_saved, 91);
        assert_eq!(delta.segments_created, 0);
    }

    #[test]
    fn test_segments_accumulate_across_jobs() {
        let mut stats = Stats::default();
        for (duration, expected) in [(30.0, 3), (40.0, 4), (45.0, 5)] {
            let delta = completion_delta(&split_job(10), &[Some(duration)], expected);
            assert_eq!(delta.segments_created, expected as u64);
            stats.apply(&delta);
        }
        assert_eq!(stats.total_segments_created, 12);
        assert_eq!(stats.total_videos_split, 3);
    }

    #[test]
    fn test_achievement_thresholds() {
        let stats = Stats {
            total_videos_split: 1,
            total_videos_merged: 0,
            total_segments_created: 10,
            total_time_saved: 300,
            total_downloads: 0,
        };
        assert_eq!(
            unlocked_ids(&stats),
            vec!["first-split", "segment-pro", "time-saver"]
        );

        let statuses = achievements(&stats);
        let merge_master = statuses
            .iter()
            .find(|a| a.id == "merge-master")
            .expect("merge-master present");
        assert!(!merge_master.unlocked);
        assert_eq!(merge_master.progress, 0);
        assert_eq!(merge_master.total, 5);
    }

    #[test]
    fn test_no_achievements_at_zero() {
        assert!(unlocked_ids(&Stats::default()).is_empty());
        assert_eq!(achievements(&Stats::default()).len(), ACHIEVEMENTS.len());
    }
}
