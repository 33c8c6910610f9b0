//! Data models for the project.
//!
//! Videos, jobs and cumulative stats, in the shape clients see on the wire
//! (camelCase JSON, millisecond timestamps).

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// An uploaded or produced media asset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoFile {
    pub id: String,
    /// Stored filename
    pub filename: String,
    /// Filename as uploaded by the user
    pub original_name: String,
    /// Size in bytes
    pub size: u64,
    /// Duration in seconds, absent until probed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    /// Storage path of the backing media
    pub path: String,

    // Probe metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub codec: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bitrate: Option<u64>,

    pub created_at: i64,
}

/// Video to be registered
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewVideo {
    pub filename: String,
    pub original_name: String,
    pub size: u64,
    #[serde(default)]
    pub duration: Option<f64>,
    pub path: String,
    #[serde(default)]
    pub codec: Option<String>,
    #[serde(default)]
    pub resolution: Option<String>,
    #[serde(default)]
    pub bitrate: Option<u64>,
}

/// Partial update of derived video metadata
///
/// Only fields that are `Some` are applied.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoPatch {
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub codec: Option<String>,
    #[serde(default)]
    pub resolution: Option<String>,
    #[serde(default)]
    pub bitrate: Option<u64>,
}

impl VideoPatch {
    pub fn is_empty(&self) -> bool {
        self.duration.is_none()
            && self.codec.is_none()
            && self.resolution.is_none()
            && self.bitrate.is_none()
    }

    /// Apply the patch to a video record
    pub fn apply(&self, video: &mut VideoFile) {
        if let Some(duration) = self.duration {
            video.duration = Some(duration);
        }
        if let Some(ref codec) = self.codec {
            video.codec = Some(codec.clone());
        }
        if let Some(ref resolution) = self.resolution {
            video.resolution = Some(resolution.clone());
        }
        if let Some(bitrate) = self.bitrate {
            video.bitrate = Some(bitrate);
        }
    }
}

/// Kind of media operation a job performs
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum JobKind {
    Split,
    Merge,
    Download,
    ExtractFrames,
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobKind::Split => write!(f, "split"),
            JobKind::Merge => write!(f, "merge"),
            JobKind::Download => write!(f, "download"),
            JobKind::ExtractFrames => write!(f, "extract-frames"),
        }
    }
}

impl std::str::FromStr for JobKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "split" => Ok(JobKind::Split),
            "merge" => Ok(JobKind::Merge),
            "download" => Ok(JobKind::Download),
            "extract-frames" => Ok(JobKind::ExtractFrames),
            _ => Err(anyhow::anyhow!("Invalid job kind: {}", s)),
        }
    }
}

/// Job status
///
/// `pending -> processing -> {completed | error}`; `pending -> error` is also
/// allowed when a precondition fails before any worker claims the job.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Error,
}

impl JobStatus {
    /// Completed and error are terminal
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Error)
    }

    /// Pending and processing jobs pin their videos
    pub fn is_active(self) -> bool {
        !self.is_terminal()
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "pending"),
            JobStatus::Processing => write!(f, "processing"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Error => write!(f, "error"),
        }
    }
}

impl std::str::FromStr for JobStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "processing" => Ok(JobStatus::Processing),
            "completed" => Ok(JobStatus::Completed),
            "error" => Ok(JobStatus::Error),
            _ => Err(anyhow::anyhow!("Invalid job status: {}", s)),
        }
    }
}

/// Kind-specific job parameters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobOptions {
    /// Split: length of each segment in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segment_duration: Option<u32>,
    /// Download: source URL of the clip
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    /// Extract-frames: seconds between extracted frames
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame_interval: Option<u32>,
}

/// One asynchronous media operation with a tracked lifecycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: JobKind,
    pub status: JobStatus,
    /// 0 to 100
    pub progress: u8,
    pub input_videos: Vec<String>,
    pub output_videos: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(flatten)]
    pub options: JobOptions,

    // Timestamps (ms)
    pub created_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<i64>,
    pub updated_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<i64>,
}

impl Job {
    /// A freshly submitted job in `pending`
    pub fn new(
        id: String,
        kind: JobKind,
        input_videos: Vec<String>,
        options: JobOptions,
        now: i64,
    ) -> Self {
        Self {
            id,
            kind,
            status: JobStatus::Pending,
            progress: 0,
            input_videos,
            output_videos: Vec::new(),
            error: None,
            options,
            created_at: now,
            started_at: None,
            updated_at: now,
            completed_at: None,
        }
    }

    /// Whether the job reads or produced the given video
    pub fn references(&self, video_id: &str) -> bool {
        self.input_videos.iter().any(|v| v == video_id)
            || self.output_videos.iter().any(|v| v == video_id)
    }

    /// Check the record-level invariants tying progress, outputs and error to status.
    pub fn check_invariants(&self) -> Result<(), String> {
        let completed = self.status == JobStatus::Completed;
        if self.progress > 100 {
            return Err(format!("progress {} out of range", self.progress));
        }
        if (self.progress == 100) != completed {
            return Err(format!(
                "progress {} inconsistent with status {}",
                self.progress, self.status
            ));
        }
        if self.status == JobStatus::Pending && self.progress != 0 {
            return Err("pending job with non-zero progress".to_string());
        }
        if self.output_videos.is_empty() == completed {
            return Err(format!(
                "{} output(s) inconsistent with status {}",
                self.output_videos.len(),
                self.status
            ));
        }
        if self.error.is_some() != (self.status == JobStatus::Error) {
            return Err(format!("error field inconsistent with status {}", self.status));
        }
        Ok(())
    }
}

/// Cumulative counters derived from completed jobs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub total_videos_split: u64,
    pub total_videos_merged: u64,
    pub total_segments_created: u64,
    /// Seconds of video processed
    pub total_time_saved: u64,
    #[serde(default)]
    pub total_downloads: u64,
}
