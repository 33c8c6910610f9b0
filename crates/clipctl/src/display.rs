//! Human-readable formatting for CLI output.

use chrono::{DateTime, Local};
use shared::stats::AchievementStatus;
use shared::{Job, Stats, VideoFile};

/// `95.0` -> `1:35`, `3725.0` -> `1:02:05`
pub fn format_duration(seconds: f64) -> String {
    let total = seconds.max(0.0).round() as u64;
    let (h, m, s) = (total / 3600, (total % 3600) / 60, total % 60);
    if h > 0 {
        format!("{}:{:02}:{:02}", h, m, s)
    } else {
        format!("{}:{:02}", m, s)
    }
}

/// Bytes with a binary unit suffix
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

/// Millisecond timestamp in local time
pub fn format_timestamp(millis: i64) -> String {
    DateTime::from_timestamp_millis(millis)
        .map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string())
}

pub fn video_line(video: &VideoFile) -> String {
    format!(
        "{}  {:<32}  {:>9}  {:>8}  {}",
        video.id,
        video.original_name,
        format_size(video.size),
        video.duration.map(format_duration).unwrap_or_else(|| "?".to_string()),
        format_timestamp(video.created_at)
    )
}

pub fn job_line(job: &Job) -> String {
    let mut line = format!(
        "{}  {:<14}  {:<10}  {:>3}%  {}",
        job.id,
        job.kind.to_string(),
        job.status.to_string(),
        job.progress,
        format_timestamp(job.created_at)
    );
    if let Some(error) = &job.error {
        line.push_str(&format!("  error: {}", error));
    }
    line
}

pub fn stats_lines(stats: &Stats) -> Vec<String> {
    vec![
        format!("Videos split:      {}", stats.total_videos_split),
        format!("Videos merged:     {}", stats.total_videos_merged),
        format!("Segments created:  {}", stats.total_segments_created),
        format!(
            "Time processed:    {}",
            format_duration(stats.total_time_saved as f64)
        ),
        format!("Downloads:         {}", stats.total_downloads),
    ]
}

pub fn achievement_line(a: &AchievementStatus) -> String {
    let mark = if a.unlocked { "[x]" } else { "[ ]" };
    format!(
        "{} {:<14} {:>4}/{:<4} {}",
        mark,
        a.title,
        a.progress.min(a.total),
        a.total,
        a.description
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(95.0), "1:35");
        assert_eq!(format_duration(3725.0), "1:02:05");
        assert_eq!(format_duration(0.4), "0:00");
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(500 * 1024 * 1024), "500.0 MB");
    }

    #[test]
    fn test_achievement_line_caps_progress() {
        let a = AchievementStatus {
            id: "segment-pro".into(),
            title: "Segment Pro".into(),
            description: "Create 10+ segments".into(),
            unlocked: true,
            progress: 25,
            total: 10,
        };
        let line = achievement_line(&a);
        assert!(line.starts_with("[x] Segment Pro"));
        assert!(line.contains("10/10"));
    }
}
