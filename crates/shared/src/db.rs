//! Database operations for SQLite.
//!
//! The in-memory store is authoritative while the process runs. This module
//! persists point-in-time snapshots of it so a restart does not lose videos,
//! job history or cumulative stats.

use crate::models::{Job, JobOptions, Stats, VideoFile};
use crate::store::StoreSnapshot;
use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use tracing::{debug, info};

/// Schema version stored in `PRAGMA user_version`.
///
/// 1: initial tables. 2: `stats.total_downloads`.
pub const SCHEMA_VERSION: i32 = 2;

/// Database connection wrapper
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create a database at the given path
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        debug!(path = %path.display(), "Opening database");

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create database directory: {}", parent.display())
            })?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database at {}", path.display()))?;

        let mut db = Self { conn };
        db.prepare_schema()?;
        Ok(db)
    }

    /// Open a throwaway in-memory database
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        let mut db = Self { conn };
        db.prepare_schema()?;
        Ok(db)
    }

    /// Create missing tables, then bring older files up to [`SCHEMA_VERSION`]
    fn prepare_schema(&mut self) -> Result<()> {
        let existing = self.table_exists("stats")?;
        let version = self.schema_version()?;

        // Tables are created idempotently, so a partial file is completed here
        self.conn
            .execute_batch(include_str!("../schema.sql"))
            .context("Failed to create database schema")?;

        if !existing {
            info!(version = SCHEMA_VERSION, "Created new database schema");
        } else if version < SCHEMA_VERSION {
            self.run_migrations(version)?;
        } else {
            debug!(version, "Database schema up to date");
        }

        self.set_schema_version(SCHEMA_VERSION)
    }

    /// Check if a table exists
    pub fn table_exists(&self, table_name: &str) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
            [table_name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn column_exists(&self, table: &str, column: &str) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM pragma_table_info(?1) WHERE name = ?2",
            params![table, column],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Version recorded in the file; 0 for files that predate versioning
    pub fn schema_version(&self) -> Result<i32> {
        let version: i32 = self
            .conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))?;
        Ok(version)
    }

    fn set_schema_version(&self, version: i32) -> Result<()> {
        self.conn
            .execute_batch(&format!("PRAGMA user_version = {}", version))?;
        Ok(())
    }

    /// Upgrade a file written at `from`
    fn run_migrations(&mut self, from: i32) -> Result<()> {
        info!(from, to = SCHEMA_VERSION, "Migrating database schema");

        if from < 2 && !self.column_exists("stats", "total_downloads")? {
            info!("Running migration: Adding stats.total_downloads");
            self.conn
                .execute_batch(
                    "ALTER TABLE stats ADD COLUMN total_downloads INTEGER NOT NULL DEFAULT 0",
                )
                .context("Failed to add total_downloads column")?;
        }

        Ok(())
    }

    // ========== Snapshots ==========

    /// Replace all persisted rows with `snapshot`, in one transaction
    pub fn save_snapshot(&mut self, snapshot: &StoreSnapshot) -> Result<()> {
        let tx = self
            .conn
            .transaction()
            .context("Failed to begin transaction")?;

        tx.execute("DELETE FROM videos", [])?;
        tx.execute("DELETE FROM jobs", [])?;

        {
            let mut insert_video = tx.prepare(
                "INSERT INTO videos (id, filename, original_name, size, duration, path,
                                     codec, resolution, bitrate, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            )?;
            for v in &snapshot.videos {
                insert_video.execute(params![
                    v.id,
                    v.filename,
                    v.original_name,
                    to_sql_int(v.size)?,
                    v.duration,
                    v.path,
                    v.codec,
                    v.resolution,
                    v.bitrate.map(to_sql_int).transpose()?,
                    v.created_at,
                ])?;
            }

            let mut insert_job = tx.prepare(
                "INSERT INTO jobs (id, kind, status, progress, input_videos, output_videos,
                                   error, segment_duration, source_url, frame_interval,
                                   created_at, started_at, updated_at, completed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            )?;
            for j in &snapshot.jobs {
                insert_job.execute(params![
                    j.id,
                    j.kind.to_string(),
                    j.status.to_string(),
                    j.progress,
                    serde_json::to_string(&j.input_videos)?,
                    serde_json::to_string(&j.output_videos)?,
                    j.error,
                    j.options.segment_duration,
                    j.options.source_url,
                    j.options.frame_interval,
                    j.created_at,
                    j.started_at,
                    j.updated_at,
                    j.completed_at,
                ])?;
            }
        }

        let s = &snapshot.stats;
        tx.execute(
            "INSERT OR REPLACE INTO stats
                 (id, total_videos_split, total_videos_merged,
                  total_segments_created, total_time_saved, total_downloads)
             VALUES (1, ?1, ?2, ?3, ?4, ?5)",
            params![
                to_sql_int(s.total_videos_split)?,
                to_sql_int(s.total_videos_merged)?,
                to_sql_int(s.total_segments_created)?,
                to_sql_int(s.total_time_saved)?,
                to_sql_int(s.total_downloads)?,
            ],
        )?;

        tx.commit().context("Failed to commit snapshot")?;

        debug!(
            videos = snapshot.videos.len(),
            jobs = snapshot.jobs.len(),
            "Snapshot saved"
        );
        Ok(())
    }

    /// Read back the last saved snapshot (empty on a fresh database)
    pub fn load_snapshot(&self) -> Result<StoreSnapshot> {
        let videos = self.load_videos()?;
        let jobs = self.load_jobs()?;
        let stats = self.load_stats()?;

        info!(
            videos = videos.len(),
            jobs = jobs.len(),
            "Snapshot loaded"
        );
        Ok(StoreSnapshot {
            videos,
            jobs,
            stats,
        })
    }

    fn load_videos(&self) -> Result<Vec<VideoFile>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, filename, original_name, size, duration, path,
                    codec, resolution, bitrate, created_at
             FROM videos ORDER BY rowid",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                VideoFile {
                    id: row.get(0)?,
                    filename: row.get(1)?,
                    original_name: row.get(2)?,
                    size: 0,
                    duration: row.get(4)?,
                    path: row.get(5)?,
                    codec: row.get(6)?,
                    resolution: row.get(7)?,
                    bitrate: None,
                    created_at: row.get(9)?,
                },
                row.get::<_, i64>(3)?,
                row.get::<_, Option<i64>>(8)?,
            ))
        })?;

        let mut videos = Vec::new();
        for row in rows {
            let (mut video, size, bitrate) = row?;
            video.size = from_sql_int(size)?;
            video.bitrate = bitrate.map(from_sql_int).transpose()?;
            videos.push(video);
        }
        Ok(videos)
    }

    fn load_jobs(&self) -> Result<Vec<Job>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, kind, status, progress, input_videos, output_videos,
                    error, segment_duration, source_url, frame_interval,
                    created_at, started_at, updated_at, completed_at
             FROM jobs ORDER BY rowid",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(JobRow {
                id: row.get(0)?,
                kind: row.get(1)?,
                status: row.get(2)?,
                progress: row.get(3)?,
                input_videos: row.get(4)?,
                output_videos: row.get(5)?,
                error: row.get(6)?,
                segment_duration: row.get(7)?,
                source_url: row.get(8)?,
                frame_interval: row.get(9)?,
                created_at: row.get(10)?,
                started_at: row.get(11)?,
                updated_at: row.get(12)?,
                completed_at: row.get(13)?,
            })
        })?;

        let mut jobs = Vec::new();
        for row in rows {
            jobs.push(row?.into_job()?);
        }
        Ok(jobs)
    }

    fn load_stats(&self) -> Result<Stats> {
        let row: Option<[i64; 5]> = self
            .conn
            .query_row(
                "SELECT total_videos_split, total_videos_merged, total_segments_created,
                        total_time_saved, total_downloads
                 FROM stats WHERE id = 1",
                [],
                |row| Ok([row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?]),
            )
            .optional()?;

        let Some([split, merged, segments, time, downloads]) = row else {
            return Ok(Stats::default());
        };
        Ok(Stats {
            total_videos_split: from_sql_int(split)?,
            total_videos_merged: from_sql_int(merged)?,
            total_segments_created: from_sql_int(segments)?,
            total_time_saved: from_sql_int(time)?,
            total_downloads: from_sql_int(downloads)?,
        })
    }
}

/// Raw `jobs` row before enum and JSON decoding
struct JobRow {
    id: String,
    kind: String,
    status: String,
    progress: u8,
    input_videos: String,
    output_videos: String,
    error: Option<String>,
    segment_duration: Option<u32>,
    source_url: Option<String>,
    frame_interval: Option<u32>,
    created_at: i64,
    started_at: Option<i64>,
    updated_at: i64,
    completed_at: Option<i64>,
}

impl JobRow {
    fn into_job(self) -> Result<Job> {
        Ok(Job {
            kind: self.kind.parse()?,
            status: self.status.parse()?,
            progress: self.progress,
            input_videos: serde_json::from_str(&self.input_videos)
                .with_context(|| format!("Bad input_videos for job {}", self.id))?,
            output_videos: serde_json::from_str(&self.output_videos)
                .with_context(|| format!("Bad output_videos for job {}", self.id))?,
            error: self.error,
            options: JobOptions {
                segment_duration: self.segment_duration,
                source_url: self.source_url,
                frame_interval: self.frame_interval,
            },
            created_at: self.created_at,
            started_at: self.started_at,
            updated_at: self.updated_at,
            completed_at: self.completed_at,
            id: self.id,
        })
    }
}

fn to_sql_int(value: u64) -> Result<i64> {
    i64::try_from(value).context("Counter does not fit in an SQLite integer")
}

fn from_sql_int(value: i64) -> Result<u64> {
    u64::try_from(value).context("Negative value in unsigned column")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{JobKind, JobStatus};
    use tempfile::TempDir;

    fn sample_snapshot() -> StoreSnapshot {
        let mut done = Job::new(
            "job-done".into(),
            JobKind::Split,
            vec!["v1".into()],
            JobOptions {
                segment_duration: Some(10),
                ..Default::default()
            },
            2_000,
        );
        done.status = JobStatus::Completed;
        done.progress = 100;
        done.output_videos = vec!["seg-1".into(), "seg-2".into()];
        done.started_at = Some(2_100);
        done.completed_at = Some(2_500);
        done.updated_at = 2_500;

        let pending = Job::new(
            "job-pending".into(),
            JobKind::Download,
            vec![],
            JobOptions {
                source_url: Some("https://example.com/v".into()),
                ..Default::default()
            },
            3_000,
        );

        StoreSnapshot {
            videos: vec![VideoFile {
                id: "v1".into(),
                filename: "v1_clip.mp4".into(),
                original_name: "clip.mp4".into(),
                size: 123_456,
                duration: Some(15.5),
                path: "/data/uploads/v1_clip.mp4".into(),
                codec: Some("h264".into()),
                resolution: Some("1920x1080".into()),
                bitrate: Some(4_000_000),
                created_at: 1_000,
            }],
            jobs: vec![pending, done],
            stats: Stats {
                total_videos_split: 1,
                total_segments_created: 2,
                total_time_saved: 16,
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_create_database() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let db_path = temp_dir.path().join("test.db");

        let db = Database::open(&db_path)?;
        assert!(db_path.exists());

        assert!(db.table_exists("videos")?);
        assert!(db.table_exists("jobs")?);
        assert!(db.table_exists("stats")?);

        Ok(())
    }

    #[test]
    fn test_new_database_records_schema_version() -> Result<()> {
        let db = Database::open_in_memory()?;
        assert_eq!(db.schema_version()?, SCHEMA_VERSION);
        Ok(())
    }

    #[test]
    fn test_migrates_unversioned_stats_table() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let db_path = temp_dir.path().join("legacy.db");

        {
            let conn = Connection::open(&db_path)?;
            conn.execute_batch(
                "CREATE TABLE stats (
                    id INTEGER PRIMARY KEY CHECK(id = 1),
                    total_videos_split INTEGER NOT NULL DEFAULT 0,
                    total_videos_merged INTEGER NOT NULL DEFAULT 0,
                    total_segments_created INTEGER NOT NULL DEFAULT 0,
                    total_time_saved INTEGER NOT NULL DEFAULT 0
                );
                INSERT INTO stats (id, total_videos_split) VALUES (1, 7);",
            )?;
        }

        let db = Database::open(&db_path)?;
        assert_eq!(db.schema_version()?, SCHEMA_VERSION);
        assert!(db.table_exists("jobs")?);

        let snapshot = db.load_snapshot()?;
        assert_eq!(snapshot.stats.total_videos_split, 7);
        assert_eq!(snapshot.stats.total_downloads, 0);
        Ok(())
    }

    #[test]
    fn test_fresh_database_loads_empty_snapshot() -> Result<()> {
        let db = Database::open_in_memory()?;
        assert_eq!(db.load_snapshot()?, StoreSnapshot::default());
        Ok(())
    }

    #[test]
    fn test_snapshot_survives_reopen() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let db_path = temp_dir.path().join("nested").join("clipyard.db");
        let snapshot = sample_snapshot();

        {
            let mut db = Database::open(&db_path)?;
            db.save_snapshot(&snapshot)?;
        }

        let db = Database::open(&db_path)?;
        assert_eq!(db.load_snapshot()?, snapshot);
        Ok(())
    }

    #[test]
    fn test_save_replaces_previous_rows() -> Result<()> {
        let mut db = Database::open_in_memory()?;
        db.save_snapshot(&sample_snapshot())?;

        let mut smaller = sample_snapshot();
        smaller.jobs.truncate(1);
        smaller.videos.clear();
        db.save_snapshot(&smaller)?;

        let loaded = db.load_snapshot()?;
        assert!(loaded.videos.is_empty());
        assert_eq!(loaded.jobs.len(), 1);
        assert_eq!(loaded.jobs[0].id, "job-pending");
        Ok(())
    }
}
