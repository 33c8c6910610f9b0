//! SQLite snapshots of the in-memory store.

use anyhow::{Context, Result};
use parking_lot::Mutex;
use shared::{Database, Store};
use std::sync::Arc;
use tracing::debug;

/// Serializes snapshot writes to one database connection
#[derive(Clone)]
pub struct SnapshotWriter {
    db: Arc<Mutex<Database>>,
}

impl SnapshotWriter {
    pub fn new(db: Database) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
        }
    }

    /// Copy the store under its read lock, then write outside it.
    pub fn save(&self, store: &Store) -> Result<()> {
        let snapshot = store.snapshot();
        self.db.lock().save_snapshot(&snapshot)?;
        debug!(
            videos = snapshot.videos.len(),
            jobs = snapshot.jobs.len(),
            "Store persisted"
        );
        Ok(())
    }

    /// [`save`](Self::save) on the blocking thread pool
    pub async fn save_blocking(&self, store: Arc<Store>) -> Result<()> {
        let writer = self.clone();
        tokio::task::spawn_blocking(move || writer.save(&store))
            .await
            .context("Snapshot task panicked")?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{JobManager, NewVideo};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_snapshot_restores_store() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let db_path = temp_dir.path().join("clipyard.db");

        let manager = JobManager::new(Arc::new(Store::new()), Default::default());
        manager.register_video(NewVideo {
            filename: "a.mp4".into(),
            original_name: "a.mp4".into(),
            size: 100,
            path: "/data/uploads/a.mp4".into(),
            ..Default::default()
        })?;

        let writer = SnapshotWriter::new(Database::open(&db_path)?);
        writer.save_blocking(Arc::clone(manager.store())).await?;

        let restored = JobManager::restore(
            Database::open(&db_path)?.load_snapshot()?,
            Default::default(),
        );
        assert_eq!(restored.store().list_videos(), manager.store().list_videos());
        Ok(())
    }
}
