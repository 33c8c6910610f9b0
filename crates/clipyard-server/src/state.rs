//! Shared application state.

use crate::persist::SnapshotWriter;
use shared::{Config, DataPaths, JobManager, PollingQuery, RetentionPolicy};
use std::sync::Arc;
use tracing::warn;

/// State handed to every handler and to the sweeper
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub manager: JobManager,
    pub query: PollingQuery,
    pub paths: DataPaths,
    pub retention: RetentionPolicy,
    /// Present when `[database] enabled = true`
    pub snapshots: Option<SnapshotWriter>,
}

impl AppState {
    pub fn new(config: Config, manager: JobManager, snapshots: Option<SnapshotWriter>) -> Self {
        Self {
            query: PollingQuery::new(Arc::clone(manager.store())),
            paths: DataPaths::from_config(&config),
            retention: RetentionPolicy::from_config(&config.retention),
            config: Arc::new(config),
            manager,
            snapshots,
        }
    }

    /// Delete backing files of removed videos. Returns how many were deleted.
    ///
    /// Files outside the managed directories are left alone, as is
    /// everything when `delete_media` is off.
    pub async fn remove_media(&self, files: Vec<String>) -> usize {
        if !self.config.retention.delete_media || files.is_empty() {
            return 0;
        }
        let paths = self.paths.clone();
        let result = tokio::task::spawn_blocking(move || {
            files
                .iter()
                .filter(|file| match paths.remove_media(file.as_str()) {
                    Ok(deleted) => deleted,
                    Err(e) => {
                        warn!(path = %file, error = %e, "Failed to delete media file");
                        false
                    }
                })
                .count()
        })
        .await;

        result.unwrap_or_else(|e| {
            warn!(error = %e, "Media cleanup task failed");
            0
        })
    }

    /// Persist the store if snapshots are enabled; failures are logged.
    pub async fn persist(&self) {
        if let Some(writer) = &self.snapshots {
            if let Err(e) = writer.save_blocking(Arc::clone(self.manager.store())).await {
                warn!(error = %e, "Failed to persist store snapshot");
            }
        }
    }
}
