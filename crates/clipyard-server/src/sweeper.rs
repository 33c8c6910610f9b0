//! Periodic retention sweep.
//!
//! Each tick removes expired records, deletes their media, reports stalled
//! jobs and persists a snapshot.

use shared::{now_millis, CleanupReport};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn};

use crate::state::AppState;

/// Run one sweep as of `now` (ms since epoch)
pub async fn sweep_once(state: &AppState, now: i64) -> CleanupReport {
    let report = state.retention.sweep(state.manager.store(), now);

    let files = report
        .removed_videos
        .iter()
        .map(|v| v.path.clone())
        .collect();
    let media_deleted = state.remove_media(files).await;
    if media_deleted > 0 {
        info!(files = media_deleted, "Deleted media of expired videos");
    }

    for job in state
        .manager
        .stalled_jobs(now, state.config.retention.stall_timeout())
    {
        warn!(
            job_id = %job.id,
            kind = %job.kind,
            progress = job.progress,
            idle_secs = (now - job.updated_at) / 1000,
            "Job appears stalled"
        );
    }

    state.persist().await;
    report
}

/// Sweep forever at the configured interval
pub async fn run(state: AppState) {
    let period = state.config.retention.sweep_interval();
    info!(interval_secs = period.as_secs(), "Retention sweeper started");

    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately
    ticker.tick().await;

    loop {
        ticker.tick().await;
        sweep_once(&state, now_millis()).await;
    }
}
