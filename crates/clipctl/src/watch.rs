//! Poll a job until it reaches a terminal state.

use crate::client::ClipyardClient;
use anyhow::{bail, Result};
use shared::{Job, JobStatus};
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::debug;

/// Re-fetch `job_id` every `interval` until it is completed or failed.
///
/// `on_change` is called with the first observation and whenever status or
/// progress changes. Returns the terminal job.
pub async fn watch_job<F>(
    client: &ClipyardClient,
    job_id: &str,
    interval: Duration,
    timeout: Option<Duration>,
    mut on_change: F,
) -> Result<Job>
where
    F: FnMut(&Job),
{
    let started = Instant::now();
    let mut last: Option<(JobStatus, u8)> = None;

    loop {
        let job = client.get_job(job_id).await?;

        let seen = (job.status, job.progress);
        if last != Some(seen) {
            on_change(&job);
            last = Some(seen);
        }

        if job.status.is_terminal() {
            return Ok(job);
        }

        if let Some(limit) = timeout {
            if started.elapsed() >= limit {
                bail!(
                    "Job {} still {} at {}% after {}s",
                    job_id,
                    job.status,
                    job.progress,
                    limit.as_secs()
                );
            }
        }

        debug!(job_id = %job_id, interval_ms = interval.as_millis(), "Polling again");
        sleep(interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ApiRejection;
    use clipyard_server::{create_router, AppState};
    use shared::{Config, JobManager, NewVideo, Store};
    use std::sync::Arc;
    use tempfile::TempDir;
    use tokio::net::TcpListener;

    async fn spawn_server() -> Result<(ClipyardClient, AppState, TempDir)> {
        let temp_dir = TempDir::new()?;
        let mut config = Config::default();
        config.data.root_dir = temp_dir.path().to_string_lossy().to_string();
        let manager = JobManager::new(Arc::new(Store::new()), config.limits.clone());
        let state = AppState::new(config, manager, None);

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let app = create_router(state.clone());
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        let client = ClipyardClient::new(format!("http://{}", addr), 0, 10)?;
        Ok((client, state, temp_dir))
    }

    fn register(state: &AppState, name: &str, duration: f64) -> Result<String> {
        let video = state.manager.register_video(NewVideo {
            filename: format!("{}.mp4", name),
            original_name: format!("{}.mp4", name),
            size: 4096,
            duration: Some(duration),
            path: format!("/srv/{}.mp4", name),
            ..Default::default()
        })?;
        Ok(video.id)
    }

    #[tokio::test]
    async fn test_watch_follows_job_to_completion() -> Result<()> {
        let (client, state, _dir) = spawn_server().await?;
        let video_id = register(&state, "lecture", 45.0)?;

        let job = client.split(&video_id, 10).await?;
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(client.polling_interval().await?, Duration::from_millis(2000));

        let worker = {
            let manager = state.manager.clone();
            let job_id = job.id.clone();
            tokio::spawn(async move {
                sleep(Duration::from_millis(30)).await;
                manager.claim(&job_id)?;
                for progress in [20u8, 60, 90] {
                    sleep(Duration::from_millis(30)).await;
                    manager.report_progress(&job_id, progress)?;
                }
                sleep(Duration::from_millis(30)).await;
                let outputs = (1..=5).map(|i| format!("part-{}", i)).collect();
                manager.complete(&job_id, outputs)?;
                Ok::<_, anyhow::Error>(())
            })
        };

        let mut seen = Vec::new();
        let done = watch_job(&client, &job.id, Duration::from_millis(5), None, |j| {
            seen.push((j.status, j.progress));
        })
        .await?;
        worker.await??;

        assert_eq!(done.status, JobStatus::Completed);
        assert_eq!(done.progress, 100);
        assert_eq!(seen.first(), Some(&(JobStatus::Pending, 0)));
        assert_eq!(seen.last(), Some(&(JobStatus::Completed, 100)));
        assert!(seen.windows(2).all(|w| w[0].1 <= w[1].1));

        let stats = client.get_stats().await?;
        assert_eq!(stats.total_segments_created, 5);
        Ok(())
    }

    #[tokio::test]
    async fn test_watch_times_out_on_unclaimed_job() -> Result<()> {
        let (client, state, _dir) = spawn_server().await?;
        let a = register(&state, "a", 10.0)?;
        let b = register(&state, "b", 10.0)?;
        let job = client.merge(&[a, b]).await?;

        let result = watch_job(
            &client,
            &job.id,
            Duration::from_millis(10),
            Some(Duration::from_millis(50)),
            |_| {},
        )
        .await;
        assert!(result.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn test_server_rejections_are_typed() -> Result<()> {
        let (client, state, _dir) = spawn_server().await?;

        let err = client.get_job("missing").await.unwrap_err();
        let rejection = err
            .downcast_ref::<ApiRejection>()
            .ok_or_else(|| anyhow::anyhow!("expected a rejection, got {}", err))?;
        assert!(rejection.is_not_found());

        let video_id = register(&state, "short", 5.0)?;
        let err = client.split(&video_id, 10).await.unwrap_err();
        let rejection = err
            .downcast_ref::<ApiRejection>()
            .ok_or_else(|| anyhow::anyhow!("expected a rejection, got {}", err))?;
        assert_eq!(rejection.code, "INVALID_REQUEST");

        let summary = client.cleanup().await?;
        assert_eq!(summary.removed_jobs, 0);
        Ok(())
    }
}
