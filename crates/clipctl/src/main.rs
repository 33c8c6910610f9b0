//! clipctl: command-line client for a clipyard server.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use clipctl::{display, watch_job, ClipyardClient};
use shared::{Config, JobStatus, LogConfig};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Server base URL (overrides `[server] base_url`)
    #[arg(short, long)]
    server: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List videos, newest first
    Videos,
    /// List jobs, newest first
    Jobs,
    /// Show cumulative stats
    Stats,
    /// Show achievement progress
    Achievements,
    /// Split a video into fixed-length segments
    Split {
        video_id: String,
        /// Segment length in seconds
        #[arg(short = 'd', long)]
        segment_duration: u32,
        /// Poll the job until it finishes
        #[arg(short, long)]
        watch: bool,
    },
    /// Merge videos in the given order
    Merge {
        #[arg(num_args = 2.., required = true)]
        video_ids: Vec<String>,
        /// Poll the job until it finishes
        #[arg(short, long)]
        watch: bool,
    },
    /// Poll a job until it completes or fails
    Watch {
        job_id: String,
        /// Give up after this many seconds
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Delete a video
    DeleteVideo { video_id: String },
    /// Remove finished jobs and unreferenced videos now
    Cleanup,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load_or_default(&args.config);

    let mut log_config = LogConfig::from_config(&config, "clipctl");
    log_config.file = false;
    log_config.default_level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    shared::logging::init(log_config)?;

    let base_url = args
        .server
        .clone()
        .unwrap_or_else(|| config.server.base_url.clone());
    let client = ClipyardClient::new(base_url, 2, 500)?;

    match args.command {
        Command::Videos => {
            let videos = client.list_videos().await?;
            if videos.is_empty() {
                println!("No videos");
            }
            for video in &videos {
                println!("{}", display::video_line(video));
            }
        }
        Command::Jobs => {
            let jobs = client.list_jobs().await?;
            if jobs.is_empty() {
                println!("No jobs");
            }
            for job in &jobs {
                println!("{}", display::job_line(job));
            }
        }
        Command::Stats => {
            let stats = client.get_stats().await?;
            for line in display::stats_lines(&stats) {
                println!("{}", line);
            }
        }
        Command::Achievements => {
            for achievement in client.achievements().await? {
                println!("{}", display::achievement_line(&achievement));
            }
        }
        Command::Split {
            video_id,
            segment_duration,
            watch,
        } => {
            let job = client.split(&video_id, segment_duration).await?;
            println!("Submitted split job {}", job.id);
            if watch {
                follow(&client, &job.id, None).await?;
            }
        }
        Command::Merge { video_ids, watch } => {
            let job = client.merge(&video_ids).await?;
            println!("Submitted merge job {}", job.id);
            if watch {
                follow(&client, &job.id, None).await?;
            }
        }
        Command::Watch { job_id, timeout } => {
            follow(&client, &job_id, timeout.map(Duration::from_secs)).await?;
        }
        Command::DeleteVideo { video_id } => {
            client.delete_video(&video_id).await?;
            println!("Deleted video {}", video_id);
        }
        Command::Cleanup => {
            let summary = client.cleanup().await?;
            println!(
                "Removed {} job(s) and {} video(s), deleted {} file(s)",
                summary.removed_jobs, summary.removed_videos, summary.media_deleted
            );
        }
    }

    Ok(())
}

/// Watch a job at the server's polling interval and print each change
async fn follow(client: &ClipyardClient, job_id: &str, timeout: Option<Duration>) -> Result<()> {
    let interval = client
        .polling_interval()
        .await
        .context("Failed to fetch polling interval")?;

    let job = watch_job(client, job_id, interval, timeout, |job| {
        println!("{}", display::job_line(job));
    })
    .await?;

    if job.status == JobStatus::Error {
        anyhow::bail!(
            "Job {} failed: {}",
            job.id,
            job.error.as_deref().unwrap_or("unknown error")
        );
    }
    println!("Outputs: {}", job.output_videos.join(", "));
    Ok(())
}
