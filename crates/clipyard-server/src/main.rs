//! clipyard server application.

use anyhow::{Context, Result};
use clap::Parser;
use clipyard_server::{create_router, sweeper, AppState, SnapshotWriter};
use shared::{Config, Database, DataPaths, JobManager, LogConfig, Store};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Override the configured port
    #[arg(short, long)]
    port: Option<u16>,

    /// Start with an empty store even if a snapshot exists
    #[arg(long)]
    fresh: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = Config::from_file(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;
    if let Some(port) = args.port {
        config.server.port = port;
    }

    // Initialize logging
    let mut log_config = LogConfig::from_config(&config, "clipyard-server");
    if args.verbose {
        log_config.default_level = tracing::Level::DEBUG;
    }
    shared::logging::init(log_config)?;

    info!("clipyard server starting");
    info!(config_file = %args.config.display(), "Loaded configuration");

    // Initialize data paths
    let data_paths = DataPaths::from_config(&config);
    data_paths
        .create_dirs()
        .context("Failed to create data directories")?;
    info!(
        root = %data_paths.root().display(),
        uploads = %data_paths.uploads_dir().display(),
        outputs = %data_paths.outputs_dir().display(),
        "Data directories ready"
    );

    // Restore state from the last snapshot
    let (manager, snapshots) = if config.database.enabled {
        let db_path = config.database_path();
        info!(db_path = %db_path.display(), "Opening database");
        let database = Database::open(&db_path).context("Failed to open database")?;

        let manager = if args.fresh {
            JobManager::new(Arc::new(Store::new()), config.limits.clone())
        } else {
            let snapshot = database
                .load_snapshot()
                .context("Failed to load store snapshot")?;
            JobManager::restore(snapshot, config.limits.clone())
        };
        (manager, Some(SnapshotWriter::new(database)))
    } else {
        info!("Persistence disabled, starting with an empty store");
        (JobManager::new(Arc::new(Store::new()), config.limits.clone()), None)
    };

    let (videos, jobs) = manager.store().counts();
    info!(videos, jobs, "Store ready");

    let bind_addr = config.bind_addr();
    let state = AppState::new(config, manager, snapshots);

    let sweeper = if state.config.retention.enabled {
        Some(tokio::spawn(sweeper::run(state.clone())))
    } else {
        info!("Retention sweeper disabled");
        None
    };

    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", bind_addr))?;
    info!(addr = %bind_addr, "Listening");

    axum::serve(listener, create_router(state.clone()))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    if let Some(handle) = sweeper {
        handle.abort();
    }

    // Final snapshot so a clean restart loses nothing
    state.persist().await;

    info!("clipyard server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => warn!(error = %e, "Failed to listen for shutdown signal"),
    }
}
