//! Shared library for clipyard, the video job lifecycle core.
//!
//! This crate provides everything the server and the CLI have in common:
//! - Configuration management
//! - Entity store and job lifecycle manager
//! - Stats aggregation and achievements
//! - Polling queries and retention sweeps
//! - SQLite snapshots and file path utilities
//! - Logging infrastructure
//! - Shared error types

pub mod config;
pub mod db;
pub mod error;
pub mod lifecycle;
pub mod logging;
pub mod models;
pub mod paths;
pub mod query;
pub mod retention;
pub mod stats;
pub mod store;

// Re-export commonly used types
pub use config::Config;
pub use db::Database;
pub use error::{JobError, JobResult};
pub use lifecycle::JobManager;
pub use logging::LogConfig;
pub use models::*;
pub use paths::DataPaths;
pub use query::PollingQuery;
pub use retention::{CleanupReport, RetentionPolicy};
pub use store::{Store, StoreSnapshot};

/// Common result type using anyhow::Error
pub type Result<T> = anyhow::Result<T>;
