//! clipctl library: HTTP client and polling helpers for a clipyard server.

pub mod client;
pub mod display;
pub mod watch;

pub use client::{ApiRejection, ClipyardClient, CleanupSummary};
pub use watch::watch_job;
