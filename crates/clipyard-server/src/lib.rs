//! clipyard HTTP server.
//!
//! Exposes the job lifecycle core over HTTP/JSON, runs the retention sweeper
//! and snapshots the store to SQLite.

pub mod api;
pub mod persist;
pub mod state;
pub mod sweeper;

pub use api::create_router;
pub use persist::SnapshotWriter;
pub use state::AppState;
