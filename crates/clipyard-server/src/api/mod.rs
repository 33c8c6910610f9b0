//! HTTP/JSON surface.
//!
//! Organizes routes by resource type. Clients observe jobs by polling; there
//! is no push channel.

pub mod error;
pub mod jobs;
pub mod maintenance;
pub mod stats;
pub mod videos;

use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Create the main API router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(videos::router())
        .merge(jobs::router())
        .merge(stats::router())
        .merge(maintenance::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
