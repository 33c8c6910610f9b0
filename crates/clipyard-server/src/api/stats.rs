//! Stats and achievements.

use axum::{extract::State, routing::get, Json, Router};
use shared::query::Overview;
use shared::stats::AchievementStatus;
use shared::Stats;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/stats", get(get_stats))
        .route("/api/achievements", get(get_achievements))
        .route("/api/overview", get(get_overview))
}

async fn get_stats(State(state): State<AppState>) -> Json<Stats> {
    Json(state.query.get_stats())
}

async fn get_achievements(State(state): State<AppState>) -> Json<Vec<AchievementStatus>> {
    Json(state.query.achievements())
}

async fn get_overview(State(state): State<AppState>) -> Json<Overview> {
    Json(state.query.overview())
}
