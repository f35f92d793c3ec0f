use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use tracing::instrument;

use super::models::{FinishedGame, StatsLedger};
use crate::shared::{AppError, AppState};

/// Default number of recent games returned when the caller does not ask for
/// a specific window.
const DEFAULT_RECENT_GAMES: usize = 2;

#[derive(Debug, Deserialize)]
pub struct RecentGamesParams {
    pub limit: Option<usize>,
}

/// GET /stats
///
/// The whole ledger: lifetime counters per player plus the finished-game
/// history under `_meta`.
#[instrument(name = "all_stats", skip(state))]
pub async fn all_stats(State(state): State<AppState>) -> Result<Json<StatsLedger>, AppError> {
    Ok(Json(state.stats.all_stats().await?))
}

/// GET /stats/recent?limit=N
///
/// Up to `limit` most recent finished games, oldest-first.
#[instrument(name = "recent_games", skip(state))]
pub async fn recent_games(
    State(state): State<AppState>,
    Query(params): Query<RecentGamesParams>,
) -> Result<Json<Vec<FinishedGame>>, AppError> {
    let limit = params.limit.unwrap_or(DEFAULT_RECENT_GAMES);
    Ok(Json(state.stats.recent_games(limit).await?))
}
