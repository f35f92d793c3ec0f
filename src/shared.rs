use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;

use crate::game::{GameError, MatchManager};
use crate::stats::{StatsError, StatsService};

/// Shared application state containing all dependencies
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<MatchManager>,
    pub stats: Arc<StatsService>,
}

impl AppState {
    pub fn new(manager: Arc<MatchManager>, stats: Arc<StatsService>) -> Self {
        Self { manager, stats }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    /// An intent arrived outside its valid phase or for an ineligible
    /// actor/target. Reported as a refusal; no state changed.
    #[error(transparent)]
    Rejected(#[from] GameError),

    #[error(transparent)]
    Stats(#[from] StatsError),

    #[error("Internal server error")]
    Internal,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::Rejected(err) => {
                let status = match err {
                    GameError::NoMatch | GameError::NotInMatch => StatusCode::NOT_FOUND,
                    GameError::NotEnoughPlayers { .. }
                    | GameError::NoNightAction
                    | GameError::WrongRole { .. } => StatusCode::BAD_REQUEST,
                    _ => StatusCode::CONFLICT,
                };
                (status, err.to_string())
            }
            AppError::Stats(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
            AppError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        let body = Json(json!({
            "error": error_message
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
pub mod test_utils {
    use super::*;
    use crate::chat::RecordingGateway;
    use crate::game::{EngineConfig, RandomRoleAllocator};
    use crate::stats::InMemoryStatsRepository;

    /// App state wired entirely with in-memory collaborators.
    pub fn app_state() -> AppState {
        let gateway = Arc::new(RecordingGateway::new());
        let stats = Arc::new(StatsService::new(Arc::new(InMemoryStatsRepository::new())));
        let manager = Arc::new(MatchManager::new(
            gateway,
            stats.clone(),
            Arc::new(RandomRoleAllocator),
            EngineConfig::default(),
        ));
        AppState::new(manager, stats)
    }
}
