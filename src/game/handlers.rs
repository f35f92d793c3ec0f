use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use super::{manager::VoteReceipt, Role};
use crate::shared::{AppError, AppState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequest {
    pub player_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinResponse {
    pub players: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartResponse {
    pub match_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    pub voter_id: String,
    pub target_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteResponse {
    pub votes_cast: usize,
    pub alive: usize,
}

impl From<VoteReceipt> for VoteResponse {
    fn from(receipt: VoteReceipt) -> Self {
        Self {
            votes_cast: receipt.votes_cast,
            alive: receipt.alive,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NightActionRequest {
    pub role: Role,
    pub actor_id: String,
    pub target_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleResponse {
    pub role: Role,
}

#[derive(Debug, Serialize)]
pub struct Ack {
    pub status: &'static str,
}

/// POST /channels/{channel_id}/join
#[instrument(name = "join_match", skip(state))]
pub async fn join_match(
    State(state): State<AppState>,
    Path(channel_id): Path<String>,
    Json(request): Json<JoinRequest>,
) -> Result<Json<JoinResponse>, AppError> {
    let players = state.manager.join(&channel_id, &request.player_id).await?;
    Ok(Json(JoinResponse { players }))
}

/// POST /channels/{channel_id}/start
///
/// Locks the roster and kicks off the first night.
#[instrument(name = "start_match", skip(state))]
pub async fn start_match(
    State(state): State<AppState>,
    Path(channel_id): Path<String>,
) -> Result<Json<StartResponse>, AppError> {
    let match_id = state.manager.start_match(&channel_id).await?;
    info!(channel_id = %channel_id, match_id = %match_id, "Match started via command layer");
    Ok(Json(StartResponse { match_id }))
}

/// POST /channels/{channel_id}/votes
#[instrument(name = "cast_vote", skip(state))]
pub async fn cast_vote(
    State(state): State<AppState>,
    Path(channel_id): Path<String>,
    Json(request): Json<VoteRequest>,
) -> Result<Json<VoteResponse>, AppError> {
    let receipt = state
        .manager
        .cast_vote(&channel_id, &request.voter_id, &request.target_id)
        .await?;
    Ok(Json(receipt.into()))
}

/// POST /channels/{channel_id}/night-actions
#[instrument(name = "submit_night_action", skip(state, request))]
pub async fn submit_night_action(
    State(state): State<AppState>,
    Path(channel_id): Path<String>,
    Json(request): Json<NightActionRequest>,
) -> Result<Json<Ack>, AppError> {
    state
        .manager
        .submit_night_action(
            &channel_id,
            request.role,
            &request.actor_id,
            &request.target_id,
        )
        .await?;
    Ok(Json(Ack { status: "recorded" }))
}

/// GET /channels/{channel_id}/players/{player_id}/role
#[instrument(name = "player_role", skip(state))]
pub async fn player_role(
    State(state): State<AppState>,
    Path((channel_id, player_id)): Path<(String, String)>,
) -> Result<Json<RoleResponse>, AppError> {
    let role = state.manager.player_role(&channel_id, &player_id).await?;
    Ok(Json(RoleResponse { role }))
}

/// POST /channels/{channel_id}/reset
#[instrument(name = "reset_match", skip(state))]
pub async fn reset_match(
    State(state): State<AppState>,
    Path(channel_id): Path<String>,
) -> Result<Json<Ack>, AppError> {
    state.manager.reset(&channel_id).await;
    Ok(Json(Ack { status: "reset" }))
}
