//! Leaderboard API handlers
//!
//! - get_leaderboard (optional forceRefresh)
//! - get_leaderboard_stats
//! - get_user_position
//! - refresh_leaderboard
//! - cleanup_leaderboards

use axum::{
    extract::{Path, Query, State},
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::db::models::BalanceStats;
use crate::error::{QuestError, Result};
use crate::services::leaderboard::{LeaderboardSnapshot, UserPosition};

use super::types::{ApiResponse, CleanupResponse, LeaderboardQuery};
use super::AppState;

pub async fn get_leaderboard(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LeaderboardQuery>,
) -> Result<Json<ApiResponse<LeaderboardSnapshot>>> {
    let snapshot = state.leaderboard.get(params.force_refresh()).await?;
    Ok(Json(ApiResponse::ok(snapshot)))
}

pub async fn get_leaderboard_stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<BalanceStats>>> {
    let stats = state.leaderboard.stats().await?;
    Ok(Json(ApiResponse::ok(stats)))
}

/// 404 unless the user is inside the current top-K.
pub async fn get_user_position(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<ApiResponse<UserPosition>>> {
    match state.leaderboard.user_position(user_id).await? {
        Some(position) => Ok(Json(ApiResponse::ok(position))),
        None => Err(QuestError::UserNotFound(format!(
            "{} is not on the leaderboard",
            user_id
        ))),
    }
}

pub async fn refresh_leaderboard(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<LeaderboardSnapshot>>> {
    let snapshot = state.leaderboard.refresh().await?;
    tracing::info!(
        entries = snapshot.entries.len(),
        valid_until_block = snapshot.valid_until_block,
        "Leaderboard refreshed on request"
    );
    Ok(Json(ApiResponse::ok(snapshot)))
}

pub async fn cleanup_leaderboards(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<CleanupResponse>>> {
    let cleaned = state.leaderboard.cleanup().await?;
    Ok(Json(ApiResponse::ok(CleanupResponse { cleaned })))
}
