//! API module - REST API handlers split by domain
//!
//! Structure:
//! - leaderboard: Cached ranking, user position, stats, maintenance
//! - types: Response envelope and query params

mod leaderboard;
pub mod types;

pub use leaderboard::*;

use axum::http::{header, HeaderValue, Method};
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::services::LeaderboardCache;

pub struct AppState {
    pub leaderboard: Arc<LeaderboardCache>,
}

pub async fn health_check() -> &'static str {
    "OK"
}

pub fn router(state: Arc<AppState>, cors_origins: &[String]) -> Router {
    let origins: Vec<HeaderValue> = cors_origins
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();

    info!("CORS allowed origins: {:?}", cors_origins);

    Router::new()
        .route("/", get(health_check))
        .route("/api/leaderboard", get(get_leaderboard))
        .route("/api/leaderboard/stats", get(get_leaderboard_stats))
        .route("/api/leaderboard/user/:user_id", get(get_user_position))
        .route("/api/leaderboard/refresh", post(refresh_leaderboard))
        .route("/api/leaderboard/cleanup", post(cleanup_leaderboards))
        // Request timeout: 30 seconds
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(origins))
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
                .allow_credentials(true),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
