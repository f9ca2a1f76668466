//! Shared types for API responses

use serde::{Deserialize, Serialize};

/// Success envelope. Failures are rendered by `QuestError`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardQuery {
    pub force_refresh: Option<String>,
}

impl LeaderboardQuery {
    /// Only the literal `true` forces a recompute; anything else reads the cache.
    pub fn force_refresh(&self) -> bool {
        self.force_refresh.as_deref() == Some("true")
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CleanupResponse {
    pub cleaned: usize,
}
