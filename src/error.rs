use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::db::models::QuestStatus;

#[derive(Error, Debug)]
pub enum QuestError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Optimistic lock conflict on {entity}: {detail}")]
    OptimisticLockConflict { entity: &'static str, detail: String },

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Quest not found: {0}")]
    QuestNotFound(String),

    #[error("Illegal quest status transition: {from} -> {to}")]
    InvalidTransition { from: QuestStatus, to: QuestStatus },

    #[error("Entity store error: {0}")]
    EntityStore(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl QuestError {
    /// Not-found errors are benign skips for the ingestion pipelines.
    pub fn is_not_found(&self) -> bool {
        matches!(self, QuestError::UserNotFound(_) | QuestError::QuestNotFound(_))
    }
}

impl IntoResponse for QuestError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            QuestError::Database(ref e) => {
                tracing::error!("Database error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error")
            }
            QuestError::Provider(ref e) => {
                tracing::error!("Provider error: {}", e);
                (StatusCode::BAD_GATEWAY, "Blockchain provider error")
            }
            QuestError::Decode(ref e) => {
                tracing::warn!("Decode error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Decode error")
            }
            QuestError::OptimisticLockConflict { entity, ref detail } => {
                tracing::warn!(entity, "Optimistic lock conflict: {}", detail);
                (StatusCode::CONFLICT, "Concurrent modification")
            }
            QuestError::UserNotFound(_) | QuestError::QuestNotFound(_) => {
                (StatusCode::NOT_FOUND, "Not found")
            }
            QuestError::InvalidTransition { .. } => {
                (StatusCode::CONFLICT, "Illegal status transition")
            }
            QuestError::EntityStore(ref e) => {
                tracing::error!("Entity store error: {}", e);
                (StatusCode::BAD_GATEWAY, "Entity store error")
            }
            QuestError::Config(ref e) => {
                tracing::error!("Configuration error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Configuration error")
            }
            QuestError::Internal(ref e) => {
                tracing::error!("Internal error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal error")
            }
        };

        let body = Json(json!({
            "success": false,
            "message": error_message,
            "details": self.to_string(),
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, QuestError>;

impl From<anyhow::Error> for QuestError {
    fn from(err: anyhow::Error) -> Self {
        QuestError::Internal(format!("{:#}", err))
    }
}
