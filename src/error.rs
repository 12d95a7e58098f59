use axum::{Json, http::StatusCode, response::{IntoResponse, Response}};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Failure categories of a catalog sync run.
///
/// `Config`, `Network`, `Auth` and `Schema` abort the run before any write.
/// `Record` and `UnmappedOrphan` are caught at the per-record boundary,
/// logged and counted.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error{}: {message}", status_suffix(.status))]
    Network { status: Option<u16>, message: String },

    #[error("Authentication error (HTTP {status}): {message}")]
    Auth { status: u16, message: String },

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Record {id} failed: {message}")]
    Record { id: String, message: String },

    #[error("No parent course found for offering {0}")]
    UnmappedOrphan(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

fn status_suffix(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!(" (HTTP {})", code),
        None => String::new(),
    }
}

impl SyncError {
    pub fn record(id: impl Into<String>, message: impl ToString) -> Self {
        SyncError::Record {
            id: id.into(),
            message: message.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Not found")]
    NotFound,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Internal server error")]
    InternalServerError,
}

impl From<SyncError> for AppError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::Database(e) => AppError::Database(e),
            SyncError::Config(msg) => {
                error!("configuration error: {}", msg);
                AppError::InternalServerError
            }
            e @ (SyncError::Network { .. } | SyncError::Auth { .. } | SyncError::Schema(_)) => {
                AppError::Upstream(e.to_string())
            }
            e @ (SyncError::Record { .. } | SyncError::UnmappedOrphan(_)) => {
                AppError::BadRequest(e.to_string())
            }
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::NotFound => (StatusCode::NOT_FOUND, "Not Found".to_string()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Upstream(msg) => {
                error!("upstream error: {}", msg);
                (StatusCode::BAD_GATEWAY, msg)
            }
            AppError::Database(e) => {
                error!("database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database error occurred".to_string(),
                )
            }
            AppError::InternalServerError => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        let body = Json(ErrorResponse {
            error: status.to_string(),
            message: error_message,
        });

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_error_surfaces_status() {
        let err = SyncError::Network { status: Some(503), message: "unavailable".into() };
        assert_eq!(err.to_string(), "Network error (HTTP 503): unavailable");

        let err = SyncError::Network { status: None, message: "connect refused".into() };
        assert_eq!(err.to_string(), "Network error: connect refused");
    }
}
