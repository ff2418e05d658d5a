//! Handler errors and their JSON responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Validation error: {0}")]
    Validation(#[from] dompet_engine::Error),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl AppError {
    /// HTTP status. Clients treat 5xx as retryable and 4xx as final.
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Validation(dompet_engine::Error::UnknownCollection(_)) => StatusCode::NOT_FOUND,
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
        }
    }

    fn response_body(&self) -> ErrorResponse {
        let (error, details) = match self {
            AppError::Database(_) => ("Database error".to_string(), None),
            AppError::Validation(dompet_engine::Error::UnknownCollection(name)) => {
                ("Unknown collection".to_string(), Some(name.clone()))
            }
            AppError::Validation(e) => (e.to_string(), None),
            AppError::BadRequest(msg) | AppError::NotFound(msg) => (msg.clone(), None),
            AppError::Forbidden(msg) => ("Forbidden".to_string(), Some(msg.clone())),
        };
        ErrorResponse { error, details }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            AppError::Database(e) => tracing::error!(error = ?e, "Database error"),
            AppError::Validation(e) => tracing::warn!(error = %e, "Rejected document"),
            AppError::Forbidden(msg) => tracing::warn!(reason = %msg, "Forbidden"),
            _ => {}
        }

        (self.status(), Json(self.response_body())).into_response()
    }
}

/// Result type alias for handlers.
pub type Result<T> = std::result::Result<T, AppError>;
