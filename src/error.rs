use crate::datasource::ImportError;
use crate::db::StoreError;
use crate::domain::ValidationError;
use crate::orchestration::AssemblyError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Internal server error: {0}")]
    Internal(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        // Stored rows that fail validation are a server-side problem.
        AppError::Internal(err.to_string())
    }
}

impl From<ImportError> for AppError {
    fn from(err: ImportError) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

impl From<AssemblyError> for AppError {
    fn from(err: AssemblyError) -> Self {
        match err {
            AssemblyError::ProductNotFound(_) => AppError::NotFound(err.to_string()),
            AssemblyError::NoProducts
            | AssemblyError::EmptyTimeline
            | AssemblyError::TimelineTooLong { .. } => AppError::BadRequest(err.to_string()),
            AssemblyError::Store(e) => e.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}
