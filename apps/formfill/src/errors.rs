use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::fill::orchestrator::FillError;
use crate::memory::store::MemoryError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),

    #[error("Fill error: {0}")]
    Fill(#[from] FillError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Memory(e @ MemoryError::Evicted(_)) => {
                tracing::warn!("Memory write rejected: {e}");
                (
                    StatusCode::PAYLOAD_TOO_LARGE,
                    "MEMORY_RECORD_TOO_LARGE",
                    e.to_string(),
                )
            }
            AppError::Memory(e) => {
                tracing::error!("Memory store error: {e}");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "STORE_WRITE_FAILURE",
                    "The memory store could not be written".to_string(),
                )
            }
            AppError::Fill(e) => {
                tracing::warn!("Fill session aborted: {e}");
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "FILL_ABORTED",
                    e.to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
