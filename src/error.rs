//! Error types for the HTTP boundary

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::extract::{ErrorResult, ExtractError};

/// Application-wide result type
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("No PDF data provided")]
    MissingInput,

    #[error("{0}")]
    InvalidRequest(String),

    #[error("invalid base64 PDF data: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error("Extraction timed out after {0} seconds")]
    Timeout(u64),

    #[error("extraction task failed: {0}")]
    Task(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::MissingInput => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();

        match &self {
            AppError::MissingInput => {
                tracing::warn!("Rejected request: {}", message);
                (status, Json(json!({ "error": message }))).into_response()
            }
            _ => {
                tracing::error!("Extraction failed: {}", message);
                (status, Json(ErrorResult::new(message))).into_response()
            }
        }
    }
}
