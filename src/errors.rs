// src/errors.rs

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use thiserror::Error;
use validator::ValidationErrors;

use crate::models::ImageRole;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Image upload failed ({role}): {message}")]
    Upload { role: ImageRole, message: String },

    #[error("All image uploads failed: {0}")]
    UploadsFailed(String),

    #[error("Category lookup failed: {0}")]
    CategoryLookup(String),

    #[error("Product registration failed: {0}")]
    Registration(String),

    #[error("Validation errors")]
    ValidationError(#[from] ValidationErrors),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Provider unreachable: {0}")]
    Network(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Copy generation failed: {0}")]
    CopyGeneration(String),

    #[error("Image processing failed: {0}")]
    ImageProcessing(String),

    #[error("Resource not found")]
    NotFound,

    #[error("Internal server error: {0}")]
    InternalServerError(String),
}

impl AppError {
    /// Whether resubmitting the same input later can succeed. Input problems
    /// have to be fixed by the caller first.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            AppError::Configuration(_)
                | AppError::ValidationError(_)
                | AppError::Validation(_)
                | AppError::BadRequest(_)
                | AppError::ImageProcessing(_)
                | AppError::NotFound
        )
    }

    /// Flattens validator output into one human readable line.
    pub fn validation_summary(errors: &ValidationErrors) -> String {
        let mut messages = Vec::new();
        for (field, field_errors) in errors.field_errors() {
            for error in field_errors {
                let msg = error.message.as_ref().map_or_else(
                    || format!("field '{}' is invalid", field),
                    |m| format!("{}: {}", field, m),
                );
                messages.push(msg);
            }
        }
        messages.sort();
        messages.join("; ")
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let retryable = self.is_retryable();
        let (status, error_message) = match self {
            AppError::Configuration(message) => {
                tracing::error!("Configuration error: {}", message);
                (StatusCode::INTERNAL_SERVER_ERROR, message)
            }
            AppError::ValidationError(ref errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                AppError::validation_summary(errors),
            ),
            AppError::Validation(message) => (StatusCode::UNPROCESSABLE_ENTITY, message),
            AppError::ImageProcessing(message) => (StatusCode::UNPROCESSABLE_ENTITY, message),
            AppError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            AppError::NotFound => (StatusCode::NOT_FOUND, "Resource not found".to_string()),
            AppError::Timeout(message) => (StatusCode::GATEWAY_TIMEOUT, message),
            AppError::InternalServerError(message) => (StatusCode::INTERNAL_SERVER_ERROR, message),
            provider_error @ (AppError::Authentication(_)
            | AppError::Upload { .. }
            | AppError::UploadsFailed(_)
            | AppError::CategoryLookup(_)
            | AppError::Registration(_)
            | AppError::Network(_)
            | AppError::CopyGeneration(_)) => (StatusCode::BAD_GATEWAY, provider_error.to_string()),
        };

        let body = Json(json!({ "error": error_message, "retryable": retryable }));
        (status, body).into_response()
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        tracing::error!("HTTP client error: {:?}", err);
        if err.is_timeout() {
            AppError::Timeout(format!("provider request timed out: {}", err))
        } else {
            AppError::Network(err.to_string())
        }
    }
}
