use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use std::time::Duration;
use thiserror::Error;

use crate::types::ErrorResponse;

/// Why a classification could not be produced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassifyError {
    #[error("Invalid API key or unauthorized access")]
    Unauthorized,
    #[error("Rate limit exceeded. Please try again later")]
    RateLimited,
    #[error("API request timed out after {0:?}")]
    Timeout(Duration),
    #[error("API request failed: {0}")]
    Request(String),
    #[error("Invalid API response structure: {0}")]
    InvalidEnvelope(String),
    #[error("Could not extract a valid classification from the model response")]
    Unparseable,
    #[error("Missing required fields in classification: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),
}

impl ClassifyError {
    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ClassifyError::Unauthorized => "unauthorized",
            ClassifyError::RateLimited => "rate_limited",
            ClassifyError::Timeout(_) => "timeout",
            ClassifyError::Request(_) => "request",
            ClassifyError::InvalidEnvelope(_) => "invalid_envelope",
            ClassifyError::Unparseable => "unparseable",
            ClassifyError::MissingFields(_) => "missing_fields",
        }
    }
}

/// A failure rendered at the HTTP boundary as `{"success": false, "error": ...}`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }
}

impl From<ClassifyError> for ApiError {
    fn from(err: ClassifyError) -> Self {
        Self::bad_request(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorResponse::new(self.message))).into_response()
    }
}
