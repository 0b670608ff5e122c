//! Response types for the Exam Data Manager API.
//!
//! This module defines the success envelopes, the error body and the
//! translation from [`ServiceError`] to HTTP status codes.

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::error::ServiceError;
use crate::models::IngestionJob;

/// Success envelope for a single value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// Always true.
    pub success: bool,
    /// Human-readable message.
    pub message: String,
    /// Payload.
    pub data: T,
}

impl<T> ApiResponse<T> {
    /// Wraps a payload.
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data,
        }
    }
}

/// Success envelope for a list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListResponse<T> {
    /// Always true.
    pub success: bool,
    /// Human-readable message.
    pub message: String,
    /// Items.
    pub data: Vec<T>,
    /// Number of items.
    pub total: usize,
}

impl<T> ListResponse<T> {
    /// Wraps a list.
    pub fn ok(message: impl Into<String>, data: Vec<T>) -> Self {
        Self {
            success: true,
            message: message.into(),
            total: data.len(),
            data,
        }
    }
}

/// A job snapshot with its completion percentage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatusResponse {
    /// The job.
    #[serde(flatten)]
    pub job: IngestionJob,
    /// Rows processed as a percentage of rows total.
    pub percent: f64,
}

impl From<IngestionJob> for JobStatusResponse {
    fn from(job: IngestionJob) -> Self {
        Self {
            percent: job.progress.percent(),
            job,
        }
    }
}

/// Body of the upload acknowledgement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadAccepted {
    /// Job id to poll.
    pub task_id: String,
    /// Status at acceptance time.
    pub status: String,
    /// Where to poll.
    pub status_url: String,
    /// Where the processed workbook will be.
    pub download_url: String,
}

/// API error response structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Optional details about the error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    /// Creates a new API error.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    /// Creates a new API error with details.
    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: Some(details.into()),
        }
    }

    /// Creates a validation error response.
    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    /// Creates a malformed JSON error response.
    pub fn malformed_json(message: impl Into<String>) -> Self {
        Self::new("MALFORMED_JSON", message)
    }
}

/// API error with HTTP status code.
#[derive(Debug)]
pub struct ApiErrorResponse {
    /// The HTTP status code.
    pub status: StatusCode,
    /// The error body.
    pub error: ApiError,
}

impl ApiErrorResponse {
    /// Pairs a status with an error body.
    pub fn new(status: StatusCode, error: ApiError) -> Self {
        Self { status, error }
    }
}

impl IntoResponse for ApiErrorResponse {
    fn into_response(self) -> Response {
        (self.status, Json(self.error)).into_response()
    }
}

impl From<ServiceError> for ApiErrorResponse {
    fn from(error: ServiceError) -> Self {
        match error {
            ServiceError::Validation { field, message } => ApiErrorResponse::new(
                StatusCode::BAD_REQUEST,
                ApiError::with_details(
                    "VALIDATION_ERROR",
                    message,
                    format!("Invalid value for '{}'", field),
                ),
            ),
            ServiceError::NotFound { resource, id } => ApiErrorResponse::new(
                StatusCode::NOT_FOUND,
                ApiError::new("NOT_FOUND", format!("{} not found: {}", resource, id)),
            ),
            ServiceError::Conflict { message } => {
                ApiErrorResponse::new(StatusCode::CONFLICT, ApiError::new("CONFLICT", message))
            }
            ServiceError::ServiceUnavailable { service, message } => ApiErrorResponse::new(
                StatusCode::SERVICE_UNAVAILABLE,
                ApiError::with_details(
                    "SERVICE_UNAVAILABLE",
                    format!("{} is unavailable", service),
                    message,
                ),
            ),
            ServiceError::Internal { message } => ApiErrorResponse::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiError::with_details("INTERNAL_ERROR", "Internal server error", message),
            ),
            ServiceError::ConfigNotFound { path } => ApiErrorResponse::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiError::with_details(
                    "CONFIG_ERROR",
                    "Configuration error",
                    format!("Configuration file not found: {}", path),
                ),
            ),
            ServiceError::ConfigParse { path, message } => ApiErrorResponse::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiError::with_details(
                    "CONFIG_ERROR",
                    "Configuration parse error",
                    format!("Failed to parse {}: {}", path, message),
                ),
            ),
            ServiceError::InvalidConfig { key, message } => ApiErrorResponse::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiError::with_details(
                    "CONFIG_ERROR",
                    "Configuration error",
                    format!("{}: {}", key, message),
                ),
            ),
        }
    }
}

impl From<JsonRejection> for ApiErrorResponse {
    fn from(rejection: JsonRejection) -> Self {
        let error = match rejection {
            JsonRejection::JsonDataError(err) => {
                // serde's message is in the body text
                let body_text = err.body_text();
                if body_text.contains("missing field") {
                    ApiError::validation_error(body_text)
                } else {
                    ApiError::malformed_json(body_text)
                }
            }
            JsonRejection::JsonSyntaxError(err) => {
                ApiError::malformed_json(format!("Invalid JSON syntax: {}", err))
            }
            JsonRejection::MissingJsonContentType(_) => {
                ApiError::new("MISSING_CONTENT_TYPE", "Content-Type must be application/json")
            }
            _ => ApiError::malformed_json("Failed to parse request body"),
        };
        ApiErrorResponse::new(StatusCode::BAD_REQUEST, error)
    }
}
