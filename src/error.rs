//! # Error Handling
//!
//! This module defines the application error type and how it is converted to
//! HTTP responses.
//!
//! ## Error Categories:
//! - **BadRequest**: the upload failed validation (400 errors)
//! - **PayloadTooLarge**: the upload exceeded the configured size limit (413)
//! - **Transcription**: model load or inference failed (500 errors)
//! - **Internal**: any other server-side problem (500 errors)
//!
//! ## JSON Response Format:
//! Every error body has the same flat shape the API contract promises:
//! ```json
//! {"error": "Unsupported file type"}
//! ```
//! Validation errors carry fixed messages; transcription errors carry the
//! underlying failure's message text with no further classification.

use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use std::fmt;

/// Custom error types for the application.
///
/// ## Usage Example:
/// ```rust
/// return Err(AppError::BadRequest("Unsupported file type".to_string()));
/// ```
#[derive(Debug)]
pub enum AppError {
    /// Client sent invalid or malformed upload data
    BadRequest(String),

    /// Upload body exceeded the configured size ceiling
    PayloadTooLarge(String),

    /// Model loading or inference failed; carries the collaborator's message
    Transcription(String),

    /// Internal server errors (task panics, IO problems, etc.)
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::PayloadTooLarge(msg) => write!(f, "Payload too large: {}", msg),
            AppError::Transcription(msg) => write!(f, "Transcription error: {}", msg),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

/// Implementation of the ResponseError trait for AppError.
///
/// ## HTTP Status Code Mapping:
/// - BadRequest → 400 (Bad Request)
/// - PayloadTooLarge → 413 (Payload Too Large)
/// - Transcription/Internal → 500 (Internal Server Error)
///
/// The body is always `{"error": <message>}` so clients can rely on a single
/// error shape across validation and inference failures.
impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (actix_web::http::StatusCode::BAD_REQUEST, msg),
            AppError::PayloadTooLarge(msg) => {
                (actix_web::http::StatusCode::PAYLOAD_TOO_LARGE, msg)
            }
            AppError::Transcription(msg) => {
                (actix_web::http::StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
            AppError::Internal(msg) => (actix_web::http::StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        HttpResponse::build(status).json(json!({ "error": message }))
    }
}

/// Automatic conversion from anyhow::Error to AppError.
///
/// ## Usage:
/// When you use `?` with an anyhow::Error in a handler, it becomes an
/// AppError::Internal carrying the error's message text.
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

/// Uploads are streamed to a temp file; IO failures while doing that are
/// server-side problems, not client mistakes.
impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

/// Type alias for Results that use our custom error type.
pub type AppResult<T> = Result<T, AppError>;
