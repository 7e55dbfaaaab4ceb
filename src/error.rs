use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use miette::Diagnostic;
use thiserror::Error;
use tracing::error;

use crate::model::StoreError;

/// Main error type for the application
#[derive(Debug, Error, Diagnostic)]
pub enum Error {
    #[error("Environment error: {0}")]
    #[diagnostic(code(kutsu::environment))]
    Environment(String),

    #[error(transparent)]
    #[diagnostic(code(kutsu::io))]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    #[diagnostic(code(kutsu::other))]
    Other(String),
}

/// Type alias for Result with our Error type
pub type AppResult<T> = Result<T, Error>;

/// Request-level error. Each variant maps to one HTTP status with a short
/// fixed body; the caller never sees internal detail.
#[derive(Debug, Error)]
pub enum HttpError {
    #[error("missing required fields: {0}")]
    Validation(String),
    #[error("conflict: {0}")]
    Conflict(&'static str),
    #[error("event not found")]
    NotFound,
    #[error("attendee listing is not implemented")]
    NotImplemented,
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for HttpError {
    fn from(err: StoreError) -> Self {
        HttpError::Internal(err.to_string())
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            HttpError::Validation(_) => (StatusCode::BAD_REQUEST, "Bad Request"),
            HttpError::Conflict(_) => (StatusCode::CONFLICT, "Conflict"),
            HttpError::NotFound => (StatusCode::NOT_FOUND, "Not Found"),
            HttpError::NotImplemented => (StatusCode::NOT_IMPLEMENTED, "Not Implemented"),
            HttpError::Internal(detail) => {
                error!("{detail}");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
            }
        };
        (status, body).into_response()
    }
}
