use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::models::ErrorResponse;

/// ApiError
///
/// Every failure a handler can report. The response body is always
/// `{ "error": <message> }` with a fixed, caller-facing message; the underlying
/// cause of an `Internal` error is logged, never returned.
#[derive(Debug, Error)]
pub enum ApiError {
    /// 400: only produced by upload validation.
    #[error("{0}")]
    BadRequest(&'static str),

    /// 401: missing or wrong admin bearer token.
    #[error("Unauthorized")]
    Unauthorized,

    /// 404: the addressed game does not exist.
    #[error("{0}")]
    NotFound(&'static str),

    /// 500: store, storage or any other unexpected failure.
    #[error("{0}")]
    Internal(&'static str),
}

impl ApiError {
    /// Logs `cause` at error level and collapses it into a 500 with `message`.
    pub fn internal(message: &'static str, cause: impl std::fmt::Display) -> Self {
        tracing::error!(error = %cause, "{}", message);
        ApiError::Internal(message)
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}
