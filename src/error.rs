//! Error model shared by every layer of the service
//!
//! All failures that reach a client are an [`ApiError`]: a status code and a
//! human readable message. [`error_response`] is the only place an error is
//! turned into a wire response.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::database::StoreError;

/// Message used for any error that does not carry its own status/message
pub const GENERIC_MESSAGE: &str = "Something went wrong";

/// An error that knows which HTTP status it maps to
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{status}: {message}")]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// 400 - malformed payload or identifier
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    /// 401 - missing, invalid or expired token
    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "Unauthorized")
    }

    /// 404 - unknown user or URL
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    /// 409 - duplicate resource
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    /// 500 - signing, storage or unclassified failure
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Renders any error as `{"message": ...}`
///
/// An [`ApiError`] keeps its own status and message. Anything else collapses
/// to `500` with [`GENERIC_MESSAGE`].
pub fn error_response(err: &(dyn std::error::Error + 'static)) -> Response {
    let (status, message) = match err.downcast_ref::<ApiError>() {
        Some(api) => (api.status, api.message.as_str()),
        None => (StatusCode::INTERNAL_SERVER_ERROR, GENERIC_MESSAGE),
    };

    (status, Json(json!({ "message": message }))).into_response()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        error_response(&self)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UsernameTaken => ApiError::conflict("Username taken"),
            other => {
                tracing::error!(error = %other, "storage failure");
                ApiError::internal(GENERIC_MESSAGE)
            }
        }
    }
}
