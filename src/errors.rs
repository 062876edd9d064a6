use crate::services::{
    oauth_service::OAuthError, object_store::StoreError, session_service::SessionError,
};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::fmt;

/// A lightweight wrapper for request-level errors.
///
/// The message is what the browser sees, so it never carries upstream
/// details; those are logged where the error is raised.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }

    /// Shortcut for a 500 Internal Server Error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    /// Shortcut for 404 Not Found
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, msg)
    }

    /// Shortcut for 403 Forbidden
    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, msg)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status, format!("{}\n", self.message)).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::ObjectNotFound { .. } => AppError::not_found("404 page not found"),
            other => {
                tracing::error!(error = %other, "object store failure");
                AppError::internal("An internal error has occurred")
            }
        }
    }
}

impl From<OAuthError> for AppError {
    fn from(err: OAuthError) -> Self {
        tracing::error!(error = %err, "oauth handshake failed");
        AppError::internal("Internal server error")
    }
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        tracing::error!(error = %err, "could not mint session cookie");
        AppError::internal("Internal server error")
    }
}
