//! services/api/src/error.rs
//!
//! Defines the primary error type for the entire API service and how each
//! failure is reported to an HTTP client.

use crate::config::ConfigError;
use axum::http::StatusCode;
use lumina_core::{AuthError, CoreError, PortError, QuizError, ValidationError};
use tracing::error;

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A rejected login, sign-up or form submission from the core components.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    #[error(transparent)]
    Quiz(#[from] QuizError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration Error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        ApiError::Core(e.into())
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        ApiError::Core(e.into())
    }
}

/// What the REST handlers return on failure.
pub type Rejection = (StatusCode, String);

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Core(CoreError::Auth(AuthError::NotFound)) => StatusCode::UNAUTHORIZED,
            ApiError::Core(CoreError::Auth(AuthError::NameTaken)) => StatusCode::CONFLICT,
            ApiError::Core(CoreError::Auth(AuthError::WeakCode)) => StatusCode::BAD_REQUEST,
            ApiError::Core(CoreError::Validation(_)) => StatusCode::BAD_REQUEST,
            ApiError::Core(CoreError::Port(e)) | ApiError::Port(e) => port_status(e),
            ApiError::Quiz(_) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Converts into the `(status, message)` pair handlers reply with, logging server faults.
    pub fn into_rejection(self) -> Rejection {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }
        (status, self.to_string())
    }
}

fn port_status(e: &PortError) -> StatusCode {
    match e {
        PortError::NotFound(_) => StatusCode::NOT_FOUND,
        PortError::Network(_) | PortError::ConnectionInterrupted(_) => StatusCode::BAD_GATEWAY,
        PortError::PermissionDenied => StatusCode::FORBIDDEN,
        PortError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Shorthand for `map_err` in handlers.
pub fn reject(e: impl Into<ApiError>) -> Rejection {
    e.into().into_rejection()
}
