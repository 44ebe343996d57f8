//! Error taxonomy for the auth handler and its HTTP mapping.

use crate::store::StoreError;
use axum::http::StatusCode;
use thiserror::Error;
use tracing::error;

pub const MISSING_REQUIRED_FIELDS: &str = "Missing required fields";
pub const MISSING_CREDENTIALS: &str = "Missing username or password";
pub const INVALID_BODY: &str = "Invalid request body";
pub const INVALID_CREDENTIALS: &str = "Invalid credentials";
pub const NO_SESSION_TOKEN: &str = "No session token provided";
pub const INVALID_SESSION: &str = "Invalid or expired session";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("{0}")]
    Validation(&'static str),

    #[error("Username or email already exists")]
    Conflict,

    #[error("{0}")]
    Authentication(&'static str),

    #[error("Invalid action")]
    UnknownAction,

    #[error("Service unavailable")]
    Unavailable,

    #[error("Request timed out")]
    Timeout,

    #[error("Internal server error")]
    Internal,
}

impl AuthError {
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::Validation(_) | Self::Conflict | Self::UnknownAction => StatusCode::BAD_REQUEST,
            Self::Authentication(_) => StatusCode::UNAUTHORIZED,
            Self::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::Timeout => StatusCode::GATEWAY_TIMEOUT,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

// Store details are logged here and never reach the caller.
impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict => Self::Conflict,
            StoreError::Timeout => Self::Timeout,
            StoreError::Unavailable(e) => {
                error!("Credential store unavailable: {e}");
                Self::Unavailable
            }
            StoreError::Database(e) => {
                error!("Credential store query failed: {e}");
                Self::Internal
            }
        }
    }
}
