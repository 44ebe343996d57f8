//! Request/response types for the auth handler.

use super::error::{
    AuthError, INVALID_BODY, MISSING_CREDENTIALS, MISSING_REQUIRED_FIELDS, NO_SESSION_TOKEN,
};
use crate::store::User;
use axum::http::{HeaderMap, Method, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

pub const SESSION_TOKEN_HEADER: &str = "x-session-token";

/// Inbound request descriptor.
#[derive(Debug, Clone)]
pub struct AuthRequest {
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Option<String>,
}

impl AuthRequest {
    #[must_use]
    pub fn post(body: impl Into<String>) -> Self {
        Self {
            method: Method::POST,
            headers: HeaderMap::new(),
            body: Some(body.into()),
        }
    }
}

/// Outbound response descriptor.
#[derive(Debug, Clone)]
pub struct AuthResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum ActionRequest {
    Register {
        username: Option<String>,
        email: Option<String>,
        password: Option<String>,
    },
    Login {
        username: Option<String>,
        password: Option<String>,
    },
    Verify {
        #[serde(rename = "sessionToken")]
        session_token: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// An action whose required fields are present and non-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Register(Registration),
    Login(Credentials),
    Verify(String),
}

impl Action {
    /// Parse and validate a request body.
    ///
    /// A blank or absent body is treated as `{}`. `verify` falls back to the
    /// session token header when the body carries none.
    ///
    /// # Errors
    /// Returns the caller-facing [`AuthError`] for malformed bodies, unknown
    /// actions and missing fields.
    pub fn parse(body: Option<&str>, headers: &HeaderMap) -> Result<Self, AuthError> {
        let body = body.map(str::trim).filter(|b| !b.is_empty()).unwrap_or("{}");
        let value: Value =
            serde_json::from_str(body).map_err(|_| AuthError::Validation(INVALID_BODY))?;

        let missing = match value.get("action").and_then(Value::as_str) {
            Some("register") => AuthError::Validation(MISSING_REQUIRED_FIELDS),
            Some("login") => AuthError::Validation(MISSING_CREDENTIALS),
            Some("verify") => AuthError::Authentication(NO_SESSION_TOKEN),
            _ => return Err(AuthError::UnknownAction),
        };

        // Fields of the wrong JSON type count as missing.
        let request: ActionRequest = serde_json::from_value(value).map_err(|_| missing.clone())?;

        match request {
            ActionRequest::Register {
                username,
                email,
                password,
            } => match (present(username), present(email), present(password)) {
                (Some(username), Some(email), Some(password)) => Ok(Self::Register(Registration {
                    username,
                    email,
                    password,
                })),
                _ => Err(missing),
            },
            ActionRequest::Login { username, password } => {
                match (present(username), present(password)) {
                    (Some(username), Some(password)) => {
                        Ok(Self::Login(Credentials { username, password }))
                    }
                    _ => Err(missing),
                }
            }
            ActionRequest::Verify { session_token } => present(session_token)
                .or_else(|| header_token(headers))
                .map(Self::Verify)
                .ok_or(missing),
        }
    }
}

fn present(field: Option<String>) -> Option<String> {
    field.filter(|value| !value.is_empty())
}

fn header_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(SESSION_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

#[derive(ToSchema, Serialize, Debug)]
pub struct AuthSuccess {
    pub success: bool,
    pub user: User,
    #[serde(rename = "sessionToken", skip_serializing_if = "Option::is_none")]
    pub session_token: Option<String>,
}

impl AuthSuccess {
    #[must_use]
    pub fn with_session(user: User, session_token: String) -> Self {
        Self {
            success: true,
            user,
            session_token: Some(session_token),
        }
    }

    #[must_use]
    pub fn verified(user: User) -> Self {
        Self {
            success: true,
            user,
            session_token: None,
        }
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ErrorBody {
    pub error: String,
}
