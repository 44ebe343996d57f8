//! Registration, login and session verification.
//!
//! [`AuthHandler::handle`] takes one request descriptor and returns one response
//! descriptor. It keeps no state between calls: each action that needs the store
//! acquires a single connection, runs its queries sequentially and releases the
//! connection when it goes out of scope.

mod error;
pub mod password;
mod types;
mod utils;

#[cfg(test)]
mod tests;

pub use self::error::AuthError;
pub use self::types::{
    Action, ActionRequest, AuthRequest, AuthResponse, AuthSuccess, Credentials, ErrorBody,
    Registration, SESSION_TOKEN_HEADER,
};
pub use self::utils::{Clock, SystemClock};

use self::error::{INVALID_CREDENTIALS, INVALID_SESSION};
use crate::store::{CredentialStore, NewSession, NewUser};
use axum::http::{
    header::{
        ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
        ACCESS_CONTROL_MAX_AGE, CONTENT_TYPE,
    },
    HeaderMap, HeaderValue, Method, StatusCode,
};
use chrono::Duration;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, instrument};

pub const DEFAULT_SESSION_TTL_DAYS: i64 = 7;

pub struct AuthHandler {
    store: Arc<dyn CredentialStore>,
    clock: Arc<dyn Clock>,
    session_ttl: Duration,
}

impl AuthHandler {
    #[must_use]
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            session_ttl: Duration::days(DEFAULT_SESSION_TTL_DAYS),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_session_ttl(mut self, session_ttl: Duration) -> Self {
        self.session_ttl = session_ttl;
        self
    }

    #[must_use]
    pub fn session_ttl(&self) -> Duration {
        self.session_ttl
    }

    /// Handle one request.
    #[instrument(skip_all, fields(method = %request.method))]
    pub async fn handle(&self, request: AuthRequest) -> AuthResponse {
        if request.method == Method::OPTIONS {
            return preflight();
        }

        if request.method != Method::POST {
            return error_response(&AuthError::MethodNotAllowed);
        }

        match self.dispatch(&request).await {
            Ok(success) => json_response(StatusCode::OK, &success),
            Err(err) => error_response(&err),
        }
    }

    async fn dispatch(&self, request: &AuthRequest) -> Result<AuthSuccess, AuthError> {
        match Action::parse(request.body.as_deref(), &request.headers)? {
            Action::Register(registration) => self.register(registration).await,
            Action::Login(credentials) => self.login(credentials).await,
            Action::Verify(token) => self.verify(&token).await,
        }
    }

    #[instrument(skip_all, fields(username = %registration.username))]
    async fn register(&self, registration: Registration) -> Result<AuthSuccess, AuthError> {
        let mut conn = self.store.connect().await?;

        if conn
            .user_exists(&registration.username, &registration.email)
            .await?
        {
            debug!("Username or email already taken");
            return Err(AuthError::Conflict);
        }

        let plaintext = registration.password;
        let password_hash = off_worker(move || password::hash_password(&plaintext))
            .await?
            .map_err(|e| {
                error!("Error hashing password: {e}");
                AuthError::Internal
            })?;

        let session = self.new_session()?;
        let user = conn
            .create_user_with_session(
                &NewUser {
                    username: registration.username,
                    email: registration.email,
                    password_hash,
                },
                &session,
            )
            .await?;

        info!(user_id = user.id, "User registered");

        Ok(AuthSuccess::with_session(user, session.token))
    }

    #[instrument(skip_all, fields(username = %credentials.username))]
    async fn login(&self, credentials: Credentials) -> Result<AuthSuccess, AuthError> {
        let mut conn = self.store.connect().await?;

        // Unknown user and wrong password are reported identically.
        let record = match conn.find_login(&credentials.username).await? {
            Some(record) => {
                let password = credentials.password;
                let stored = record.password_hash.clone();
                off_worker(move || password::verify_password(&password, &stored))
                    .await?
                    .then_some(record)
            }
            None => None,
        };
        let Some(record) = record else {
            debug!("Invalid credentials");
            return Err(AuthError::Authentication(INVALID_CREDENTIALS));
        };

        let session = self.new_session()?;
        conn.create_session(record.user.id, &session).await?;

        info!(user_id = record.user.id, "User logged in");

        Ok(AuthSuccess::with_session(record.user, session.token))
    }

    #[instrument(skip_all)]
    async fn verify(&self, token: &str) -> Result<AuthSuccess, AuthError> {
        let mut conn = self.store.connect().await?;

        match conn.find_user_by_session(token, self.clock.now()).await? {
            Some(user) => Ok(AuthSuccess::verified(user)),
            None => {
                debug!("Session not found or expired");
                Err(AuthError::Authentication(INVALID_SESSION))
            }
        }
    }

    fn new_session(&self) -> Result<NewSession, AuthError> {
        let token = utils::generate_session_token().map_err(|e| {
            error!("{e:#}");
            AuthError::Internal
        })?;

        Ok(NewSession {
            token,
            expires_at: self.clock.now() + self.session_ttl,
        })
    }
}

/// Run CPU-bound password work on the blocking pool.
async fn off_worker<T, F>(f: F) -> Result<T, AuthError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        error!("Password task failed: {e}");
        AuthError::Internal
    })
}

fn cors_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers
}

fn preflight() -> AuthResponse {
    let mut headers = cors_headers();
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("POST, OPTIONS"),
    );
    headers.insert(
        ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type, X-Session-Token"),
    );
    headers.insert(ACCESS_CONTROL_MAX_AGE, HeaderValue::from_static("86400"));

    AuthResponse {
        status: StatusCode::OK,
        headers,
        body: String::new(),
    }
}

fn json_response<T: Serialize>(status: StatusCode, body: &T) -> AuthResponse {
    let (status, body) = match serde_json::to_string(body) {
        Ok(body) => (status, body),
        Err(e) => {
            error!("Error serializing response: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                r#"{"error":"Internal server error"}"#.to_string(),
            )
        }
    };

    let mut headers = cors_headers();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    AuthResponse {
        status,
        headers,
        body,
    }
}

fn error_response(err: &AuthError) -> AuthResponse {
    json_response(
        err.status(),
        &ErrorBody {
            error: err.to_string(),
        },
    )
}
