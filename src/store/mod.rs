//! Credential store seam.
//!
//! The handler never talks to a database directly: it asks a [`CredentialStore`]
//! for a scoped [`StoreConnection`], runs its queries on it and drops it. Dropping
//! the connection is what releases it, so every exit path gives it back exactly once.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

#[cfg(any(test, feature = "test-util"))]
pub mod memory;
pub mod postgres;

#[cfg(any(test, feature = "test-util"))]
pub use self::memory::MemoryStore;
pub use self::postgres::PgStore;

/// Balance credited to every new account.
pub const INITIAL_BALANCE: f64 = 1000.00;

const UNIQUE_VIOLATION: &str = "23505";

/// Public view of a user row.
#[derive(ToSchema, Serialize, Debug, Clone, PartialEq)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub balance: f64,
}

/// User row plus its stored credential digest, used only by login.
#[derive(Debug, Clone)]
pub struct LoginRecord {
    pub user: User,
    pub password_hash: String,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

#[derive(Debug, Clone)]
pub struct NewSession {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write.
    #[error("unique constraint violated")]
    Conflict,

    #[error("store operation timed out")]
    Timeout,

    #[error("store unavailable: {0}")]
    Unavailable(#[source] sqlx::Error),

    #[error("store query failed: {0}")]
    Database(#[source] sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if is_unique_violation(&err) {
            return Self::Conflict;
        }

        match err {
            sqlx::Error::PoolTimedOut => Self::Timeout,
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => Self::Unavailable(err),
            _ => Self::Database(err),
        }
    }
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err
            .code()
            .is_some_and(|code| code.as_ref() == UNIQUE_VIOLATION),
        _ => false,
    }
}

/// Factory for per-request store connections.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Acquire a connection. It is released when the returned box is dropped.
    async fn connect(&self) -> Result<Box<dyn StoreConnection>, StoreError>;
}

/// Operations available on one acquired connection. Calls are issued sequentially.
#[async_trait]
pub trait StoreConnection: Send {
    /// Whether any user already holds `username` or `email`.
    async fn user_exists(&mut self, username: &str, email: &str) -> Result<bool, StoreError>;

    /// Insert the user and its first session atomically.
    ///
    /// Returns [`StoreError::Conflict`] when the username or email is taken.
    async fn create_user_with_session(
        &mut self,
        user: &NewUser,
        session: &NewSession,
    ) -> Result<User, StoreError>;

    async fn find_login(&mut self, username: &str) -> Result<Option<LoginRecord>, StoreError>;

    async fn create_session(&mut self, user_id: i64, session: &NewSession)
        -> Result<(), StoreError>;

    /// Resolve a session token to its user when `expires_at > now`.
    async fn find_user_by_session(
        &mut self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, StoreError>;
}
