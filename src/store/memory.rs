//! In-process credential store.
//!
//! Applies the same uniqueness and expiry rules as the PostgreSQL schema and keeps
//! counters of connections and queries, so callers can assert that a request
//! released its connection or never touched the store at all.

use super::{
    CredentialStore, LoginRecord, NewSession, NewUser, StoreConnection, StoreError, User,
    INITIAL_BALANCE,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc, Mutex, MutexGuard, PoisonError,
};

#[derive(Debug, Default)]
struct State {
    users: Vec<(User, String)>,
    sessions: Vec<Session>,
    next_id: i64,
}

#[derive(Debug, Clone)]
struct Session {
    user_id: i64,
    token: String,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Counters {
    open: AtomicUsize,
    acquired: AtomicUsize,
    queries: AtomicUsize,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
    counters: Arc<Counters>,
    unavailable: Arc<AtomicBool>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent `connect` calls fail as if the database were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Connections currently held.
    #[must_use]
    pub fn open_connections(&self) -> usize {
        self.counters.open.load(Ordering::SeqCst)
    }

    /// Connections handed out since creation.
    #[must_use]
    pub fn connections_acquired(&self) -> usize {
        self.counters.acquired.load(Ordering::SeqCst)
    }

    /// Store operations issued since creation.
    #[must_use]
    pub fn queries(&self) -> usize {
        self.counters.queries.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn user_count(&self) -> usize {
        lock(&self.state).users.len()
    }

    #[must_use]
    pub fn session_count(&self) -> usize {
        lock(&self.state).sessions.len()
    }

    /// Stored credential digest for `username`.
    #[must_use]
    pub fn password_hash(&self, username: &str) -> Option<String> {
        lock(&self.state)
            .users
            .iter()
            .find(|(user, _)| user.username == username)
            .map(|(_, hash)| hash.clone())
    }

    /// Seed a user row directly, bypassing the handler.
    pub fn insert_user(&self, username: &str, email: &str, password_hash: &str) -> User {
        let mut state = lock(&self.state);
        state.next_id += 1;
        let user = User {
            id: state.next_id,
            username: username.to_string(),
            email: email.to_string(),
            balance: INITIAL_BALANCE,
        };
        state.users.push((user.clone(), password_hash.to_string()));
        user
    }
}

fn lock(state: &Mutex<State>) -> MutexGuard<'_, State> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn connect(&self) -> Result<Box<dyn StoreConnection>, StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(sqlx::Error::PoolClosed));
        }

        self.counters.open.fetch_add(1, Ordering::SeqCst);
        self.counters.acquired.fetch_add(1, Ordering::SeqCst);

        Ok(Box::new(MemoryConnection {
            state: Arc::clone(&self.state),
            counters: Arc::clone(&self.counters),
        }))
    }
}

pub struct MemoryConnection {
    state: Arc<Mutex<State>>,
    counters: Arc<Counters>,
}

impl MemoryConnection {
    fn state(&self) -> MutexGuard<'_, State> {
        self.counters.queries.fetch_add(1, Ordering::SeqCst);
        lock(&self.state)
    }
}

impl Drop for MemoryConnection {
    fn drop(&mut self) {
        self.counters.open.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl StoreConnection for MemoryConnection {
    async fn user_exists(&mut self, username: &str, email: &str) -> Result<bool, StoreError> {
        Ok(self
            .state()
            .users
            .iter()
            .any(|(user, _)| user.username == username || user.email == email))
    }

    async fn create_user_with_session(
        &mut self,
        user: &NewUser,
        session: &NewSession,
    ) -> Result<User, StoreError> {
        let mut state = self.state();

        let taken = state
            .users
            .iter()
            .any(|(u, _)| u.username == user.username || u.email == user.email);
        if taken || state.sessions.iter().any(|s| s.token == session.token) {
            return Err(StoreError::Conflict);
        }

        state.next_id += 1;
        let created = User {
            id: state.next_id,
            username: user.username.clone(),
            email: user.email.clone(),
            balance: INITIAL_BALANCE,
        };
        state
            .users
            .push((created.clone(), user.password_hash.clone()));
        state.sessions.push(Session {
            user_id: created.id,
            token: session.token.clone(),
            expires_at: session.expires_at,
        });

        Ok(created)
    }

    async fn find_login(&mut self, username: &str) -> Result<Option<LoginRecord>, StoreError> {
        Ok(self
            .state()
            .users
            .iter()
            .find(|(user, _)| user.username == username)
            .map(|(user, hash)| LoginRecord {
                user: user.clone(),
                password_hash: hash.clone(),
            }))
    }

    async fn create_session(
        &mut self,
        user_id: i64,
        session: &NewSession,
    ) -> Result<(), StoreError> {
        let mut state = self.state();

        if state.sessions.iter().any(|s| s.token == session.token) {
            return Err(StoreError::Conflict);
        }

        state.sessions.push(Session {
            user_id,
            token: session.token.clone(),
            expires_at: session.expires_at,
        });

        Ok(())
    }

    async fn find_user_by_session(
        &mut self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, StoreError> {
        let state = self.state();

        Ok(state
            .sessions
            .iter()
            .find(|s| s.token == token && s.expires_at > now)
            .and_then(|s| state.users.iter().find(|(user, _)| user.id == s.user_id))
            .map(|(user, _)| user.clone()))
    }
}
