//! # Tessera
//!
//! Stateless registration, login and session verification.
//!
//! A single endpoint accepts a JSON body tagged with an `action`:
//!
//! - **register** creates a user (unique username and email, starting balance
//!   `1000.00`) and opens a first session.
//! - **login** checks a password against the stored digest and opens a new
//!   session. Unknown users and wrong passwords get the same answer.
//! - **verify** resolves a session token to its user while the session has not
//!   expired. Sessions last seven days by default.
//!
//! Passwords are stored as Argon2 PHC strings with a per-user salt. Unsalted
//! SHA-256 hex digests written by earlier deployments are still accepted.
//!
//! The handler keeps nothing between requests. Every request that touches the
//! store acquires one connection, runs its queries in order and releases it
//! before the response is returned.
//!
//! Two surfaces drive the same handler: `tessera server` (axum) and
//! `tessera invoke`, which handles one function-runtime event read from stdin.

pub mod api;
pub mod cli;
pub mod store;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};
