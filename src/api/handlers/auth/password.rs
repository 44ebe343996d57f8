//! Credential digests.
//!
//! New digests are Argon2id PHC strings with a per-user salt. Accounts created by
//! the earlier handler hold an unsalted lowercase hex SHA-256 digest; those are
//! still accepted so existing users can log in.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use sha2::{Digest, Sha256};

const LEGACY_DIGEST_LEN: usize = 64;

/// Hash a password with a fresh random salt.
///
/// # Errors
/// Returns an error if Argon2 rejects the input.
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    hash_password_with_salt(password, &salt)
}

/// Deterministic for a given `(password, salt)` pair.
///
/// # Errors
/// Returns an error if Argon2 rejects the input.
pub fn hash_password_with_salt(
    password: &str,
    salt: &SaltString,
) -> Result<String, argon2::password_hash::Error> {
    Ok(Argon2::default()
        .hash_password(password.as_bytes(), salt)?
        .to_string())
}

/// Check `password` against a stored digest of either format.
///
/// A stored value that parses as neither format never matches.
#[must_use]
pub fn verify_password(password: &str, stored: &str) -> bool {
    if is_legacy_digest(stored) {
        return constant_time_eq(legacy_digest(password).as_bytes(), stored.as_bytes());
    }

    PasswordHash::new(stored).is_ok_and(|parsed| {
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    })
}

fn legacy_digest(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}

fn is_legacy_digest(stored: &str) -> bool {
    stored.len() == LEGACY_DIGEST_LEN
        && stored
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
