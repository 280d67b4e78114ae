//! Argon2id password hashing in PHC string format.
//!
//! Hashing is CPU bound, so the async entry points run it on the blocking pool.

use std::sync::LazyLock;

use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use tokio::task::spawn_blocking;
use tracing::warn;

use crate::error::PasswordHashError;

/// Compared against on a username miss so both login paths cost one verification.
static DECOY_HASH: LazyLock<String> = LazyLock::new(|| {
    let decoy: [u8; 16] = rand::random();
    hash_now(&hex::encode(decoy)).unwrap_or_default()
});

/// Hash a password with a fresh random salt.
///
/// # Errors
///
/// Returns `PasswordHashError` if hashing fails or the worker is lost.
pub async fn hash_password(password: &str) -> Result<String, PasswordHashError> {
    let password = password.to_owned();
    spawn_blocking(move || hash_now(&password))
        .await
        .map_err(|e| PasswordHashError(e.to_string()))?
}

/// Check a candidate against a stored PHC string. A malformed hash never matches.
pub async fn verify_password(password: &str, stored: &str) -> bool {
    let (password, stored) = (password.to_owned(), stored.to_owned());
    spawn_blocking(move || verify_now(&password, &stored))
        .await
        .unwrap_or_else(|e| {
            warn!(error = %e, "password verification task failed");
            false
        })
}

/// Burn one verification against a throwaway hash. Always `false`.
pub async fn verify_decoy(password: &str) -> bool {
    let password = password.to_owned();
    let _ = spawn_blocking(move || verify_now(&password, &DECOY_HASH)).await;
    false
}

fn hash_now(password: &str) -> Result<String, PasswordHashError> {
    let salt_bytes: [u8; 16] = rand::random();
    let salt =
        SaltString::encode_b64(&salt_bytes).map_err(|e| PasswordHashError(e.to_string()))?;
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| PasswordHashError(e.to_string()))
}

fn verify_now(password: &str, stored: &str) -> bool {
    PasswordHash::new(stored).is_ok_and(|parsed| {
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hashes_verify_and_are_salted() {
        let first = hash_password("correct horse").await.unwrap();
        let second = hash_password("correct horse").await.unwrap();
        assert!(first.starts_with("$argon2id$"));
        assert_ne!(first, second);
        assert!(verify_password("correct horse", &first).await);
        assert!(!verify_password("battery staple", &first).await);
    }

    #[tokio::test]
    async fn legacy_digests_never_match() {
        // hex md5 of "passwordAdmin1" style digests are not PHC strings
        assert!(!verify_password("anything", "5f4dcc3b5aa765d61d8327deb882cf99").await);
    }

    #[tokio::test]
    async fn decoy_is_a_real_hash_that_never_matches() {
        assert!(DECOY_HASH.starts_with("$argon2id$"));
        assert!(!verify_decoy("correct horse").await);
    }
}
