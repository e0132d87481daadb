//! Password hashing and verification.
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use crate::error::{ApiError, GENERIC_MESSAGE};

/// Hash a password with argon2id and a random salt, returned as a PHC string
pub fn hash_password(plain: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| {
            tracing::error!(error = %err, "password hashing failed");
            ApiError::internal(GENERIC_MESSAGE)
        })
}

/// Verify a password against a stored hash
pub fn verify_password(hash: &str, plain: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };
    Argon2::default()
        .verify_password(plain.as_bytes(), &parsed_hash)
        .is_ok()
}

/// [`hash_password`] on the blocking pool, keeping argon2 off the async workers
pub async fn hash_password_async(plain: String) -> Result<String, ApiError> {
    run_blocking(move || hash_password(&plain)).await?
}

/// [`verify_password`] on the blocking pool
pub async fn verify_password_async(hash: String, plain: String) -> Result<bool, ApiError> {
    run_blocking(move || verify_password(&hash, &plain)).await
}

async fn run_blocking<T, F>(work: F) -> Result<T, ApiError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work).await.map_err(|err| {
        tracing::error!(error = %err, "password task failed");
        ApiError::internal(GENERIC_MESSAGE)
    })
}
