use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;

use crate::error::AppError;

/// Verified against when the login email is unknown, so the response time
/// does not reveal whether an account exists.
const DUMMY_HASH: &str =
    "$argon2id$v=19$m=19456,t=2,p=1$c3R1ZGlvLWR1bW15LXNhbHQ$2mJQ5QbtaySfyfINF6tF7hZ6BUY8AkKi1HClF+otkH0";

/// Hash a password with Argon2id and a random salt.
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(Argon2::default()
        .hash_password(password.as_bytes(), &salt)?
        .to_string())
}

/// Returns `Ok(false)` on mismatch; errors only for malformed hashes.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, argon2::password_hash::Error> {
    let parsed = PasswordHash::new(hash)?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(e),
    }
}

/// Burn one verification's worth of CPU.
pub fn dummy_verify(password: &str) {
    let _ = verify_password(password, DUMMY_HASH);
}

/// Hash on the blocking pool.
pub async fn hash_password_blocking(password: String) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| AppError::Internal(format!("Hash task failed: {e}")))?
        .map_err(|e| AppError::Internal(format!("Password hash error: {e}")))
}

/// Verify on the blocking pool. A `None` hash runs [`dummy_verify`] and
/// reports a mismatch.
pub async fn verify_password_blocking(
    password: String,
    hash: Option<String>,
) -> Result<bool, AppError> {
    tokio::task::spawn_blocking(move || match hash {
        Some(hash) => verify_password(&password, &hash),
        None => {
            dummy_verify(&password);
            Ok(false)
        }
    })
    .await
    .map_err(|e| AppError::Internal(format!("Verify task failed: {e}")))?
    .map_err(|e| AppError::Internal(format!("Password verify error: {e}")))
}
