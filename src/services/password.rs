//! Password hashing
//!
//! Credentials are stored as Argon2id PHC strings with a per-password random
//! salt. A wrong password is an `Ok(false)` from verification, never an
//! error; errors mean the stored hash itself is unusable.

use anyhow::{anyhow, Result};
use argon2::{
    password_hash::{rand_core::OsRng, Error as HashError, PasswordHash, PasswordHasher,
        PasswordVerifier, SaltString},
    Argon2,
};

/// Hash a password into a PHC string (algorithm, parameters, salt, digest)
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| anyhow!("Password hashing failed: {}", e))
}

/// Check a password against a stored PHC string.
///
/// Returns `Ok(false)` on mismatch. An `Err` means the stored value is not
/// a parseable hash or verification itself broke.
pub fn verify_password(password: &str, stored: &str) -> Result<bool> {
    let parsed =
        PasswordHash::new(stored).map_err(|e| anyhow!("Stored hash is not valid PHC: {}", e))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(HashError::Password) => Ok(false),
        Err(e) => Err(anyhow!("Password verification failed: {}", e)),
    }
}
