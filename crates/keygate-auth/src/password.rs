//! Password hashing and verification using Argon2id.

use argon2::password_hash::SaltString;
use argon2::password_hash::rand_core::OsRng;
use argon2::{Argon2, PasswordHasher, PasswordVerifier};

use keygate_core::{KeygateError, KeygateResult};

/// Hash a plaintext password with Argon2id and a random per-hash salt.
/// The cost factor is the crate default.
pub fn hash_password(password: &str) -> KeygateResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| KeygateError::Crypto(format!("password hash error: {e}")))?;
    Ok(hash.to_string())
}

/// Verify a plaintext password against a PHC-format hash.
///
/// Returns `Ok(true)` on match, `Ok(false)` on mismatch, or
/// `Err(Crypto)` if the stored hash is malformed. The comparison is
/// constant-time.
pub fn verify_password(password: &str, hash: &str) -> KeygateResult<bool> {
    let parsed_hash = argon2::PasswordHash::new(hash)
        .map_err(|e| KeygateError::Crypto(format!("invalid hash format: {e}")))?;

    let argon2 = Argon2::default();
    match argon2.verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(KeygateError::Crypto(format!("verify error: {e}"))),
    }
}
