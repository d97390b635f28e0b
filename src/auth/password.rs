//! Password Hashing and Verification
//!
//! bcrypt with a random per-hash salt embedded in the digest.

use bcrypt::{hash, verify, DEFAULT_COST};
use lazy_static::lazy_static;

use crate::error::{AppError, AuthError, ValidationError};

/// bcrypt ignores everything past this many bytes
const MAX_PASSWORD_BYTES: usize = 72;

lazy_static! {
    /// Stand-in digest at the same cost as real ones, checked when no user matched
    static ref MISSING_USER_DIGEST: Option<String> =
        hash("chirpy-missing-user", DEFAULT_COST).ok();
}

/// Hash a password using bcrypt
///
/// # Errors
/// Returns error if:
/// - Password is longer than bcrypt can distinguish (72 bytes)
/// - Bcrypt hashing fails
pub fn hash_password(password: &str) -> Result<String, AppError> {
    if password.len() > MAX_PASSWORD_BYTES {
        return Err(AppError::Validation(ValidationError::TooLong(
            "password".to_string(),
            MAX_PASSWORD_BYTES,
        )));
    }

    hash(password, DEFAULT_COST)
        .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
}

/// Verify a password against a stored digest
///
/// Returns `Ok(false)` on a plain mismatch.
///
/// # Errors
/// Returns `AuthError::MalformedDigest` if the digest cannot be parsed
pub fn verify_password(digest: &str, password: &str) -> Result<bool, AppError> {
    if password.len() > MAX_PASSWORD_BYTES {
        return Ok(false);
    }

    // verify only fails while parsing the digest (prefix, cost, salt, hash)
    verify(password, digest).map_err(|e| {
        tracing::error!(error = %e, "Stored password digest could not be parsed");
        AuthError::MalformedDigest.into()
    })
}

/// Spend one full bcrypt verify for a login whose email matched no user,
/// so the response takes as long as a wrong password would. Never succeeds.
pub fn verify_missing_user_password(password: &str) -> Result<bool, AppError> {
    match MISSING_USER_DIGEST.as_ref() {
        Some(digest) => verify_password(digest, password).map(|_| false),
        None => Ok(false),
    }
}
