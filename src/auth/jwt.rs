/// JWT Token Generation and Validation
///
/// Access tokens are HS256-signed and checked purely from
/// (token, secret, clock); nothing is looked up.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use crate::auth::claims::{Claims, ISSUER};
use crate::error::{AppError, AuthError};

/// Mint a signed access token for `user_id`
///
/// # Errors
/// Returns error if token encoding fails
pub fn mint_access_token(
    user_id: Uuid,
    secret: &str,
    lifetime: Duration,
) -> Result<String, AppError> {
    mint_access_token_at(user_id, secret, lifetime, Utc::now())
}

pub fn mint_access_token_at(
    user_id: Uuid,
    secret: &str,
    lifetime: Duration,
    now: DateTime<Utc>,
) -> Result<String, AppError> {
    let claims = Claims::new(user_id, now, lifetime);

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))
}

/// Validate an access token and return the user it was issued to
///
/// # Errors
/// - `InvalidSignature` if the token was not signed with `secret`
/// - `Expired` if the current time has reached `exp`
/// - `Malformed` if the token cannot be parsed
pub fn validate_access_token(token: &str, secret: &str) -> Result<Uuid, AppError> {
    validate_access_token_at(token, secret, Utc::now())
}

pub fn validate_access_token_at(
    token: &str,
    secret: &str,
    now: DateTime<Utc>,
) -> Result<Uuid, AppError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[ISSUER]);
    // exp is checked below against `now`, with no leeway
    validation.validate_exp = false;
    validation.leeway = 0;

    let claims = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| {
        tracing::debug!(error = %e, "JWT validation error");
        let kind = match e.kind() {
            ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
                AuthError::InvalidSignature
            }
            ErrorKind::ExpiredSignature => AuthError::Expired,
            _ => AuthError::Malformed,
        };
        AppError::from(kind)
    })?;

    if claims.is_expired_at(now) {
        return Err(AuthError::Expired.into());
    }

    claims.user_id()
}
