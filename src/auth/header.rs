//! `Authorization` header parsing.
//!
//! Two schemes are recognised: `Bearer <token>` for end users and
//! `ApiKey <key>` for the payment provider's webhook.

use actix_web::http::header::{HeaderMap, AUTHORIZATION};

use crate::error::{AppError, AuthError};

/// Credential scheme carried in the `Authorization` header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Bearer,
    ApiKey,
}

impl Scheme {
    /// Exact, case-sensitive keyword preceding the credential
    pub fn keyword(&self) -> &'static str {
        match self {
            Scheme::Bearer => "Bearer",
            Scheme::ApiKey => "ApiKey",
        }
    }
}

/// A parsed `Authorization` value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub scheme: Scheme,
    pub value: String,
}

/// Parse a raw `Authorization` header value, requiring `expected` as the scheme.
///
/// # Errors
/// - `MissingCredential` if the value is absent or empty
/// - `MalformedCredential` if the scheme word differs or the payload is empty
pub fn parse_authorization(raw: Option<&str>, expected: Scheme) -> Result<Credential, AuthError> {
    let raw = match raw {
        Some(raw) if !raw.is_empty() => raw,
        _ => return Err(AuthError::MissingCredential),
    };

    let (scheme, value) = raw.split_once(' ').ok_or(AuthError::MalformedCredential)?;

    if scheme != expected.keyword() || value.is_empty() || value.contains(char::is_whitespace) {
        return Err(AuthError::MalformedCredential);
    }

    Ok(Credential {
        scheme: expected,
        value: value.to_string(),
    })
}

fn extract(headers: &HeaderMap, expected: Scheme) -> Result<String, AppError> {
    let raw = match headers.get(AUTHORIZATION) {
        None => None,
        Some(value) => Some(value.to_str().map_err(|_| AuthError::MalformedCredential)?),
    };

    Ok(parse_authorization(raw, expected)?.value)
}

/// Extract the token from `Authorization: Bearer <token>`
pub fn bearer_token(headers: &HeaderMap) -> Result<String, AppError> {
    extract(headers, Scheme::Bearer)
}

/// Extract the key from `Authorization: ApiKey <key>`
pub fn api_key(headers: &HeaderMap) -> Result<String, AppError> {
    extract(headers, Scheme::ApiKey)
}
