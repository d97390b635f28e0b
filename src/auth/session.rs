//! Session orchestration: login, refresh, revoke, plus the checks protected
//! endpoints and the upgrade webhook rely on.

use std::sync::Arc;

use actix_web::http::header::HeaderMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::auth::header::{api_key, bearer_token};
use crate::auth::jwt::{mint_access_token_at, validate_access_token_at};
use crate::auth::password::{hash_password, verify_missing_user_password, verify_password};
use crate::auth::refresh_token::RefreshTokenStore;
use crate::configuration::JwtSettings;
use crate::error::{AppError, AuthError, ValidationError};
use crate::store::{UserProfile, UserRepository};

/// Event the payment provider sends when a user pays for the upgrade
pub const USER_UPGRADED_EVENT: &str = "user.upgraded";

/// Login payload. Any client-supplied token lifetime is not part of this type
/// and is dropped during decoding.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Email/password payload for registration and credential updates
#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    #[serde(flatten)]
    pub user: UserProfile,
    pub token: String,
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
pub struct UpgradeEventData {
    pub user_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct UpgradeEvent {
    pub event: String,
    pub data: UpgradeEventData,
}

#[derive(Clone)]
pub struct SessionService {
    users: Arc<dyn UserRepository>,
    refresh_tokens: RefreshTokenStore,
    jwt: JwtSettings,
    service_api_key: String,
}

impl std::fmt::Debug for SessionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionService")
            .field("refresh_tokens", &self.refresh_tokens)
            .field("access_token_expiry", &self.jwt.access_token_expiry)
            .finish()
    }
}

impl SessionService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        refresh_tokens: RefreshTokenStore,
        jwt: JwtSettings,
        service_api_key: String,
    ) -> Self {
        Self {
            users,
            refresh_tokens,
            jwt,
            service_api_key,
        }
    }

    pub async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, AppError> {
        self.login_at(request, Utc::now()).await
    }

    /// Verify email and password, then mint an access token and issue a refresh token.
    /// An unknown email still costs one bcrypt verify.
    ///
    /// # Errors
    /// `InvalidCredentials` for an unknown email or a wrong password alike
    pub async fn login_at(
        &self,
        request: &LoginRequest,
        now: DateTime<Utc>,
    ) -> Result<LoginResponse, AppError> {
        let user = match self.users.find_user_by_email(&request.email).await? {
            Some(user) => user,
            None => {
                verify_missing_user_password(&request.password)?;
                tracing::info!("Login attempt for unknown email");
                return Err(AuthError::InvalidCredentials.into());
            }
        };

        if !verify_password(&user.hashed_password, &request.password)? {
            tracing::info!(user_id = %user.id, "Login attempt with wrong password");
            return Err(AuthError::InvalidCredentials.into());
        }

        let token = mint_access_token_at(
            user.id,
            &self.jwt.secret,
            self.jwt.access_token_lifetime(),
            now,
        )?;
        let refresh = self.refresh_tokens.issue_at(user.id, now).await?;

        tracing::info!(user_id = %user.id, "User logged in");

        Ok(LoginResponse {
            user: user.profile(),
            token,
            refresh_token: refresh.token,
        })
    }

    pub async fn refresh(&self, headers: &HeaderMap) -> Result<String, AppError> {
        self.refresh_at(headers, Utc::now()).await
    }

    /// Exchange a bearer refresh token for a fresh access token. The refresh
    /// token stays valid.
    ///
    /// # Errors
    /// `Unauthorized` if the token is unknown, expired or revoked
    pub async fn refresh_at(
        &self,
        headers: &HeaderMap,
        now: DateTime<Utc>,
    ) -> Result<String, AppError> {
        let token = bearer_token(headers)?;

        let record = self
            .refresh_tokens
            .resolve(&token)
            .await
            .map_err(AppError::into_unauthorized)?;
        record
            .ensure_usable(now)
            .map_err(AppError::into_unauthorized)?;

        let access_token = mint_access_token_at(
            record.user_id,
            &self.jwt.secret,
            self.jwt.access_token_lifetime(),
            now,
        )?;

        tracing::info!(user_id = %record.user_id, "Access token refreshed");
        Ok(access_token)
    }

    /// Revoke the bearer refresh token. Revoking twice succeeds.
    ///
    /// # Errors
    /// `Unauthorized` if the token is unknown
    pub async fn revoke(&self, headers: &HeaderMap) -> Result<(), AppError> {
        let token = bearer_token(headers)?;

        self.refresh_tokens
            .revoke(&token)
            .await
            .map_err(AppError::into_unauthorized)?;

        tracing::info!("Refresh token revoked");
        Ok(())
    }

    pub fn authenticate(&self, headers: &HeaderMap) -> Result<Uuid, AppError> {
        self.authenticate_at(headers, Utc::now())
    }

    /// Recover the caller's user id from a bearer access token
    pub fn authenticate_at(&self, headers: &HeaderMap, now: DateTime<Utc>) -> Result<Uuid, AppError> {
        let token = bearer_token(headers)?;
        validate_access_token_at(&token, &self.jwt.secret, now)
    }

    /// Check an `ApiKey` header against the configured service key.
    ///
    /// # Errors
    /// `InvalidCredentials` if the key does not match
    pub fn check_api_key(&self, headers: &HeaderMap) -> Result<(), AppError> {
        let key = api_key(headers)?;
        let matches: bool = key.as_bytes().ct_eq(self.service_api_key.as_bytes()).into();
        if !matches {
            return Err(AuthError::InvalidCredentials.into());
        }
        Ok(())
    }

    /// Create a user with a freshly hashed password
    pub async fn register(&self, request: &CredentialsRequest) -> Result<UserProfile, AppError> {
        validate_credentials(request)?;
        let digest = hash_password(&request.password)?;

        let user = self.users.create_user(&request.email, &digest).await?;

        tracing::info!(user_id = %user.id, "User registered");
        Ok(user.profile())
    }

    /// Replace the email and password of an authenticated user
    pub async fn update_credentials(
        &self,
        user_id: Uuid,
        request: &CredentialsRequest,
    ) -> Result<UserProfile, AppError> {
        validate_credentials(request)?;
        let digest = hash_password(&request.password)?;

        let user = self
            .users
            .update_user(user_id, &request.email, &digest)
            .await?;

        tracing::info!(user_id = %user.id, "User credentials updated");
        Ok(user.profile())
    }

    /// Apply a raw payment provider event. The API key is checked before the
    /// body is decoded. Events other than `user.upgraded` are acknowledged and ignored.
    ///
    /// # Errors
    /// - `InvalidCredentials` / `MissingCredential` for a bad or absent key
    /// - `InvalidPayload` if the body is not an event
    /// - `NotFound` for an upgrade of an unknown user
    pub async fn handle_upgrade_event(
        &self,
        headers: &HeaderMap,
        body: &[u8],
    ) -> Result<(), AppError> {
        self.check_api_key(headers)?;

        let event: UpgradeEvent = serde_json::from_slice(body)
            .map_err(|e| ValidationError::InvalidPayload(e.to_string()))?;

        if event.event != USER_UPGRADED_EVENT {
            tracing::debug!(event = %event.event, "Ignoring webhook event");
            return Ok(());
        }

        self.users.upgrade_user(event.data.user_id).await?;

        tracing::info!(user_id = %event.data.user_id, "User upgraded");
        Ok(())
    }
}

fn validate_credentials(request: &CredentialsRequest) -> Result<(), AppError> {
    if request.email.trim().is_empty() {
        return Err(ValidationError::EmptyField("email".to_string()).into());
    }
    if request.password.is_empty() {
        return Err(ValidationError::EmptyField("password".to_string()).into());
    }
    Ok(())
}
