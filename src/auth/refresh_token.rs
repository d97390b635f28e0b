/// Refresh Token Management
///
/// Refresh tokens are:
/// - 32 random bytes from the OS CSPRNG, hex encoded (64 chars)
/// - Long-lived (60 days by default) and reusable until expiry or revocation
/// - Never rotated; revocation is terminal

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use uuid::Uuid;

use crate::error::{AppError, AuthError};
use crate::store::RefreshTokenRepository;

const TOKEN_BYTES: usize = 32;

/// Lifecycle state of a refresh token at a given instant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshTokenState {
    Active,
    Expired,
    Revoked,
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct RefreshToken {
    pub token: String,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl RefreshToken {
    pub fn new(token: String, user_id: Uuid, now: DateTime<Utc>, lifetime: Duration) -> Self {
        Self {
            token,
            user_id,
            created_at: now,
            expires_at: now + lifetime,
            revoked_at: None,
        }
    }

    /// Revocation wins over expiry: a revoked token stays revoked.
    pub fn state(&self, now: DateTime<Utc>) -> RefreshTokenState {
        if self.revoked_at.is_some() {
            RefreshTokenState::Revoked
        } else if now >= self.expires_at {
            RefreshTokenState::Expired
        } else {
            RefreshTokenState::Active
        }
    }

    /// # Errors
    /// `AuthError::Revoked` or `AuthError::Expired` unless the token is active
    pub fn ensure_usable(&self, now: DateTime<Utc>) -> Result<(), AppError> {
        match self.state(now) {
            RefreshTokenState::Active => Ok(()),
            RefreshTokenState::Expired => Err(AuthError::Expired.into()),
            RefreshTokenState::Revoked => Err(AuthError::Revoked.into()),
        }
    }
}

/// Generate a new refresh token value
pub fn generate_refresh_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Issues, resolves and revokes refresh tokens over a persistence collaborator
#[derive(Clone)]
pub struct RefreshTokenStore {
    repo: Arc<dyn RefreshTokenRepository>,
    lifetime: Duration,
}

impl std::fmt::Debug for RefreshTokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshTokenStore")
            .field("lifetime", &self.lifetime)
            .finish()
    }
}

impl RefreshTokenStore {
    pub fn new(repo: Arc<dyn RefreshTokenRepository>, lifetime: Duration) -> Self {
        Self { repo, lifetime }
    }

    pub async fn issue(&self, user_id: Uuid) -> Result<RefreshToken, AppError> {
        self.issue_at(user_id, Utc::now()).await
    }

    /// Generate and persist a new token for `user_id`, expiring `lifetime` after `now`
    pub async fn issue_at(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<RefreshToken, AppError> {
        let record = RefreshToken::new(generate_refresh_token(), user_id, now, self.lifetime);

        tracing::debug!(
            user_id = %user_id,
            expires_at = %record.expires_at,
            "Issuing refresh token"
        );

        self.repo.insert(&record).await?;
        Ok(record)
    }

    /// Look up a token by exact value.
    ///
    /// # Errors
    /// `AuthError::NotFound` if no such token exists; expiry and revocation
    /// are left to the caller.
    pub async fn resolve(&self, token: &str) -> Result<RefreshToken, AppError> {
        self.repo
            .find(token)
            .await?
            .ok_or_else(|| AuthError::NotFound.into())
    }

    pub async fn revoke(&self, token: &str) -> Result<(), AppError> {
        self.revoke_at(token, Utc::now()).await
    }

    /// Mark a token revoked. Revoking an already revoked token succeeds and
    /// keeps the first timestamp.
    ///
    /// # Errors
    /// `AuthError::NotFound` if no such token exists
    pub async fn revoke_at(&self, token: &str, now: DateTime<Utc>) -> Result<(), AppError> {
        if !self.repo.revoke(token, now).await? {
            return Err(AuthError::NotFound.into());
        }
        Ok(())
    }
}
