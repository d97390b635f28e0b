//! Persistence collaborators for users and refresh tokens.
//!
//! The auth layer only talks to these traits; `postgres` backs them with
//! sqlx, `memory` keeps everything in process for tests and local runs.

mod memory;
mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::auth::RefreshToken;
use crate::error::AppError;

pub use memory::{InMemoryRefreshTokenRepository, InMemoryUserRepository};
pub use postgres::{PgRefreshTokenRepository, PgUserRepository};

/// Stored user row
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub hashed_password: String,
    pub is_chirpy_red: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            created_at: self.created_at,
            updated_at: self.updated_at,
            email: self.email.clone(),
            is_chirpy_red: self.is_chirpy_red,
        }
    }
}

/// Public view of a user; never carries the password digest
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub email: String,
    pub is_chirpy_red: bool,
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// # Errors
    /// `DatabaseError::UniqueConstraintViolation` if the email is taken
    async fn create_user(&self, email: &str, hashed_password: &str) -> Result<User, AppError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError>;

    /// Replace email and password digest.
    ///
    /// # Errors
    /// `DatabaseError::NotFound` if no such user exists
    async fn update_user(
        &self,
        id: Uuid,
        email: &str,
        hashed_password: &str,
    ) -> Result<User, AppError>;

    /// Set the upgrade flag.
    ///
    /// # Errors
    /// `DatabaseError::NotFound` if no such user exists
    async fn upgrade_user(&self, id: Uuid) -> Result<(), AppError>;
}

#[async_trait]
pub trait RefreshTokenRepository: Send + Sync {
    async fn insert(&self, token: &RefreshToken) -> Result<(), AppError>;

    /// Exact-match lookup, regardless of expiry or revocation
    async fn find(&self, token: &str) -> Result<Option<RefreshToken>, AppError>;

    /// Set `revoked_at` unless it is already set.
    ///
    /// Returns `false` if no row matches `token`.
    async fn revoke(&self, token: &str, at: DateTime<Utc>) -> Result<bool, AppError>;
}
