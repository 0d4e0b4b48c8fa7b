//! Authentication error types.

use thiserror::Error;

use crate::db::RepositoryError;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] emporium_core::EmailError),

    /// Wrong email or password. Deliberately does not say which.
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// Account exists but has been deactivated.
    #[error("Account is disabled")]
    AccountDisabled,

    /// No bearer token or auth cookie on the request.
    #[error("Authentication required")]
    MissingToken,

    /// Token failed signature or claim validation.
    #[error("Invalid authentication token")]
    InvalidToken,

    /// Token is past its expiry.
    #[error("Authentication token has expired")]
    ExpiredToken,

    /// Password too weak or invalid.
    #[error("password validation failed: {0}")]
    WeakPassword(String),

    /// Reset token unknown or expired.
    #[error("Password reset link is invalid or has expired")]
    InvalidResetToken,

    /// Repository/database error.
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,

    /// Token could not be signed.
    #[error("token generation failed: {0}")]
    TokenGeneration(String),
}
