//! Authentication service.
//!
//! Password login for staff, JWT issuing, and the forgot/reset password flow.

mod error;
pub mod jwt;

pub use error::AuthError;
pub use jwt::{Claims, JwtService};

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{Duration, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};
use sqlx::PgPool;

use emporium_core::{Email, StaffId, StaffRole};

use crate::db::StaffRepository;
use crate::models::staff::{NewStaff, Staff};

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 8;

/// How long a password reset link stays valid.
const RESET_TOKEN_LIFETIME_HOURS: i64 = 1;

/// Authentication service.
pub struct AuthService<'a> {
    staff: StaffRepository<'a>,
    jwt: &'a JwtService,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(pool: &'a PgPool, jwt: &'a JwtService) -> Self {
        Self {
            staff: StaffRepository::new(pool),
            jwt,
        }
    }

    /// Login with email and password, returning the staff member and a token.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email/password is wrong,
    /// `AuthError::AccountDisabled` for deactivated accounts.
    pub async fn login(&self, email: &str, password: &str) -> Result<(Staff, String), AuthError> {
        let email = Email::parse(email).map_err(|_| AuthError::InvalidCredentials)?;

        let (staff, password_hash) = self
            .staff
            .get_password_hash_by_email(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, &password_hash)?;

        if !staff.is_active {
            return Err(AuthError::AccountDisabled);
        }

        self.staff.record_login(staff.id).await?;
        let token = self.jwt.issue(staff.id, staff.email.as_str(), staff.role)?;
        Ok((staff, token))
    }

    /// Resolve a bearer token to an active staff member.
    ///
    /// # Errors
    ///
    /// Returns token errors, or `AuthError::AccountDisabled` when the account
    /// was removed or deactivated after the token was issued.
    pub async fn authenticate(&self, token: &str) -> Result<Staff, AuthError> {
        let claims = self.jwt.verify(token)?;
        let staff = self
            .staff
            .get_by_id(claims.staff_id()?)
            .await?
            .ok_or(AuthError::AccountDisabled)?;
        if !staff.is_active {
            return Err(AuthError::AccountDisabled);
        }
        Ok(staff)
    }

    /// Create a staff account with a password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail`, `AuthError::WeakPassword`, or a
    /// repository conflict when the email is taken.
    pub async fn create_staff(
        &self,
        name: &str,
        email: &str,
        password: &str,
        role: StaffRole,
        image: Option<String>,
    ) -> Result<Staff, AuthError> {
        let new = new_staff(name, email, password, role, image)?;
        Ok(self.staff.create(&new).await?)
    }

    /// Create the first account as a super admin, if no account exists yet.
    ///
    /// Returns `None` when some account already exists, including one
    /// created by a concurrent call.
    ///
    /// # Errors
    ///
    /// Same as [`Self::create_staff`].
    pub async fn create_first_staff(
        &self,
        name: &str,
        email: &str,
        password: &str,
        image: Option<String>,
    ) -> Result<Option<Staff>, AuthError> {
        let new = new_staff(name, email, password, StaffRole::SuperAdmin, image)?;
        Ok(self.staff.create_first(&new).await?)
    }

    /// Change a password after checking the current one.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if `current` is wrong,
    /// `AuthError::WeakPassword` if `new` is too short.
    pub async fn change_password(
        &self,
        id: StaffId,
        current: &str,
        new: &str,
    ) -> Result<(), AuthError> {
        let hash = self
            .staff
            .get_password_hash(id)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;
        verify_password(current, &hash)?;
        validate_password(new)?;
        self.staff.set_password(id, &hash_password(new)?).await?;
        Ok(())
    }

    /// Start a password reset. Returns the staff member and the raw token to
    /// send them, or `None` when no active account has that email.
    ///
    /// Only the SHA-256 of the token is stored.
    ///
    /// # Errors
    ///
    /// Returns repository errors.
    pub async fn begin_password_reset(
        &self,
        email: &str,
    ) -> Result<Option<(Staff, String)>, AuthError> {
        let Ok(email) = Email::parse(email) else {
            return Ok(None);
        };
        let Some(staff) = self.staff.get_by_email(&email).await? else {
            return Ok(None);
        };
        if !staff.is_active {
            return Ok(None);
        }

        let token = generate_reset_token();
        let expires_at = Utc::now() + Duration::hours(RESET_TOKEN_LIFETIME_HOURS);
        self.staff
            .set_reset_token(staff.id, &hash_reset_token(&token), expires_at)
            .await?;
        Ok(Some((staff, token)))
    }

    /// Finish a password reset. The token is single-use.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::WeakPassword` or `AuthError::InvalidResetToken`.
    pub async fn complete_password_reset(
        &self,
        token: &str,
        new_password: &str,
    ) -> Result<Staff, AuthError> {
        validate_password(new_password)?;
        let password_hash = hash_password(new_password)?;
        self.staff
            .consume_reset_token(&hash_reset_token(token.trim()), &password_hash)
            .await?
            .ok_or(AuthError::InvalidResetToken)
    }
}

/// Validate and hash a new account.
fn new_staff(
    name: &str,
    email: &str,
    password: &str,
    role: StaffRole,
    image: Option<String>,
) -> Result<NewStaff, AuthError> {
    let email = Email::parse(email)?;
    validate_password(password)?;
    Ok(NewStaff {
        name: name.trim().to_string(),
        email,
        password_hash: hash_password(password)?,
        role,
        image,
    })
}

/// Validate password requirements.
///
/// # Errors
///
/// Returns `AuthError::WeakPassword` when the password is too short.
pub fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Hash a password using Argon2id.
///
/// # Errors
///
/// Returns `AuthError::PasswordHash` if hashing fails.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

/// 32 random bytes, URL-safe base64.
fn generate_reset_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Hex SHA-256 of a reset token, as stored in the database.
fn hash_reset_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_password_round_trip() {
        let hash = hash_password("correct horse battery").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("correct horse battery", &hash).is_ok());
        assert!(matches!(
            verify_password("wrong horse battery", &hash),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_verify_rejects_malformed_hash() {
        assert!(matches!(
            verify_password("whatever1", "not-a-phc-string"),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_validate_password_length() {
        assert!(matches!(
            validate_password("short"),
            Err(AuthError::WeakPassword(_))
        ));
        assert!(validate_password("longenough").is_ok());
    }

    #[test]
    fn test_reset_tokens() {
        let a = generate_reset_token();
        let b = generate_reset_token();
        assert_ne!(a, b);
        assert_eq!(a.len(), 43);

        let hashed = hash_reset_token(&a);
        assert_eq!(hashed.len(), 64);
        assert_eq!(hashed, hash_reset_token(&a));
        assert_ne!(hashed, a);
    }
}
