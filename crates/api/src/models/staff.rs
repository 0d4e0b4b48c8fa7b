//! Staff account types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use emporium_core::{Email, StaffId, StaffRole};

use super::{blank, double_option};
use crate::error::FieldErrors;

/// A staff member. The password hash is never loaded into this type.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Staff {
    pub id: StaffId,
    pub name: String,
    pub email: Email,
    pub role: StaffRole,
    pub is_active: bool,
    /// Public URL of the profile picture.
    pub image: Option<String>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A validated staff record ready to insert.
#[derive(Debug, Clone)]
pub struct NewStaff {
    pub name: String,
    pub email: Email,
    pub password_hash: String,
    pub role: StaffRole,
    pub image: Option<String>,
}

/// Body of `POST /api/auth/register` and `POST /api/staff`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterInput {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Option<StaffRole>,
    pub image: Option<String>,
}

impl RegisterInput {
    /// Shape checks; email and password strength are checked by the auth service.
    #[must_use]
    pub fn field_errors(&self) -> FieldErrors {
        let mut errors = FieldErrors::new();
        errors.check(blank(&self.name), "name", "is required");
        errors.check(blank(&self.email), "email", "is required");
        errors.check(self.password.is_empty(), "password", "is required");
        errors
    }
}

/// Body of `PUT /api/staff/{id}`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<StaffRole>,
    pub is_active: Option<bool>,
    #[serde(default, deserialize_with = "double_option")]
    pub image: Option<Option<String>>,
}

impl StaffUpdate {
    /// Validate and normalize the email.
    ///
    /// # Errors
    ///
    /// Returns validation errors keyed by field.
    pub fn validate(&self) -> Result<Option<Email>, crate::error::AppError> {
        let mut errors = FieldErrors::new();
        errors.check(
            self.name.as_deref().is_some_and(blank),
            "name",
            "must not be blank",
        );
        let email = match self.email.as_deref().map(Email::parse).transpose() {
            Ok(email) => email,
            Err(e) => {
                errors.add("email", e.to_string());
                None
            }
        };
        errors.finish()?;
        Ok(email)
    }
}

/// Body of `PUT /api/auth/update-password`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePasswordInput {
    pub current_password: String,
    pub new_password: String,
}

/// Body of `POST /api/auth/login`.
#[derive(Debug, Deserialize)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

/// Body of `POST /api/auth/forgot-password`.
#[derive(Debug, Deserialize)]
pub struct ForgotPasswordInput {
    pub email: String,
}

/// Body of `POST /api/auth/reset-password`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordInput {
    pub token: String,
    pub new_password: String,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_register_input_requires_fields() {
        let input: RegisterInput =
            serde_json::from_str(r#"{"name":" ","email":"","password":""}"#).unwrap();
        let errors = input.field_errors();
        assert_eq!(errors.to_string(), "email, name, password");
    }

    #[test]
    fn test_staff_update_normalizes_email() {
        let update: StaffUpdate =
            serde_json::from_str(r#"{"email":" Ops@Shop.TEST ","image":null}"#).unwrap();
        let email = update.validate().unwrap();
        assert_eq!(email.unwrap().as_str(), "ops@shop.test");
        assert_eq!(update.image, Some(None));
    }

    #[test]
    fn test_staff_update_rejects_bad_email() {
        let update: StaffUpdate = serde_json::from_str(r#"{"email":"nope"}"#).unwrap();
        assert!(update.validate().is_err());
    }
}
