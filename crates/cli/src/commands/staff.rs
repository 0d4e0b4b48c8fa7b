//! Staff account management.
//!
//! ```bash
//! emporium staff create -e owner@example.com -n "Store Owner" -r super_admin
//! ```
//!
//! The password is read from `--password` or `EMPORIUM_STAFF_PASSWORD`. This is
//! how the first super admin is created on a fresh database when public
//! registration is closed.

use emporium_api::db::StaffRepository;
use emporium_api::models::staff::NewStaff;
use emporium_api::services::auth::{hash_password, validate_password};
use emporium_core::{Email, StaffRole};

use super::{CommandError, connect};

/// Create a staff account.
///
/// # Errors
///
/// Returns `CommandError::Invalid` for a malformed email or when the email is
/// already registered; database and hashing failures otherwise.
pub async fn create(
    email: &str,
    name: &str,
    role: StaffRole,
    password: &str,
) -> Result<(), CommandError> {
    let email = Email::parse(email).map_err(|e| CommandError::Invalid(e.to_string()))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(CommandError::Invalid("name must not be empty".to_string()));
    }
    validate_password(password)?;

    let pool = connect().await?;
    let repo = StaffRepository::new(&pool);

    if repo.get_by_email(&email).await?.is_some() {
        return Err(CommandError::Invalid(format!(
            "a staff account for {email} already exists"
        )));
    }

    let staff = repo
        .create(&NewStaff {
            name: name.to_string(),
            email,
            password_hash: hash_password(password)?,
            role,
            image: None,
        })
        .await?;

    tracing::info!(staff_id = %staff.id, email = %staff.email, role = %staff.role, "Staff account created");
    Ok(())
}
