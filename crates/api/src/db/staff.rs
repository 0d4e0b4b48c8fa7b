//! Staff repository.
//!
//! The password hash and reset token columns are only read by the dedicated
//! methods below; every other query returns [`Staff`] without them.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use emporium_core::{Email, PageRequest, StaffId, StaffRole};

use super::{RepositoryError, found, like_pattern};
use crate::models::staff::{NewStaff, Staff, StaffUpdate};

// =============================================================================
// Internal Row Types
// =============================================================================

const STAFF_COLUMNS: &str = "id, name, email, role, is_active, image, last_login_at, created_at, updated_at";

/// Advisory lock key held while the first account is created.
const FIRST_STAFF_LOCK: i64 = 0x656d_706f_7269_756d;

#[derive(Debug, sqlx::FromRow)]
struct StaffRow {
    id: i32,
    name: String,
    email: String,
    role: StaffRole,
    is_active: bool,
    image: Option<String>,
    last_login_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<StaffRow> for Staff {
    type Error = RepositoryError;

    fn try_from(row: StaffRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        Ok(Self {
            id: StaffId::new(row.id),
            name: row.name,
            email,
            role: row.role,
            is_active: row.is_active,
            image: row.image,
            last_login_at: row.last_login_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct StaffWithHashRow {
    #[sqlx(flatten)]
    staff: StaffRow,
    password_hash: String,
}

/// Filters for the staff list.
#[derive(Debug, Default, Clone)]
pub struct StaffFilter {
    pub search: Option<String>,
    pub role: Option<StaffRole>,
    pub is_active: Option<bool>,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for staff accounts.
pub struct StaffRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> StaffRepository<'a> {
    /// Create a new staff repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List staff, newest first, with the total matching count.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        filter: &StaffFilter,
        page: PageRequest,
    ) -> Result<(Vec<Staff>, i64), RepositoryError> {
        let search = like_pattern(filter.search.as_deref());
        let rows: Vec<StaffRow> = sqlx::query_as(&format!(
            "SELECT {STAFF_COLUMNS} FROM staff
             WHERE ($1::text IS NULL OR name ILIKE $1 OR email ILIKE $1)
               AND ($2::staff_role IS NULL OR role = $2)
               AND ($3::boolean IS NULL OR is_active = $3)
             ORDER BY created_at DESC, id DESC
             LIMIT $4 OFFSET $5"
        ))
        .bind(&search)
        .bind(filter.role)
        .bind(filter.is_active)
        .bind(page.sql_limit())
        .bind(page.sql_offset())
        .fetch_all(self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM staff
             WHERE ($1::text IS NULL OR name ILIKE $1 OR email ILIKE $1)
               AND ($2::staff_role IS NULL OR role = $2)
               AND ($3::boolean IS NULL OR is_active = $3)",
        )
        .bind(&search)
        .bind(filter.role)
        .bind(filter.is_active)
        .fetch_one(self.pool)
        .await?;

        let staff = rows
            .into_iter()
            .map(TryInto::try_into)
            .collect::<Result<_, _>>()?;
        Ok((staff, total))
    }

    /// Number of staff accounts. Zero means the first registration bootstraps.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count(&self) -> Result<i64, RepositoryError> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM staff")
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }

    /// Get a staff member by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the data is invalid.
    pub async fn get_by_id(&self, id: StaffId) -> Result<Option<Staff>, RepositoryError> {
        let row: Option<StaffRow> =
            sqlx::query_as(&format!("SELECT {STAFF_COLUMNS} FROM staff WHERE id = $1"))
                .bind(id)
                .fetch_optional(self.pool)
                .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Get a staff member by email.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the data is invalid.
    pub async fn get_by_email(&self, email: &Email) -> Result<Option<Staff>, RepositoryError> {
        let row: Option<StaffRow> =
            sqlx::query_as(&format!("SELECT {STAFF_COLUMNS} FROM staff WHERE email = $1"))
                .bind(email.as_str())
                .fetch_optional(self.pool)
                .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Get a staff member and their password hash by email, for login.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_password_hash_by_email(
        &self,
        email: &Email,
    ) -> Result<Option<(Staff, String)>, RepositoryError> {
        let row: Option<StaffWithHashRow> = sqlx::query_as(&format!(
            "SELECT {STAFF_COLUMNS}, password_hash FROM staff WHERE email = $1"
        ))
        .bind(email.as_str())
        .fetch_optional(self.pool)
        .await?;

        row.map(|r| Ok((r.staff.try_into()?, r.password_hash)))
            .transpose()
    }

    /// Get the password hash for a staff member.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_password_hash(&self, id: StaffId) -> Result<Option<String>, RepositoryError> {
        let hash = sqlx::query_scalar("SELECT password_hash FROM staff WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(hash)
    }

    /// Create a staff member.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email is already registered.
    pub async fn create(&self, staff: &NewStaff) -> Result<Staff, RepositoryError> {
        let row: StaffRow = sqlx::query_as(&format!(
            "INSERT INTO staff (name, email, password_hash, role, image)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {STAFF_COLUMNS}"
        ))
        .bind(&staff.name)
        .bind(staff.email.as_str())
        .bind(&staff.password_hash)
        .bind(staff.role)
        .bind(&staff.image)
        .fetch_one(self.pool)
        .await?;

        row.try_into()
    }

    /// Insert `staff` only if the table is empty.
    ///
    /// Concurrent callers are serialized on an advisory lock, so at most one
    /// of them creates the first account. Returns `None` for the others.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn create_first(&self, staff: &NewStaff) -> Result<Option<Staff>, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(FIRST_STAFF_LOCK)
            .execute(&mut *tx)
            .await?;

        let row: Option<StaffRow> = sqlx::query_as(&format!(
            "INSERT INTO staff (name, email, password_hash, role, image)
             SELECT $1, $2, $3, $4, $5
             WHERE NOT EXISTS (SELECT 1 FROM staff)
             RETURNING {STAFF_COLUMNS}"
        ))
        .bind(&staff.name)
        .bind(staff.email.as_str())
        .bind(&staff.password_hash)
        .bind(staff.role)
        .bind(&staff.image)
        .fetch_optional(&mut *tx)
        .await?;

        tx.commit().await?;
        row.map(TryInto::try_into).transpose()
    }

    /// Apply a partial update.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the staff member doesn't exist.
    /// Returns `RepositoryError::Conflict` if the new email is taken.
    pub async fn update(
        &self,
        id: StaffId,
        update: &StaffUpdate,
        email: Option<&Email>,
    ) -> Result<Staff, RepositoryError> {
        let (set_image, image) = match &update.image {
            Some(image) => (true, image.as_deref()),
            None => (false, None),
        };
        let row: Option<StaffRow> = sqlx::query_as(&format!(
            "UPDATE staff SET
                 name = COALESCE($2, name),
                 email = COALESCE($3, email),
                 role = COALESCE($4, role),
                 is_active = COALESCE($5, is_active),
                 image = CASE WHEN $6 THEN $7 ELSE image END,
                 updated_at = NOW()
             WHERE id = $1
             RETURNING {STAFF_COLUMNS}"
        ))
        .bind(id)
        .bind(update.name.as_deref().map(str::trim))
        .bind(email.map(Email::as_str))
        .bind(update.role)
        .bind(update.is_active)
        .bind(set_image)
        .bind(image)
        .fetch_optional(self.pool)
        .await?;

        found(row)?.try_into()
    }

    /// Replace a password hash and drop any pending reset token.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the staff member doesn't exist.
    pub async fn set_password(&self, id: StaffId, password_hash: &str) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE staff SET password_hash = $2, reset_token_hash = NULL,
                 reset_token_expires_at = NULL, updated_at = NOW()
             WHERE id = $1",
        )
        .bind(id)
        .bind(password_hash)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Stamp a successful login.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn record_login(&self, id: StaffId) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE staff SET last_login_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Store the hash of a fresh reset token, replacing any earlier one.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn set_reset_token(
        &self,
        id: StaffId,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE staff SET reset_token_hash = $2, reset_token_expires_at = $3 WHERE id = $1",
        )
        .bind(id)
        .bind(token_hash)
        .bind(expires_at)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Set a new password if `token_hash` matches an unexpired reset token,
    /// clearing the token in the same statement so it cannot be reused.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn consume_reset_token(
        &self,
        token_hash: &str,
        password_hash: &str,
    ) -> Result<Option<Staff>, RepositoryError> {
        let row: Option<StaffRow> = sqlx::query_as(&format!(
            "UPDATE staff SET password_hash = $2, reset_token_hash = NULL,
                 reset_token_expires_at = NULL, updated_at = NOW()
             WHERE reset_token_hash = $1
               AND reset_token_expires_at > NOW()
               AND is_active
             RETURNING {STAFF_COLUMNS}"
        ))
        .bind(token_hash)
        .bind(password_hash)
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Delete a staff member.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the staff member doesn't exist.
    pub async fn delete(&self, id: StaffId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM staff WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Number of active super admins, so the last one cannot be removed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count_active_super_admins(&self) -> Result<i64, RepositoryError> {
        let count = sqlx::query_scalar(
            "SELECT COUNT(*) FROM staff WHERE role = 'super_admin' AND is_active",
        )
        .fetch_one(self.pool)
        .await?;
        Ok(count)
    }
}
