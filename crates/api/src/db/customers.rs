//! Customer repository.
//!
//! Order statistics are computed from `orders` on every read rather than
//! stored on the customer row, so they cannot drift.

use emporium_core::{CustomerId, Email, PageRequest};
use sqlx::PgPool;

use super::{OrderRepository, RepositoryError, found, like_pattern};
use crate::models::clean;
use crate::models::customer::{
    Customer, CustomerDetail, CustomerStats, CustomerSummary, CustomerUpdate, NewCustomer,
};

pub(crate) const CUSTOMER_COLUMNS: &str =
    "id, name, email, phone, firebase_uid, addresses, is_active, created_at, updated_at";

const SUMMARY_SELECT: &str = "SELECT c.id, c.name, c.email, c.phone, c.firebase_uid, c.addresses,
            c.is_active, c.created_at, c.updated_at,
            COALESCE(o.order_count, 0) AS order_count,
            COALESCE(o.total_spent, 0) AS total_spent,
            o.last_order_at
     FROM customers c
     LEFT JOIN LATERAL (
         SELECT COUNT(*) AS order_count,
                SUM(total_amount) FILTER (WHERE status <> 'cancelled') AS total_spent,
                MAX(created_at) AS last_order_at
         FROM orders WHERE customer_id = c.id
     ) o ON TRUE";

const FILTER_WHERE: &str = "WHERE ($1::text IS NULL OR c.name ILIKE $1 OR c.email ILIKE $1
            OR c.phone ILIKE $1)
       AND ($2::boolean IS NULL OR c.is_active = $2)";

/// Number of orders shown on the customer detail view.
const RECENT_ORDERS: i64 = 5;

/// Filters for the customer list and export.
#[derive(Debug, Default, Clone)]
pub struct CustomerFilter {
    /// Matches name, email or phone.
    pub search: Option<String>,
    pub is_active: Option<bool>,
}

/// Repository for customers.
pub struct CustomerRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CustomerRepository<'a> {
    /// Create a new customer repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List customers with order totals, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        filter: &CustomerFilter,
        page: PageRequest,
    ) -> Result<(Vec<CustomerSummary>, i64), RepositoryError> {
        let rows = self
            .fetch_summaries(filter, Some(page.sql_limit()), page.sql_offset())
            .await?;

        let total: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM customers c {FILTER_WHERE}"))
                .bind(like_pattern(filter.search.as_deref()))
                .bind(filter.is_active)
                .fetch_one(self.pool)
                .await?;

        Ok((rows, total))
    }

    /// Every customer matching the filter, for export.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn export(
        &self,
        filter: &CustomerFilter,
    ) -> Result<Vec<CustomerSummary>, RepositoryError> {
        self.fetch_summaries(filter, None, 0).await
    }

    async fn fetch_summaries(
        &self,
        filter: &CustomerFilter,
        limit: Option<i64>,
        offset: i64,
    ) -> Result<Vec<CustomerSummary>, RepositoryError> {
        let rows = sqlx::query_as(&format!(
            "{SUMMARY_SELECT} {FILTER_WHERE}
             ORDER BY c.created_at DESC, c.id DESC
             LIMIT $3 OFFSET $4"
        ))
        .bind(like_pattern(filter.search.as_deref()))
        .bind(filter.is_active)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// Get a customer with statistics and recent orders.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get_detail(&self, id: CustomerId) -> Result<Option<CustomerDetail>, RepositoryError> {
        let Some(customer) = self.get(id).await? else {
            return Ok(None);
        };

        let stats: CustomerStats = sqlx::query_as(
            "SELECT COUNT(*) AS order_count,
                    COALESCE(SUM(total_amount) FILTER (WHERE status <> 'cancelled'), 0)
                        AS total_spent,
                    COALESCE(ROUND(AVG(total_amount) FILTER (WHERE status <> 'cancelled'), 2), 0)
                        AS average_order_value,
                    COUNT(*) FILTER (WHERE status = 'pending') AS pending,
                    COUNT(*) FILTER (WHERE status = 'processing') AS processing,
                    COUNT(*) FILTER (WHERE status = 'dispatched') AS dispatched,
                    COUNT(*) FILTER (WHERE status = 'shipped') AS shipped,
                    COUNT(*) FILTER (WHERE status = 'delivered') AS delivered,
                    COUNT(*) FILTER (WHERE status = 'cancelled') AS cancelled,
                    MIN(created_at) AS first_order_at,
                    MAX(created_at) AS last_order_at
             FROM orders WHERE customer_id = $1",
        )
        .bind(id)
        .fetch_one(self.pool)
        .await?;

        let recent_orders = OrderRepository::new(self.pool)
            .recent_for_customer(id, RECENT_ORDERS)
            .await?;

        Ok(Some(CustomerDetail {
            customer,
            stats,
            recent_orders,
        }))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: CustomerId) -> Result<Option<Customer>, RepositoryError> {
        let row = sqlx::query_as(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customers WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(row)
    }

    /// Find the customer linked to a Firebase account.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_firebase_uid(&self, uid: &str) -> Result<Option<Customer>, RepositoryError> {
        let row = sqlx::query_as(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customers WHERE firebase_uid = $1"
        ))
        .bind(uid)
        .fetch_optional(self.pool)
        .await?;
        Ok(row)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email or Firebase UID is taken.
    pub async fn create(&self, input: &NewCustomer) -> Result<Customer, RepositoryError> {
        let row = sqlx::query_as(&format!(
            "INSERT INTO customers (name, email, phone, firebase_uid, addresses, is_active)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {CUSTOMER_COLUMNS}"
        ))
        .bind(&input.name)
        .bind(input.email.as_str())
        .bind(&input.phone)
        .bind(&input.firebase_uid)
        .bind(&input.addresses)
        .bind(input.is_active)
        .fetch_one(self.pool)
        .await?;
        Ok(row)
    }

    /// Apply a partial update. `email` is the normalized form of `update.email`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` or `RepositoryError::Conflict`.
    pub async fn update(
        &self,
        id: CustomerId,
        update: &CustomerUpdate,
        email: Option<&Email>,
    ) -> Result<Customer, RepositoryError> {
        let (set_phone, phone) = match &update.phone {
            Some(value) => (true, clean(value.as_deref())),
            None => (false, None),
        };
        let (set_uid, firebase_uid) = match &update.firebase_uid {
            Some(value) => (true, clean(value.as_deref())),
            None => (false, None),
        };

        let row = sqlx::query_as(&format!(
            "UPDATE customers SET
                 name = COALESCE($2, name),
                 email = COALESCE($3, email),
                 phone = CASE WHEN $4 THEN $5 ELSE phone END,
                 firebase_uid = CASE WHEN $6 THEN $7 ELSE firebase_uid END,
                 addresses = COALESCE($8, addresses),
                 is_active = COALESCE($9, is_active),
                 updated_at = NOW()
             WHERE id = $1
             RETURNING {CUSTOMER_COLUMNS}"
        ))
        .bind(id)
        .bind(update.name.as_deref().map(str::trim))
        .bind(email.map(Email::as_str))
        .bind(set_phone)
        .bind(phone)
        .bind(set_uid)
        .bind(firebase_uid)
        .bind(&update.addresses)
        .bind(update.is_active)
        .fetch_optional(self.pool)
        .await?;
        found(row)
    }

    /// Delete a customer. Their orders and ratings are kept without the link.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the customer doesn't exist.
    pub async fn delete(&self, id: CustomerId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM customers WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
