//! Bulk order inquiry repository.

use emporium_core::{BulkOrderId, BulkOrderStatus, PageRequest};
use sqlx::PgPool;

use super::{RepositoryError, found, like_pattern};
use crate::models::bulk_order::{BulkOrder, BulkOrderUpdate, NewBulkOrder};

const BULK_ORDER_COLUMNS: &str = "id, contact_name, email, phone, company, product_details, \
     quantity, status, notes, created_at, updated_at";

const FILTER_WHERE: &str = "WHERE ($1::text IS NULL OR contact_name ILIKE $1 OR email ILIKE $1
            OR company ILIKE $1 OR product_details ILIKE $1)
       AND ($2::bulk_order_status IS NULL OR status = $2)";

#[derive(Debug, Default, Clone)]
pub struct BulkOrderFilter {
    pub search: Option<String>,
    pub status: Option<BulkOrderStatus>,
}

/// Repository for bulk order inquiries.
pub struct BulkOrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> BulkOrderRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        filter: &BulkOrderFilter,
        page: PageRequest,
    ) -> Result<(Vec<BulkOrder>, i64), RepositoryError> {
        let search = like_pattern(filter.search.as_deref());
        let rows = sqlx::query_as(&format!(
            "SELECT {BULK_ORDER_COLUMNS} FROM bulk_orders {FILTER_WHERE}
             ORDER BY created_at DESC, id DESC
             LIMIT $3 OFFSET $4"
        ))
        .bind(&search)
        .bind(filter.status)
        .bind(page.sql_limit())
        .bind(page.sql_offset())
        .fetch_all(self.pool)
        .await?;

        let total: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM bulk_orders {FILTER_WHERE}"))
                .bind(&search)
                .bind(filter.status)
                .fetch_one(self.pool)
                .await?;

        Ok((rows, total))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: BulkOrderId) -> Result<Option<BulkOrder>, RepositoryError> {
        let row = sqlx::query_as(&format!(
            "SELECT {BULK_ORDER_COLUMNS} FROM bulk_orders WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(row)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(&self, input: &NewBulkOrder) -> Result<BulkOrder, RepositoryError> {
        let row: BulkOrder = sqlx::query_as(&format!(
            "INSERT INTO bulk_orders (contact_name, email, phone, company, product_details,
                                      quantity)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {BULK_ORDER_COLUMNS}"
        ))
        .bind(&input.contact_name)
        .bind(input.email.as_str())
        .bind(&input.phone)
        .bind(&input.company)
        .bind(&input.product_details)
        .bind(input.quantity)
        .fetch_one(self.pool)
        .await?;
        tracing::info!(bulk_order_id = %row.id, quantity = row.quantity, "Bulk order inquiry received");
        Ok(row)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the inquiry doesn't exist.
    pub async fn update(
        &self,
        id: BulkOrderId,
        update: &BulkOrderUpdate,
    ) -> Result<BulkOrder, RepositoryError> {
        let (set_notes, notes) = match &update.notes {
            Some(value) => (true, value.clone()),
            None => (false, None),
        };
        let row = sqlx::query_as(&format!(
            "UPDATE bulk_orders SET
                 status = COALESCE($2, status),
                 notes = CASE WHEN $3 THEN $4 ELSE notes END,
                 quantity = COALESCE($5, quantity),
                 updated_at = NOW()
             WHERE id = $1
             RETURNING {BULK_ORDER_COLUMNS}"
        ))
        .bind(id)
        .bind(update.status)
        .bind(set_notes)
        .bind(notes)
        .bind(update.quantity)
        .fetch_optional(self.pool)
        .await?;
        found(row)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the inquiry doesn't exist.
    pub async fn delete(&self, id: BulkOrderId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM bulk_orders WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
