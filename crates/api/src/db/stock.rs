//! Stock repository.
//!
//! Every quantity change runs in a transaction that first takes a row lock
//! (`SELECT ... FOR UPDATE`), plans the change with
//! [`emporium_core::stock`], then writes the new quantity and appends the
//! audit note. Concurrent changes to the same row therefore serialize, and
//! the `quantity >= 0` CHECK backstops the arithmetic.

use sqlx::{PgConnection, PgPool};

use emporium_core::stock::{StockChange, append_note, plan_adjustment, plan_dispatch};
use emporium_core::{PageRequest, ProductId, StockId, VariantId};

use super::{RepositoryError, found, like_pattern};
use crate::models::stock::{
    LowStockSummary, Stock, StockImportRow, StockInput, StockItem, StockUpdate,
};

const STOCK_COLUMNS: &str =
    "id, product_id, variant_id, quantity, min_stock, notes, created_at, updated_at";

const ITEM_SELECT: &str = "SELECT s.id, s.product_id, s.variant_id, s.quantity, s.min_stock,
            s.notes, s.created_at, s.updated_at,
            p.name AS product_name, p.sku AS product_sku,
            v.sku AS variant_sku, v.attributes AS variant_attributes
     FROM stock s
     JOIN products p ON p.id = s.product_id
     LEFT JOIN product_variants v ON v.id = s.variant_id";

const FILTER_WHERE: &str = "WHERE ($1::text IS NULL OR p.name ILIKE $1 OR p.sku ILIKE $1
            OR v.sku ILIKE $1)
       AND ($2::boolean IS NULL OR (s.quantity <= s.min_stock) = $2)
       AND ($3::integer IS NULL OR s.product_id = $3)";

/// Filters for the stock list and export.
#[derive(Debug, Default, Clone)]
pub struct StockFilter {
    pub search: Option<String>,
    /// `Some(true)` keeps only rows at or below their minimum.
    pub low_stock: Option<bool>,
    pub product_id: Option<ProductId>,
}

/// Outcome of importing one CSV row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockImportOutcome {
    Created,
    Updated,
}

/// Repository for stock rows.
pub struct StockRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> StockRepository<'a> {
    /// Create a new stock repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List stock rows, lowest relative stock first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        filter: &StockFilter,
        page: PageRequest,
    ) -> Result<(Vec<StockItem>, i64), RepositoryError> {
        let rows = self
            .fetch_items(filter, Some(page.sql_limit()), page.sql_offset())
            .await?;

        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM stock s
             JOIN products p ON p.id = s.product_id
             LEFT JOIN product_variants v ON v.id = s.variant_id
             {FILTER_WHERE}"
        ))
        .bind(like_pattern(filter.search.as_deref()))
        .bind(filter.low_stock)
        .bind(filter.product_id)
        .fetch_one(self.pool)
        .await?;

        Ok((rows, total))
    }

    /// Every stock row matching the filter, for export.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn export(&self, filter: &StockFilter) -> Result<Vec<StockItem>, RepositoryError> {
        self.fetch_items(filter, None, 0).await
    }

    async fn fetch_items(
        &self,
        filter: &StockFilter,
        limit: Option<i64>,
        offset: i64,
    ) -> Result<Vec<StockItem>, RepositoryError> {
        let rows = sqlx::query_as(&format!(
            "{ITEM_SELECT} {FILTER_WHERE}
             ORDER BY (s.quantity - s.min_stock), p.name, s.id
             LIMIT $4 OFFSET $5"
        ))
        .bind(like_pattern(filter.search.as_deref()))
        .bind(filter.low_stock)
        .bind(filter.product_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// Rows at or below their minimum, with counts.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn low_stock(&self, limit: i64) -> Result<LowStockSummary, RepositoryError> {
        let (low_stock_count, out_of_stock_count): (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*) FILTER (WHERE quantity <= min_stock),
                    COUNT(*) FILTER (WHERE quantity = 0)
             FROM stock",
        )
        .fetch_one(self.pool)
        .await?;

        let items = sqlx::query_as(&format!(
            "{ITEM_SELECT}
             WHERE s.quantity <= s.min_stock
             ORDER BY s.quantity, p.name, s.id
             LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        Ok(LowStockSummary {
            low_stock_count,
            out_of_stock_count,
            items,
        })
    }

    /// Get a stock row with product details.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: StockId) -> Result<Option<StockItem>, RepositoryError> {
        let row = sqlx::query_as(&format!("{ITEM_SELECT} WHERE s.id = $1"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(row)
    }

    /// Create a stock row.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the product/variant already has
    /// a row, the variant belongs to another product, or the product is missing.
    pub async fn create(&self, input: &StockInput) -> Result<Stock, RepositoryError> {
        if let Some(variant_id) = input.variant_id {
            let owner: Option<ProductId> =
                sqlx::query_scalar("SELECT product_id FROM product_variants WHERE id = $1")
                    .bind(variant_id)
                    .fetch_optional(self.pool)
                    .await?;
            if owner != Some(input.product_id) {
                return Err(RepositoryError::Conflict(format!(
                    "variant {variant_id} does not belong to product {}",
                    input.product_id
                )));
            }
        }

        let notes = input
            .notes
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty());
        let row = sqlx::query_as(&format!(
            "INSERT INTO stock (product_id, variant_id, quantity, min_stock, notes)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {STOCK_COLUMNS}"
        ))
        .bind(input.product_id)
        .bind(input.variant_id)
        .bind(input.quantity)
        .bind(input.min_stock.unwrap_or(0))
        .bind(notes)
        .fetch_one(self.pool)
        .await?;
        Ok(row)
    }

    /// Update quantity, minimum and notes under a row lock. A quantity change
    /// appends `Manual adjustment: X → Y` to the notes.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the row doesn't exist.
    pub async fn update(&self, id: StockId, update: &StockUpdate) -> Result<Stock, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let current = found(lock_by_id(&mut tx, id).await?)?;

        let mut notes = match &update.notes {
            Some(replacement) => replacement
                .as_deref()
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(String::from),
            None => current.notes.clone(),
        };
        let mut quantity = current.quantity;
        if let Some(target) = update.quantity
            && target != current.quantity
        {
            let change = plan_adjustment(
                current.quantity,
                target - current.quantity,
                update.reason.as_deref().unwrap_or_default(),
            )?;
            notes = Some(append_note(notes.as_deref(), &change.note));
            quantity = change.after;
        }

        let row = sqlx::query_as(&format!(
            "UPDATE stock SET quantity = $2, min_stock = COALESCE($3, min_stock), notes = $4,
                 updated_at = NOW()
             WHERE id = $1
             RETURNING {STOCK_COLUMNS}"
        ))
        .bind(id)
        .bind(quantity)
        .bind(update.min_stock)
        .bind(notes)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(row)
    }

    /// Change quantity by `delta` under a row lock.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound`, or `RepositoryError::Stock` when
    /// the result would be negative.
    pub async fn adjust(
        &self,
        id: StockId,
        delta: i32,
        reason: &str,
    ) -> Result<(Stock, StockChange), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let current = found(lock_by_id(&mut tx, id).await?)?;
        let change = plan_adjustment(current.quantity, delta, reason)?;
        let stock = write_change(&mut tx, &current, &change).await?;
        tx.commit().await?;

        tracing::info!(
            stock_id = %id,
            before = change.before,
            after = change.after,
            "Stock adjusted"
        );
        Ok((stock, change))
    }

    /// Delete a stock row.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the row doesn't exist.
    pub async fn delete(&self, id: StockId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM stock WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Set stock for the product or variant with `row.sku`, creating the row
    /// if needed. Quantity changes are noted like manual adjustments.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` when no product or variant has the SKU.
    pub async fn import_row(&self, row: &StockImportRow) -> Result<StockImportOutcome, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        // Variant SKUs win over product SKUs.
        let target: Option<(ProductId, Option<VariantId>, i32)> = sqlx::query_as(
            "SELECT product_id, id, 0 AS rank FROM product_variants WHERE sku = $1
             UNION ALL
             SELECT id, NULL, 1 FROM products WHERE sku = $1
             ORDER BY rank
             LIMIT 1",
        )
        .bind(&row.sku)
        .fetch_optional(&mut *tx)
        .await?;
        let (product_id, variant_id, _) = found(target)?;

        let Some(current) = lock_by_target(&mut tx, product_id, variant_id).await? else {
            let note = append_note(
                row.notes.as_deref(),
                &format!("Imported: {}", row.quantity),
            );
            sqlx::query(
                "INSERT INTO stock (product_id, variant_id, quantity, min_stock, notes)
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(product_id)
            .bind(variant_id)
            .bind(row.quantity)
            .bind(row.min_stock.unwrap_or(0))
            .bind(note)
            .execute(&mut *tx)
            .await?;
            tx.commit().await?;
            return Ok(StockImportOutcome::Created);
        };

        let mut notes = current.notes.clone();
        if let Some(extra) = row.notes.as_deref() {
            notes = Some(append_note(notes.as_deref(), extra));
        }
        if row.quantity != current.quantity {
            let change = plan_adjustment(current.quantity, row.quantity - current.quantity, "import")?;
            notes = Some(append_note(notes.as_deref(), &change.note));
        }
        sqlx::query(
            "UPDATE stock SET quantity = $2, min_stock = COALESCE($3, min_stock), notes = $4,
                 updated_at = NOW()
             WHERE id = $1",
        )
        .bind(current.id)
        .bind(row.quantity)
        .bind(row.min_stock)
        .bind(notes)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(StockImportOutcome::Updated)
    }
}

// =============================================================================
// Locked operations shared with order dispatch
// =============================================================================

async fn lock_by_id(conn: &mut PgConnection, id: StockId) -> Result<Option<Stock>, RepositoryError> {
    let row = sqlx::query_as(&format!(
        "SELECT {STOCK_COLUMNS} FROM stock WHERE id = $1 FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(conn)
    .await?;
    Ok(row)
}

/// Lock the stock row for a product (variant `None`) or a variant.
pub(crate) async fn lock_by_target(
    conn: &mut PgConnection,
    product_id: ProductId,
    variant_id: Option<VariantId>,
) -> Result<Option<Stock>, RepositoryError> {
    let row = sqlx::query_as(&format!(
        "SELECT {STOCK_COLUMNS} FROM stock
         WHERE product_id = $1 AND variant_id IS NOT DISTINCT FROM $2
         FOR UPDATE"
    ))
    .bind(product_id)
    .bind(variant_id)
    .fetch_optional(conn)
    .await?;
    Ok(row)
}

/// Persist a planned change on a row locked by the caller.
pub(crate) async fn write_change(
    conn: &mut PgConnection,
    current: &Stock,
    change: &StockChange,
) -> Result<Stock, RepositoryError> {
    let row = sqlx::query_as(&format!(
        "UPDATE stock SET quantity = $2, notes = $3, updated_at = NOW()
         WHERE id = $1
         RETURNING {STOCK_COLUMNS}"
    ))
    .bind(current.id)
    .bind(change.after)
    .bind(append_note(current.notes.as_deref(), &change.note))
    .fetch_one(conn)
    .await?;
    Ok(row)
}

/// Decrement stock for one dispatched order line on the caller's transaction.
///
/// # Errors
///
/// Returns `RepositoryError::Conflict` when the line has no stock row and
/// `RepositoryError::Stock` when there is not enough on hand.
pub(crate) async fn dispatch_line(
    conn: &mut PgConnection,
    product_id: ProductId,
    variant_id: Option<VariantId>,
    quantity: i32,
) -> Result<StockChange, RepositoryError> {
    let current = lock_by_target(conn, product_id, variant_id)
        .await?
        .ok_or_else(|| {
            RepositoryError::Conflict(match variant_id {
                Some(v) => format!("no stock record for product {product_id} variant {v}"),
                None => format!("no stock record for product {product_id}"),
            })
        })?;
    let change = plan_dispatch(current.quantity, quantity)?;
    write_change(conn, &current, &change).await?;
    Ok(change)
}
