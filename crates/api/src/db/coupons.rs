//! Coupon repository.

use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use emporium_core::coupon::{CouponContext, CouponError, normalize_code};
use emporium_core::{CategoryId, CouponId, PageRequest, ProductId};

use super::{RepositoryError, found, like_pattern};
use crate::models::coupon::{Coupon, CouponCheck, CouponDefinition, CouponValidation};

const COUPON_COLUMNS: &str = "id, code, description, discount_type, discount_value, \
     min_order_amount, max_discount_amount, usage_limit, used_count, valid_from, valid_until, \
     is_active, applicable_category_ids, applicable_product_ids, created_at, updated_at";

const FILTER_WHERE: &str = "WHERE ($1::text IS NULL OR code ILIKE $1 OR description ILIKE $1)
       AND ($2::boolean IS NULL OR is_active = $2)";

/// Filters for the coupon list.
#[derive(Debug, Default, Clone)]
pub struct CouponFilter {
    pub search: Option<String>,
    pub is_active: Option<bool>,
}

/// Repository for coupons.
pub struct CouponRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CouponRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List coupons, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        filter: &CouponFilter,
        page: PageRequest,
    ) -> Result<(Vec<Coupon>, i64), RepositoryError> {
        let search = like_pattern(filter.search.as_deref());
        let rows = sqlx::query_as(&format!(
            "SELECT {COUPON_COLUMNS} FROM coupons {FILTER_WHERE}
             ORDER BY created_at DESC, id DESC
             LIMIT $3 OFFSET $4"
        ))
        .bind(&search)
        .bind(filter.is_active)
        .bind(page.sql_limit())
        .bind(page.sql_offset())
        .fetch_all(self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM coupons {FILTER_WHERE}"))
            .bind(&search)
            .bind(filter.is_active)
            .fetch_one(self.pool)
            .await?;

        Ok((rows, total))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: CouponId) -> Result<Option<Coupon>, RepositoryError> {
        let row = sqlx::query_as(&format!("SELECT {COUPON_COLUMNS} FROM coupons WHERE id = $1"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(row)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the code is taken.
    pub async fn create(&self, def: &CouponDefinition) -> Result<Coupon, RepositoryError> {
        let rules = &def.rules;
        let row = sqlx::query_as(&format!(
            "INSERT INTO coupons (code, description, discount_type, discount_value,
                                  min_order_amount, max_discount_amount, usage_limit,
                                  valid_from, valid_until, is_active,
                                  applicable_category_ids, applicable_product_ids)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
             RETURNING {COUPON_COLUMNS}"
        ))
        .bind(&def.code)
        .bind(&def.description)
        .bind(rules.discount_type)
        .bind(rules.discount_value)
        .bind(rules.min_order_amount)
        .bind(rules.max_discount_amount)
        .bind(rules.usage_limit)
        .bind(rules.valid_from)
        .bind(rules.valid_until)
        .bind(rules.is_active)
        .bind(&rules.applicable_category_ids)
        .bind(&rules.applicable_product_ids)
        .fetch_one(self.pool)
        .await?;
        Ok(row)
    }

    /// Overwrite a coupon's definition. `used_count` is left alone.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` or `RepositoryError::Conflict`.
    pub async fn replace(
        &self,
        id: CouponId,
        def: &CouponDefinition,
    ) -> Result<Coupon, RepositoryError> {
        let rules = &def.rules;
        let row = sqlx::query_as(&format!(
            "UPDATE coupons SET code = $2, description = $3, discount_type = $4,
                 discount_value = $5, min_order_amount = $6, max_discount_amount = $7,
                 usage_limit = $8, valid_from = $9, valid_until = $10, is_active = $11,
                 applicable_category_ids = $12, applicable_product_ids = $13,
                 updated_at = NOW()
             WHERE id = $1
             RETURNING {COUPON_COLUMNS}"
        ))
        .bind(id)
        .bind(&def.code)
        .bind(&def.description)
        .bind(rules.discount_type)
        .bind(rules.discount_value)
        .bind(rules.min_order_amount)
        .bind(rules.max_discount_amount)
        .bind(rules.usage_limit)
        .bind(rules.valid_from)
        .bind(rules.valid_until)
        .bind(rules.is_active)
        .bind(&rules.applicable_category_ids)
        .bind(&rules.applicable_product_ids)
        .fetch_optional(self.pool)
        .await?;
        found(row)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the coupon doesn't exist.
    pub async fn delete(&self, id: CouponId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM coupons WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Check a code against a cart without using it up.
    ///
    /// When only products are given, their categories are looked up so
    /// category-restricted coupons still match.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails. Coupon rule
    /// failures are reported in the result, not as errors.
    pub async fn check(&self, check: &CouponCheck) -> Result<CouponValidation, RepositoryError> {
        let coupon: Option<Coupon> = sqlx::query_as(&format!(
            "SELECT {COUPON_COLUMNS} FROM coupons WHERE code = $1"
        ))
        .bind(normalize_code(&check.code))
        .fetch_optional(self.pool)
        .await?;

        let mut category_ids = check.category_ids.clone();
        if category_ids.is_empty() && !check.product_ids.is_empty() {
            category_ids = categories_of(self.pool, &check.product_ids).await?;
        }

        let outcome = coupon.ok_or(CouponError::NotFound).and_then(|coupon| {
            coupon.rules().evaluate(&CouponContext {
                order_total: check.order_total,
                now: Utc::now(),
                product_ids: &check.product_ids,
                category_ids: &category_ids,
            })
        });

        Ok(match outcome {
            Ok(discount) => CouponValidation {
                valid: true,
                discount,
                message: "Coupon applied".to_string(),
            },
            Err(err) => CouponValidation {
                valid: false,
                discount: Decimal::ZERO,
                message: err.to_string(),
            },
        })
    }
}

/// Distinct categories of the given products.
async fn categories_of(
    pool: &PgPool,
    product_ids: &[ProductId],
) -> Result<Vec<CategoryId>, RepositoryError> {
    let ids = sqlx::query_scalar(
        "SELECT DISTINCT category_id FROM products
         WHERE id = ANY($1) AND category_id IS NOT NULL",
    )
    .bind(product_ids)
    .fetch_all(pool)
    .await?;
    Ok(ids)
}

/// Load a coupon by code and lock it for the rest of the transaction.
pub(crate) async fn lock_by_code(
    conn: &mut PgConnection,
    code: &str,
) -> Result<Option<Coupon>, RepositoryError> {
    let row = sqlx::query_as(&format!(
        "SELECT {COUPON_COLUMNS} FROM coupons WHERE code = $1 FOR UPDATE"
    ))
    .bind(normalize_code(code))
    .fetch_optional(conn)
    .await?;
    Ok(row)
}

/// Count one use of a coupon. The usage limit is re-checked in the UPDATE.
///
/// # Errors
///
/// Returns `CouponError::UsageLimitReached` when no use is left.
pub(crate) async fn record_use(conn: &mut PgConnection, id: CouponId) -> Result<(), RepositoryError> {
    let result = sqlx::query(
        "UPDATE coupons SET used_count = used_count + 1, updated_at = NOW()
         WHERE id = $1 AND (usage_limit IS NULL OR used_count < usage_limit)",
    )
    .bind(id)
    .execute(conn)
    .await?;
    if result.rows_affected() == 0 {
        return Err(CouponError::UsageLimitReached.into());
    }
    Ok(())
}
