//! Order repository.
//!
//! Status changes lock the order row first, so two requests moving the same
//! order serialize and only one of them can dispatch it. Dispatch then locks
//! each stock row in `(product_id, variant_id)` order and decrements it on the
//! same transaction; any shortfall rolls the whole change back.

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use emporium_core::coupon::{CouponContext, CouponError};
use emporium_core::stock::StockError;
use emporium_core::{
    CategoryId, CustomerId, OrderId, OrderStatus, PageRequest, ProductId, ProductStatus,
    VariantId, checked_subtotal, fits_amount, round_money,
};

use super::customers::CUSTOMER_COLUMNS;
use super::{RepositoryError, coupons, found, like_pattern, stock};
use crate::models::order::{
    DispatchedLine, Order, OrderDetail, OrderInput, OrderItem, OrderSummary, OrderUpdate,
    StatusChange,
};

const ORDER_COLUMNS: &str = "id, order_number, customer_id, subtotal, shipping_amount, \
     discount_amount, total_amount, coupon_code, status, payment_method, shipping_address, \
     notes, created_at, updated_at";

const SUMMARY_SELECT: &str = "SELECT o.id, o.order_number, o.customer_id, o.subtotal,
            o.shipping_amount, o.discount_amount, o.total_amount, o.coupon_code, o.status,
            o.payment_method, o.shipping_address, o.notes, o.created_at, o.updated_at,
            c.name AS customer_name, c.email AS customer_email,
            (SELECT COUNT(*) FROM order_items i WHERE i.order_id = o.id) AS item_count
     FROM orders o
     LEFT JOIN customers c ON c.id = o.customer_id";

const FILTER_WHERE: &str = "WHERE ($1::text IS NULL OR o.order_number ILIKE $1
            OR c.name ILIKE $1 OR c.email ILIKE $1)
       AND ($2::order_status IS NULL OR o.status = $2)
       AND ($3::date IS NULL OR o.created_at >= $3)
       AND ($4::date IS NULL OR o.created_at < $4 + 1)
       AND ($5::integer IS NULL OR o.customer_id = $5)";

const ITEM_COLUMNS: &str = "id, order_id, product_id, variant_id, name, sku, quantity, unit_price";

/// Filters for the order list and export.
#[derive(Debug, Default, Clone)]
pub struct OrderFilter {
    /// Matches order number, customer name or email.
    pub search: Option<String>,
    pub status: Option<OrderStatus>,
    /// First day included.
    pub from: Option<NaiveDate>,
    /// Last day included.
    pub to: Option<NaiveDate>,
    pub customer_id: Option<CustomerId>,
}

/// Catalog data for one order line.
#[derive(Debug, sqlx::FromRow)]
struct LineSource {
    product_name: String,
    product_sku: String,
    selling_price: Decimal,
    status: ProductStatus,
    category_id: Option<CategoryId>,
    variant_product_id: Option<ProductId>,
    variant_sku: Option<String>,
    variant_price: Option<Decimal>,
    variant_attributes: Option<serde_json::Value>,
}

/// A priced line ready to insert.
struct PricedLine {
    product_id: ProductId,
    variant_id: Option<VariantId>,
    name: String,
    sku: String,
    quantity: i32,
    unit_price: Decimal,
}

/// Repository for orders and their items.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        filter: &OrderFilter,
        page: PageRequest,
    ) -> Result<(Vec<OrderSummary>, i64), RepositoryError> {
        let rows = self
            .fetch_summaries(filter, Some(page.sql_limit()), page.sql_offset())
            .await?;

        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM orders o
             LEFT JOIN customers c ON c.id = o.customer_id
             {FILTER_WHERE}"
        ))
        .bind(like_pattern(filter.search.as_deref()))
        .bind(filter.status)
        .bind(filter.from)
        .bind(filter.to)
        .bind(filter.customer_id)
        .fetch_one(self.pool)
        .await?;

        Ok((rows, total))
    }

    /// Every order matching the filter, for export.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn export(&self, filter: &OrderFilter) -> Result<Vec<OrderSummary>, RepositoryError> {
        self.fetch_summaries(filter, None, 0).await
    }

    async fn fetch_summaries(
        &self,
        filter: &OrderFilter,
        limit: Option<i64>,
        offset: i64,
    ) -> Result<Vec<OrderSummary>, RepositoryError> {
        let rows = sqlx::query_as(&format!(
            "{SUMMARY_SELECT} {FILTER_WHERE}
             ORDER BY o.created_at DESC, o.id DESC
             LIMIT $6 OFFSET $7"
        ))
        .bind(like_pattern(filter.search.as_deref()))
        .bind(filter.status)
        .bind(filter.from)
        .bind(filter.to)
        .bind(filter.customer_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// A customer's latest orders.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn recent_for_customer(
        &self,
        customer_id: CustomerId,
        limit: i64,
    ) -> Result<Vec<OrderSummary>, RepositoryError> {
        let rows = sqlx::query_as(&format!(
            "{SUMMARY_SELECT}
             WHERE o.customer_id = $1
             ORDER BY o.created_at DESC, o.id DESC
             LIMIT $2"
        ))
        .bind(customer_id)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// Get an order with its customer and items.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: OrderId) -> Result<Option<OrderDetail>, RepositoryError> {
        let Some(order) = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        else {
            return Ok(None);
        };

        let customer = match order.customer_id {
            Some(customer_id) => {
                sqlx::query_as(&format!(
                    "SELECT {CUSTOMER_COLUMNS} FROM customers WHERE id = $1"
                ))
                .bind(customer_id)
                .fetch_optional(self.pool)
                .await?
            }
            None => None,
        };

        let items = sqlx::query_as(&format!(
            "SELECT {ITEM_COLUMNS} FROM order_items WHERE order_id = $1 ORDER BY id"
        ))
        .bind(id)
        .fetch_all(self.pool)
        .await?;

        Ok(Some(OrderDetail {
            order,
            customer,
            items,
        }))
    }

    /// Create a pending order.
    ///
    /// Lines are priced from the catalog unless the input overrides the unit
    /// price. A coupon is locked, evaluated against the subtotal and counted
    /// as used on the same transaction. Stock is untouched until dispatch.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` for unknown or archived products
    /// and mismatched variants, `RepositoryError::Coupon` when the coupon
    /// does not apply.
    pub async fn create(&self, input: &OrderInput) -> Result<OrderDetail, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let mut lines = Vec::with_capacity(input.items.len());
        let mut category_ids = Vec::new();
        for item in &input.items {
            let source = load_line_source(&mut tx, item.product_id, item.variant_id).await?;
            if let Some(category_id) = source.category_id
                && !category_ids.contains(&category_id)
            {
                category_ids.push(category_id);
            }
            lines.push(price_line(
                item.product_id,
                item.variant_id,
                item.quantity,
                item.unit_price,
                source,
            )?);
        }

        let subtotal = checked_subtotal(lines.iter().map(|l| (l.unit_price, l.quantity)))
            .ok_or_else(|| RepositoryError::InvalidValue("order subtotal is too large".to_string()))?;
        let shipping = round_money(input.shipping_amount.unwrap_or(Decimal::ZERO));

        let (coupon_code, discount) = match input.coupon_code.as_deref() {
            Some(code) => {
                let coupon = coupons::lock_by_code(&mut tx, code)
                    .await?
                    .ok_or(CouponError::NotFound)?;
                let product_ids: Vec<ProductId> = lines.iter().map(|l| l.product_id).collect();
                let discount = coupon.rules().evaluate(&CouponContext {
                    order_total: subtotal,
                    now: Utc::now(),
                    product_ids: &product_ids,
                    category_ids: &category_ids,
                })?;
                coupons::record_use(&mut tx, coupon.id).await?;
                (Some(coupon.code), discount)
            }
            None => (None, Decimal::ZERO),
        };

        let total = order_total(subtotal, shipping, discount)?;

        let order: Order = sqlx::query_as(&format!(
            "INSERT INTO orders (customer_id, subtotal, shipping_amount, discount_amount,
                                 total_amount, coupon_code, payment_method, shipping_address,
                                 notes)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(input.customer_id)
        .bind(subtotal)
        .bind(shipping)
        .bind(discount)
        .bind(total)
        .bind(&coupon_code)
        .bind(input.payment_method)
        .bind(&input.shipping_address)
        .bind(&input.notes)
        .fetch_one(&mut *tx)
        .await?;

        let mut items = Vec::with_capacity(lines.len());
        for line in &lines {
            let item: OrderItem = sqlx::query_as(&format!(
                "INSERT INTO order_items (order_id, product_id, variant_id, name, sku, quantity,
                                          unit_price)
                 VALUES ($1, $2, $3, $4, $5, $6, $7)
                 RETURNING {ITEM_COLUMNS}"
            ))
            .bind(order.id)
            .bind(line.product_id)
            .bind(line.variant_id)
            .bind(&line.name)
            .bind(&line.sku)
            .bind(line.quantity)
            .bind(line.unit_price)
            .fetch_one(&mut *tx)
            .await?;
            items.push(item);
        }

        let customer = match order.customer_id {
            Some(customer_id) => {
                sqlx::query_as(&format!(
                    "SELECT {CUSTOMER_COLUMNS} FROM customers WHERE id = $1"
                ))
                .bind(customer_id)
                .fetch_optional(&mut *tx)
                .await?
            }
            None => None,
        };

        tx.commit().await?;
        Ok(OrderDetail {
            order,
            customer,
            items,
        })
    }

    /// Update payment method, shipping address and notes.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order doesn't exist.
    pub async fn update(&self, id: OrderId, update: &OrderUpdate) -> Result<Order, RepositoryError> {
        let (set_address, address) = match &update.shipping_address {
            Some(value) => (true, value.clone()),
            None => (false, None),
        };
        let (set_notes, notes) = match &update.notes {
            Some(value) => (true, value.clone()),
            None => (false, None),
        };

        let row = sqlx::query_as(&format!(
            "UPDATE orders SET
                 payment_method = COALESCE($2, payment_method),
                 shipping_address = CASE WHEN $3 THEN $4 ELSE shipping_address END,
                 notes = CASE WHEN $5 THEN $6 ELSE notes END,
                 updated_at = NOW()
             WHERE id = $1
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(id)
        .bind(update.payment_method)
        .bind(set_address)
        .bind(address)
        .bind(set_notes)
        .bind(notes)
        .fetch_optional(self.pool)
        .await?;
        found(row)
    }

    /// Move an order to `target`, dispatching stock when the move crosses
    /// into a shipped state.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound`, `RepositoryError::Transition` for
    /// moves the lifecycle forbids, and `RepositoryError::Stock` or
    /// `RepositoryError::Conflict` when a line cannot be dispatched.
    pub async fn change_status(
        &self,
        id: OrderId,
        target: OrderStatus,
    ) -> Result<StatusChange, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let current: Order = found(
            sqlx::query_as(&format!(
                "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 FOR UPDATE"
            ))
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?,
        )?;
        let previous_status = current.status;
        previous_status.transition_to(target)?;

        if previous_status == target {
            tx.rollback().await?;
            return Ok(StatusChange {
                order: current,
                previous_status,
                stock_changes: Vec::new(),
            });
        }

        let stock_changes = if previous_status.transition_consumes_stock(target) {
            dispatch_order(&mut tx, id).await?
        } else {
            Vec::new()
        };

        let order: Order = sqlx::query_as(&format!(
            "UPDATE orders SET status = $2, updated_at = NOW()
             WHERE id = $1
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(id)
        .bind(target)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!(
            order_id = %id,
            from = %previous_status,
            to = %target,
            dispatched_lines = stock_changes.len(),
            "Order status changed"
        );
        Ok(StatusChange {
            order,
            previous_status,
            stock_changes,
        })
    }

    /// Delete an order that never left the warehouse.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound`, or `RepositoryError::Conflict`
    /// unless the order is pending or cancelled.
    pub async fn delete(&self, id: OrderId) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let status: OrderStatus = found(
            sqlx::query_scalar("SELECT status FROM orders WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?,
        )?;
        if !matches!(status, OrderStatus::Pending | OrderStatus::Cancelled) {
            return Err(RepositoryError::Conflict(format!(
                "only pending or cancelled orders can be deleted (order is {status})"
            )));
        }
        sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        tracing::info!(order_id = %id, "Order deleted");
        Ok(())
    }
}

/// Decrement stock for every line of an order locked by the caller.
async fn dispatch_order(
    conn: &mut PgConnection,
    id: OrderId,
) -> Result<Vec<DispatchedLine>, RepositoryError> {
    // Same product/variant on several lines is taken in one step, and the
    // ordering keeps lock acquisition consistent across concurrent orders.
    let lines: Vec<(ProductId, Option<VariantId>, i64)> = sqlx::query_as(
        "SELECT product_id, variant_id, SUM(quantity)
         FROM order_items
         WHERE order_id = $1
         GROUP BY product_id, variant_id
         ORDER BY product_id, variant_id NULLS FIRST",
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;

    let mut dispatched = Vec::with_capacity(lines.len());
    for (product_id, variant_id, quantity) in lines {
        let quantity = i32::try_from(quantity).map_err(|_| StockError::Overflow)?;
        let change = stock::dispatch_line(&mut *conn, product_id, variant_id, quantity).await?;
        dispatched.push(DispatchedLine {
            product_id,
            variant_id,
            quantity,
            change,
        });
    }
    Ok(dispatched)
}

async fn load_line_source(
    conn: &mut PgConnection,
    product_id: ProductId,
    variant_id: Option<VariantId>,
) -> Result<LineSource, RepositoryError> {
    let source: Option<LineSource> = sqlx::query_as(
        "SELECT p.name AS product_name, p.sku AS product_sku, p.selling_price, p.status,
                p.category_id,
                v.product_id AS variant_product_id, v.sku AS variant_sku,
                v.price AS variant_price, v.attributes AS variant_attributes
         FROM products p
         LEFT JOIN product_variants v ON v.id = $2
         WHERE p.id = $1",
    )
    .bind(product_id)
    .bind(variant_id)
    .fetch_optional(conn)
    .await?;

    source.ok_or_else(|| RepositoryError::Conflict(format!("product {product_id} does not exist")))
}

fn price_line(
    product_id: ProductId,
    variant_id: Option<VariantId>,
    quantity: i32,
    override_price: Option<Decimal>,
    source: LineSource,
) -> Result<PricedLine, RepositoryError> {
    if source.status == ProductStatus::Archived {
        return Err(RepositoryError::Conflict(format!(
            "product {} is archived",
            source.product_sku
        )));
    }

    let (name, sku, catalog_price) = match variant_id {
        None => (source.product_name, source.product_sku, source.selling_price),
        Some(variant_id) => {
            if source.variant_product_id != Some(product_id) {
                return Err(RepositoryError::Conflict(format!(
                    "variant {variant_id} does not belong to product {product_id}"
                )));
            }
            let label = source
                .variant_attributes
                .as_ref()
                .map(variant_label)
                .unwrap_or_default();
            let name = if label.is_empty() {
                source.product_name
            } else {
                format!("{} ({label})", source.product_name)
            };
            (
                name,
                source.variant_sku.unwrap_or(source.product_sku),
                source.variant_price.unwrap_or(source.selling_price),
            )
        }
    };

    Ok(PricedLine {
        product_id,
        variant_id,
        name,
        sku,
        quantity,
        unit_price: round_money(override_price.unwrap_or(catalog_price)),
    })
}

/// Attribute values of a variant joined for display, e.g. `M, Blue`.
fn variant_label(attributes: &serde_json::Value) -> String {
    let Some(map) = attributes.as_object() else {
        return String::new();
    };
    map.values()
        .map(|value| match value {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

/// `subtotal + shipping - discount`, never below zero.
fn order_total(
    subtotal: Decimal,
    shipping: Decimal,
    discount: Decimal,
) -> Result<Decimal, RepositoryError> {
    let total = subtotal
        .checked_add(shipping)
        .map(|gross| round_money((gross - discount).max(Decimal::ZERO)))
        .filter(|total| fits_amount(*total));
    total.ok_or_else(|| RepositoryError::InvalidValue("order total is too large".to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use emporium_core::MAX_AMOUNT;
    use serde_json::json;

    use super::*;

    fn source() -> LineSource {
        LineSource {
            product_name: "Linen Shirt".to_string(),
            product_sku: "SHIRT".to_string(),
            selling_price: Decimal::new(4000, 2),
            status: ProductStatus::Active,
            category_id: None,
            variant_product_id: Some(ProductId::new(5)),
            variant_sku: Some("SHIRT-M-BLU".to_string()),
            variant_price: Some(Decimal::new(4250, 2)),
            variant_attributes: Some(json!({"size": "M", "color": "Blue"})),
        }
    }

    #[test]
    fn test_variant_label() {
        assert_eq!(variant_label(&json!({"size": "M", "color": "Blue"})), "Blue, M");
        assert_eq!(variant_label(&json!({"pack": 6})), "6");
        assert_eq!(variant_label(&json!([])), "");
    }

    #[test]
    fn test_price_line_uses_variant_snapshot() {
        let line = price_line(ProductId::new(5), Some(VariantId::new(9)), 2, None, source());
        let Ok(line) = line else {
            panic!("line should price");
        };
        assert_eq!(line.name, "Linen Shirt (Blue, M)");
        assert_eq!(line.sku, "SHIRT-M-BLU");
        assert_eq!(line.unit_price, Decimal::new(4250, 2));
    }

    #[test]
    fn test_price_line_override_and_product_level() {
        let Ok(line) = price_line(
            ProductId::new(5),
            None,
            1,
            Some(Decimal::new(3999, 2)),
            source(),
        ) else {
            panic!("line should price");
        };
        assert_eq!(line.name, "Linen Shirt");
        assert_eq!(line.sku, "SHIRT");
        assert_eq!(line.unit_price, Decimal::new(3999, 2));
    }

    #[test]
    fn test_price_line_rejects_foreign_variant_and_archived() {
        assert!(matches!(
            price_line(ProductId::new(6), Some(VariantId::new(9)), 1, None, source()),
            Err(RepositoryError::Conflict(_))
        ));

        let archived = LineSource {
            status: ProductStatus::Archived,
            ..source()
        };
        assert!(matches!(
            price_line(ProductId::new(5), None, 1, None, archived),
            Err(RepositoryError::Conflict(_))
        ));
    }

    #[test]
    fn test_order_total_floors_at_zero() {
        assert_eq!(
            order_total(Decimal::new(100, 0), Decimal::new(10, 0), Decimal::new(25, 0)).unwrap(),
            Decimal::new(85, 0)
        );
        assert_eq!(
            order_total(Decimal::new(10, 0), Decimal::ZERO, Decimal::new(25, 0)).unwrap(),
            Decimal::ZERO
        );
    }

    #[test]
    fn test_order_total_past_column_limit_is_rejected() {
        assert!(matches!(
            order_total(MAX_AMOUNT, Decimal::ONE, Decimal::ZERO),
            Err(RepositoryError::InvalidValue(_))
        ));
        assert_eq!(
            order_total(MAX_AMOUNT, Decimal::ONE, Decimal::ONE).unwrap(),
            MAX_AMOUNT
        );
        assert!(order_total(Decimal::MAX, Decimal::MAX, Decimal::ZERO).is_err());
    }
}
