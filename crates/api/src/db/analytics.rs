//! Read-only reporting queries.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::PgPool;

use super::RepositoryError;
use crate::models::analytics::{
    CategoryInventory, DashboardStats, Granularity, InventoryReport, InventoryTotals, SalesPoint,
    SalesReport, StatusCount, TopProduct,
};

/// Repository for analytics reports.
pub struct AnalyticsRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AnalyticsRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Store-wide headline numbers.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn dashboard(&self) -> Result<DashboardStats, RepositoryError> {
        let (total_revenue, order_count, average_order_value): (Decimal, i64, Decimal) =
            sqlx::query_as(
                "SELECT COALESCE(SUM(total_amount) FILTER (WHERE status <> 'cancelled'), 0),
                        COUNT(*),
                        COALESCE(ROUND(AVG(total_amount) FILTER (WHERE status <> 'cancelled'), 2), 0)
                 FROM orders",
            )
            .fetch_one(self.pool)
            .await?;

        let (customer_count, product_count, low_stock_count): (i64, i64, i64) = sqlx::query_as(
            "SELECT (SELECT COUNT(*) FROM customers),
                    (SELECT COUNT(*) FROM products WHERE status <> 'archived'),
                    (SELECT COUNT(*) FROM stock WHERE quantity <= min_stock)",
        )
        .fetch_one(self.pool)
        .await?;

        let orders_by_status: Vec<StatusCount> = sqlx::query_as(
            "SELECT status, COUNT(*) AS count FROM orders GROUP BY status ORDER BY status",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(DashboardStats {
            total_revenue,
            order_count,
            average_order_value,
            customer_count,
            product_count,
            low_stock_count,
            orders_by_status,
        })
    }

    /// Revenue and order count per day or month, both ends inclusive.
    /// Periods without orders are omitted.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn sales(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        granularity: Granularity,
    ) -> Result<SalesReport, RepositoryError> {
        let points: Vec<SalesPoint> = sqlx::query_as(
            "SELECT to_char(date_trunc($1, created_at), $2) AS period,
                    COUNT(*) AS order_count,
                    COALESCE(SUM(total_amount), 0) AS revenue
             FROM orders
             WHERE status <> 'cancelled'
               AND created_at >= $3::date
               AND created_at < $4::date + 1
             GROUP BY 1
             ORDER BY 1",
        )
        .bind(granularity.unit())
        .bind(granularity.label_format())
        .bind(from)
        .bind(to)
        .fetch_all(self.pool)
        .await?;

        Ok(SalesReport::new(from, to, granularity, points))
    }

    /// Best sellers by units, then revenue.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn top_products(&self, limit: i64) -> Result<Vec<TopProduct>, RepositoryError> {
        let rows = sqlx::query_as(
            "SELECT i.product_id, p.name, p.sku,
                    SUM(i.quantity)::BIGINT AS units_sold,
                    SUM(i.unit_price * i.quantity) AS revenue
             FROM order_items i
             JOIN orders o ON o.id = i.order_id
             JOIN products p ON p.id = i.product_id
             WHERE o.status <> 'cancelled'
             GROUP BY i.product_id, p.name, p.sku
             ORDER BY units_sold DESC, revenue DESC, i.product_id
             LIMIT $1",
        )
        .bind(limit)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// Units on hand and their value, in total and per category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn inventory(&self) -> Result<InventoryReport, RepositoryError> {
        let totals: InventoryTotals = sqlx::query_as(
            "SELECT (SELECT COUNT(*) FROM products WHERE status <> 'archived') AS product_count,
                    (SELECT COUNT(*) FROM product_variants) AS variant_count,
                    COALESCE(SUM(s.quantity), 0)::BIGINT AS total_units,
                    COALESCE(SUM(s.quantity * p.cost_price), 0) AS stock_value,
                    COALESCE(SUM(s.quantity * COALESCE(v.price, p.selling_price)), 0)
                        AS retail_value,
                    COUNT(*) FILTER (WHERE s.quantity <= s.min_stock) AS low_stock_count,
                    COUNT(*) FILTER (WHERE s.quantity = 0) AS out_of_stock_count
             FROM stock s
             JOIN products p ON p.id = s.product_id
             LEFT JOIN product_variants v ON v.id = s.variant_id",
        )
        .fetch_one(self.pool)
        .await?;

        let by_category: Vec<CategoryInventory> = sqlx::query_as(
            "SELECT c.id AS category_id,
                    COALESCE(c.name, 'Uncategorized') AS category_name,
                    COALESCE(SUM(s.quantity), 0)::BIGINT AS total_units,
                    COALESCE(SUM(s.quantity * p.cost_price), 0) AS stock_value
             FROM stock s
             JOIN products p ON p.id = s.product_id
             LEFT JOIN categories c ON c.id = p.category_id
             GROUP BY c.id, c.name
             ORDER BY stock_value DESC, category_name",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(InventoryReport {
            totals,
            by_category,
        })
    }
}
