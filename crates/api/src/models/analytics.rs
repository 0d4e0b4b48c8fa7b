//! Analytics report types.
//!
//! Revenue figures exclude cancelled orders; order counts include them only
//! where a report says so.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use emporium_core::{CategoryId, OrderStatus, ProductId};

/// Headline numbers for the dashboard home page.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_revenue: Decimal,
    /// All orders, cancelled included.
    pub order_count: i64,
    pub average_order_value: Decimal,
    pub customer_count: i64,
    /// Products that are not archived.
    pub product_count: i64,
    pub low_stock_count: i64,
    pub orders_by_status: Vec<StatusCount>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct StatusCount {
    pub status: OrderStatus,
    pub count: i64,
}

/// Bucket size for the sales report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    #[default]
    Day,
    Month,
}

impl Granularity {
    /// `date_trunc` unit.
    #[must_use]
    pub const fn unit(self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Month => "month",
        }
    }

    /// `to_char` pattern for the period label.
    #[must_use]
    pub const fn label_format(self) -> &'static str {
        match self {
            Self::Day => "YYYY-MM-DD",
            Self::Month => "YYYY-MM",
        }
    }
}

/// Query of `GET /api/analytics/sales`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SalesQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    #[serde(default)]
    pub granularity: Granularity,
    pub format: Option<String>,
}

/// One period of the sales report.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SalesPoint {
    /// `YYYY-MM-DD` or `YYYY-MM`.
    pub period: String,
    pub order_count: i64,
    pub revenue: Decimal,
}

/// Sales report with the range it covers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesReport {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub granularity: &'static str,
    pub total_revenue: Decimal,
    pub total_orders: i64,
    pub points: Vec<SalesPoint>,
}

impl SalesReport {
    #[must_use]
    pub fn new(
        from: NaiveDate,
        to: NaiveDate,
        granularity: Granularity,
        points: Vec<SalesPoint>,
    ) -> Self {
        Self {
            from,
            to,
            granularity: granularity.unit(),
            total_revenue: points.iter().map(|p| p.revenue).sum(),
            total_orders: points.iter().map(|p| p.order_count).sum(),
            points,
        }
    }
}

/// A best seller.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TopProduct {
    pub product_id: ProductId,
    pub name: String,
    pub sku: String,
    pub units_sold: i64,
    pub revenue: Decimal,
}

/// Stock totals and value.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct InventoryTotals {
    pub product_count: i64,
    pub variant_count: i64,
    pub total_units: i64,
    /// Units on hand valued at cost price.
    pub stock_value: Decimal,
    /// Units on hand valued at selling price.
    pub retail_value: Decimal,
    pub low_stock_count: i64,
    pub out_of_stock_count: i64,
}

/// Stock value per category.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CategoryInventory {
    pub category_id: Option<CategoryId>,
    /// `Uncategorized` for products without a category.
    pub category_name: String,
    pub total_units: i64,
    pub stock_value: Decimal,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryReport {
    #[serde(flatten)]
    pub totals: InventoryTotals,
    pub by_category: Vec<CategoryInventory>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_granularity_parsing() {
        let query: SalesQuery = serde_json::from_str(r#"{"granularity":"month"}"#).unwrap();
        assert_eq!(query.granularity, Granularity::Month);
        assert_eq!(query.granularity.label_format(), "YYYY-MM");

        let default: SalesQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(default.granularity, Granularity::Day);
        assert!(serde_json::from_str::<SalesQuery>(r#"{"granularity":"week"}"#).is_err());
    }

    #[test]
    fn test_sales_report_totals() {
        let report = SalesReport::new(
            NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 6, 2).unwrap(),
            Granularity::Day,
            vec![
                SalesPoint {
                    period: "2025-06-01".to_string(),
                    order_count: 2,
                    revenue: Decimal::new(15000, 2),
                },
                SalesPoint {
                    period: "2025-06-02".to_string(),
                    order_count: 1,
                    revenue: Decimal::new(4999, 2),
                },
            ],
        );
        assert_eq!(report.total_orders, 3);
        assert_eq!(report.total_revenue, Decimal::new(19999, 2));
        assert_eq!(report.granularity, "day");
    }
}
