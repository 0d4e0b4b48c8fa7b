//! Reporting endpoints for the dashboard.
//!
//! Each report is JSON by default and a CSV download with `?format=csv`.

use axum::{
    Json,
    extract::State,
    response::{IntoResponse, Response},
};
use chrono::{Days, NaiveDate, Utc};
use serde::Deserialize;
use tracing::instrument;

use emporium_core::csv::CsvColumn;

use super::export::csv_download;
use crate::db::AnalyticsRepository;
use crate::error::AppError;
use crate::extract::QueryParams;
use crate::middleware::RequireStaff;
use crate::models::analytics::{
    CategoryInventory, DashboardStats, SalesPoint, SalesQuery, TopProduct,
};
use crate::state::AppState;

/// Days covered by the sales report when no `from` is given.
const DEFAULT_SALES_DAYS: u64 = 30;
const DEFAULT_TOP_PRODUCTS: i64 = 10;
const MAX_TOP_PRODUCTS: i64 = 100;

#[derive(Debug, Default, Deserialize)]
pub struct ReportQuery {
    pub format: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TopProductsQuery {
    pub limit: Option<i64>,
    pub format: Option<String>,
}

/// `true` for `csv`, `false` for `json` or nothing.
fn wants_csv(format: Option<&str>) -> Result<bool, AppError> {
    match format.map(|f| f.trim().to_ascii_lowercase()).as_deref() {
        None | Some("" | "json") => Ok(false),
        Some("csv") => Ok(true),
        Some(other) => Err(AppError::BadRequest(format!(
            "Unsupported format '{other}', expected csv or json"
        ))),
    }
}

/// Resolve the sales range: `to` defaults to today, `from` to the thirty
/// days ending at `to`.
fn sales_range(
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    today: NaiveDate,
) -> Result<(NaiveDate, NaiveDate), AppError> {
    let to = to.unwrap_or(today);
    let from = match from {
        Some(from) => from,
        None => to
            .checked_sub_days(Days::new(DEFAULT_SALES_DAYS - 1))
            .ok_or_else(|| AppError::BadRequest("'to' is out of range".to_string()))?,
    };
    if from > to {
        return Err(AppError::BadRequest(
            "'from' must not be after 'to'".to_string(),
        ));
    }
    Ok((from, to))
}

/// One line of the dashboard CSV.
struct Metric {
    name: String,
    value: String,
}

fn dashboard_metrics(stats: &DashboardStats) -> Vec<Metric> {
    let mut rows: Vec<Metric> = [
        ("Total Revenue", stats.total_revenue.to_string()),
        ("Orders", stats.order_count.to_string()),
        ("Average Order Value", stats.average_order_value.to_string()),
        ("Customers", stats.customer_count.to_string()),
        ("Products", stats.product_count.to_string()),
        ("Low Stock Items", stats.low_stock_count.to_string()),
    ]
    .into_iter()
    .map(|(name, value)| Metric {
        name: name.to_string(),
        value,
    })
    .collect();

    rows.extend(stats.orders_by_status.iter().map(|s| Metric {
        name: format!("Orders: {}", s.status),
        value: s.count.to_string(),
    }));
    rows
}

fn metric_columns() -> Vec<CsvColumn<Metric>> {
    vec![
        CsvColumn::new("Metric", |m: &Metric| m.name.as_str().into()),
        CsvColumn::new("Value", |m: &Metric| m.value.as_str().into()),
    ]
}

fn sales_columns() -> Vec<CsvColumn<SalesPoint>> {
    vec![
        CsvColumn::new("Period", |p: &SalesPoint| p.period.as_str().into()),
        CsvColumn::new("Orders", |p: &SalesPoint| p.order_count.into()),
        CsvColumn::currency("Revenue", |p: &SalesPoint| p.revenue.into()),
    ]
}

fn top_product_columns() -> Vec<CsvColumn<TopProduct>> {
    vec![
        CsvColumn::new("Product ID", |p: &TopProduct| p.product_id.as_i32().into()),
        CsvColumn::new("SKU", |p: &TopProduct| p.sku.as_str().into()),
        CsvColumn::new("Name", |p: &TopProduct| p.name.as_str().into()),
        CsvColumn::new("Units Sold", |p: &TopProduct| p.units_sold.into()),
        CsvColumn::currency("Revenue", |p: &TopProduct| p.revenue.into()),
    ]
}

fn inventory_columns() -> Vec<CsvColumn<CategoryInventory>> {
    vec![
        CsvColumn::new("Category", |c: &CategoryInventory| {
            c.category_name.as_str().into()
        }),
        CsvColumn::new("Units", |c: &CategoryInventory| c.total_units.into()),
        CsvColumn::currency("Stock Value", |c: &CategoryInventory| {
            c.stock_value.into()
        }),
    ]
}

#[instrument(skip(state, _staff))]
pub async fn dashboard(
    State(state): State<AppState>,
    RequireStaff(_staff): RequireStaff,
    QueryParams(query): QueryParams<ReportQuery>,
) -> Result<Response, AppError> {
    let csv = wants_csv(query.format.as_deref())?;
    let stats = AnalyticsRepository::new(state.pool()).dashboard().await?;
    if csv {
        return Ok(csv_download(
            "dashboard",
            &dashboard_metrics(&stats),
            &metric_columns(),
        ));
    }
    Ok(Json(stats).into_response())
}

#[instrument(skip(state, _staff))]
pub async fn sales(
    State(state): State<AppState>,
    RequireStaff(_staff): RequireStaff,
    QueryParams(query): QueryParams<SalesQuery>,
) -> Result<Response, AppError> {
    let csv = wants_csv(query.format.as_deref())?;
    let (from, to) = sales_range(query.from, query.to, Utc::now().date_naive())?;
    let report = AnalyticsRepository::new(state.pool())
        .sales(from, to, query.granularity)
        .await?;
    if csv {
        return Ok(csv_download("sales", &report.points, &sales_columns()));
    }
    Ok(Json(report).into_response())
}

#[instrument(skip(state, _staff))]
pub async fn top_products(
    State(state): State<AppState>,
    RequireStaff(_staff): RequireStaff,
    QueryParams(query): QueryParams<TopProductsQuery>,
) -> Result<Response, AppError> {
    let csv = wants_csv(query.format.as_deref())?;
    let limit = query
        .limit
        .unwrap_or(DEFAULT_TOP_PRODUCTS)
        .clamp(1, MAX_TOP_PRODUCTS);
    let rows = AnalyticsRepository::new(state.pool())
        .top_products(limit)
        .await?;
    if csv {
        return Ok(csv_download("top-products", &rows, &top_product_columns()));
    }
    Ok(Json(rows).into_response())
}

#[instrument(skip(state, _staff))]
pub async fn inventory(
    State(state): State<AppState>,
    RequireStaff(_staff): RequireStaff,
    QueryParams(query): QueryParams<ReportQuery>,
) -> Result<Response, AppError> {
    let csv = wants_csv(query.format.as_deref())?;
    let report = AnalyticsRepository::new(state.pool()).inventory().await?;
    if csv {
        return Ok(csv_download(
            "inventory",
            &report.by_category,
            &inventory_columns(),
        ));
    }
    Ok(Json(report).into_response())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use emporium_core::OrderStatus;
    use emporium_core::csv::to_csv;
    use rust_decimal::Decimal;

    use super::*;
    use crate::models::analytics::StatusCount;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_wants_csv() {
        assert!(!wants_csv(None).unwrap());
        assert!(!wants_csv(Some("json")).unwrap());
        assert!(wants_csv(Some("CSV")).unwrap());
        assert!(matches!(wants_csv(Some("xlsx")), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_sales_range_defaults_to_thirty_days() {
        let today = date(2025, 6, 30);
        assert_eq!(
            sales_range(None, None, today).unwrap(),
            (date(2025, 6, 1), today)
        );
        assert_eq!(
            sales_range(Some(date(2025, 6, 10)), Some(date(2025, 6, 10)), today).unwrap(),
            (date(2025, 6, 10), date(2025, 6, 10))
        );
        assert!(sales_range(Some(date(2025, 7, 1)), Some(date(2025, 6, 1)), today).is_err());
    }

    #[test]
    fn test_sales_range_near_min_date_is_bad_request() {
        let query: SalesQuery =
            serde_json::from_value(serde_json::json!({ "to": NaiveDate::MIN })).unwrap();
        assert_eq!(query.to, Some(NaiveDate::MIN));
        let today = date(2025, 6, 30);
        assert!(matches!(
            sales_range(query.from, query.to, today),
            Err(AppError::BadRequest(_))
        ));
        assert_eq!(
            sales_range(Some(NaiveDate::MIN), Some(NaiveDate::MIN), today).unwrap(),
            (NaiveDate::MIN, NaiveDate::MIN)
        );
    }

    #[test]
    fn test_dashboard_csv() {
        let stats = DashboardStats {
            total_revenue: Decimal::new(125_050, 2),
            order_count: 4,
            average_order_value: Decimal::new(31_263, 2),
            customer_count: 3,
            product_count: 12,
            low_stock_count: 2,
            orders_by_status: vec![StatusCount {
                status: OrderStatus::Pending,
                count: 1,
            }],
        };
        let csv = to_csv(&dashboard_metrics(&stats), &metric_columns());
        let lines: Vec<&str> = csv.split("\r\n").collect();
        assert_eq!(lines.first().copied(), Some("Metric,Value"));
        assert_eq!(lines.get(1).copied(), Some("Total Revenue,1250.50"));
        assert!(lines.contains(&"Orders: pending,1"));
    }
}
