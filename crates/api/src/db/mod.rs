//! Database operations for the Emporium `PostgreSQL` store.
//!
//! # Tables
//!
//! - `products`, `product_variants` - Catalog
//! - `stock` - On-hand quantities per product or variant
//! - `categories`, `subcategories`, `category_subcategory_map` - Taxonomy
//! - `customers`, `orders`, `order_items` - Sales
//! - `coupons`, `special_offers`, `marquee_offers` - Promotions
//! - `ratings`, `bulk_orders` - Storefront submissions
//! - `staff` - Dashboard accounts
//!
//! # Migrations
//!
//! Migrations live in `crates/api/migrations/` and run via:
//! ```bash
//! cargo run -p emporium-cli -- migrate
//! ```

pub mod analytics;
pub mod bulk_orders;
pub mod categories;
pub mod coupons;
pub mod customers;
pub mod offers;
pub mod orders;
pub mod products;
pub mod ratings;
pub mod staff;
pub mod stock;

use std::time::Duration;

use emporium_core::StatusTransitionError;
use emporium_core::coupon::CouponError;
use emporium_core::stock::StockError;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use analytics::AnalyticsRepository;
pub use bulk_orders::BulkOrderRepository;
pub use categories::{CategoryRepository, SubcategoryRepository};
pub use coupons::CouponRepository;
pub use customers::CustomerRepository;
pub use offers::OfferRepository;
pub use orders::OrderRepository;
pub use products::ProductRepository;
pub use ratings::RatingRepository;
pub use staff::StaffRepository;
pub use stock::StockRepository;

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";
const CHECK_VIOLATION: &str = "23514";
const NUMERIC_OUT_OF_RANGE: &str = "22003";
const DATETIME_OUT_OF_RANGE: &str = "22008";
const INVALID_TEXT_REPRESENTATION: &str = "22P02";

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., duplicate SKU).
    #[error("{0}")]
    Conflict(String),

    /// A value the column type cannot hold, such as an amount past `NUMERIC(12,2)`.
    #[error("{0}")]
    InvalidValue(String),

    /// A stock change was refused.
    #[error(transparent)]
    Stock(#[from] StockError),

    /// An order status change was refused.
    #[error(transparent)]
    Transition(#[from] StatusTransitionError),

    /// A coupon could not be applied.
    #[error(transparent)]
    Coupon(#[from] CouponError),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        if matches!(err, sqlx::Error::RowNotFound) {
            return Self::NotFound;
        }
        let classified = err.as_database_error().and_then(|db_err| {
            Self::from_sqlstate(
                db_err.code().as_deref(),
                db_err.constraint().unwrap_or("constraint"),
            )
        });
        classified.unwrap_or(Self::Database(err))
    }
}

impl RepositoryError {
    /// Client-facing error for a Postgres SQLSTATE, `None` for server faults.
    fn from_sqlstate(code: Option<&str>, constraint: &str) -> Option<Self> {
        Some(match code? {
            UNIQUE_VIOLATION => Self::Conflict(unique_message(constraint)),
            FOREIGN_KEY_VIOLATION => Self::Conflict(format!(
                "referenced record missing or still in use ({constraint})"
            )),
            CHECK_VIOLATION => Self::Conflict(format!("value rejected by {constraint}")),
            NUMERIC_OUT_OF_RANGE => Self::InvalidValue("numeric value out of range".to_string()),
            DATETIME_OUT_OF_RANGE => Self::InvalidValue("date out of range".to_string()),
            INVALID_TEXT_REPRESENTATION => Self::InvalidValue("malformed value".to_string()),
            _ => return None,
        })
    }
}

/// Human message for a unique constraint name like `products_sku_key`.
fn unique_message(constraint: &str) -> String {
    let field = constraint
        .strip_suffix("_key")
        .and_then(|rest| rest.split_once('_'))
        .map_or(constraint, |(_, field)| field);
    format!("{} already exists", field.replace('_', " "))
}

/// Map "no row" to `NotFound` for lookups that must find something.
pub(crate) fn found<T>(row: Option<T>) -> Result<T, RepositoryError> {
    row.ok_or(RepositoryError::NotFound)
}

/// Escape `%` and `_` and wrap in `%...%` for `ILIKE` searches.
pub(crate) fn like_pattern(search: Option<&str>) -> Option<String> {
    search.map(str::trim).filter(|s| !s.is_empty()).map(|s| {
        let escaped = s
            .replace('\\', "\\\\")
            .replace('%', "\\%")
            .replace('_', "\\_");
        format!("%{escaped}%")
    })
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_message() {
        assert_eq!(unique_message("products_sku_key"), "sku already exists");
        assert_eq!(unique_message("customers_firebase_uid_key"), "firebase uid already exists");
        assert_eq!(unique_message("stock_product_variant_key"), "product variant already exists");
        assert_eq!(unique_message("weird"), "weird already exists");
    }

    #[test]
    fn test_like_pattern() {
        assert_eq!(like_pattern(None), None);
        assert_eq!(like_pattern(Some("  ")), None);
        assert_eq!(like_pattern(Some(" tee ")), Some("%tee%".to_string()));
        assert_eq!(like_pattern(Some("50%_off")), Some("%50\\%\\_off%".to_string()));
    }

    #[test]
    fn test_sqlstate_classification() {
        assert!(matches!(
            RepositoryError::from_sqlstate(Some("22003"), "constraint"),
            Some(RepositoryError::InvalidValue(_))
        ));
        assert!(matches!(
            RepositoryError::from_sqlstate(Some("22P02"), "constraint"),
            Some(RepositoryError::InvalidValue(_))
        ));
        assert!(matches!(
            RepositoryError::from_sqlstate(Some("23505"), "products_sku_key"),
            Some(RepositoryError::Conflict(msg)) if msg == "sku already exists"
        ));
        assert!(RepositoryError::from_sqlstate(Some("40001"), "constraint").is_none());
        assert!(RepositoryError::from_sqlstate(None, "constraint").is_none());
    }

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        assert!(matches!(
            RepositoryError::from(sqlx::Error::RowNotFound),
            RepositoryError::NotFound
        ));
    }
}
