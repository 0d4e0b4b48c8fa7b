//! Stock record types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use emporium_core::csv::{CsvColumn, CsvError, CsvRecord};
use emporium_core::stock::StockLevel;
use emporium_core::{ProductId, StockId, VariantId};

use super::double_option;
use crate::error::{AppError, FieldErrors};

/// A stock row: on-hand quantity for a product or one of its variants.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Stock {
    pub id: StockId,
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    pub quantity: i32,
    pub min_stock: i32,
    /// Audit trail, one change per line.
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Stock row joined with what it counts.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct StockItem {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub stock: Stock,
    pub product_name: String,
    pub product_sku: String,
    pub variant_sku: Option<String>,
    pub variant_attributes: Option<serde_json::Value>,
}

impl StockItem {
    /// SKU of the variant when present, otherwise of the product.
    #[must_use]
    pub fn sku(&self) -> &str {
        self.variant_sku.as_deref().unwrap_or(&self.product_sku)
    }

    #[must_use]
    pub const fn level(&self) -> StockLevel {
        StockLevel::classify(self.stock.quantity, self.stock.min_stock)
    }

    /// Export layout; `SKU`, `Quantity`, `Min Stock` and `Notes` read back
    /// through [`StockImportRow::from_record`].
    #[must_use]
    pub fn csv_columns() -> Vec<CsvColumn<Self>> {
        vec![
            CsvColumn::new("ID", |s: &Self| s.stock.id.as_i32().into()),
            CsvColumn::new("SKU", |s: &Self| s.sku().into()),
            CsvColumn::new("Product", |s: &Self| s.product_name.as_str().into()),
            CsvColumn::new("Variant", |s: &Self| {
                s.variant_attributes
                    .as_ref()
                    .and_then(serde_json::Value::as_object)
                    .map(|attrs| {
                        attrs
                            .values()
                            .map(|v| v.as_str().map_or_else(|| v.to_string(), String::from))
                            .collect::<Vec<_>>()
                            .join(" / ")
                    })
                    .into()
            }),
            CsvColumn::new("Quantity", |s: &Self| s.stock.quantity.into()),
            CsvColumn::new("Min Stock", |s: &Self| s.stock.min_stock.into()),
            CsvColumn::new("Level", |s: &Self| match s.level() {
                StockLevel::OutOfStock => "out of stock".into(),
                StockLevel::Low => "low".into(),
                StockLevel::InStock => "in stock".into(),
            }),
            CsvColumn::new("Notes", |s: &Self| s.stock.notes.clone().into()),
            CsvColumn::datetime("Updated At", |s: &Self| s.stock.updated_at.into()),
        ]
    }
}

/// Low-stock overview.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LowStockSummary {
    pub low_stock_count: i64,
    pub out_of_stock_count: i64,
    pub items: Vec<StockItem>,
}

/// Body of `POST /api/stock`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockInput {
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    pub quantity: i32,
    pub min_stock: Option<i32>,
    pub notes: Option<String>,
}

impl StockInput {
    /// Validate quantities.
    ///
    /// # Errors
    ///
    /// Returns validation errors keyed by field.
    pub fn validate(&self) -> Result<(), AppError> {
        let mut errors = FieldErrors::new();
        errors.check(self.quantity < 0, "quantity", "must not be negative");
        errors.check(
            self.min_stock.is_some_and(|m| m < 0),
            "minStock",
            "must not be negative",
        );
        errors.finish()
    }
}

/// Body of `PUT /api/stock/{id}`.
///
/// A changed quantity is logged to the notes like any other adjustment;
/// `notes` replaces the whole audit trail and is meant for corrections.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockUpdate {
    pub quantity: Option<i32>,
    pub min_stock: Option<i32>,
    #[serde(default, deserialize_with = "double_option")]
    pub notes: Option<Option<String>>,
    /// Reason recorded with a quantity change.
    pub reason: Option<String>,
}

impl StockUpdate {
    /// Validate quantities.
    ///
    /// # Errors
    ///
    /// Returns validation errors keyed by field.
    pub fn validate(&self) -> Result<(), AppError> {
        let mut errors = FieldErrors::new();
        errors.check(
            self.quantity.is_some_and(|q| q < 0),
            "quantity",
            "must not be negative",
        );
        errors.check(
            self.min_stock.is_some_and(|m| m < 0),
            "minStock",
            "must not be negative",
        );
        errors.finish()
    }
}

/// Body of `POST /api/stock/{id}/adjust`.
#[derive(Debug, Clone, Deserialize)]
pub struct StockAdjustment {
    /// Positive to receive, negative to remove.
    pub delta: i32,
    #[serde(default)]
    pub reason: String,
}

/// One parsed row of a stock CSV import.
#[derive(Debug, Clone)]
pub struct StockImportRow {
    /// Product or variant SKU.
    pub sku: String,
    pub quantity: i32,
    pub min_stock: Option<i32>,
    pub notes: Option<String>,
}

impl StockImportRow {
    /// Columns a stock import must carry.
    pub const REQUIRED_COLUMNS: [&'static str; 2] = ["SKU", "Quantity"];

    /// Read one CSV record.
    ///
    /// # Errors
    ///
    /// Returns the first missing or malformed field; negative quantities are
    /// malformed.
    pub fn from_record(record: &CsvRecord<'_>) -> Result<Self, CsvError> {
        let sku = record.require("SKU")?.to_string();
        let quantity: i32 = record.parse_required("Quantity")?;
        let min_stock: Option<i32> = record.parse_opt("Min Stock")?;
        for (column, value) in [("Quantity", Some(quantity)), ("Min Stock", min_stock)] {
            if let Some(value) = value.filter(|v| *v < 0) {
                return Err(CsvError::InvalidValue {
                    column: column.to_string(),
                    value: value.to_string(),
                });
            }
        }
        Ok(Self {
            sku,
            quantity,
            min_stock,
            notes: record.get("Notes").map(String::from),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use emporium_core::csv::CsvTable;

    use super::*;

    #[test]
    fn test_stock_input_validation() {
        let input: StockInput =
            serde_json::from_str(r#"{"productId":1,"quantity":-1,"minStock":-2}"#).unwrap();
        let AppError::Validation(fields) = input.validate().unwrap_err() else {
            panic!("expected validation error");
        };
        assert_eq!(fields.to_string(), "minStock, quantity");
    }

    #[test]
    fn test_adjustment_reason_optional() {
        let adj: StockAdjustment = serde_json::from_str(r#"{"delta":-3}"#).unwrap();
        assert_eq!(adj.delta, -3);
        assert!(adj.reason.is_empty());
    }

    #[test]
    fn test_import_row_from_record() {
        let table = CsvTable::parse(
            "sku,quantity,min stock\nTEE-S,12,3\nTEE-M,-4,\nTEE-L,lots,\n",
        )
        .unwrap();
        table.require_columns(&StockImportRow::REQUIRED_COLUMNS).unwrap();
        let rows: Vec<_> = table
            .records()
            .map(|(_, r)| StockImportRow::from_record(&r))
            .collect();

        let first = rows[0].as_ref().unwrap();
        assert_eq!((first.sku.as_str(), first.quantity, first.min_stock), ("TEE-S", 12, Some(3)));
        assert!(rows[1].is_err());
        assert!(rows[2].is_err());
    }
}
