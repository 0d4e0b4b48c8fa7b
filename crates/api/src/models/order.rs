//! Order types.
//!
//! Orders snapshot the product name, SKU and price of every line at creation
//! time, so later catalog edits don't rewrite history.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use emporium_core::csv::CsvColumn;
use emporium_core::stock::StockChange;
use emporium_core::{
    CustomerId, OrderId, OrderItemId, OrderStatus, PaymentMethod, ProductId, VariantId,
    fits_amount,
};

use super::customer::Customer;
use super::{check_amount, clean, double_option};
use crate::error::{AppError, FieldErrors};

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub order_number: String,
    pub customer_id: Option<CustomerId>,
    pub subtotal: Decimal,
    pub shipping_amount: Decimal,
    pub discount_amount: Decimal,
    pub total_amount: Decimal,
    pub coupon_code: Option<String>,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub shipping_address: Option<serde_json::Value>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// List row with customer and line count.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummary {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub order: Order,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub item_count: i64,
}

impl OrderSummary {
    /// Export layout.
    #[must_use]
    pub fn csv_columns() -> Vec<CsvColumn<Self>> {
        vec![
            CsvColumn::new("Order Number", |o: &Self| o.order.order_number.as_str().into()),
            CsvColumn::date("Date", |o: &Self| o.order.created_at.into()),
            CsvColumn::new("Customer", |o: &Self| o.customer_name.clone().into()),
            CsvColumn::new("Email", |o: &Self| o.customer_email.clone().into()),
            CsvColumn::new("Status", |o: &Self| o.order.status.as_str().into()),
            CsvColumn::new("Payment Method", |o: &Self| o.order.payment_method.as_str().into()),
            CsvColumn::new("Items", |o: &Self| o.item_count.into()),
            CsvColumn::currency("Subtotal", |o: &Self| o.order.subtotal.into()),
            CsvColumn::currency("Shipping", |o: &Self| o.order.shipping_amount.into()),
            CsvColumn::currency("Discount", |o: &Self| o.order.discount_amount.into()),
            CsvColumn::currency("Total", |o: &Self| o.order.total_amount.into()),
            CsvColumn::new("Coupon", |o: &Self| o.order.coupon_code.clone().into()),
            CsvColumn::new("Notes", |o: &Self| o.order.notes.clone().into()),
        ]
    }
}

/// A line item.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    /// Product name when ordered, with variant attributes appended.
    pub name: String,
    pub sku: String,
    pub quantity: i32,
    pub unit_price: Decimal,
}

/// Order detail view.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub customer: Option<Customer>,
    pub items: Vec<OrderItem>,
}

/// Result of a status change. `stock_changes` is empty unless the move
/// dispatched the order.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChange {
    #[serde(flatten)]
    pub order: Order,
    pub previous_status: OrderStatus,
    pub stock_changes: Vec<DispatchedLine>,
}

/// Stock taken for one product or variant on dispatch.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchedLine {
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    pub quantity: i32,
    #[serde(flatten)]
    pub change: StockChange,
}

/// One line of `POST /api/orders`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemInput {
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    pub quantity: i32,
    /// Overrides the catalog price.
    pub unit_price: Option<Decimal>,
}

/// Body of `POST /api/orders`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderInput {
    pub customer_id: Option<CustomerId>,
    pub items: Vec<OrderItemInput>,
    pub shipping_amount: Option<Decimal>,
    pub coupon_code: Option<String>,
    #[serde(default)]
    pub payment_method: PaymentMethod,
    pub shipping_address: Option<serde_json::Value>,
    pub notes: Option<String>,
}

impl OrderInput {
    /// Check quantities and amounts, and normalize text fields.
    ///
    /// # Errors
    ///
    /// Returns validation errors keyed by field.
    pub fn validate(&mut self) -> Result<(), AppError> {
        let mut errors = FieldErrors::new();
        errors.check(self.items.is_empty(), "items", "must contain at least one item");
        errors.check(
            self.items.iter().any(|i| i.quantity <= 0),
            "items",
            "quantities must be positive",
        );
        errors.check(
            self.items
                .iter()
                .any(|i| i.unit_price.is_some_and(|p| p.is_sign_negative() || !fits_amount(p))),
            "items",
            "prices must be between 0 and 9999999999.99",
        );
        check_amount(&mut errors, "shippingAmount", self.shipping_amount);
        errors.check(
            self.shipping_address
                .as_ref()
                .is_some_and(|a| !a.is_object()),
            "shippingAddress",
            "must be an object",
        );
        errors.finish()?;

        self.coupon_code = clean(self.coupon_code.as_deref());
        self.notes = clean(self.notes.as_deref());
        Ok(())
    }
}

/// Body of `PUT /api/orders/{id}`. Status has its own endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderUpdate {
    pub payment_method: Option<PaymentMethod>,
    #[serde(default, deserialize_with = "double_option")]
    pub shipping_address: Option<Option<serde_json::Value>>,
    #[serde(default, deserialize_with = "double_option")]
    pub notes: Option<Option<String>>,
}

impl OrderUpdate {
    /// # Errors
    ///
    /// Returns validation errors keyed by field.
    pub fn validate(&mut self) -> Result<(), AppError> {
        let mut errors = FieldErrors::new();
        errors.check(
            matches!(&self.shipping_address, Some(Some(a)) if !a.is_object()),
            "shippingAddress",
            "must be an object",
        );
        errors.finish()?;
        if let Some(notes) = &mut self.notes {
            *notes = clean(notes.as_deref());
        }
        Ok(())
    }
}

/// Body of `PUT /api/orders/{id}/status`.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusInput {
    pub status: String,
}

impl StatusInput {
    /// Parse the requested status.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` naming the accepted values.
    pub fn parse(&self) -> Result<OrderStatus, AppError> {
        self.status
            .parse()
            .map_err(|e: emporium_core::ParseEnumError| AppError::BadRequest(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_status_input_accepts_only_known_statuses() {
        let ok = StatusInput {
            status: " Dispatched ".to_string(),
        };
        assert_eq!(ok.parse().unwrap(), OrderStatus::Dispatched);

        for bad in ["", "refunded", "canceled", "pending;drop"] {
            let input = StatusInput {
                status: bad.to_string(),
            };
            assert!(
                matches!(input.parse(), Err(AppError::BadRequest(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_order_input_validation() {
        let mut input: OrderInput = serde_json::from_str(
            r#"{"items":[{"productId":1,"quantity":0}],"shippingAmount":"-1","shippingAddress":[]}"#,
        )
        .unwrap();
        let AppError::Validation(fields) = input.validate().unwrap_err() else {
            panic!("expected validation error");
        };
        assert_eq!(fields.to_string(), "items, shippingAddress, shippingAmount");
    }

    #[test]
    fn test_order_input_rejects_amounts_past_column_limit() {
        let mut input: OrderInput = serde_json::from_str(
            r#"{"items":[{"productId":1,"quantity":2,"unitPrice":"79228162514264337593543950335"}],
                "shippingAmount":"10000000000"}"#,
        )
        .unwrap();
        let AppError::Validation(fields) = input.validate().unwrap_err() else {
            panic!("expected validation error");
        };
        assert_eq!(fields.to_string(), "items, shippingAmount");
    }

    #[test]
    fn test_order_input_defaults() {
        let mut input: OrderInput = serde_json::from_str(
            r#"{"items":[{"productId":3,"variantId":7,"quantity":2}],"couponCode":"  ","notes":" gift "}"#,
        )
        .unwrap();
        input.validate().unwrap();
        assert_eq!(input.payment_method, PaymentMethod::Cod);
        assert_eq!(input.coupon_code, None);
        assert_eq!(input.notes.as_deref(), Some("gift"));
    }

    #[test]
    fn test_export_row_quotes_free_text() {
        let created_at = DateTime::parse_from_rfc3339("2025-06-01T10:30:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let summary = OrderSummary {
            order: Order {
                id: OrderId::new(9),
                order_number: "ORD-20250601-0009".to_string(),
                customer_id: Some(CustomerId::new(4)),
                subtotal: Decimal::new(1000, 1),
                shipping_amount: Decimal::ZERO,
                discount_amount: Decimal::new(10, 0),
                total_amount: Decimal::new(90, 0),
                coupon_code: Some("SAVE10".to_string()),
                status: OrderStatus::Pending,
                payment_method: PaymentMethod::BankTransfer,
                shipping_address: None,
                notes: Some("leave at gate, \"blue\" door".to_string()),
                created_at,
                updated_at: created_at,
            },
            customer_name: Some("Asha".to_string()),
            customer_email: None,
            item_count: 2,
        };
        let csv = emporium_core::csv::to_csv(&[summary], &OrderSummary::csv_columns());
        let row = csv.lines().nth(1).unwrap();
        assert_eq!(
            row,
            "ORD-20250601-0009,2025-06-01,Asha,,pending,bank_transfer,2,100.00,0.00,10.00,90.00,\
             SAVE10,\"leave at gate, \"\"blue\"\" door\""
        );
    }
}
