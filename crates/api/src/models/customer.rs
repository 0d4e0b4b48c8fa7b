//! Customer types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use emporium_core::csv::CsvColumn;
use emporium_core::{CustomerId, Email};

use super::{blank, clean, double_option};
use crate::error::{AppError, FieldErrors};
use crate::models::order::OrderSummary;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: CustomerId,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub firebase_uid: Option<String>,
    /// Saved addresses as sent by the storefront.
    pub addresses: serde_json::Value,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// List row with order totals.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CustomerSummary {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub customer: Customer,
    pub order_count: i64,
    pub total_spent: Decimal,
    pub last_order_at: Option<DateTime<Utc>>,
}

impl CustomerSummary {
    /// Export layout.
    #[must_use]
    pub fn csv_columns() -> Vec<CsvColumn<Self>> {
        vec![
            CsvColumn::new("ID", |c: &Self| c.customer.id.as_i32().into()),
            CsvColumn::new("Name", |c: &Self| c.customer.name.as_str().into()),
            CsvColumn::new("Email", |c: &Self| c.customer.email.as_str().into()),
            CsvColumn::new("Phone", |c: &Self| c.customer.phone.clone().into()),
            CsvColumn::new("Active", |c: &Self| c.customer.is_active.into()),
            CsvColumn::new("Orders", |c: &Self| c.order_count.into()),
            CsvColumn::currency("Total Spent", |c: &Self| c.total_spent.into()),
            CsvColumn::date("Last Order", |c: &Self| c.last_order_at.into()),
            CsvColumn::date("Joined", |c: &Self| c.customer.created_at.into()),
        ]
    }
}

/// Statistics computed from a customer's orders. Cancelled orders count
/// towards `order_count` and the status breakdown, not towards spend.
#[derive(Debug, Clone, Default, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CustomerStats {
    pub order_count: i64,
    pub total_spent: Decimal,
    pub average_order_value: Decimal,
    pub pending: i64,
    pub processing: i64,
    pub dispatched: i64,
    pub shipped: i64,
    pub delivered: i64,
    pub cancelled: i64,
    pub first_order_at: Option<DateTime<Utc>>,
    pub last_order_at: Option<DateTime<Utc>>,
}

/// Customer detail view.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerDetail {
    #[serde(flatten)]
    pub customer: Customer,
    pub stats: CustomerStats,
    pub recent_orders: Vec<OrderSummary>,
}

/// Body of `POST /api/customers`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerInput {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub firebase_uid: Option<String>,
    pub addresses: Option<serde_json::Value>,
    pub is_active: Option<bool>,
}

/// Validated customer ready to insert.
#[derive(Debug, Clone)]
pub struct NewCustomer {
    pub name: String,
    pub email: Email,
    pub phone: Option<String>,
    pub firebase_uid: Option<String>,
    pub addresses: serde_json::Value,
    pub is_active: bool,
}

fn check_addresses(errors: &mut FieldErrors, addresses: Option<&serde_json::Value>) {
    errors.check(
        addresses.is_some_and(|a| !a.is_array()),
        "addresses",
        "must be a list",
    );
}

impl CustomerInput {
    /// Validate and normalize.
    ///
    /// # Errors
    ///
    /// Returns validation errors keyed by field.
    pub fn validate(&self) -> Result<NewCustomer, AppError> {
        let mut errors = FieldErrors::new();
        errors.check(blank(&self.name), "name", "is required");
        let email = Email::parse(&self.email);
        if let Err(e) = &email {
            errors.add("email", e.to_string());
        }
        check_addresses(&mut errors, self.addresses.as_ref());
        errors.finish()?;

        let email = email.map_err(|e| AppError::BadRequest(e.to_string()))?;
        Ok(NewCustomer {
            name: self.name.trim().to_string(),
            email,
            phone: clean(self.phone.as_deref()),
            firebase_uid: clean(self.firebase_uid.as_deref()),
            addresses: self
                .addresses
                .clone()
                .unwrap_or_else(|| serde_json::json!([])),
            is_active: self.is_active.unwrap_or(true),
        })
    }
}

/// Body of `PUT /api/customers/{id}`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub phone: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub firebase_uid: Option<Option<String>>,
    pub addresses: Option<serde_json::Value>,
    pub is_active: Option<bool>,
}

impl CustomerUpdate {
    /// Validate the fields that were sent. Returns the normalized email.
    ///
    /// # Errors
    ///
    /// Returns validation errors keyed by field.
    pub fn validate(&self) -> Result<Option<Email>, AppError> {
        let mut errors = FieldErrors::new();
        errors.check(
            self.name.as_deref().is_some_and(blank),
            "name",
            "must not be blank",
        );
        let email = match self.email.as_deref().map(Email::parse).transpose() {
            Ok(email) => email,
            Err(e) => {
                errors.add("email", e.to_string());
                None
            }
        };
        check_addresses(&mut errors, self.addresses.as_ref());
        errors.finish()?;
        Ok(email)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_customer_input_normalizes() {
        let input: CustomerInput = serde_json::from_str(
            r#"{"name":" Ravi ","email":"Ravi@Mail.Test","phone":" ","firebaseUid":"fb-1"}"#,
        )
        .unwrap();
        let new = input.validate().unwrap();
        assert_eq!(new.name, "Ravi");
        assert_eq!(new.email.as_str(), "ravi@mail.test");
        assert_eq!(new.phone, None);
        assert_eq!(new.firebase_uid.as_deref(), Some("fb-1"));
        assert_eq!(new.addresses, serde_json::json!([]));
    }

    #[test]
    fn test_customer_input_rejects_bad_fields() {
        let input: CustomerInput =
            serde_json::from_str(r#"{"name":"","email":"x","addresses":{}}"#).unwrap();
        let AppError::Validation(fields) = input.validate().unwrap_err() else {
            panic!("expected validation error");
        };
        assert_eq!(fields.to_string(), "addresses, email, name");
    }
}
