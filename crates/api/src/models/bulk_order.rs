//! Bulk order inquiry types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use emporium_core::{BulkOrderId, BulkOrderStatus, Email};

use super::{blank, clean, double_option};
use crate::error::{AppError, FieldErrors};

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct BulkOrder {
    pub id: BulkOrderId,
    pub contact_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub product_details: String,
    pub quantity: i32,
    pub status: BulkOrderStatus,
    /// Staff notes, never shown to the buyer.
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Body of the public `POST /api/bulk-orders`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkOrderInput {
    pub contact_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub product_details: String,
    pub quantity: i32,
}

/// Validated inquiry.
#[derive(Debug, Clone)]
pub struct NewBulkOrder {
    pub contact_name: String,
    pub email: Email,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub product_details: String,
    pub quantity: i32,
}

impl BulkOrderInput {
    /// # Errors
    ///
    /// Returns validation errors keyed by field.
    pub fn validate(&self) -> Result<NewBulkOrder, AppError> {
        let mut errors = FieldErrors::new();
        errors.check(blank(&self.contact_name), "contactName", "is required");
        errors.check(blank(&self.product_details), "productDetails", "is required");
        errors.check(self.quantity <= 0, "quantity", "must be positive");
        let email = Email::parse(&self.email);
        if let Err(e) = &email {
            errors.add("email", e.to_string());
        }
        errors.finish()?;

        Ok(NewBulkOrder {
            contact_name: self.contact_name.trim().to_string(),
            email: email.map_err(|e| AppError::BadRequest(e.to_string()))?,
            phone: clean(self.phone.as_deref()),
            company: clean(self.company.as_deref()),
            product_details: self.product_details.trim().to_string(),
            quantity: self.quantity,
        })
    }
}

/// Body of `PUT /api/bulk-orders/{id}`: staff follow-up.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkOrderUpdate {
    pub status: Option<BulkOrderStatus>,
    #[serde(default, deserialize_with = "double_option")]
    pub notes: Option<Option<String>>,
    pub quantity: Option<i32>,
}

impl BulkOrderUpdate {
    /// # Errors
    ///
    /// Returns validation errors keyed by field.
    pub fn validate(&mut self) -> Result<(), AppError> {
        let mut errors = FieldErrors::new();
        errors.check(
            self.quantity.is_some_and(|q| q <= 0),
            "quantity",
            "must be positive",
        );
        errors.finish()?;
        if let Some(notes) = &mut self.notes {
            *notes = clean(notes.as_deref());
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_inquiry_validation() {
        let input: BulkOrderInput = serde_json::from_str(
            r#"{"contactName":"Meera","email":"Buyer@Corp.Test","productDetails":"200 tote bags","quantity":200,"company":" "}"#,
        )
        .unwrap();
        let new = input.validate().unwrap();
        assert_eq!(new.email.as_str(), "buyer@corp.test");
        assert_eq!(new.company, None);

        let bad: BulkOrderInput = serde_json::from_str(
            r#"{"contactName":"","email":"nope","productDetails":"x","quantity":0}"#,
        )
        .unwrap();
        let AppError::Validation(fields) = bad.validate().unwrap_err() else {
            panic!("expected validation error");
        };
        assert_eq!(fields.to_string(), "contactName, email, quantity");
    }

    #[test]
    fn test_update_status_parses() {
        let update: BulkOrderUpdate = serde_json::from_str(r#"{"status":"quoted","notes":null}"#).unwrap();
        assert_eq!(update.status, Some(BulkOrderStatus::Quoted));
        assert_eq!(update.notes, Some(None));
    }
}
