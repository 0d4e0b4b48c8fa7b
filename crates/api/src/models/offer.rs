//! Promotional offer types: special offers (banners with a discount) and
//! marquee offers (scrolling one-liners).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use emporium_core::{DiscountType, MarqueeOfferId, ProductId, SpecialOfferId, fits_amount};

use super::{blank, clean, double_option};
use crate::error::{AppError, FieldErrors};

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SpecialOffer {
    pub id: SpecialOfferId,
    pub title: String,
    pub description: Option<String>,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    pub product_ids: Vec<ProductId>,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub banner_image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MarqueeOffer {
    pub id: MarqueeOfferId,
    pub text: String,
    pub link: Option<String>,
    pub sort_order: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn check_discount(errors: &mut FieldErrors, kind: DiscountType, value: Decimal) {
    match kind {
        DiscountType::Percentage => errors.check(
            value <= Decimal::ZERO || value > Decimal::ONE_HUNDRED,
            "discountValue",
            "must be between 0 and 100",
        ),
        DiscountType::Fixed if value <= Decimal::ZERO => {
            errors.add("discountValue", "must be greater than 0");
        }
        DiscountType::Fixed => errors.check(!fits_amount(value), "discountValue", "is too large"),
    }
}

fn check_window(
    errors: &mut FieldErrors,
    starts_at: Option<DateTime<Utc>>,
    ends_at: Option<DateTime<Utc>>,
) {
    errors.check(
        matches!((starts_at, ends_at), (Some(s), Some(e)) if e <= s),
        "endsAt",
        "must be after startsAt",
    );
}

/// Body of `POST /api/special-offers`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecialOfferInput {
    pub title: String,
    pub description: Option<String>,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    #[serde(default)]
    pub product_ids: Vec<ProductId>,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub is_active: Option<bool>,
    pub banner_image: Option<String>,
}

impl SpecialOfferInput {
    /// # Errors
    ///
    /// Returns validation errors keyed by field.
    pub fn validate(&mut self) -> Result<(), AppError> {
        let mut errors = FieldErrors::new();
        errors.check(blank(&self.title), "title", "is required");
        check_discount(&mut errors, self.discount_type, self.discount_value);
        check_window(&mut errors, self.starts_at, self.ends_at);
        errors.finish()?;
        self.title = self.title.trim().to_string();
        self.description = clean(self.description.as_deref());
        self.banner_image = clean(self.banner_image.as_deref());
        Ok(())
    }
}

/// Body of `PUT /api/special-offers/{id}`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecialOfferUpdate {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    pub discount_type: Option<DiscountType>,
    pub discount_value: Option<Decimal>,
    pub product_ids: Option<Vec<ProductId>>,
    #[serde(default, deserialize_with = "double_option")]
    pub starts_at: Option<Option<DateTime<Utc>>>,
    #[serde(default, deserialize_with = "double_option")]
    pub ends_at: Option<Option<DateTime<Utc>>>,
    pub is_active: Option<bool>,
    #[serde(default, deserialize_with = "double_option")]
    pub banner_image: Option<Option<String>>,
}

impl SpecialOfferUpdate {
    /// Validate against the stored offer so the discount and date window are
    /// checked with their final values.
    ///
    /// # Errors
    ///
    /// Returns validation errors keyed by field.
    pub fn validate(&mut self, current: &SpecialOffer) -> Result<(), AppError> {
        let mut errors = FieldErrors::new();
        errors.check(
            self.title.as_deref().is_some_and(blank),
            "title",
            "must not be blank",
        );
        if self.discount_type.is_some() || self.discount_value.is_some() {
            check_discount(
                &mut errors,
                self.discount_type.unwrap_or(current.discount_type),
                self.discount_value.unwrap_or(current.discount_value),
            );
        }
        check_window(
            &mut errors,
            self.starts_at.unwrap_or(current.starts_at),
            self.ends_at.unwrap_or(current.ends_at),
        );
        errors.finish()?;
        if let Some(description) = &mut self.description {
            *description = clean(description.as_deref());
        }
        if let Some(banner) = &mut self.banner_image {
            *banner = clean(banner.as_deref());
        }
        Ok(())
    }
}

/// Body of `POST /api/marquee-offers`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarqueeOfferInput {
    pub text: String,
    pub link: Option<String>,
    pub sort_order: Option<i32>,
    pub is_active: Option<bool>,
}

impl MarqueeOfferInput {
    /// # Errors
    ///
    /// Returns validation errors keyed by field.
    pub fn validate(&mut self) -> Result<(), AppError> {
        let mut errors = FieldErrors::new();
        errors.check(blank(&self.text), "text", "is required");
        errors.finish()?;
        self.text = self.text.trim().to_string();
        self.link = clean(self.link.as_deref());
        Ok(())
    }
}

/// Body of `PUT /api/marquee-offers/{id}`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarqueeOfferUpdate {
    pub text: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub link: Option<Option<String>>,
    pub sort_order: Option<i32>,
    pub is_active: Option<bool>,
}

impl MarqueeOfferUpdate {
    /// # Errors
    ///
    /// Returns validation errors keyed by field.
    pub fn validate(&mut self) -> Result<(), AppError> {
        let mut errors = FieldErrors::new();
        errors.check(
            self.text.as_deref().is_some_and(blank),
            "text",
            "must not be blank",
        );
        errors.finish()?;
        if let Some(link) = &mut self.link {
            *link = clean(link.as_deref());
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn offer() -> SpecialOffer {
        SpecialOffer {
            id: SpecialOfferId::new(1),
            title: "Monsoon sale".to_string(),
            description: None,
            discount_type: DiscountType::Percentage,
            discount_value: Decimal::new(20, 0),
            product_ids: vec![],
            starts_at: Some(Utc::now()),
            ends_at: Some(Utc::now() + Duration::days(7)),
            is_active: true,
            banner_image: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_special_offer_input_validation() {
        let mut input: SpecialOfferInput = serde_json::from_str(
            r#"{"title":" ","discountType":"fixed","discountValue":"0",
                "startsAt":"2025-06-10T00:00:00Z","endsAt":"2025-06-01T00:00:00Z"}"#,
        )
        .unwrap();
        let AppError::Validation(fields) = input.validate().unwrap_err() else {
            panic!("expected validation error");
        };
        assert_eq!(fields.to_string(), "discountValue, endsAt, title");
    }

    #[test]
    fn test_special_offer_update_checks_final_values() {
        let mut too_large: SpecialOfferUpdate =
            serde_json::from_str(r#"{"discountValue":"150"}"#).unwrap();
        assert!(too_large.validate(&offer()).is_err());

        let mut open_ended: SpecialOfferUpdate =
            serde_json::from_str(r#"{"endsAt":null}"#).unwrap();
        open_ended.validate(&offer()).unwrap();
        assert_eq!(open_ended.ends_at, Some(None));
    }

    #[test]
    fn test_fixed_discount_past_column_limit_rejected() {
        let mut input: SpecialOfferInput = serde_json::from_str(
            r#"{"title":"Big","discountType":"fixed","discountValue":"10000000000"}"#,
        )
        .unwrap();
        let AppError::Validation(fields) = input.validate().unwrap_err() else {
            panic!("expected validation error");
        };
        assert_eq!(fields.to_string(), "discountValue");

        let mut at_limit: SpecialOfferInput = serde_json::from_str(
            r#"{"title":"Big","discountType":"fixed","discountValue":"9999999999.99"}"#,
        )
        .unwrap();
        at_limit.validate().unwrap();
    }

    #[test]
    fn test_marquee_input_trims() {
        let mut input: MarqueeOfferInput =
            serde_json::from_str(r#"{"text":" Free shipping over 999 ","link":""}"#).unwrap();
        input.validate().unwrap();
        assert_eq!(input.text, "Free shipping over 999");
        assert_eq!(input.link, None);
    }
}
