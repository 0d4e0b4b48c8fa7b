//! Coupon types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use emporium_core::coupon::{CouponRules, normalize_code};
use emporium_core::{CategoryId, CouponId, DiscountType, ProductId, fits_amount};

use super::{blank, clean, double_option};
use crate::error::{AppError, FieldErrors};

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Coupon {
    pub id: CouponId,
    pub code: String,
    pub description: Option<String>,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    pub min_order_amount: Option<Decimal>,
    pub max_discount_amount: Option<Decimal>,
    pub usage_limit: Option<i32>,
    pub used_count: i32,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub applicable_category_ids: Vec<CategoryId>,
    pub applicable_product_ids: Vec<ProductId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Coupon {
    #[must_use]
    pub fn rules(&self) -> CouponRules {
        CouponRules {
            discount_type: self.discount_type,
            discount_value: self.discount_value,
            min_order_amount: self.min_order_amount,
            max_discount_amount: self.max_discount_amount,
            usage_limit: self.usage_limit,
            used_count: self.used_count,
            valid_from: self.valid_from,
            valid_until: self.valid_until,
            is_active: self.is_active,
            applicable_product_ids: self.applicable_product_ids.clone(),
            applicable_category_ids: self.applicable_category_ids.clone(),
        }
    }
}

/// Body of `POST /api/coupons`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CouponInput {
    pub code: String,
    pub description: Option<String>,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    pub min_order_amount: Option<Decimal>,
    pub max_discount_amount: Option<Decimal>,
    pub usage_limit: Option<i32>,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    pub is_active: Option<bool>,
    #[serde(default)]
    pub applicable_category_ids: Vec<CategoryId>,
    #[serde(default)]
    pub applicable_product_ids: Vec<ProductId>,
}

/// A validated coupon definition, written as a whole on create and update.
#[derive(Debug, Clone)]
pub struct CouponDefinition {
    pub code: String,
    pub description: Option<String>,
    pub rules: CouponRules,
}

impl CouponDefinition {
    fn validate(self) -> Result<Self, AppError> {
        let mut errors = FieldErrors::new();
        errors.check(blank(&self.code), "code", "is required");
        errors.check(
            self.code.chars().any(char::is_whitespace),
            "code",
            "must not contain spaces",
        );
        for (field, message) in self.rules.definition_errors() {
            errors.add(field, message);
        }
        errors.finish()?;
        Ok(self)
    }
}

impl CouponInput {
    /// Normalize the code and check the discount rules.
    ///
    /// # Errors
    ///
    /// Returns validation errors keyed by field.
    pub fn validate(self) -> Result<CouponDefinition, AppError> {
        CouponDefinition {
            code: normalize_code(&self.code),
            description: clean(self.description.as_deref()),
            rules: CouponRules {
                discount_type: self.discount_type,
                discount_value: self.discount_value,
                min_order_amount: self.min_order_amount,
                max_discount_amount: self.max_discount_amount,
                usage_limit: self.usage_limit,
                used_count: 0,
                valid_from: self.valid_from,
                valid_until: self.valid_until,
                is_active: self.is_active.unwrap_or(true),
                applicable_product_ids: self.applicable_product_ids,
                applicable_category_ids: self.applicable_category_ids,
            },
        }
        .validate()
    }
}

/// Body of `PUT /api/coupons/{id}`. Nullable limits use `null` to clear.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CouponUpdate {
    pub code: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    pub discount_type: Option<DiscountType>,
    pub discount_value: Option<Decimal>,
    #[serde(default, deserialize_with = "double_option")]
    pub min_order_amount: Option<Option<Decimal>>,
    #[serde(default, deserialize_with = "double_option")]
    pub max_discount_amount: Option<Option<Decimal>>,
    #[serde(default, deserialize_with = "double_option")]
    pub usage_limit: Option<Option<i32>>,
    #[serde(default, deserialize_with = "double_option")]
    pub valid_from: Option<Option<DateTime<Utc>>>,
    #[serde(default, deserialize_with = "double_option")]
    pub valid_until: Option<Option<DateTime<Utc>>>,
    pub is_active: Option<bool>,
    pub applicable_category_ids: Option<Vec<CategoryId>>,
    pub applicable_product_ids: Option<Vec<ProductId>>,
}

impl CouponUpdate {
    /// Overlay the sent fields on `current` and validate the result, so rules
    /// that span fields (percentage range, validity window) see final values.
    ///
    /// # Errors
    ///
    /// Returns validation errors keyed by field.
    pub fn merge(self, current: &Coupon) -> Result<CouponDefinition, AppError> {
        let base = current.rules();
        CouponDefinition {
            code: self
                .code
                .as_deref()
                .map_or_else(|| current.code.clone(), normalize_code),
            description: self
                .description
                .map_or_else(|| current.description.clone(), |d| clean(d.as_deref())),
            rules: CouponRules {
                discount_type: self.discount_type.unwrap_or(base.discount_type),
                discount_value: self.discount_value.unwrap_or(base.discount_value),
                min_order_amount: self.min_order_amount.unwrap_or(base.min_order_amount),
                max_discount_amount: self
                    .max_discount_amount
                    .unwrap_or(base.max_discount_amount),
                usage_limit: self.usage_limit.unwrap_or(base.usage_limit),
                used_count: base.used_count,
                valid_from: self.valid_from.unwrap_or(base.valid_from),
                valid_until: self.valid_until.unwrap_or(base.valid_until),
                is_active: self.is_active.unwrap_or(base.is_active),
                applicable_product_ids: self
                    .applicable_product_ids
                    .unwrap_or(base.applicable_product_ids),
                applicable_category_ids: self
                    .applicable_category_ids
                    .unwrap_or(base.applicable_category_ids),
            },
        }
        .validate()
    }
}

/// Body of `POST /api/coupons/validate`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CouponCheck {
    pub code: String,
    pub order_total: Decimal,
    #[serde(default)]
    pub product_ids: Vec<ProductId>,
    #[serde(default)]
    pub category_ids: Vec<CategoryId>,
}

impl CouponCheck {
    /// # Errors
    ///
    /// Returns validation errors for a blank code or an order total outside
    /// what a stored amount can hold.
    pub fn validate(&self) -> Result<(), AppError> {
        let mut errors = FieldErrors::new();
        errors.check(blank(&self.code), "code", "is required");
        errors.check(
            self.order_total.is_sign_negative() || !fits_amount(self.order_total),
            "orderTotal",
            "is out of range",
        );
        errors.finish()
    }
}

/// Response of `POST /api/coupons/validate`.
#[derive(Debug, Clone, Serialize)]
pub struct CouponValidation {
    pub valid: bool,
    pub discount: Decimal,
    pub message: String,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn stored() -> Coupon {
        CouponInput {
            code: "save10".to_string(),
            description: None,
            discount_type: DiscountType::Percentage,
            discount_value: Decimal::new(10, 0),
            min_order_amount: Some(Decimal::new(100, 0)),
            max_discount_amount: None,
            usage_limit: Some(50),
            valid_from: None,
            valid_until: None,
            is_active: None,
            applicable_category_ids: Vec::new(),
            applicable_product_ids: Vec::new(),
        }
        .validate()
        .map(|def| Coupon {
            id: CouponId::new(1),
            code: def.code,
            description: def.description,
            discount_type: def.rules.discount_type,
            discount_value: def.rules.discount_value,
            min_order_amount: def.rules.min_order_amount,
            max_discount_amount: def.rules.max_discount_amount,
            usage_limit: def.rules.usage_limit,
            used_count: 7,
            valid_from: None,
            valid_until: None,
            is_active: def.rules.is_active,
            applicable_category_ids: Vec::new(),
            applicable_product_ids: Vec::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        })
        .unwrap()
    }

    #[test]
    fn test_input_normalizes_code() {
        let coupon = stored();
        assert_eq!(coupon.code, "SAVE10");
        assert!(coupon.is_active);
    }

    #[test]
    fn test_input_rejects_bad_definition() {
        let input: CouponInput = serde_json::from_str(
            r#"{"code":"two words","discountType":"percentage","discountValue":"120"}"#,
        )
        .unwrap();
        let AppError::Validation(fields) = input.validate().unwrap_err() else {
            panic!("expected validation error");
        };
        assert_eq!(fields.to_string(), "code, discountValue");
    }

    #[test]
    fn test_merge_clears_and_keeps() {
        let update: CouponUpdate =
            serde_json::from_str(r#"{"minOrderAmount":null,"discountValue":"15"}"#).unwrap();
        let merged = update.merge(&stored()).unwrap();
        assert_eq!(merged.code, "SAVE10");
        assert_eq!(merged.rules.min_order_amount, None);
        assert_eq!(merged.rules.discount_value, Decimal::new(15, 0));
        assert_eq!(merged.rules.usage_limit, Some(50));
        assert_eq!(merged.rules.used_count, 7);
    }

    #[test]
    fn test_check_rejects_out_of_range_total() {
        let check = |body: &str| serde_json::from_str::<CouponCheck>(body).unwrap().validate();
        assert!(check(r#"{"code":"SAVE10","orderTotal":"250.00"}"#).is_ok());
        for body in [
            r#"{"code":"SAVE10","orderTotal":"79228162514264337593543950335"}"#,
            r#"{"code":"SAVE10","orderTotal":"10000000000"}"#,
            r#"{"code":"SAVE10","orderTotal":"-1"}"#,
        ] {
            let Err(AppError::Validation(fields)) = check(body) else {
                panic!("{body} should be rejected");
            };
            assert_eq!(fields.to_string(), "orderTotal");
        }
    }

    #[test]
    fn test_merge_validates_combined_values() {
        let update: CouponUpdate = serde_json::from_str(r#"{"discountValue":"150"}"#).unwrap();
        assert!(matches!(
            update.merge(&stored()),
            Err(AppError::Validation(_))
        ));
    }
}
