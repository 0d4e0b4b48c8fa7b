//! Coupon rules.
//!
//! [`CouponRules::evaluate`] decides whether a coupon applies to a cart and
//! how much it takes off. The database layer loads the rules, calls this, and
//! only then increments `used_count`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

use crate::types::money::{fits_amount, round_money};
use crate::types::{CategoryId, DiscountType, ProductId};

/// Why a coupon cannot be applied. Messages are shown to shoppers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CouponError {
    /// No coupon has this code.
    #[error("Invalid coupon code")]
    NotFound,
    /// Switched off by staff.
    #[error("This coupon is not active")]
    Inactive,
    /// `valid_from` is in the future.
    #[error("This coupon is not valid yet")]
    NotYetValid,
    /// `valid_until` has passed.
    #[error("This coupon has expired")]
    Expired,
    /// `used_count` reached `usage_limit`.
    #[error("This coupon has reached its usage limit")]
    UsageLimitReached,
    /// Cart total under `min_order_amount`.
    #[error("Minimum order amount of {minimum} not met")]
    BelowMinimum {
        /// Required minimum.
        minimum: Decimal,
    },
    /// None of the cart's products or categories are covered.
    #[error("This coupon does not apply to the items in your order")]
    NotApplicable,
    /// Negative or larger than a stored amount can be.
    #[error("Order total is out of range")]
    InvalidOrderTotal,
}

/// Upper-case and trim a coupon code. Codes are stored in this form.
#[must_use]
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

/// Everything needed to evaluate a coupon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CouponRules {
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    pub min_order_amount: Option<Decimal>,
    pub max_discount_amount: Option<Decimal>,
    pub usage_limit: Option<i32>,
    pub used_count: i32,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub applicable_product_ids: Vec<ProductId>,
    pub applicable_category_ids: Vec<CategoryId>,
}

/// The cart a coupon is being applied to.
#[derive(Debug, Clone, Copy)]
pub struct CouponContext<'a> {
    pub order_total: Decimal,
    pub now: DateTime<Utc>,
    pub product_ids: &'a [ProductId],
    pub category_ids: &'a [CategoryId],
}

impl CouponRules {
    /// Compute the discount for a cart.
    ///
    /// Percentage coupons take `discount_value`% of the total, capped by
    /// `max_discount_amount`; fixed coupons never exceed the total. The
    /// result is rounded to two places.
    ///
    /// # Errors
    ///
    /// Returns the first [`CouponError`] that applies, checked in the order
    /// active, window, usage, minimum, applicability.
    pub fn evaluate(&self, ctx: &CouponContext<'_>) -> Result<Decimal, CouponError> {
        if ctx.order_total.is_sign_negative() || !fits_amount(ctx.order_total) {
            return Err(CouponError::InvalidOrderTotal);
        }
        if !self.is_active {
            return Err(CouponError::Inactive);
        }
        if self.valid_from.is_some_and(|from| ctx.now < from) {
            return Err(CouponError::NotYetValid);
        }
        if self.valid_until.is_some_and(|until| ctx.now > until) {
            return Err(CouponError::Expired);
        }
        if self
            .usage_limit
            .is_some_and(|limit| self.used_count >= limit)
        {
            return Err(CouponError::UsageLimitReached);
        }
        if let Some(minimum) = self.min_order_amount
            && ctx.order_total < minimum
        {
            return Err(CouponError::BelowMinimum { minimum });
        }
        if !self.applies_to(ctx.product_ids, ctx.category_ids) {
            return Err(CouponError::NotApplicable);
        }

        let discount = match self.discount_type {
            DiscountType::Percentage => {
                let raw = ctx
                    .order_total
                    .checked_mul(self.discount_value)
                    .and_then(|n| n.checked_div(Decimal::ONE_HUNDRED))
                    .ok_or(CouponError::InvalidOrderTotal)?;
                self.max_discount_amount.map_or(raw, |cap| raw.min(cap))
            }
            DiscountType::Fixed => self.discount_value,
        };
        Ok(round_money(discount.min(ctx.order_total).max(Decimal::ZERO)))
    }

    /// Unrestricted coupons apply to everything; restricted ones need at least
    /// one listed product or category in the cart.
    fn applies_to(&self, product_ids: &[ProductId], category_ids: &[CategoryId]) -> bool {
        if self.applicable_product_ids.is_empty() && self.applicable_category_ids.is_empty() {
            return true;
        }
        product_ids
            .iter()
            .any(|id| self.applicable_product_ids.contains(id))
            || category_ids
                .iter()
                .any(|id| self.applicable_category_ids.contains(id))
    }

    /// Field-level problems with a coupon definition, empty when valid.
    #[must_use]
    pub fn definition_errors(&self) -> Vec<(&'static str, &'static str)> {
        let mut errors = Vec::new();
        match self.discount_type {
            DiscountType::Percentage
                if self.discount_value <= Decimal::ZERO
                    || self.discount_value > Decimal::ONE_HUNDRED =>
            {
                errors.push(("discountValue", "must be between 0 and 100"));
            }
            DiscountType::Fixed if self.discount_value <= Decimal::ZERO => {
                errors.push(("discountValue", "must be greater than 0"));
            }
            _ => {}
        }
        if !fits_amount(self.discount_value) {
            errors.push(("discountValue", "is too large"));
        }
        if self.min_order_amount.is_some_and(|m| !fits_amount(m)) {
            errors.push(("minOrderAmount", "is too large"));
        }
        if self.max_discount_amount.is_some_and(|m| !fits_amount(m)) {
            errors.push(("maxDiscountAmount", "is too large"));
        }
        if self.min_order_amount.is_some_and(|m| m.is_sign_negative()) {
            errors.push(("minOrderAmount", "must not be negative"));
        }
        if self.max_discount_amount.is_some_and(|m| m <= Decimal::ZERO) {
            errors.push(("maxDiscountAmount", "must be greater than 0"));
        }
        if self.usage_limit.is_some_and(|l| l < 1) {
            errors.push(("usageLimit", "must be at least 1"));
        }
        if let (Some(from), Some(until)) = (self.valid_from, self.valid_until)
            && until <= from
        {
            errors.push(("validUntil", "must be after validFrom"));
        }
        errors
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;
    use crate::types::MAX_AMOUNT;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn percent(value: i64) -> CouponRules {
        CouponRules {
            discount_type: DiscountType::Percentage,
            discount_value: Decimal::new(value, 0),
            min_order_amount: None,
            max_discount_amount: None,
            usage_limit: None,
            used_count: 0,
            valid_from: None,
            valid_until: None,
            is_active: true,
            applicable_product_ids: Vec::new(),
            applicable_category_ids: Vec::new(),
        }
    }

    fn cart(total: i64) -> CouponContext<'static> {
        CouponContext {
            order_total: Decimal::new(total, 0),
            now: now(),
            product_ids: &[],
            category_ids: &[],
        }
    }

    #[test]
    fn test_percentage_with_cap() {
        let mut rules = percent(20);
        assert_eq!(rules.evaluate(&cart(500)).unwrap(), Decimal::new(100, 0));

        rules.max_discount_amount = Some(Decimal::new(75, 0));
        assert_eq!(rules.evaluate(&cart(500)).unwrap(), Decimal::new(75, 0));
    }

    #[test]
    fn test_percentage_rounds_to_cents() {
        let rules = percent(15);
        let ctx = CouponContext {
            order_total: Decimal::new(3333, 2),
            ..cart(0)
        };
        assert_eq!(rules.evaluate(&ctx).unwrap(), Decimal::new(500, 2));
    }

    #[test]
    fn test_fixed_capped_at_total() {
        let rules = CouponRules {
            discount_type: DiscountType::Fixed,
            discount_value: Decimal::new(200, 0),
            ..percent(0)
        };
        assert_eq!(rules.evaluate(&cart(150)).unwrap(), Decimal::new(150, 0));
        assert_eq!(rules.evaluate(&cart(900)).unwrap(), Decimal::new(200, 0));
    }

    #[test]
    fn test_rejections() {
        let inactive = CouponRules {
            is_active: false,
            ..percent(10)
        };
        assert_eq!(inactive.evaluate(&cart(100)), Err(CouponError::Inactive));

        let future = CouponRules {
            valid_from: Some(now() + Duration::days(1)),
            ..percent(10)
        };
        assert_eq!(future.evaluate(&cart(100)), Err(CouponError::NotYetValid));

        let expired = CouponRules {
            valid_until: Some(now() - Duration::seconds(1)),
            ..percent(10)
        };
        assert_eq!(expired.evaluate(&cart(100)), Err(CouponError::Expired));

        let used_up = CouponRules {
            usage_limit: Some(3),
            used_count: 3,
            ..percent(10)
        };
        assert_eq!(
            used_up.evaluate(&cart(100)),
            Err(CouponError::UsageLimitReached)
        );

        let minimum = CouponRules {
            min_order_amount: Some(Decimal::new(250, 0)),
            ..percent(10)
        };
        assert_eq!(
            minimum.evaluate(&cart(249)),
            Err(CouponError::BelowMinimum {
                minimum: Decimal::new(250, 0)
            })
        );
        assert!(minimum.evaluate(&cart(250)).is_ok());

        assert_eq!(
            percent(10).evaluate(&cart(-1)),
            Err(CouponError::InvalidOrderTotal)
        );
    }

    #[test]
    fn test_huge_total_is_rejected_not_overflowed() {
        let half = percent(50);
        let huge = CouponContext {
            order_total: Decimal::MAX,
            ..cart(0)
        };
        assert_eq!(half.evaluate(&huge), Err(CouponError::InvalidOrderTotal));

        let ceiling = CouponContext {
            order_total: MAX_AMOUNT,
            ..cart(0)
        };
        assert_eq!(percent(100).evaluate(&ceiling).unwrap(), MAX_AMOUNT);
    }

    #[test]
    fn test_applicability() {
        let rules = CouponRules {
            applicable_product_ids: vec![ProductId::new(7)],
            applicable_category_ids: vec![CategoryId::new(2)],
            ..percent(10)
        };
        assert_eq!(rules.evaluate(&cart(100)), Err(CouponError::NotApplicable));

        let by_product = CouponContext {
            product_ids: &[ProductId::new(1), ProductId::new(7)],
            ..cart(100)
        };
        assert!(rules.evaluate(&by_product).is_ok());

        let by_category = CouponContext {
            category_ids: &[CategoryId::new(2)],
            ..cart(100)
        };
        assert!(rules.evaluate(&by_category).is_ok());
    }

    #[test]
    fn test_definition_errors() {
        assert!(percent(10).definition_errors().is_empty());
        assert_eq!(
            percent(150).definition_errors(),
            vec![("discountValue", "must be between 0 and 100")]
        );
        let bad_window = CouponRules {
            valid_from: Some(now()),
            valid_until: Some(now()),
            usage_limit: Some(0),
            ..percent(5)
        };
        let fields: Vec<_> = bad_window
            .definition_errors()
            .into_iter()
            .map(|(f, _)| f)
            .collect();
        assert_eq!(fields, vec!["usageLimit", "validUntil"]);

        let huge = CouponRules {
            discount_type: DiscountType::Fixed,
            discount_value: Decimal::MAX,
            min_order_amount: Some(Decimal::MAX),
            ..percent(0)
        };
        let fields: Vec<_> = huge.definition_errors().into_iter().map(|(f, _)| f).collect();
        assert_eq!(fields, vec!["discountValue", "minOrderAmount"]);
    }

    #[test]
    fn test_normalize_code() {
        assert_eq!(normalize_code("  summer10 "), "SUMMER10");
    }
}
