//! Database rows and request payloads.
//!
//! Rows derive `sqlx::FromRow` and serialize in camelCase for the dashboard.
//! Payloads deserialize camelCase and validate into [`FieldErrors`].
//!
//! [`FieldErrors`]: crate::error::FieldErrors

pub mod analytics;
pub mod bulk_order;
pub mod category;
pub mod coupon;
pub mod customer;
pub mod offer;
pub mod order;
pub mod product;
pub mod rating;
pub mod staff;
pub mod stock;

use emporium_core::fits_amount;
use emporium_core::slug::{is_valid_slug, slugify};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};

use crate::error::FieldErrors;

/// Deserialize a field where `null` and "absent" mean different things.
///
/// Use with `#[serde(default, deserialize_with = "double_option")]` on an
/// `Option<Option<T>>`: absent is `None` (leave unchanged), `null` is
/// `Some(None)` (clear), a value is `Some(Some(v))`.
pub fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Trim optional text; blank becomes `None`.
pub(crate) fn clean(text: Option<&str>) -> Option<String> {
    text.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

/// Whether a string is empty after trimming.
pub(crate) fn blank(text: &str) -> bool {
    text.trim().is_empty()
}

/// Record a money field that is negative or past what the column stores.
pub(crate) fn check_amount(errors: &mut FieldErrors, field: &'static str, amount: Option<Decimal>) {
    match amount {
        Some(a) if a.is_sign_negative() => errors.add(field, "must not be negative"),
        Some(a) if !fits_amount(a) => errors.add(field, "is too large"),
        _ => {}
    }
}

/// Use the client's slug when given, otherwise derive one from `source`.
///
/// Problems are recorded under `slug`; an empty result is returned with them.
pub(crate) fn resolve_slug(errors: &mut FieldErrors, explicit: Option<&str>, source: &str) -> String {
    match explicit.map(str::trim).filter(|s| !s.is_empty()) {
        Some(slug) if is_valid_slug(slug) => slug.to_string(),
        Some(_) => {
            errors.add("slug", "must contain only lowercase letters, digits and single hyphens");
            String::new()
        }
        None => {
            let derived = slugify(source);
            if derived.is_empty() {
                errors.add("slug", "could not be derived; provide one");
            }
            derived
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde::Deserialize;

    use super::*;

    #[derive(Deserialize)]
    struct Patch {
        #[serde(default, deserialize_with = "double_option")]
        note: Option<Option<String>>,
    }

    #[test]
    fn test_double_option_distinguishes_null_from_absent() {
        let absent: Patch = serde_json::from_str("{}").unwrap();
        assert_eq!(absent.note, None);

        let null: Patch = serde_json::from_str(r#"{"note":null}"#).unwrap();
        assert_eq!(null.note, Some(None));

        let set: Patch = serde_json::from_str(r#"{"note":"hi"}"#).unwrap();
        assert_eq!(set.note, Some(Some("hi".to_string())));
    }

    #[test]
    fn test_clean() {
        assert_eq!(clean(Some("  x ")), Some("x".to_string()));
        assert_eq!(clean(Some("   ")), None);
        assert_eq!(clean(None), None);
        assert!(blank(" \t"));
    }

    #[test]
    fn test_check_amount() {
        let mut errors = FieldErrors::new();
        check_amount(&mut errors, "price", None);
        check_amount(&mut errors, "price", Some(emporium_core::MAX_AMOUNT));
        assert!(errors.is_empty());

        check_amount(&mut errors, "cost", Some(Decimal::NEGATIVE_ONE));
        check_amount(&mut errors, "total", Some(Decimal::MAX));
        assert_eq!(errors.to_string(), "cost, total");
    }

    #[test]
    fn test_resolve_slug() {
        let mut errors = FieldErrors::new();
        assert_eq!(resolve_slug(&mut errors, None, "Summer Tees"), "summer-tees");
        assert_eq!(resolve_slug(&mut errors, Some("custom-1"), "ignored"), "custom-1");
        assert!(errors.is_empty());

        resolve_slug(&mut errors, Some("Not Valid"), "x");
        assert_eq!(errors.to_string(), "slug");

        let mut errors = FieldErrors::new();
        resolve_slug(&mut errors, None, "???");
        assert!(!errors.is_empty());
    }
}
