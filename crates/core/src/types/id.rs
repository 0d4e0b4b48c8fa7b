//! Entity ids.
//!
//! Every table has a `SERIAL` primary key; wrapping it per entity keeps a
//! `StockId` from being passed where a `ProductId` is expected.

/// Declare an `i32` id newtype.
///
/// The wrapper serializes as the bare number and, with the `postgres`
/// feature, binds and decodes as `INTEGER` (arrays included, for `= ANY($1)`
/// filters).
///
/// ```rust
/// # use emporium_core::define_id;
/// define_id!(WarehouseId);
/// define_id!(ShipmentId);
///
/// let warehouse = WarehouseId::new(1);
/// assert_eq!(warehouse.as_i32(), 1);
/// // let _: WarehouseId = ShipmentId::new(1); // mismatched types
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            ::serde::Serialize,
            ::serde::Deserialize,
        )]
        #[cfg_attr(feature = "postgres", derive(::sqlx::Type))]
        #[cfg_attr(feature = "postgres", sqlx(transparent))]
        #[serde(transparent)]
        pub struct $name(i32);

        impl $name {
            #[must_use]
            pub const fn new(id: i32) -> Self {
                Self(id)
            }

            #[must_use]
            pub const fn as_i32(self) -> i32 {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                ::core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl ::core::convert::From<i32> for $name {
            fn from(id: i32) -> Self {
                Self(id)
            }
        }

        impl ::core::convert::From<$name> for i32 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

// Catalog
define_id!(ProductId);
define_id!(VariantId);
define_id!(CategoryId);
define_id!(SubcategoryId);

// Inventory and sales
define_id!(StockId);
define_id!(OrderId);
define_id!(OrderItemId);
define_id!(CustomerId);
define_id!(CouponId);

// Staff and storefront content
define_id!(StaffId);
define_id!(RatingId);
define_id!(BulkOrderId);
define_id!(SpecialOfferId);
define_id!(MarqueeOfferId);

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_id_serializes_transparently() {
        let id = ProductId::new(42);
        assert_eq!(serde_json::to_string(&id).unwrap(), "42");
        let parsed: ProductId = serde_json::from_str("42").unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_id_conversions() {
        let id: StockId = 7.into();
        assert_eq!(id.as_i32(), 7);
        assert_eq!(i32::from(id), 7);
        assert_eq!(id.to_string(), "7");
    }
}
