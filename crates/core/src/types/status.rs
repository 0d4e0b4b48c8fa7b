//! Status enums for various entities.
//!
//! Each enum maps to a `PostgreSQL` enum type (with the `postgres` feature)
//! and serializes as `snake_case`, matching the strings the dashboard sends.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error returned when a string is not one of an enum's variants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {kind}: {value:?} (expected one of: {expected})")]
pub struct ParseEnumError {
    /// Human name of the enum (e.g. "order status").
    pub kind: &'static str,
    /// The rejected input.
    pub value: String,
    /// Comma-separated list of accepted values.
    pub expected: String,
}

/// Implements `as_str`, `Display`, `FromStr` and `ALL` for a unit-only enum.
macro_rules! string_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// The wire/database spelling of this value.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let normalized = s.trim().to_ascii_lowercase();
                match normalized.as_str() {
                    $($text => Ok(Self::$variant),)+
                    _ => Err(ParseEnumError {
                        kind: $kind,
                        value: s.to_string(),
                        expected: Self::ALL
                            .iter()
                            .map(|v| v.as_str())
                            .collect::<Vec<_>>()
                            .join(", "),
                    }),
                }
            }
        }
    };
}

// =============================================================================
// Orders
// =============================================================================

/// Order lifecycle status.
///
/// The happy path is `Pending -> Processing -> Dispatched -> Shipped ->
/// Delivered`. `Cancelled` can only be reached before stock has left the
/// warehouse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "order_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Processing,
    Dispatched,
    Shipped,
    Delivered,
    Cancelled,
}

string_enum!(OrderStatus, "order status", {
    Pending => "pending",
    Processing => "processing",
    Dispatched => "dispatched",
    Shipped => "shipped",
    Delivered => "delivered",
    Cancelled => "cancelled",
});

/// A status change the order lifecycle does not allow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cannot move order from {from} to {to}")]
pub struct StatusTransitionError {
    /// Current status.
    pub from: OrderStatus,
    /// Requested status.
    pub to: OrderStatus,
}

impl OrderStatus {
    /// Position along the fulfillment path; `None` for `Cancelled`.
    const fn rank(self) -> Option<u8> {
        match self {
            Self::Pending => Some(0),
            Self::Processing => Some(1),
            Self::Dispatched => Some(2),
            Self::Shipped => Some(3),
            Self::Delivered => Some(4),
            Self::Cancelled => None,
        }
    }

    /// Whether no further transitions are possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }

    /// Whether stock has already been taken for an order in this status.
    #[must_use]
    pub const fn has_consumed_stock(self) -> bool {
        matches!(self, Self::Dispatched | Self::Shipped | Self::Delivered)
    }

    /// Validate a transition from `self` to `to`.
    ///
    /// Re-applying the current status is accepted as a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`StatusTransitionError`] when leaving a terminal status,
    /// moving backwards, or cancelling after dispatch.
    pub fn transition_to(self, to: Self) -> Result<(), StatusTransitionError> {
        if self == to {
            return Ok(());
        }
        let err = StatusTransitionError { from: self, to };
        if self.is_terminal() {
            return Err(err);
        }
        match (self.rank(), to.rank()) {
            (Some(from), Some(target)) if target > from => Ok(()),
            (Some(from), None) if from < 2 => Ok(()),
            _ => Err(err),
        }
    }

    /// Whether moving from `self` to `to` must decrement stock.
    #[must_use]
    pub const fn transition_consumes_stock(self, to: Self) -> bool {
        !self.has_consumed_stock() && to.has_consumed_stock()
    }
}

/// How the customer pays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "payment_method", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[default]
    Cod,
    Card,
    Upi,
    Wallet,
    BankTransfer,
}

string_enum!(PaymentMethod, "payment method", {
    Cod => "cod",
    Card => "card",
    Upi => "upi",
    Wallet => "wallet",
    BankTransfer => "bank_transfer",
});

// =============================================================================
// Catalog
// =============================================================================

/// Product visibility. `Archived` is the soft-delete state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "product_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum ProductStatus {
    #[default]
    Active,
    Draft,
    Archived,
}

string_enum!(ProductStatus, "product status", {
    Active => "active",
    Draft => "draft",
    Archived => "archived",
});

/// Discount kind used by coupons and special offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "discount_type", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    /// `value` is a percentage of the order total (0-100).
    Percentage,
    /// `value` is an absolute amount.
    Fixed,
}

string_enum!(DiscountType, "discount type", {
    Percentage => "percentage",
    Fixed => "fixed",
});

// =============================================================================
// Staff and inquiries
// =============================================================================

/// Staff role with different permission levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "staff_role", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum StaffRole {
    /// Full access including staff management.
    SuperAdmin,
    /// Full access to store management.
    Admin,
    /// Day-to-day operations: orders, stock, customers.
    Staff,
}

string_enum!(StaffRole, "staff role", {
    SuperAdmin => "super_admin",
    Admin => "admin",
    Staff => "staff",
});

impl StaffRole {
    /// Whether this role may manage catalog, coupons and offers.
    #[must_use]
    pub const fn can_manage_store(self) -> bool {
        matches!(self, Self::SuperAdmin | Self::Admin)
    }
}

/// Progress of a bulk-order inquiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "bulk_order_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum BulkOrderStatus {
    #[default]
    New,
    Contacted,
    Quoted,
    Closed,
}

string_enum!(BulkOrderStatus, "bulk order status", {
    New => "new",
    Contacted => "contacted",
    Quoted => "quoted",
    Closed => "closed",
});

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_order_status_accepts_only_enumerated_values() {
        for status in OrderStatus::ALL {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), *status);
        }
        assert_eq!(" Shipped ".parse::<OrderStatus>().unwrap(), OrderStatus::Shipped);

        let err = "refunded".parse::<OrderStatus>().unwrap_err();
        assert_eq!(err.kind, "order status");
        assert!(err.to_string().contains("refunded"));
        assert!("".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_order_status_serde_rejects_unknown() {
        assert!(serde_json::from_str::<OrderStatus>("\"on_hold\"").is_err());
        assert_eq!(
            serde_json::to_string(&OrderStatus::Dispatched).unwrap(),
            "\"dispatched\""
        );
    }

    #[test]
    fn test_forward_transitions_allowed() {
        use OrderStatus::*;
        assert!(Pending.transition_to(Processing).is_ok());
        assert!(Processing.transition_to(Dispatched).is_ok());
        assert!(Dispatched.transition_to(Shipped).is_ok());
        assert!(Shipped.transition_to(Delivered).is_ok());
        assert!(Pending.transition_to(Shipped).is_ok());
        assert!(Delivered.transition_to(Delivered).is_ok());
    }

    #[test]
    fn test_backward_and_terminal_transitions_rejected() {
        use OrderStatus::*;
        assert_eq!(
            Delivered.transition_to(Pending),
            Err(StatusTransitionError {
                from: Delivered,
                to: Pending
            })
        );
        assert!(Shipped.transition_to(Processing).is_err());
        assert!(Cancelled.transition_to(Pending).is_err());
        assert!(Cancelled.transition_to(Processing).is_err());
    }

    #[test]
    fn test_cancel_only_before_dispatch() {
        use OrderStatus::*;
        assert!(Pending.transition_to(Cancelled).is_ok());
        assert!(Processing.transition_to(Cancelled).is_ok());
        assert!(Dispatched.transition_to(Cancelled).is_err());
        assert!(Shipped.transition_to(Cancelled).is_err());
    }

    #[test]
    fn test_transition_consumes_stock() {
        use OrderStatus::*;
        assert!(Processing.transition_consumes_stock(Dispatched));
        assert!(Pending.transition_consumes_stock(Shipped));
        assert!(!Dispatched.transition_consumes_stock(Shipped));
        assert!(!Pending.transition_consumes_stock(Cancelled));
        assert!(!Pending.transition_consumes_stock(Processing));
    }

    #[test]
    fn test_staff_role_permissions() {
        assert!(StaffRole::SuperAdmin.can_manage_store());
        assert!(StaffRole::Admin.can_manage_store());
        assert!(!StaffRole::Staff.can_manage_store());
        assert_eq!("super_admin".parse::<StaffRole>().unwrap(), StaffRole::SuperAdmin);
    }
}
