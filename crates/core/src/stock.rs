//! Stock arithmetic.
//!
//! Repositories lock the stock row, hand the current quantity to one of the
//! planners here, and write back exactly what the returned [`StockChange`]
//! says. Keeping the arithmetic pure means the rules (never below zero, a
//! human-readable audit note per change) are tested without a database.

use serde::Serialize;
use thiserror::Error;

/// Errors from planning a stock change.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StockError {
    /// Dispatch quantities must be positive.
    #[error("quantity must be positive, got {0}")]
    NonPositiveQuantity(i32),
    /// Not enough units on hand.
    #[error("insufficient stock: {available} available, {requested} requested")]
    Insufficient {
        /// Units currently on hand.
        available: i32,
        /// Units asked for.
        requested: i32,
    },
    /// An adjustment would leave the quantity below zero.
    #[error("adjustment of {delta} would leave {before} below zero")]
    BelowZero {
        /// Units on hand before the adjustment.
        before: i32,
        /// Requested delta.
        delta: i32,
    },
    /// A zero adjustment changes nothing and is refused.
    #[error("adjustment must not be zero")]
    ZeroAdjustment,
    /// The arithmetic overflowed `i32`.
    #[error("stock quantity overflow")]
    Overflow,
}

/// A planned quantity change and the audit note describing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockChange {
    /// Quantity before the change.
    pub before: i32,
    /// Quantity after the change.
    pub after: i32,
    /// Line appended to the stock record's notes.
    pub note: String,
}

/// Plan the decrement for dispatching `quantity` units.
///
/// ```
/// use emporium_core::stock::plan_dispatch;
///
/// let change = plan_dispatch(10, 3).unwrap();
/// assert_eq!(change.after, 7);
/// assert_eq!(change.note, "Updated via order dispatch: 10 → 7");
/// ```
///
/// # Errors
///
/// Returns [`StockError::NonPositiveQuantity`] for `quantity <= 0` and
/// [`StockError::Insufficient`] when `quantity > before`.
pub fn plan_dispatch(before: i32, quantity: i32) -> Result<StockChange, StockError> {
    if quantity <= 0 {
        return Err(StockError::NonPositiveQuantity(quantity));
    }
    if quantity > before {
        return Err(StockError::Insufficient {
            available: before,
            requested: quantity,
        });
    }
    let after = before - quantity;
    Ok(StockChange {
        before,
        after,
        note: format!("Updated via order dispatch: {before} → {after}"),
    })
}

/// Plan a manual adjustment by `delta` (positive to receive, negative to remove).
///
/// # Errors
///
/// Returns [`StockError::ZeroAdjustment`], [`StockError::BelowZero`] or
/// [`StockError::Overflow`].
pub fn plan_adjustment(before: i32, delta: i32, reason: &str) -> Result<StockChange, StockError> {
    if delta == 0 {
        return Err(StockError::ZeroAdjustment);
    }
    let after = before.checked_add(delta).ok_or(StockError::Overflow)?;
    if after < 0 {
        return Err(StockError::BelowZero { before, delta });
    }
    let reason = reason.trim();
    let note = if reason.is_empty() {
        format!("Manual adjustment: {before} → {after}")
    } else {
        format!("Manual adjustment: {before} → {after} ({reason})")
    };
    Ok(StockChange {
        before,
        after,
        note,
    })
}

/// Append a line to existing notes, newline separated.
#[must_use]
pub fn append_note(existing: Option<&str>, line: &str) -> String {
    match existing.map(str::trim_end).filter(|s| !s.is_empty()) {
        Some(prev) => format!("{prev}\n{line}"),
        None => line.to_string(),
    }
}

/// Stock level bucket used by filters and the inventory report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StockLevel {
    /// Nothing on hand.
    OutOfStock,
    /// At or below the reorder threshold.
    Low,
    /// Above the threshold.
    InStock,
}

impl StockLevel {
    /// Classify a quantity against its threshold.
    #[must_use]
    pub const fn classify(quantity: i32, min_stock: i32) -> Self {
        if quantity <= 0 {
            Self::OutOfStock
        } else if quantity <= min_stock {
            Self::Low
        } else {
            Self::InStock
        }
    }
}

/// Whether a record counts as low stock (out-of-stock included).
#[must_use]
pub const fn is_low_stock(quantity: i32, min_stock: i32) -> bool {
    quantity <= min_stock
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_subtracts_exactly() {
        for before in [1, 5, 100] {
            for n in 1..=before {
                let change = plan_dispatch(before, n).unwrap();
                assert_eq!(change.after, before - n);
            }
        }
    }

    #[test]
    fn test_dispatch_note_format() {
        let change = plan_dispatch(12, 12).unwrap();
        assert_eq!(change.after, 0);
        assert_eq!(change.note, "Updated via order dispatch: 12 → 0");
    }

    #[test]
    fn test_dispatch_rejects_bad_quantities() {
        assert_eq!(plan_dispatch(5, 0), Err(StockError::NonPositiveQuantity(0)));
        assert_eq!(plan_dispatch(5, -2), Err(StockError::NonPositiveQuantity(-2)));
        assert_eq!(
            plan_dispatch(2, 3),
            Err(StockError::Insufficient {
                available: 2,
                requested: 3
            })
        );
    }

    #[test]
    fn test_sequential_dispatches_compose() {
        let first = plan_dispatch(10, 4).unwrap();
        let second = plan_dispatch(first.after, 5).unwrap();
        assert_eq!(second.after, 10 - 4 - 5);
        assert!(plan_dispatch(second.after, 2).is_err());
    }

    #[test]
    fn test_adjustment() {
        let change = plan_adjustment(3, 7, "restock from supplier").unwrap();
        assert_eq!(change.after, 10);
        assert_eq!(
            change.note,
            "Manual adjustment: 3 → 10 (restock from supplier)"
        );
        assert_eq!(
            plan_adjustment(3, -2, "  ").unwrap().note,
            "Manual adjustment: 3 → 1"
        );
        assert_eq!(
            plan_adjustment(3, -4, "damaged"),
            Err(StockError::BelowZero {
                before: 3,
                delta: -4
            })
        );
        assert_eq!(plan_adjustment(3, 0, "noop"), Err(StockError::ZeroAdjustment));
        assert_eq!(plan_adjustment(i32::MAX, 1, "x"), Err(StockError::Overflow));
    }

    #[test]
    fn test_append_note() {
        assert_eq!(append_note(None, "a"), "a");
        assert_eq!(append_note(Some(""), "a"), "a");
        assert_eq!(append_note(Some("first\n"), "second"), "first\nsecond");
    }

    #[test]
    fn test_levels() {
        assert_eq!(StockLevel::classify(0, 5), StockLevel::OutOfStock);
        assert_eq!(StockLevel::classify(5, 5), StockLevel::Low);
        assert_eq!(StockLevel::classify(6, 5), StockLevel::InStock);
        assert!(is_low_stock(5, 5));
        assert!(!is_low_stock(6, 5));
    }
}
