//! Money helpers.
//!
//! Amounts are `rust_decimal::Decimal` in the store currency's major unit
//! (e.g. rupees, not paise). Arithmetic stays exact; rounding to two places
//! happens only when an amount is persisted or displayed.

use rust_decimal::{Decimal, RoundingStrategy};

/// Largest amount a money column (`NUMERIC(12,2)`) holds: 9,999,999,999.99.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(0xD4A5_0FFF, 0xE8, 0, false, 2);

/// Whether `amount` is within `-MAX_AMOUNT..=MAX_AMOUNT`.
#[must_use]
pub fn fits_amount(amount: Decimal) -> bool {
    amount.abs() <= MAX_AMOUNT
}

/// Sum of `unit_price * quantity` over `lines`.
///
/// `None` when an intermediate overflows or the result exceeds [`MAX_AMOUNT`].
#[must_use]
pub fn checked_subtotal(lines: impl IntoIterator<Item = (Decimal, i32)>) -> Option<Decimal> {
    lines
        .into_iter()
        .try_fold(Decimal::ZERO, |acc, (price, quantity)| {
            price
                .checked_mul(Decimal::from(quantity))
                .and_then(|line| acc.checked_add(line))
        })
        .map(round_money)
        .filter(|total| fits_amount(*total))
}

/// Round an amount to two decimal places, half away from zero.
#[must_use]
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Format an amount for humans: symbol, thousands separators, two decimals.
///
/// ```
/// use rust_decimal::Decimal;
/// use emporium_core::format_currency;
///
/// assert_eq!(format_currency(Decimal::new(123_456_789, 2), "₹"), "₹1,234,567.89");
/// assert_eq!(format_currency(Decimal::new(-5, 1), "$"), "-$0.50");
/// ```
#[must_use]
pub fn format_currency(amount: Decimal, symbol: &str) -> String {
    let rounded = round_money(amount);
    let negative = rounded.is_sign_negative() && !rounded.is_zero();
    let text = format!("{:.2}", rounded.abs());
    let (whole, frac) = text.split_once('.').unwrap_or((text.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    format!("{}{symbol}{grouped}.{frac}", if negative { "-" } else { "" })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_money_midpoint() {
        assert_eq!(round_money(Decimal::new(1005, 3)), Decimal::new(101, 2));
        assert_eq!(round_money(Decimal::new(-1005, 3)), Decimal::new(-101, 2));
    }

    #[test]
    fn test_max_amount_matches_column() {
        assert_eq!(MAX_AMOUNT.to_string(), "9999999999.99");
        assert!(fits_amount(MAX_AMOUNT));
        assert!(fits_amount(-MAX_AMOUNT));
        assert!(!fits_amount(MAX_AMOUNT + Decimal::new(1, 2)));
        assert!(!fits_amount(Decimal::MAX));
    }

    #[test]
    fn test_checked_subtotal() {
        let lines = [(Decimal::new(1250, 2), 3), (Decimal::new(5, 1), 1)];
        assert_eq!(checked_subtotal(lines), Some(Decimal::new(38, 0)));
        assert_eq!(checked_subtotal([]), Some(Decimal::ZERO));
        assert_eq!(checked_subtotal([(Decimal::MAX, 2)]), None);
        assert_eq!(checked_subtotal([(MAX_AMOUNT, 1), (Decimal::ONE, 1)]), None);
    }

    #[test]
    fn test_format_currency_grouping() {
        assert_eq!(format_currency(Decimal::ZERO, "₹"), "₹0.00");
        assert_eq!(format_currency(Decimal::new(999, 0), "₹"), "₹999.00");
        assert_eq!(format_currency(Decimal::new(1000, 0), "₹"), "₹1,000.00");
        assert_eq!(format_currency(Decimal::new(12_345_675, 3), ""), "12,345.68");
    }
}
