//! Price display helpers.
//!
//! Prices are carried as [`rust_decimal::Decimal`] end to end. The client never
//! computes line or cart totals; it only formats amounts the server sent.

use rust_decimal::Decimal;

/// Format an amount for display (e.g. `$19.99`).
///
/// Whole amounts drop the cents (`$20` rather than `$20.00`), matching the
/// storefront's price tags.
#[must_use]
pub fn format_price(amount: Decimal) -> String {
    let rounded = amount.round_dp(2);
    if rounded.fract().is_zero() {
        format!("${}", rounded.trunc())
    } else {
        format!("${rounded:.2}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_whole_amount_drops_cents() {
        assert_eq!(format_price(Decimal::new(2000, 2)), "$20");
        assert_eq!(format_price(Decimal::ZERO), "$0");
    }

    #[test]
    fn test_format_fractional_amount() {
        assert_eq!(format_price(Decimal::new(1999, 2)), "$19.99");
        assert_eq!(format_price(Decimal::new(125, 1)), "$12.50");
    }

    #[test]
    fn test_format_rounds_to_cents() {
        assert_eq!(format_price(Decimal::new(10_005, 3)), "$10");
        assert_eq!(format_price(Decimal::new(10_015, 3)), "$10.02");
    }
}
