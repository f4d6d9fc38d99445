//! Price arithmetic shared by every place that totals a cart line.
//!
//! Product prices are decimal amounts in the store currency's standard unit.
//! Discounts are whole percentages. The discounted unit price is rounded to
//! a whole unit with midpoint-away-from-zero rounding; this rule is the wire
//! contract with the backend and must be applied identically in the cart
//! summary, at checkout, and around the merge.

use rust_decimal::{Decimal, RoundingStrategy};

/// Unit price of a product after applying its percentage discount.
///
/// A discount of zero leaves the price untouched (no rounding). A positive
/// discount yields `round(price × (1 − discount/100))` rounded to a whole
/// unit, half away from zero.
#[must_use]
pub fn discounted_unit_price(price: Decimal, discount: u32) -> Decimal {
    if discount == 0 {
        return price;
    }

    let factor = Decimal::from(100u32.saturating_sub(discount)) / Decimal::from(100u32);
    (price * factor).round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_discount_is_identity() {
        let price = Decimal::new(49950, 2); // 499.50
        assert_eq!(discounted_unit_price(price, 0), price);
    }

    #[test]
    fn test_discount_rounds_to_whole_unit() {
        // 1000 at 10% off -> 900
        assert_eq!(
            discounted_unit_price(Decimal::from(1000), 10),
            Decimal::from(900)
        );
        // 999 at 15% off -> 849.15 -> 849
        assert_eq!(
            discounted_unit_price(Decimal::from(999), 15),
            Decimal::from(849)
        );
    }

    #[test]
    fn test_discount_midpoint_rounds_away_from_zero() {
        // 25 at 50% off -> 12.5 -> 13
        assert_eq!(
            discounted_unit_price(Decimal::from(25), 50),
            Decimal::from(13)
        );
    }

    #[test]
    fn test_full_discount_is_free() {
        assert_eq!(
            discounted_unit_price(Decimal::from(750), 100),
            Decimal::ZERO
        );
    }

    #[test]
    fn test_discount_above_hundred_saturates() {
        assert_eq!(
            discounted_unit_price(Decimal::from(750), 120),
            Decimal::ZERO
        );
    }
}
