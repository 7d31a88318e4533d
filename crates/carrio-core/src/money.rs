//! Monetary rounding helpers

use rust_decimal::{Decimal, RoundingStrategy};

/// Round to cents, half away from zero
#[inline]
pub fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// `value * percent / 100`, unrounded
#[inline]
pub fn percent_of(value: Decimal, percent: Decimal) -> Decimal {
    value * percent / Decimal::ONE_HUNDRED
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_round2_half_away_from_zero() {
        assert_eq!(round2(dec!(6.645)), dec!(6.65));
        assert_eq!(round2(dec!(6.644)), dec!(6.64));
        assert_eq!(round2(dec!(-1.005)), dec!(-1.01));
    }

    #[test]
    fn test_percent_of() {
        assert_eq!(percent_of(dec!(5.00), dec!(22)), dec!(1.10));
        assert_eq!(percent_of(dec!(10), dec!(0)), dec!(0));
    }
}
