use crate::error::BookingError;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A monetary value in the storefront's single currency.
///
/// This is a wrapper around `rust_decimal::Decimal` so prices never pass through
/// binary floating point on their way to the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    pub fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    /// A nightly price, which must be strictly positive.
    pub fn price(value: Decimal) -> Result<Self, BookingError> {
        if value > Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(BookingError::ValidationError(
                "Price must be positive".to_string(),
            ))
        }
    }

    /// Price of `nights` nights. Fails instead of overflowing.
    pub fn checked_mul(self, nights: u32) -> Result<Self, BookingError> {
        self.0
            .checked_mul(Decimal::from(nights))
            .map(Self)
            .ok_or_else(|| {
                BookingError::ValidationError(format!(
                    "Total for {nights} nights at {} is out of range",
                    self.0
                ))
            })
    }

    /// Amount in cents, the unit payment gateways charge in.
    pub fn to_minor_units(&self) -> Result<i64, BookingError> {
        self.0
            .checked_mul(Decimal::ONE_HUNDRED)
            .map(|cents| cents.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))
            .and_then(|cents| cents.to_i64())
            .ok_or_else(|| {
                BookingError::ValidationError(format!("Amount {} out of range", self.0))
            })
    }
}

impl TryFrom<Decimal> for Money {
    type Error = BookingError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::price(value)
    }
}

impl From<Money> for Decimal {
    fn from(money: Money) -> Self {
        money.0
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_price_validation() {
        assert!(Money::price(dec!(1.0)).is_ok());
        assert!(matches!(
            Money::price(dec!(0.0)),
            Err(BookingError::ValidationError(_))
        ));
        assert!(matches!(
            Money::price(dec!(-12.5)),
            Err(BookingError::ValidationError(_))
        ));
    }

    #[test]
    fn test_nightly_multiplication() {
        let nightly = Money::new(dec!(89.90));
        assert_eq!(nightly.checked_mul(3).unwrap(), Money::new(dec!(269.70)));
    }

    #[test]
    fn test_multiplication_overflow_is_an_error() {
        let huge = Money::new(Decimal::MAX);
        assert!(matches!(
            huge.checked_mul(2),
            Err(BookingError::ValidationError(_))
        ));
        assert!(matches!(
            huge.to_minor_units(),
            Err(BookingError::ValidationError(_))
        ));
    }

    #[test]
    fn test_minor_units() {
        assert_eq!(Money::new(dec!(120)).to_minor_units().unwrap(), 12000);
        assert_eq!(Money::new(dec!(10.005)).to_minor_units().unwrap(), 1001);
        assert_eq!(Money::new(dec!(0.01)).to_minor_units().unwrap(), 1);
    }

    #[test]
    fn test_display_two_decimals() {
        assert_eq!(Money::new(dec!(200)).to_string(), "200.00");
        assert_eq!(Money::new(dec!(1.5)).to_string(), "1.50");
    }
}
