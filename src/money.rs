//! Non-negative decimal money with currency-checked arithmetic (spec §3, §4.1).

use crate::error::DomainError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 3-letter currency tag. Not a full ISO-4217 table (multi-currency conversion
/// is a non-goal) - just enough to keep arithmetic currency-checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Currency([u8; 3]);

impl Currency {
    pub const USD: Currency = Currency(*b"USD");
    pub const EUR: Currency = Currency(*b"EUR");
    pub const GBP: Currency = Currency(*b"GBP");

    pub fn parse(code: &str) -> Result<Self, DomainError> {
        let bytes = code.as_bytes();
        if bytes.len() != 3 || !bytes.iter().all(u8::is_ascii_uppercase) {
            return Err(DomainError::InvalidRequest(format!(
                "invalid currency code: {code}"
            )));
        }
        Ok(Currency([bytes[0], bytes[1], bytes[2]]))
    }

    /// Fractional digits for this currency. Non-goal: a full ISO-4217 digit
    /// table; everything modeled here uses 2, matching the spec's "exact
    /// 2-4 fractional digits" invariant with room for future 4-digit tags.
    pub fn fractional_digits(&self) -> u32 {
        2
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", std::str::from_utf8(&self.0).unwrap_or("???"))
    }
}

/// A non-negative amount of a single currency, exact to that currency's
/// fractional digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    amount: Decimal,
    currency: Currency,
}

impl Money {
    pub fn new(amount: Decimal, currency: Currency) -> Result<Self, DomainError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(DomainError::NegativeAmount);
        }
        let rounded = amount.round_dp(currency.fractional_digits());
        Ok(Money {
            amount: rounded,
            currency,
        })
    }

    pub fn zero(currency: Currency) -> Self {
        Money {
            amount: Decimal::ZERO,
            currency,
        }
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }

    pub fn is_positive(&self) -> bool {
        self.amount.is_sign_positive() && !self.amount.is_zero()
    }

    fn check_currency(&self, other: &Money) -> Result<(), DomainError> {
        if self.currency != other.currency {
            return Err(DomainError::CurrencyMismatch);
        }
        Ok(())
    }

    pub fn add(&self, other: &Money) -> Result<Money, DomainError> {
        self.check_currency(other)?;
        Money::new(self.amount + other.amount, self.currency)
    }

    pub fn subtract(&self, other: &Money) -> Result<Money, DomainError> {
        self.check_currency(other)?;
        if self.amount < other.amount {
            return Err(DomainError::InsufficientAmount);
        }
        Money::new(self.amount - other.amount, self.currency)
    }

    pub fn compare(&self, other: &Money) -> Result<std::cmp::Ordering, DomainError> {
        self.check_currency(other)?;
        Ok(self.amount.cmp(&other.amount))
    }

    pub fn multiply(&self, factor: Decimal) -> Result<Money, DomainError> {
        Money::new(self.amount * factor, self.currency)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.currency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usd(cents: i64) -> Money {
        Money::new(Decimal::new(cents, 2), Currency::USD).unwrap()
    }

    #[test]
    fn negative_amount_rejected() {
        let err = Money::new(Decimal::new(-100, 2), Currency::USD).unwrap_err();
        assert_eq!(err, DomainError::NegativeAmount);
    }

    #[test]
    fn currency_mismatch_on_add() {
        let a = usd(1000);
        let b = Money::new(Decimal::new(1000, 2), Currency::EUR).unwrap();
        assert_eq!(a.add(&b).unwrap_err(), DomainError::CurrencyMismatch);
    }

    #[test]
    fn subtract_more_than_available() {
        let a = usd(500);
        let b = usd(1000);
        assert_eq!(a.subtract(&b).unwrap_err(), DomainError::InsufficientAmount);
    }

    #[test]
    fn round_trip_add_subtract() {
        let a = usd(10000);
        let b = usd(3750);
        let sum = a.add(&b).unwrap();
        let back = sum.subtract(&b).unwrap();
        assert_eq!(back, a);
    }

    proptest::proptest! {
        #[test]
        fn add_then_subtract_is_identity(x in 0i64..1_000_000, y in 0i64..1_000_000) {
            let a = Money::new(Decimal::new(x, 2), Currency::USD).unwrap();
            let b = Money::new(Decimal::new(y, 2), Currency::USD).unwrap();
            let sum = a.add(&b).unwrap();
            let back = sum.subtract(&b).unwrap();
            proptest::prop_assert_eq!(back, a);
        }
    }
}
