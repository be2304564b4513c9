//! Money type for cart and order totals.
//!
//! The API speaks floating point prices; totals are accumulated in the
//! smallest currency unit so that summing many lines does not drift.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Mul};

/// Supported currencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Currency {
    #[default]
    PHP,
    USD,
}

impl Currency {
    /// Get the currency code (e.g., "PHP").
    pub fn code(&self) -> &'static str {
        match self {
            Currency::PHP => "PHP",
            Currency::USD => "USD",
        }
    }

    /// Get the currency symbol.
    pub fn symbol(&self) -> &'static str {
        match self {
            Currency::PHP => "\u{20b1}",
            Currency::USD => "$",
        }
    }

    /// Parse a currency code string.
    pub fn from_code(code: &str) -> Option<Self> {
        match code.to_uppercase().as_str() {
            "PHP" => Some(Currency::PHP),
            "USD" => Some(Currency::USD),
            _ => None,
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// A monetary value with currency, stored in cents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Money {
    /// Amount in smallest currency unit.
    pub amount_cents: i64,
    /// The currency.
    pub currency: Currency,
}

impl Money {
    /// Create a new Money value from cents.
    pub fn new(amount_cents: i64, currency: Currency) -> Self {
        Self {
            amount_cents,
            currency,
        }
    }

    /// Create a Money value from a decimal API price.
    ///
    /// ```
    /// use bazaar_commerce::money::{Money, Currency};
    /// let price = Money::from_decimal(49.99, Currency::PHP);
    /// assert_eq!(price.amount_cents, 4999);
    /// ```
    pub fn from_decimal(amount: f64, currency: Currency) -> Self {
        if !amount.is_finite() {
            return Self::zero(currency);
        }
        Self::new((amount * 100.0).round() as i64, currency)
    }

    /// Create a zero amount in the given currency.
    pub fn zero(currency: Currency) -> Self {
        Self::new(0, currency)
    }

    /// Check if this is zero.
    pub fn is_zero(&self) -> bool {
        self.amount_cents == 0
    }

    /// Convert back to a decimal value.
    pub fn to_decimal(&self) -> f64 {
        self.amount_cents as f64 / 100.0
    }

    /// Format as a display string (e.g., "₱49.99").
    pub fn display(&self) -> String {
        format!("{}{:.2}", self.currency.symbol(), self.to_decimal())
    }

    /// Saturating sum of an iterator of values in one currency.
    pub fn sum(iter: impl Iterator<Item = Money>, currency: Currency) -> Money {
        iter.fold(Money::zero(currency), |acc, m| acc + m)
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, other: Money) -> Money {
        Money::new(
            self.amount_cents.saturating_add(other.amount_cents),
            self.currency,
        )
    }
}

impl Mul<i64> for Money {
    type Output = Money;

    fn mul(self, factor: i64) -> Money {
        Money::new(self.amount_cents.saturating_mul(factor), self.currency)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_money_from_decimal() {
        let m = Money::from_decimal(0.1 + 0.2, Currency::PHP);
        assert_eq!(m.amount_cents, 30);
        assert!(Money::from_decimal(f64::NAN, Currency::PHP).is_zero());
    }

    #[test]
    fn test_money_display() {
        assert_eq!(Money::new(4999, Currency::USD).display(), "$49.99");
        assert_eq!(Money::new(5000, Currency::PHP).display(), "\u{20b1}50.00");
    }

    #[test]
    fn test_money_sum_and_multiply() {
        let unit = Money::from_decimal(12.5, Currency::PHP);
        let total = Money::sum([unit * 2, unit].into_iter(), Currency::PHP);
        assert_eq!(total.amount_cents, 3750);
    }

    #[test]
    fn test_currency_from_code() {
        assert_eq!(Currency::from_code("php"), Some(Currency::PHP));
        assert_eq!(Currency::from_code("EUR"), None);
    }
}
