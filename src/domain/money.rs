//! Monetary amounts in the single ledger currency.
//!
//! Backed by rust_decimal to avoid floating-point drift. All rounding of
//! derived amounts goes through [`Money::round2`] (2 decimal places,
//! half-up) so commission math is reproducible across platforms.

use rust_decimal::{Decimal as RustDecimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A monetary amount in the ledger currency.
///
/// Serializes to a JSON number by default; API DTOs format amounts as
/// canonical strings instead.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Money(#[serde(with = "rust_decimal::serde::float")] RustDecimal);

impl Money {
    pub fn new(value: RustDecimal) -> Self {
        Money(value)
    }

    /// Parse an amount from a string losslessly.
    ///
    /// # Errors
    /// Returns an error if the string is not a valid decimal number.
    pub fn from_str_canonical(s: &str) -> Result<Self, rust_decimal::Error> {
        RustDecimal::from_str(s).map(Money)
    }

    /// Format as a canonical string (no exponent notation, no trailing zeros).
    pub fn to_canonical_string(&self) -> String {
        format!("{}", self.0.normalize())
    }

    pub fn inner(&self) -> RustDecimal {
        self.0
    }

    pub fn zero() -> Self {
        Money(RustDecimal::ZERO)
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_positive(&self) -> bool {
        !self.is_zero() && self.0.is_sign_positive()
    }

    pub fn is_negative(&self) -> bool {
        !self.is_zero() && self.0.is_sign_negative()
    }

    pub fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Round to 2 decimal places, half-up (midpoint away from zero).
    pub fn round2(&self) -> Self {
        Money(
            self.0
                .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero),
        )
    }

    /// Apply a percentage rate to this amount, rounded to 2 decimal places.
    ///
    /// `Money::from_str_canonical("10000")?.percent(rate_10)` == 1000.00.
    pub fn percent(&self, rate: Money) -> Self {
        Money(self.0 * rate.0 / RustDecimal::ONE_HUNDRED).round2()
    }

    /// Clamp into `[lo, hi]`.
    pub fn clamp(&self, lo: Money, hi: Money) -> Self {
        if *self < lo {
            lo
        } else if *self > hi {
            hi
        } else {
            *self
        }
    }

    pub fn min(self, other: Money) -> Self {
        if self <= other {
            self
        } else {
            other
        }
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_canonical_string())
    }
}

impl FromStr for Money {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_str_canonical(s)
    }
}

impl From<RustDecimal> for Money {
    fn from(value: RustDecimal) -> Self {
        Money(value)
    }
}

impl From<Money> for RustDecimal {
    fn from(value: Money) -> Self {
        value.0
    }
}

impl From<i64> for Money {
    fn from(value: i64) -> Self {
        Money(RustDecimal::from(value))
    }
}

impl std::ops::Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl std::ops::Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Money {
        Money(self.0 - rhs.0)
    }
}

impl std::ops::Mul for Money {
    type Output = Money;

    fn mul(self, rhs: Money) -> Money {
        Money(self.0 * rhs.0)
    }
}

impl std::ops::Neg for Money {
    type Output = Money;

    fn neg(self) -> Money {
        Money(-self.0)
    }
}

impl std::ops::AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        self.0 += rhs.0;
    }
}

impl std::ops::SubAssign for Money {
    fn sub_assign(&mut self, rhs: Money) {
        self.0 -= rhs.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(s: &str) -> Money {
        Money::from_str_canonical(s).unwrap()
    }

    #[test]
    fn test_parse_roundtrip() {
        for s in ["123.45", "0.01", "1000000", "-42.5", "0"] {
            let amount = m(s);
            let reparsed = m(&amount.to_canonical_string());
            assert_eq!(amount, reparsed, "roundtrip failed for {}", s);
        }
    }

    #[test]
    fn test_round2_half_up() {
        assert_eq!(m("1.005").round2(), m("1.01"));
        assert_eq!(m("1.004").round2(), m("1.00"));
        assert_eq!(m("2.675").round2(), m("2.68"));
        assert_eq!(m("-1.005").round2(), m("-1.01"));
    }

    #[test]
    fn test_percent() {
        assert_eq!(m("10000").percent(m("10")), m("1000"));
        assert_eq!(m("9000").percent(m("2")), m("180"));
        assert_eq!(m("33.33").percent(m("7.5")), m("2.5"));
    }

    #[test]
    fn test_canonical_no_exponent() {
        let formatted = m("1000").to_canonical_string();
        assert!(!formatted.contains('e'));
        assert_eq!(formatted, "1000");
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(m("10.5") + m("2.5"), m("13"));
        assert_eq!(m("10.5") - m("2.5"), m("8"));
        assert_eq!(m("10") * m("0.5"), m("5"));
    }

    #[test]
    fn test_clamp_and_min() {
        assert_eq!(m("15").clamp(Money::zero(), m("10")), m("10"));
        assert_eq!(m("-1").clamp(Money::zero(), m("10")), Money::zero());
        assert_eq!(m("3").min(m("7")), m("3"));
    }

    #[test]
    fn test_signs() {
        assert!(m("1").is_positive());
        assert!(m("-1").is_negative());
        assert!(Money::zero().is_zero());
        assert!(!Money::zero().is_positive());
    }
}
