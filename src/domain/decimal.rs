//! Lossless decimal numeric type backed by rust_decimal.
//!
//! Volumes, prices, percentages and costs all flow through this type so that
//! allocation conservation and cost totals are exact.

use rust_decimal::Decimal as RustDecimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::str::FromStr;

/// Lossless decimal numeric type for volume and cost calculations.
///
/// Serializes to a JSON number (not string).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Decimal(#[serde(with = "rust_decimal::serde::float")] RustDecimal);

impl Decimal {
    pub fn new(value: RustDecimal) -> Self {
        Decimal(value)
    }

    /// Parse a Decimal from a string losslessly.
    ///
    /// # Errors
    /// Returns an error if the string is not a valid decimal number.
    pub fn from_str_canonical(s: &str) -> Result<Self, rust_decimal::Error> {
        RustDecimal::from_str(s.trim()).map(Decimal)
    }

    /// Format the Decimal as a canonical string (no exponent notation, no trailing zeros).
    pub fn to_canonical_string(&self) -> String {
        format!("{}", self.0.normalize())
    }

    pub fn zero() -> Self {
        Decimal(RustDecimal::ZERO)
    }

    pub fn one() -> Self {
        Decimal(RustDecimal::ONE)
    }

    pub fn hundred() -> Self {
        Decimal(RustDecimal::ONE_HUNDRED)
    }

    pub fn from_i64(value: i64) -> Self {
        Decimal(RustDecimal::from(value))
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Returns true if the value is > 0.
    pub fn is_positive(&self) -> bool {
        !self.is_zero() && self.0.is_sign_positive()
    }

    /// Returns true if the value is < 0.
    pub fn is_negative(&self) -> bool {
        !self.is_zero() && self.0.is_sign_negative()
    }

    /// Division that yields `None` for a zero divisor instead of panicking.
    pub fn checked_div(&self, rhs: Decimal) -> Option<Decimal> {
        self.0.checked_div(rhs.0).map(Decimal)
    }

    /// `None` when the result leaves the 96-bit mantissa range.
    pub fn checked_add(&self, rhs: Decimal) -> Option<Decimal> {
        self.0.checked_add(rhs.0).map(Decimal)
    }

    pub fn checked_sub(&self, rhs: Decimal) -> Option<Decimal> {
        self.0.checked_sub(rhs.0).map(Decimal)
    }

    pub fn checked_mul(&self, rhs: Decimal) -> Option<Decimal> {
        self.0.checked_mul(rhs.0).map(Decimal)
    }

    pub fn saturating_add(&self, rhs: Decimal) -> Decimal {
        Decimal(self.0.saturating_add(rhs.0))
    }

    /// Sum of `values`, or `None` if any partial sum overflows.
    pub fn checked_sum<I: IntoIterator<Item = Decimal>>(values: I) -> Option<Decimal> {
        values
            .into_iter()
            .try_fold(Decimal::zero(), |acc, v| acc.checked_add(v))
    }

    /// Round to `dp` decimal places (banker's rounding).
    pub fn round_dp(&self, dp: u32) -> Self {
        Decimal(self.0.round_dp(dp))
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_canonical_string())
    }
}

impl FromStr for Decimal {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_str_canonical(s)
    }
}

impl From<RustDecimal> for Decimal {
    fn from(value: RustDecimal) -> Self {
        Decimal(value)
    }
}

impl From<Decimal> for RustDecimal {
    fn from(value: Decimal) -> Self {
        value.0
    }
}

impl From<i64> for Decimal {
    fn from(value: i64) -> Self {
        Decimal::from_i64(value)
    }
}

// Arithmetic operations
impl std::ops::Add for Decimal {
    type Output = Decimal;

    fn add(self, rhs: Decimal) -> Decimal {
        Decimal(self.0 + rhs.0)
    }
}

impl std::ops::AddAssign for Decimal {
    fn add_assign(&mut self, rhs: Decimal) {
        self.0 += rhs.0;
    }
}

impl std::ops::Sub for Decimal {
    type Output = Decimal;

    fn sub(self, rhs: Decimal) -> Decimal {
        Decimal(self.0 - rhs.0)
    }
}

impl std::ops::Mul for Decimal {
    type Output = Decimal;

    fn mul(self, rhs: Decimal) -> Decimal {
        Decimal(self.0 * rhs.0)
    }
}

impl std::ops::Div for Decimal {
    type Output = Decimal;

    fn div(self, rhs: Decimal) -> Decimal {
        Decimal(self.0 / rhs.0)
    }
}

impl Sum for Decimal {
    fn sum<I: Iterator<Item = Decimal>>(iter: I) -> Decimal {
        iter.fold(Decimal::zero(), |acc, d| acc + d)
    }
}

impl<'a> Sum<&'a Decimal> for Decimal {
    fn sum<I: Iterator<Item = &'a Decimal>>(iter: I) -> Decimal {
        iter.fold(Decimal::zero(), |acc, d| acc + *d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    #[test]
    fn test_decimal_canonical_strips_trailing_zeros() {
        assert_eq!(d("600.00").to_canonical_string(), "600");
        assert_eq!(d("0.250").to_canonical_string(), "0.25");
        assert_eq!(d(" 42 ").to_canonical_string(), "42");
    }

    #[test]
    fn test_decimal_arithmetic() {
        let a = d("10.5");
        let b = d("2.5");

        assert_eq!((a + b).to_canonical_string(), "13");
        assert_eq!((a - b).to_canonical_string(), "8");
        assert_eq!((a * b).to_canonical_string(), "26.25");
        assert_eq!((a / b).to_canonical_string(), "4.2");
    }

    #[test]
    fn test_decimal_checked_div_by_zero() {
        assert_eq!(d("10").checked_div(Decimal::zero()), None);
        assert_eq!(d("10").checked_div(d("4")), Some(d("2.5")));
    }

    #[test]
    fn test_decimal_checked_ops_report_overflow() {
        let big = d("60000000000000000000000000000");
        assert_eq!(big.checked_add(big), None);
        assert_eq!(big.checked_mul(d("2")), None);
        assert_eq!(Decimal::zero().checked_sub(big).and_then(|n| n.checked_sub(big)), None);
        assert_eq!(big.checked_add(d("1")), Some(d("60000000000000000000000000001")));
        assert_eq!(d("1.5").checked_mul(d("4")), Some(d("6")));

        assert_eq!(Decimal::checked_sum([big, big]), None);
        assert_eq!(Decimal::checked_sum([d("1"), d("2.5")]), Some(d("3.5")));
        assert_eq!(Decimal::checked_sum(Vec::new()), Some(Decimal::zero()));
        assert!(big.saturating_add(big) > big);
    }

    #[test]
    fn test_decimal_percentages_are_exact() {
        // 1000 * 60% + 1000 * 40% must add back to 1000 with no drift.
        let raw = d("1000");
        let a = raw * (d("60") / Decimal::hundred());
        let b = raw * (d("40") / Decimal::hundred());
        assert_eq!(a + b, raw);

        let third = d("33.3333");
        let total: Decimal = [third, third, third].iter().sum();
        assert_eq!(total, d("99.9999"));
    }

    #[test]
    fn test_decimal_sign_helpers() {
        assert!(d("1").is_positive());
        assert!(d("-1").is_negative());
        assert!(!Decimal::zero().is_positive());
        assert!(!Decimal::zero().is_negative());
    }

    #[test]
    fn test_decimal_round_dp() {
        assert_eq!(d("12.3456").round_dp(2), d("12.35"));
        assert_eq!(d("-8.333333").round_dp(2), d("-8.33"));
    }

    #[test]
    fn test_decimal_json_serialization() {
        let decimal = d("123.456");
        let json = serde_json::to_value(decimal).unwrap();
        assert!(json.is_number());
        assert_eq!(json.to_string(), "123.456");

        let parsed: Decimal = serde_json::from_str("1500").unwrap();
        assert_eq!(parsed, d("1500"));
    }

    #[test]
    fn test_decimal_ordering() {
        assert!(d("10") < d("20"));
        assert_eq!(d("10"), d("10.0"));
    }
}
