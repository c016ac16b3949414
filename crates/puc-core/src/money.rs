//! Integer-cent money amounts.
//!
//! Every balance in the ledger is a whole number of cents. Arithmetic is checked so an
//! overflow or a negative result surfaces as an error instead of wrapping.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;

/// Non-negative amount of money in cents.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(u64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn from_cents(cents: u64) -> Self {
        Self(cents)
    }

    /// Whole-dollar constructor. Saturates instead of overflowing.
    pub const fn from_dollars(dollars: u64) -> Self {
        Self(dollars.saturating_mul(100))
    }

    pub const fn cents(self) -> u64 {
        self.0
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }

    pub fn checked_sub(self, other: Money) -> Option<Money> {
        self.0.checked_sub(other.0).map(Money)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}.{:02}", self.0 / 100, self.0 % 100)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        Money(iter.fold(0u64, |acc, m| acc.saturating_add(m.0)))
    }
}

impl Sum<Money> for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        Money(iter.fold(0u64, |acc, m| acc.saturating_add(m.0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn displays_dollars_and_cents() {
        assert_eq!(Money::from_cents(0).to_string(), "$0.00");
        assert_eq!(Money::from_cents(505).to_string(), "$5.05");
        assert_eq!(Money::from_dollars(250).to_string(), "$250.00");
    }

    #[test]
    fn checked_sub_refuses_negative() {
        assert_eq!(Money::from_dollars(3).checked_sub(Money::from_dollars(5)), None);
        assert_eq!(
            Money::from_dollars(5).checked_sub(Money::from_dollars(3)),
            Some(Money::from_dollars(2))
        );
    }

    #[test]
    fn sums_references() {
        let amounts = [Money::from_dollars(5), Money::from_cents(250)];
        assert_eq!(amounts.iter().sum::<Money>(), Money::from_cents(750));
    }
}
