//! Money with precise decimal arithmetic
//!
//! This module provides a type-safe representation of monetary values using
//! rust_decimal. The system is single-currency: every amount is a plain
//! two-decimal value, rounded half-up where rounding is needed.

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub};

/// A monetary amount with two-decimal precision
///
/// Construction via [`Money::new`] rounds half-up immediately, so aggregate
/// identities over line items hold cent-for-cent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    /// Number of decimal places carried by every amount
    pub const SCALE: u32 = 2;

    /// Creates a new amount, rounded half-up to two decimals
    pub fn new(amount: Decimal) -> Self {
        Self(amount.round_dp_with_strategy(
            Self::SCALE,
            RoundingStrategy::MidpointAwayFromZero,
        ))
    }

    /// Creates an amount from minor units (e.g. pesewas/cents)
    pub fn from_minor(minor_units: i64) -> Self {
        Self(Decimal::new(minor_units, Self::SCALE))
    }

    /// The zero amount
    pub fn zero() -> Self {
        Self(dec!(0))
    }

    /// Returns the underlying decimal value
    pub fn amount(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_positive(&self) -> bool {
        self.0.is_sign_positive() && !self.0.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    /// Multiplies by a unitless factor (quantity, rate), then rounds
    pub fn multiply(&self, factor: Decimal) -> Self {
        Self::new(self.0 * factor)
    }

    /// Applies a percentage expressed as e.g. `80` for 80%, then rounds
    pub fn percentage(&self, percent: Decimal) -> Self {
        Self::new(self.0 * percent / dec!(100))
    }

    /// Returns the smaller of two amounts
    pub fn min(self, other: Money) -> Money {
        if self.0 <= other.0 {
            self
        } else {
            other
        }
    }

    /// Effective percentage of `self` against a base, for display aggregates
    pub fn percent_of(&self, base: Money) -> Decimal {
        if base.is_zero() {
            dec!(0)
        } else {
            (self.0 / base.0 * dec!(100)).round_dp_with_strategy(
                Self::SCALE,
                RoundingStrategy::MidpointAwayFromZero,
            )
        }
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl Add for Money {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self(self.0 + other.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        Self(self.0 - other.0)
    }
}

impl Neg for Money {
    type Output = Self;

    fn neg(self) -> Self {
        Self(-self.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

impl From<Decimal> for Money {
    fn from(amount: Decimal) -> Self {
        Self::new(amount)
    }
}
