//! Points value object for loyalty amounts.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Sub};

use crate::domain::shared::DomainError;

/// Number of fractional digits a point amount carries.
pub const POINTS_SCALE: u32 = 2;

/// An amount of loyalty points.
///
/// Backed by a `Decimal` so repeated credits never drift. Amounts are kept at
/// two fractional digits; persistence stores them as integer minor units
/// (hundredths of a point).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Decimal", into = "Decimal")]
pub struct Points(Decimal);

impl Points {
    /// Zero amount.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Create a Points value from a Decimal, rounded to two places.
    #[must_use]
    pub fn new(amount: Decimal) -> Self {
        Self(amount.round_dp(POINTS_SCALE))
    }

    /// Create a Points value from whole points.
    #[must_use]
    pub fn whole(points: i64) -> Self {
        Self(Decimal::from(points))
    }

    /// Create a Points value from minor units (hundredths).
    #[must_use]
    pub fn from_minor_units(minor: i64) -> Self {
        Self(Decimal::new(minor, POINTS_SCALE))
    }

    /// Convert to minor units (hundredths).
    ///
    /// # Errors
    ///
    /// Returns error if the amount does not fit in an `i64`.
    pub fn to_minor_units(&self) -> Result<i64, DomainError> {
        (self.0 * Decimal::ONE_HUNDRED)
            .round()
            .to_i64()
            .ok_or_else(|| DomainError::invalid_value("points", format!("{} is out of range", self.0)))
    }

    /// Get the inner Decimal value.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Returns true if this amount is positive.
    #[must_use]
    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    /// Returns true if this amount is negative.
    #[must_use]
    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }

    /// Returns true if this amount is zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Subtract, returning `None` if the result would be negative.
    #[must_use]
    pub fn checked_debit(self, amount: Self) -> Option<Self> {
        let remaining = self.0 - amount.0;
        (remaining >= Decimal::ZERO).then_some(Self(remaining))
    }

    /// Validate an amount that may be credited (zero allowed).
    ///
    /// # Errors
    ///
    /// Returns error if the amount is negative.
    pub fn validate_credit(&self) -> Result<(), DomainError> {
        if self.is_negative() {
            return Err(DomainError::invalid_value(
                "amount",
                "credit amount cannot be negative",
            ));
        }
        Ok(())
    }

    /// Validate an amount that may be withdrawn.
    ///
    /// # Errors
    ///
    /// Returns error unless the amount is strictly positive.
    pub fn validate_withdrawal(&self) -> Result<(), DomainError> {
        if !self.is_positive() {
            return Err(DomainError::invalid_value(
                "sum",
                "withdrawal amount must be positive",
            ));
        }
        Ok(())
    }
}

impl Default for Points {
    fn default() -> Self {
        Self::ZERO
    }
}

impl fmt::Display for Points {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl PartialOrd for Points {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Points {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

impl Add for Points {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Points {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl From<Decimal> for Points {
    fn from(value: Decimal) -> Self {
        Self::new(value)
    }
}

impl From<Points> for Decimal {
    fn from(value: Points) -> Self {
        value.0
    }
}
