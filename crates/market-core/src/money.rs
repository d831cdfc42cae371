//! # Money Module
//!
//! Provides the `Money` type for monetary values.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Prices in this marketplace are quoted in whole currency units          │
//! │  (supplier feeds carry `price: 110000`, never fractions).               │
//! │                                                                         │
//! │  Storing them as i64 means:                                             │
//! │    • sums over thousands of basket lines are exact                      │
//! │    • the database column, the JSON field and the Rust value agree       │
//! │    • no rounding policy is needed anywhere in the pipeline             │
//! │                                                                         │
//! │  Arithmetic saturates instead of overflowing; price lists are capped    │
//! │  at MAX_PRICE so real totals never reach the bound.                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use market_core::money::Money;
//!
//! let price = Money::from_units(65_000);
//! let line_total = price * 2;
//! assert_eq!(line_total.units(), 130_000);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul};

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in whole currency units.
///
/// Serializes as a bare integer so API payloads read `"price": 65000`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(transparent))]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from whole currency units.
    #[inline]
    pub const fn from_units(units: i64) -> Self {
        Money(units)
    }

    /// Returns the value in whole currency units.
    #[inline]
    pub const fn units(&self) -> i64 {
        self.0
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is negative.
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Multiplies a unit price by a quantity, saturating at the `i64` bounds.
    ///
    /// ## Example
    /// ```rust
    /// use market_core::money::Money;
    ///
    /// let unit_price = Money::from_units(299);
    /// assert_eq!(unit_price.multiply_quantity(3).units(), 897);
    /// ```
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0.saturating_mul(qty))
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0.saturating_add(other.0))
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 = self.0.saturating_add(other.0);
    }
}

/// Multiplication by a quantity.
impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        self.multiply_quantity(qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), Add::add)
    }
}

impl From<i64> for Money {
    fn from(units: i64) -> Self {
        Money(units)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
