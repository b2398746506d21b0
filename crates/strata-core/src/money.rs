//! # Money Module
//!
//! Fixed-point monetary types. No floating point anywhere.
//!
//! ## Two Scales
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Money     i64 cents             totals, allocations, valuation         │
//! │  UnitCost  i64 ten-thousandths   per-unit cost of a layer               │
//! │                                                                         │
//! │  Landed cost spreads $20.00 over 3 units = $6.6667 per unit.            │
//! │  Cents alone would lose the fraction on every future draw, so the       │
//! │  per-unit side keeps two extra digits and rounds once per extension:    │
//! │                                                                         │
//! │    UnitCost(66_667) × 3 units = 200_001 / 100 → Money(2000)             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use strata_core::money::{Money, UnitCost};
//!
//! let cost = UnitCost::from_cents(500);       // $5.00 per unit
//! assert_eq!(cost.extend(10), Money::from_cents(5000));
//!
//! let total = Money::from_cents(5000) + Money::from_cents(3500);
//! assert_eq!(total.cents(), 8500);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

/// Number of `UnitCost` units in one cent.
pub const UNIT_COST_PER_CENT: i64 = 100;

/// Number of `UnitCost` units in one whole currency unit.
pub const UNIT_COST_SCALE: i64 = 10_000;

/// Divides with rounding half away from zero.
///
/// Shared by both scales so every rounding step in the ledger behaves the same.
pub(crate) fn div_round(numerator: i128, denominator: i128) -> i128 {
    debug_assert!(denominator > 0);
    let half = denominator / 2;
    if numerator >= 0 {
        (numerator + half) / denominator
    } else {
        (numerator - half) / denominator
    }
}

// =============================================================================
// Money Type
// =============================================================================

/// Monetary value in the smallest currency unit (cents).
///
/// ## Design Decisions
/// - **i64 (signed)**: reversal records and revaluation deltas can be negative
/// - **Single field tuple struct**: zero-cost abstraction over i64
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(transparent))]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents.
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates a Money value from major and minor units (dollars and cents).
    ///
    /// ```rust
    /// use strata_core::money::Money;
    ///
    /// assert_eq!(Money::from_major_minor(20, 0).cents(), 2000);
    /// assert_eq!(Money::from_major_minor(-5, 50).cents(), -550);
    /// ```
    #[inline]
    pub const fn from_major_minor(major: i64, minor: i64) -> Self {
        if major < 0 {
            Money(major * 100 - minor)
        } else {
            Money(major * 100 + minor)
        }
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit (dollars) portion.
    #[inline]
    pub const fn dollars(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit (cents) portion (always 0-99).
    #[inline]
    pub const fn cents_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Spreads this amount over `quantity` units as a per-unit cost.
    ///
    /// ```rust
    /// use strata_core::money::{Money, UnitCost};
    ///
    /// // $5.00 of freight over 10 units = $0.50 per unit
    /// let per_unit = Money::from_cents(500).per_unit(10);
    /// assert_eq!(per_unit, UnitCost::from_cents(50));
    /// ```
    ///
    /// Returns zero for a non-positive quantity.
    pub fn per_unit(&self, quantity: i64) -> UnitCost {
        if quantity <= 0 {
            return UnitCost::zero();
        }
        let scaled = self.0 as i128 * UNIT_COST_PER_CENT as i128;
        UnitCost::from_raw(div_round(scaled, quantity as i128) as i64)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}${}.{:02}", sign, self.dollars().abs(), self.cents_part())
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
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Neg for Money {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Money(-self.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

// =============================================================================
// Unit Cost Type
// =============================================================================

/// Per-unit cost in ten-thousandths of a currency unit (4 decimal places).
///
/// `UnitCost::from_cents(550)` is $5.50 and is stored as `55_000`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(transparent))]
pub struct UnitCost(i64);

impl UnitCost {
    /// Creates a unit cost from its raw ten-thousandths value.
    #[inline]
    pub const fn from_raw(raw: i64) -> Self {
        UnitCost(raw)
    }

    /// Creates a unit cost from whole cents.
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        UnitCost(cents * UNIT_COST_PER_CENT)
    }

    /// Returns the raw ten-thousandths value.
    #[inline]
    pub const fn raw(&self) -> i64 {
        self.0
    }

    #[inline]
    pub const fn zero() -> Self {
        UnitCost(0)
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Extends the unit cost over a quantity, rounding to whole cents.
    ///
    /// ```rust
    /// use strata_core::money::{Money, UnitCost};
    ///
    /// assert_eq!(UnitCost::from_cents(700).extend(5), Money::from_cents(3500));
    /// // $0.3333 × 3 = $0.9999 → $1.00
    /// assert_eq!(UnitCost::from_raw(3_333).extend(3), Money::from_cents(100));
    /// ```
    pub fn extend(&self, quantity: i64) -> Money {
        let raw = self.0 as i128 * quantity as i128;
        Money::from_cents(div_round(raw, UNIT_COST_PER_CENT as i128) as i64)
    }

    /// Weighted average of `value` over `quantity` units.
    ///
    /// Returns `None` when there is no quantity to average over.
    pub fn average(value_raw: i128, quantity: i64) -> Option<UnitCost> {
        if quantity <= 0 {
            return None;
        }
        Some(UnitCost(div_round(value_raw, quantity as i128) as i64))
    }
}

impl fmt::Display for UnitCost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.abs();
        write!(
            f,
            "{}${}.{:04}",
            sign,
            abs / UNIT_COST_SCALE,
            abs % UNIT_COST_SCALE
        )
    }
}

impl Default for UnitCost {
    fn default() -> Self {
        UnitCost::zero()
    }
}

impl Add for UnitCost {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        UnitCost(self.0 + other.0)
    }
}

impl AddAssign for UnitCost {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for UnitCost {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        UnitCost(self.0 - other.0)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Money::from_cents(1099)), "$10.99");
        assert_eq!(format!("{}", Money::from_cents(-550)), "-$5.50");
        assert_eq!(format!("{}", UnitCost::from_cents(550)), "$5.5000");
        assert_eq!(format!("{}", UnitCost::from_raw(66_667)), "$6.6667");
    }

    #[test]
    fn test_extend_rounds_half_away_from_zero() {
        assert_eq!(UnitCost::from_raw(50).extend(1), Money::from_cents(1));
        assert_eq!(UnitCost::from_raw(49).extend(1), Money::from_cents(0));
        assert_eq!(UnitCost::from_raw(-50).extend(1), Money::from_cents(-1));
    }

    #[test]
    fn test_per_unit_spreads_fractional_cents() {
        // $20.00 over 3 units
        let per_unit = Money::from_cents(2000).per_unit(3);
        assert_eq!(per_unit.raw(), 66_667);
        assert_eq!(Money::from_cents(2000).per_unit(0), UnitCost::zero());
    }

    #[test]
    fn test_average() {
        // 10 @ $5.00 + 10 @ $7.00 → $6.00
        let value = UnitCost::from_cents(500).raw() as i128 * 10
            + UnitCost::from_cents(700).raw() as i128 * 10;
        assert_eq!(UnitCost::average(value, 20), Some(UnitCost::from_cents(600)));
        assert_eq!(UnitCost::average(value, 0), None);
    }

    #[test]
    fn test_money_sum() {
        let total: Money = [500, 1500, 5]
            .iter()
            .map(|c| Money::from_cents(*c))
            .sum();
        assert_eq!(total.cents(), 2005);
    }
}
