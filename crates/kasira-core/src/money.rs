//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely, plus the
//! discount model used by the reservation cart.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In floating point:                                                     │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Rupiah                                           │
//! │    Prices are whole rupiah (no minor unit in circulation), stored as    │
//! │    i64. Percentage discounts use integer math with explicit rounding.   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};

// =============================================================================
// Money Type
// =============================================================================

/// Represents a monetary value in whole rupiah.
///
/// ## Design Decisions
/// - **i64 (signed)**: Allows negative values for refunds and over-discounts.
///   A nominal discount larger than the subtotal legitimately produces a
///   negative total; this layer does not clamp it (see DESIGN.md).
/// - **Single field tuple struct**: Zero-cost abstraction over i64
/// - **Derives**: Full serde support for JSON serialization
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from whole rupiah.
    #[inline]
    pub const fn new(amount: i64) -> Self {
        Money(amount)
    }

    /// Returns the raw amount.
    #[inline]
    pub const fn amount(&self) -> i64 {
        self.0
    }

    /// Zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is positive (greater than zero).
    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Returns the absolute value.
    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Multiplies money by a quantity.
    ///
    /// ## Example
    /// ```rust
    /// use kasira_core::money::Money;
    ///
    /// let unit_price = Money::new(19_000);
    /// let line_total = unit_price.multiply_quantity(3);
    /// assert_eq!(line_total.amount(), 57_000);
    /// ```
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// Calculates a whole-percent share of this amount, rounding half up.
    ///
    /// ## Implementation
    /// Integer math in i128 to prevent overflow on large amounts:
    /// `(amount * pct + 50) / 100`
    ///
    /// ## Example
    /// ```rust
    /// use kasira_core::money::Money;
    ///
    /// let subtotal = Money::new(95_000);
    /// assert_eq!(subtotal.percentage(10).amount(), 9_500);
    /// ```
    pub fn percentage(&self, pct: u32) -> Money {
        let share = (self.0 as i128 * pct as i128 + 50) / 100;
        Money(share as i64)
    }
}

// =============================================================================
// Discount
// =============================================================================

/// A discount applied against a cart subtotal.
///
/// The discount type is part of the value: a flat amount (`Nominal`) or a
/// whole-percent share of the subtotal (`Percentage`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Discount {
    /// Flat amount off the subtotal.
    Nominal(Money),
    /// Whole-percent share of the subtotal (10 = 10%).
    Percentage(u32),
}

impl Discount {
    /// Computes the discount amount for a given subtotal.
    ///
    /// The result is never negative. It is deliberately NOT clamped above
    /// the subtotal: a nominal discount can exceed it and drive the total
    /// negative (the layer above decides what to do with that).
    pub fn amount_on(&self, subtotal: Money) -> Money {
        let raw = match self {
            Discount::Nominal(amount) => *amount,
            Discount::Percentage(pct) => subtotal.percentage(*pct),
        };
        if raw.is_negative() {
            Money::zero()
        } else {
            raw
        }
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Display implementation shows money in a human-readable format.
///
/// ## Note
/// This is for logs and receipts in tests. The UI layer owns real
/// localization.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}Rp{}", sign, group_thousands(self.0.unsigned_abs()))
    }
}

/// Groups digits with dots, Indonesian style: 95000 -> "95.000".
fn group_thousands(mut n: u64) -> String {
    if n == 0 {
        return "0".to_string();
    }
    let mut groups = Vec::new();
    while n > 0 {
        groups.push((n % 1000) as u16);
        n /= 1000;
    }
    let mut out = String::new();
    for (i, g) in groups.iter().rev().enumerate() {
        if i == 0 {
            out.push_str(&g.to_string());
        } else {
            out.push_str(&format!(".{:03}", g));
        }
    }
    out
}

/// Default money is zero.
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

/// Multiplication by i64 (for quantity calculations).
impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_and_amount() {
        let money = Money::new(95_000);
        assert_eq!(money.amount(), 95_000);
    }

    #[test]
    fn test_display_grouping() {
        assert_eq!(format!("{}", Money::new(95_000)), "Rp95.000");
        assert_eq!(format!("{}", Money::new(1_250_000)), "Rp1.250.000");
        assert_eq!(format!("{}", Money::new(500)), "Rp500");
        assert_eq!(format!("{}", Money::new(-5_000)), "-Rp5.000");
        assert_eq!(format!("{}", Money::new(0)), "Rp0");
    }

    #[test]
    fn test_arithmetic() {
        let a = Money::new(10_000);
        let b = Money::new(4_000);

        assert_eq!((a + b).amount(), 14_000);
        assert_eq!((a - b).amount(), 6_000);
        assert_eq!((a * 3).amount(), 30_000);
    }

    #[test]
    fn test_percentage_discount_from_spec() {
        // subtotal=95.000, 10% -> 9.500
        let subtotal = Money::new(95_000);
        let discount = Discount::Percentage(10);
        assert_eq!(discount.amount_on(subtotal).amount(), 9_500);
    }

    #[test]
    fn test_nominal_discount_from_spec() {
        // subtotal=95.000, nominal 5.000 -> total 90.000
        let subtotal = Money::new(95_000);
        let discount = Discount::Nominal(Money::new(5_000));
        let amount = discount.amount_on(subtotal);
        assert_eq!((subtotal - amount).amount(), 90_000);
    }

    #[test]
    fn test_nominal_discount_can_exceed_subtotal() {
        // Deliberately unclamped: total may go negative.
        let subtotal = Money::new(10_000);
        let discount = Discount::Nominal(Money::new(15_000));
        let amount = discount.amount_on(subtotal);
        assert_eq!(amount.amount(), 15_000);
        assert!((subtotal - amount).is_negative());
    }

    #[test]
    fn test_negative_nominal_is_floored_at_zero() {
        let subtotal = Money::new(10_000);
        let discount = Discount::Nominal(Money::new(-500));
        assert_eq!(discount.amount_on(subtotal), Money::zero());
    }

    #[test]
    fn test_percentage_rounds_half_up() {
        // 125 * 10% = 12.5 -> 13
        let amount = Money::new(125);
        assert_eq!(amount.percentage(10).amount(), 13);
    }

    #[test]
    fn test_zero_and_checks() {
        let zero = Money::zero();
        assert!(zero.is_zero());
        assert!(!zero.is_positive());
        assert!(!zero.is_negative());

        let negative = Money::new(-100);
        assert!(negative.is_negative());
        assert_eq!(negative.abs().amount(), 100);
    }
}
