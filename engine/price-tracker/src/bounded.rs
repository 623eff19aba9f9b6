//! Numeric value pinned between a lower and an upper bound

use crate::{PricingError, Result};
use rust_decimal::Decimal;
use std::fmt::{Debug, Display};
use std::ops::{Add, Neg, Sub};

/// Numbers a [`BoundedAccumulator`] can hold
pub trait Amount:
    Copy + PartialOrd + Default + Debug + Display + Add<Output = Self> + Sub<Output = Self> + Neg<Output = Self>
{
}

impl Amount for i64 {}
impl Amount for Decimal {}

/// Value that accumulates trades without ever leaving `[min, max]`
///
/// Increases and decreases saturate at the bounds and report how much of the
/// request actually applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundedAccumulator<T: Amount> {
    min: T,
    max: T,
    value: T,
}

impl<T: Amount> BoundedAccumulator<T> {
    /// Create an accumulator starting at the bound closest to zero
    pub fn new(min: T, max: T) -> Result<Self> {
        if min > max {
            return Err(PricingError::invariant(format!("lower bound {min} exceeds upper bound {max}")));
        }
        let mut bounded = Self { min, max, value: min };
        bounded.reset();
        Ok(bounded)
    }

    /// Create an accumulator with an explicit starting value
    pub fn with_value(min: T, max: T, value: T) -> Result<Self> {
        let mut bounded = Self::new(min, max)?;
        bounded.set(value)?;
        Ok(bounded)
    }

    /// Add `amount`, saturating at the upper bound; returns what was applied
    pub fn increase(&mut self, amount: T) -> T {
        if amount < T::default() {
            return -self.decrease(-amount);
        }
        let headroom = self.max - self.value;
        let applied = if amount > headroom { headroom } else { amount };
        self.value = self.value + applied;
        applied
    }

    /// Subtract `amount`, saturating at the lower bound; returns what was applied
    pub fn decrease(&mut self, amount: T) -> T {
        if amount < T::default() {
            return -self.increase(-amount);
        }
        let room = self.value - self.min;
        let applied = if amount > room { room } else { amount };
        self.value = self.value - applied;
        applied
    }

    /// How much can still be added
    pub fn increase_room(&self) -> T {
        self.max - self.value
    }

    /// How much can still be removed
    pub fn decrease_room(&self) -> T {
        self.value - self.min
    }

    pub fn set(&mut self, value: T) -> Result<()> {
        if value < self.min || value > self.max {
            return Err(PricingError::out_of_range("bounded value", value, self.min, self.max));
        }
        self.value = value;
        Ok(())
    }

    /// Replace the bounds, pulling the current value inside them.
    /// Returns `true` when the value had to be clamped.
    pub fn rebound(&mut self, min: T, max: T) -> Result<bool> {
        let mut rebounded = Self::new(min, max)?;
        let clamped = if self.value < min {
            rebounded.value = min;
            true
        } else if self.value > max {
            rebounded.value = max;
            true
        } else {
            rebounded.value = self.value;
            false
        };
        *self = rebounded;
        Ok(clamped)
    }

    /// Return to the starting value
    pub fn reset(&mut self) {
        self.value = self.initial_value();
    }

    /// Nothing accumulated since the last reset
    pub fn is_reset(&self) -> bool {
        self.value == self.initial_value()
    }

    fn initial_value(&self) -> T {
        let zero = T::default();
        if self.min > zero {
            self.min
        } else if self.max < zero {
            self.max
        } else {
            zero
        }
    }

    pub fn value(&self) -> T {
        self.value
    }

    pub fn min(&self) -> T {
        self.min
    }

    pub fn max(&self) -> T {
        self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_is_reset_tracks_accumulation() {
        let mut acc = BoundedAccumulator::new(0i64, 10).unwrap();
        assert!(acc.is_reset());
        acc.increase(4);
        assert!(!acc.is_reset());
        acc.reset();
        assert!(acc.is_reset());

        let mut floor = BoundedAccumulator::new(dec!(2), dec!(5)).unwrap();
        assert!(floor.is_reset());
        floor.increase(dec!(1));
        assert!(!floor.is_reset());
    }

    #[test]
    fn test_initial_value_closest_to_zero() {
        assert_eq!(BoundedAccumulator::new(0i64, 10).unwrap().value(), 0);
        assert_eq!(BoundedAccumulator::new(3i64, 10).unwrap().value(), 3);
        assert_eq!(BoundedAccumulator::new(-10i64, -4).unwrap().value(), -4);
        assert_eq!(BoundedAccumulator::new(-5i64, 5).unwrap().value(), 0);
    }

    #[test]
    fn test_inverted_bounds_rejected() {
        assert!(matches!(
            BoundedAccumulator::new(5i64, 1),
            Err(PricingError::InvariantViolation { .. })
        ));
    }

    #[test]
    fn test_with_value_out_of_range() {
        assert!(matches!(
            BoundedAccumulator::with_value(0i64, 10, 11),
            Err(PricingError::OutOfRange { .. })
        ));
        assert_eq!(BoundedAccumulator::with_value(0i64, 10, 7).unwrap().value(), 7);
    }

    #[test]
    fn test_increase_saturates() {
        let mut acc = BoundedAccumulator::new(0i64, 10).unwrap();
        assert_eq!(acc.increase(4), 4);
        assert_eq!(acc.increase(20), 6);
        assert_eq!(acc.value(), 10);
        assert_eq!(acc.increase_room(), 0);
        assert_eq!(acc.decrease_room(), 10);
    }

    #[test]
    fn test_negative_amounts_flip_direction() {
        let mut acc = BoundedAccumulator::with_value(0i64, 10, 5).unwrap();
        assert_eq!(acc.increase(-8), -5);
        assert_eq!(acc.value(), 0);
        assert_eq!(acc.decrease(-3), -3);
        assert_eq!(acc.value(), 3);
    }

    #[test]
    fn test_decimal_accumulator() {
        let mut acc = BoundedAccumulator::new(dec!(0), dec!(100.50)).unwrap();
        assert_eq!(acc.increase(dec!(60.25)), dec!(60.25));
        assert_eq!(acc.increase(dec!(60.25)), dec!(40.25));
        assert_eq!(acc.value(), dec!(100.50));
    }

    #[test]
    fn test_rebound_clamps() {
        let mut acc = BoundedAccumulator::with_value(0i64, 100, 80).unwrap();
        assert!(acc.rebound(0, 50).unwrap());
        assert_eq!(acc.value(), 50);
        assert!(!acc.rebound(0, 200).unwrap());
        assert_eq!(acc.value(), 50);
    }

    #[test]
    fn test_set_and_reset() {
        let mut acc = BoundedAccumulator::new(0i64, 10).unwrap();
        assert!(acc.set(11).is_err());
        acc.set(9).unwrap();
        acc.reset();
        assert_eq!(acc.value(), 0);
    }

    proptest! {
        #[test]
        fn prop_value_stays_within_bounds(
            max in 0i64..10_000,
            ops in proptest::collection::vec(-20_000i64..20_000, 0..50),
        ) {
            let mut acc = BoundedAccumulator::new(0, max).unwrap();
            for amount in ops {
                let before = acc.value();
                let applied = acc.increase(amount);
                prop_assert!(acc.value() >= 0 && acc.value() <= max);
                prop_assert_eq!(acc.value() - before, applied);
            }
        }
    }
}
