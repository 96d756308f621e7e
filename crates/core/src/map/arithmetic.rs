//! Map operators
//!
//! | Operator | value | ivar | mask | unit |
//! |---|---|---|---|---|
//! | `a + b`, `a - b` | IEEE `+`/`-` | [`add_ivar`] | AND | [`propagate`](crate::propagate) |
//! | `a * b`, `a / b` | IEEE `*`/`/` | [`mul_ivar`] | AND | [`propagate`](crate::propagate) |
//! | `a.powf(p)` | `value^p` | [`pow_ivar`](crate::algebra::variance::pow_ivar) | unchanged | `unit^p` |
//!
//! Binary operators check shapes before any numeric work. The `std::ops` impls on
//! references return `Result<MapValue, MapError>` so they compose with `?`.

use std::ops::{Add, Div, Mul, Sub};

use tracing::debug;

use super::MapValue;
use crate::algebra::mask;
use crate::algebra::unit_propagation::{propagate_optional, Operator};
use crate::algebra::variance::{self, add_ivar, mul_ivar};
use crate::error::MapError;
use crate::grid::{self, Grid};

impl MapValue {
    /// Apply a binary operator to two same-shaped maps
    ///
    /// # Errors
    ///
    /// Returns `MapError::ShapeMismatch` if the maps differ in shape
    pub fn apply(&self, other: &MapValue, op: Operator) -> Result<MapValue, MapError> {
        MapError::check_shape("left/right", self.shape(), other.shape())?;
        debug!(
            "Map operator '{}' on {}x{} grid",
            op,
            self.shape().0,
            self.shape().1
        );

        let value: Grid = grid::zip_map("left/right", &self.value, &other.value, |a, b| {
            match op {
                Operator::Add => a + b,
                Operator::Sub => a - b,
                Operator::Mul => a * b,
                Operator::Div => a / b,
            }
        })?;

        let ivar = if op.is_additive() {
            add_ivar(self.ivar(), other.ivar())?
        } else {
            mul_ivar(self.ivar(), other.ivar(), &self.value, &other.value, &value)?
        };

        let mask = mask::combine(&self.mask, &other.mask)?;
        let unit = propagate_optional(self.unit(), other.unit(), op);

        Ok(MapValue::from_parts(value, ivar, mask, unit))
    }

    /// `self + other`
    ///
    /// # Errors
    ///
    /// Returns `MapError::ShapeMismatch` if the maps differ in shape
    pub fn checked_add(&self, other: &MapValue) -> Result<MapValue, MapError> {
        self.apply(other, Operator::Add)
    }

    /// `self - other`
    ///
    /// # Errors
    ///
    /// Returns `MapError::ShapeMismatch` if the maps differ in shape
    pub fn checked_sub(&self, other: &MapValue) -> Result<MapValue, MapError> {
        self.apply(other, Operator::Sub)
    }

    /// `self * other`
    ///
    /// # Errors
    ///
    /// Returns `MapError::ShapeMismatch` if the maps differ in shape
    pub fn checked_mul(&self, other: &MapValue) -> Result<MapValue, MapError> {
        self.apply(other, Operator::Mul)
    }

    /// `self / other`, with IEEE `inf`/`NaN` where `other` is zero
    ///
    /// # Errors
    ///
    /// Returns `MapError::ShapeMismatch` if the maps differ in shape
    pub fn checked_div(&self, other: &MapValue) -> Result<MapValue, MapError> {
        self.apply(other, Operator::Div)
    }

    /// `self ** power`
    ///
    /// The mask is kept as is. Without an ivar the result ivar is all zeros (no
    /// information). The unit is dropped if `power` is not a simple fraction.
    pub fn powf(&self, power: f64) -> MapValue {
        debug!(
            "Map power {} on {}x{} grid",
            power,
            self.shape().0,
            self.shape().1
        );
        let value = grid::map(&self.value, |v| v.powf(power));
        let ivar = match &self.ivar {
            Some(ivar) => variance::pow_ivar_same_shape(ivar, &self.value, power),
            None => Grid::zeros(self.value.nrows(), self.value.ncols()),
        };
        let unit = self.unit.as_ref().and_then(|u| u.powf(power));

        MapValue::from_parts(value, Some(ivar), self.mask.clone(), unit)
    }
}

macro_rules! impl_map_op {
    ($trait:ident, $method:ident, $op:expr) => {
        impl $trait<&MapValue> for &MapValue {
            type Output = Result<MapValue, MapError>;

            fn $method(self, rhs: &MapValue) -> Self::Output {
                self.apply(rhs, $op)
            }
        }

        impl $trait<MapValue> for MapValue {
            type Output = Result<MapValue, MapError>;

            fn $method(self, rhs: MapValue) -> Self::Output {
                self.apply(&rhs, $op)
            }
        }
    };
}

impl_map_op!(Add, add, Operator::Add);
impl_map_op!(Sub, sub, Operator::Sub);
impl_map_op!(Mul, mul, Operator::Mul);
impl_map_op!(Div, div, Operator::Div);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_types::Unit;
    use approx::assert_relative_eq;

    fn map(values: &[Vec<f64>], ivar: &[Vec<f64>], mask: &[Vec<u32>], unit: Unit) -> MapValue {
        MapValue::from_rows(values, Some(ivar), mask, Some(unit)).unwrap()
    }

    #[test]
    fn test_add_combines_all_parts() {
        let a = map(&[vec![1.0, 2.0]], &[vec![4.0, 1.0]], &[vec![3, 0]], Unit::km_per_s());
        let b = map(&[vec![10.0, 20.0]], &[vec![4.0, 0.0]], &[vec![1, 2]], Unit::km_per_s());
        let c = (&a + &b).unwrap();

        assert_eq!(c.value()[(0, 0)], 11.0);
        assert_eq!(c.value()[(0, 1)], 22.0);
        assert_relative_eq!(c.ivar().unwrap()[(0, 0)], 2.0);
        assert_eq!(c.ivar().unwrap()[(0, 1)], 0.0);
        assert_eq!(c.mask()[(0, 0)], 1);
        assert_eq!(c.mask()[(0, 1)], 0);
        assert_eq!(c.unit(), Some(&Unit::km_per_s()));
        assert!(c.meta().is_none());
    }

    #[test]
    fn test_sub_uses_additive_ivar() {
        let a = map(&[vec![5.0]], &[vec![2.0]], &[vec![0]], Unit::second());
        let b = map(&[vec![3.0]], &[vec![2.0]], &[vec![0]], Unit::second());
        let c = a.checked_sub(&b).unwrap();
        assert_eq!(c.value()[(0, 0)], 2.0);
        assert_relative_eq!(c.ivar().unwrap()[(0, 0)], 1.0);
    }

    #[test]
    fn test_mul_and_div_units() {
        let km = map(&[vec![2.0]], &[vec![1.0]], &[vec![0]], Unit::kilometer());
        let s = map(&[vec![4.0]], &[vec![1.0]], &[vec![0]], Unit::second());

        let product = (&km * &s).unwrap();
        assert_eq!(product.value()[(0, 0)], 8.0);
        assert_eq!(product.unit(), Some(&(Unit::kilometer() * Unit::second())));

        let speed = (&km / &s).unwrap();
        assert_eq!(speed.value()[(0, 0)], 0.5);
        assert_eq!(speed.unit(), Some(&Unit::km_per_s()));
    }

    #[test]
    fn test_incompatible_add_drops_unit() {
        let km = map(&[vec![2.0]], &[vec![1.0]], &[vec![0]], Unit::kilometer());
        let s = map(&[vec![4.0]], &[vec![1.0]], &[vec![0]], Unit::second());
        let sum = (&km + &s).unwrap();
        assert_eq!(sum.value()[(0, 0)], 6.0);
        assert!(sum.unit().is_none());
    }

    #[test]
    fn test_owned_operators() {
        let a = map(&[vec![2.0]], &[vec![1.0]], &[vec![0]], Unit::meter());
        let b = a.clone();
        let c = (a * b).unwrap();
        assert_eq!(c.value()[(0, 0)], 4.0);
        assert_eq!(c.unit(), Some(&Unit::meter().powi(2)));
    }

    #[test]
    fn test_shape_mismatch_fails_before_work() {
        let a = MapValue::from_values(Grid::zeros(2, 2), None);
        let b = MapValue::from_values(Grid::zeros(3, 2), None);
        for op in [Operator::Add, Operator::Sub, Operator::Mul, Operator::Div] {
            let err = a.apply(&b, op).unwrap_err();
            assert!(matches!(err, MapError::ShapeMismatch { context: "left/right", .. }));
        }
    }

    #[test]
    fn test_no_ivar_operands() {
        let a = MapValue::from_values(Grid::from_element(1, 2, 3.0), None);
        let b = MapValue::from_values(Grid::from_element(1, 2, 2.0), None);
        assert!((&a + &b).unwrap().ivar().is_none());
        assert!((&a / &b).unwrap().ivar().is_none());
    }

    #[test]
    fn test_powf_keeps_mask_and_raises_unit() {
        let a = map(
            &[vec![4.0, 9.0]],
            &[vec![1.0, 1.0]],
            &[vec![0, 8]],
            Unit::kilometer().powi(2),
        );
        let root = a.powf(0.5);
        assert_relative_eq!(root.value()[(0, 0)], 2.0);
        assert_relative_eq!(root.value()[(0, 1)], 3.0);
        assert_eq!(root.mask(), a.mask());
        assert_eq!(root.unit(), Some(&Unit::kilometer()));

        let constant = a.powf(0.0);
        assert!(constant.value().iter().all(|&v| v == 1.0));
        assert!(constant.ivar().unwrap().iter().all(|&x| x.is_infinite()));
        assert_eq!(constant.unit(), Some(&Unit::dimensionless()));
    }

    #[test]
    fn test_powf_without_ivar() {
        let a = MapValue::from_values(Grid::from_element(2, 2, 3.0), None);
        let squared = a.powf(2.0);
        assert_eq!(squared.value()[(1, 1)], 9.0);
        assert!(squared.ivar().unwrap().iter().all(|&x| x == 0.0));
        assert!(squared.unit().is_none());
    }
}
