//! The map entity: co-indexed value, inverse-variance and mask grids with a unit
//!
//! A [`MapValue`] is immutable once built. Every operator returns a new instance and the
//! grids of the operands are never touched, so maps can be shared freely across threads.
//!
//! # Example
//!
//! ```
//! use maps_core::{MapValue, Unit};
//!
//! let flux = MapValue::from_rows(
//!     &[vec![1.0, 2.0], vec![3.0, 4.0]],
//!     Some(&[vec![4.0, 4.0], vec![1.0, 0.0]]),
//!     &[vec![0, 0], vec![0, 1]],
//!     Some(Unit::erg()),
//! )
//! .unwrap();
//!
//! let doubled = (&flux + &flux).unwrap();
//! assert_eq!(doubled.value()[(1, 1)], 8.0);
//! assert_eq!(doubled.ivar().unwrap()[(0, 0)], 2.0);
//! ```

mod arithmetic;
mod correction;
mod persistence;

pub use persistence::PersistenceError;

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::core_types::Unit;
use crate::error::MapError;
use crate::grid::{self, Grid, MaskGrid};

/// Descriptive metadata for a map taken from the survey datamodel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapMeta {
    /// Datamodel property (e.g. `emline_gflux`, `stellar_sigma`)
    pub property_name: String,
    /// Channel within the property (e.g. `ha_6564`), if any
    pub channel: Option<String>,
    /// Survey release the map belongs to (e.g. `MPL-5`)
    pub release: String,
}

impl MapMeta {
    pub fn new(property_name: &str, channel: Option<&str>, release: &str) -> Self {
        Self {
            property_name: property_name.to_string(),
            channel: channel.map(str::to_string),
            release: release.to_string(),
        }
    }

    /// `property_channel`, or just the property when there is no channel
    pub fn full_name(&self) -> String {
        match &self.channel {
            Some(channel) => format!("{}_{}", self.property_name, channel),
            None => self.property_name.clone(),
        }
    }
}

/// A 2-D measured quantity with uncertainty, quality mask and unit
#[derive(Debug, Clone, PartialEq)]
pub struct MapValue {
    value: Grid,
    ivar: Option<Grid>,
    mask: MaskGrid,
    unit: Option<Unit>,
    meta: Option<MapMeta>,
}

impl MapValue {
    /// Create a map from its grids
    ///
    /// # Arguments
    ///
    /// * `value` - Measured values
    /// * `ivar` - Inverse variances (non-negative), or `None` when no uncertainty is known
    /// * `mask` - Quality bitmask, 0 = good
    /// * `unit` - Physical unit, or `None` when unknown
    ///
    /// # Errors
    ///
    /// - `MapError::ShapeMismatch` if `ivar` or `mask` differ in shape from `value`
    /// - `MapError::NegativeIvar` if any inverse variance is below zero
    pub fn new(
        value: Grid,
        ivar: Option<Grid>,
        mask: MaskGrid,
        unit: Option<Unit>,
    ) -> Result<Self, MapError> {
        let shape = value.shape();
        if let Some(ivar) = &ivar {
            MapError::check_shape("value/ivar", shape, ivar.shape())?;
            if let Some((idx, &bad)) = ivar.iter().enumerate().find(|(_, &x)| x < 0.0) {
                // Column-major storage
                return Err(MapError::NegativeIvar {
                    row: idx % shape.0,
                    col: idx / shape.0,
                    value: bad,
                });
            }
        }
        MapError::check_shape("value/mask", shape, mask.shape())?;

        Ok(Self::from_parts(value, ivar, mask, unit))
    }

    /// Create a map from nested rows
    ///
    /// # Errors
    ///
    /// Same as [`MapValue::new`], plus `MapError::ShapeMismatch` for ragged rows
    pub fn from_rows(
        value: &[Vec<f64>],
        ivar: Option<&[Vec<f64>]>,
        mask: &[Vec<u32>],
        unit: Option<Unit>,
    ) -> Result<Self, MapError> {
        let ivar = ivar.map(grid::from_rows).transpose()?;
        Self::new(grid::from_rows(value)?, ivar, grid::from_rows(mask)?, unit)
    }

    /// Map with the given values, no uncertainty, nothing masked
    pub fn from_values(value: Grid, unit: Option<Unit>) -> Self {
        let (rows, cols) = value.shape();
        Self::from_parts(value, None, MaskGrid::zeros(rows, cols), unit)
    }

    /// Assemble a map from grids already known to be consistent
    pub(crate) fn from_parts(
        value: Grid,
        ivar: Option<Grid>,
        mask: MaskGrid,
        unit: Option<Unit>,
    ) -> Self {
        debug_assert_eq!(value.shape(), mask.shape());
        Self {
            value,
            ivar,
            mask,
            unit,
            meta: None,
        }
    }

    /// Attach datamodel metadata
    pub fn with_meta(mut self, meta: MapMeta) -> Self {
        self.meta = Some(meta);
        self
    }

    pub fn value(&self) -> &Grid {
        &self.value
    }

    pub fn ivar(&self) -> Option<&Grid> {
        self.ivar.as_ref()
    }

    pub fn mask(&self) -> &MaskGrid {
        &self.mask
    }

    pub fn unit(&self) -> Option<&Unit> {
        self.unit.as_ref()
    }

    pub fn meta(&self) -> Option<&MapMeta> {
        self.meta.as_ref()
    }

    /// Grid shape as `(rows, cols)`
    pub fn shape(&self) -> (usize, usize) {
        self.value.shape()
    }

    /// Signal-to-noise ratio `|value * sqrt(ivar)|` (zeros without ivar)
    pub fn snr(&self) -> Grid {
        match &self.ivar {
            Some(ivar) => {
                let (rows, cols) = self.shape();
                grid::build(rows, cols, |i| (self.value[i] * ivar[i].sqrt()).abs())
            }
            None => Grid::zeros(self.value.nrows(), self.value.ncols()),
        }
    }

    /// One-sigma uncertainty `1/sqrt(ivar)`, `None` without ivar
    pub fn error(&self) -> Option<Grid> {
        self.ivar.as_ref().map(crate::algebra::variance::ivar_to_sigma)
    }

    /// Values with masked pixels (any flag set) replaced by `None`
    pub fn masked(&self) -> DMatrix<Option<f64>> {
        let (rows, cols) = self.shape();
        grid::build(rows, cols, |i| (self.mask[i] == 0).then_some(self.value[i]))
    }
}
