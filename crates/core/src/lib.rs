//! Map Arithmetic Core Library
//!
//! Two-dimensional "map" data products of an integral-field galaxy survey: a measured
//! quantity on a spaxel grid together with its inverse variance, a quality bitmask and a
//! physical unit.
//!
//! ## Arithmetic with uncertainties
//!
//! Every operator on a [`MapValue`] combines the three co-indexed grids atomically:
//! - values follow IEEE arithmetic (no panics on zero or infinite inputs)
//! - inverse variances are propagated by [`algebra::variance`]
//! - masks are combined by [`algebra::mask`]
//! - units are propagated by [`algebra::unit_propagation`]
//!
//! ## Parameter lookup
//!
//! The [`query`] module maps a static relational schema description onto searchable
//! parameters, with shortcut expansion and explicit not-found/ambiguous results.

// Core types and utilities
pub mod core_types;
pub mod error;
pub mod grid;

// Arithmetic building blocks
pub mod algebra;

// The map entity and its operators
pub mod map;

// Schema-driven parameter lookup
pub mod query;

// Re-export core types
pub use core_types::{Rational, Unit, UnitParseError};
pub use error::MapError;
pub use grid::{Grid, MaskGrid};

// Re-export algebra entry points
pub use algebra::mask::{combine as combine_masks, MaskFlag};
pub use algebra::unit_propagation::{propagate, Operator};
pub use algebra::variance::{add_ivar, mul_ivar, pow_ivar};

// Re-export map types
pub use map::{MapMeta, MapValue, PersistenceError};

// Re-export query types
pub use query::{
    FunctionLookup, LookupError, LookupResult, ParamCatalog, ParamLookup, SearchInput,
    SurveyConfig, ValidationError,
};
