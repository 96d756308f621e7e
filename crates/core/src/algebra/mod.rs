//! Arithmetic building blocks for maps
//!
//! Each sub-module handles one of the co-indexed parts of a map and is a set of pure
//! functions over grids, so higher layers (derived-quantity corrections, the
//! [`MapValue`](crate::MapValue) operators) can compose them freely:
//!
//! - [`variance`]: inverse-variance propagation for `+ - * / **`
//! - [`mask`]: quality-mask combination
//! - [`unit_propagation`]: physical units through `+ - * / **`

pub mod mask;
pub mod unit_propagation;
pub mod variance;

pub use mask::MaskFlag;
pub use unit_propagation::Operator;
