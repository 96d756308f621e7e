//! Core types and utilities

pub mod rational;
pub mod units;

pub use rational::Rational;
pub use units::{Unit, UnitParseError};
