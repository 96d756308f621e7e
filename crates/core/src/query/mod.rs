//! Schema-driven parameter lookup
//!
//! - [`config`]: the survey release selection passed to every constructor
//! - [`schema`]: static table descriptions and the [`ParamCatalog`] built from them
//! - [`lookup`]: suffix matching of dotted paths with shortcut expansion
//! - [`validation`]: search filter and form field checks

pub mod config;
pub mod lookup;
pub mod schema;
pub mod validation;

pub use config::SurveyConfig;
pub use lookup::{FunctionLookup, LookupError, LookupResult, ParamLookup, ShortcutTable};
pub use schema::{ColumnKind, ColumnRef, ColumnSpec, FieldValue, FormSpec, ParamCatalog, TableSchema};
pub use validation::{SearchInput, ValidationError, OPERATORS};
