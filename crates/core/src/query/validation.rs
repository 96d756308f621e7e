//! Search input and form field validation

use std::fmt;

use super::lookup::LookupError;
use super::schema::ColumnKind;

/// Query operator words and the comparison they stand for
pub const OPERATORS: [(&str, &str); 6] = [
    ("le", "<="),
    ("ge", ">="),
    ("gt", ">"),
    ("lt", "<"),
    ("ne", "!="),
    ("eq", "="),
];

/// Comparison symbol for an operator word (`ge` -> `>=`)
pub fn operator_symbol(word: &str) -> Option<&'static str> {
    OPERATORS
        .iter()
        .find(|(w, _)| w.eq_ignore_ascii_case(word))
        .map(|(_, symbol)| *symbol)
}

/// A rule an input violated
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Input is empty or whitespace
    Required,
    /// Input is shorter than the minimum length
    TooShort { min: usize, actual: usize },
    /// Input has no comparison operand
    MissingOperand,
    /// Form has no field of this name
    UnknownField(String),
    /// Parameter name did not resolve to exactly one column
    Lookup(LookupError),
    /// Value does not parse as the field's column type
    InvalidValue {
        field: String,
        expected: ColumnKind,
        value: String,
    },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::Required => write!(f, "Input filter string required"),
            ValidationError::TooShort { min, actual } => write!(
                f,
                "Input must have at least {min} characters (got {actual})"
            ),
            ValidationError::MissingOperand => write!(f, "Input must contain a valid operand."),
            ValidationError::UnknownField(name) => write!(f, "Unknown field {name}"),
            ValidationError::Lookup(e) => write!(f, "{e}"),
            ValidationError::InvalidValue {
                field,
                expected,
                value,
            } => write!(f, "Field {field} expects {expected:?}, got {value:?}"),
        }
    }
}

impl std::error::Error for ValidationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ValidationError::Lookup(e) => Some(e),
            _ => None,
        }
    }
}

impl From<LookupError> for ValidationError {
    fn from(e: LookupError) -> Self {
        ValidationError::Lookup(e)
    }
}

/// A validated free-text search filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchInput {
    filter: String,
}

impl SearchInput {
    /// Minimum filter length in characters
    pub const MIN_LENGTH: usize = 3;

    /// Check a filter string
    ///
    /// An empty input reports only `Required`; otherwise every violated rule is returned.
    ///
    /// # Errors
    ///
    /// Returns the list of violated rules
    pub fn validate(filter: &str) -> Result<Self, Vec<ValidationError>> {
        if filter.trim().is_empty() {
            return Err(vec![ValidationError::Required]);
        }

        let mut errors = Vec::new();
        let actual = filter.chars().count();
        if actual < Self::MIN_LENGTH {
            errors.push(ValidationError::TooShort {
                min: Self::MIN_LENGTH,
                actual,
            });
        }
        if !filter.contains(['<', '>', '=']) {
            errors.push(ValidationError::MissingOperand);
        }

        if errors.is_empty() {
            Ok(Self {
                filter: filter.to_string(),
            })
        } else {
            Err(errors)
        }
    }

    pub fn filter(&self) -> &str {
        &self.filter
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_filter() {
        let input = SearchInput::validate("nsa.z < 0.1").unwrap();
        assert_eq!(input.filter(), "nsa.z < 0.1");
        assert!(SearchInput::validate("a=1").is_ok());
    }

    #[test]
    fn test_empty_reports_required_only() {
        assert_eq!(SearchInput::validate(""), Err(vec![ValidationError::Required]));
        assert_eq!(SearchInput::validate("   "), Err(vec![ValidationError::Required]));
    }

    #[test]
    fn test_collects_every_violation() {
        assert_eq!(
            SearchInput::validate("ab"),
            Err(vec![
                ValidationError::TooShort { min: 3, actual: 2 },
                ValidationError::MissingOperand
            ])
        );
        assert_eq!(
            SearchInput::validate("nsa.z"),
            Err(vec![ValidationError::MissingOperand])
        );
        assert_eq!(
            SearchInput::validate("a<"),
            Err(vec![ValidationError::TooShort { min: 3, actual: 2 }])
        );
    }

    #[test]
    fn test_operator_table() {
        assert_eq!(operator_symbol("le"), Some("<="));
        assert_eq!(operator_symbol("NE"), Some("!="));
        assert_eq!(operator_symbol("eq"), Some("="));
        assert_eq!(operator_symbol("like"), None);
    }

    #[test]
    fn test_messages() {
        assert_eq!(
            ValidationError::MissingOperand.to_string(),
            "Input must contain a valid operand."
        );
        assert_eq!(
            ValidationError::Required.to_string(),
            "Input filter string required"
        );
    }
}
