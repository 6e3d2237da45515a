//! Scalar field types.

use std::fmt;

/// Bind type tag used when preparing a statement parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindTag {
    /// Integer parameter.
    Int,
    /// Double precision parameter.
    Double,
    /// String parameter.
    Text,
}

impl BindTag {
    /// The single character appended to the prepared statement type string.
    pub fn as_char(&self) -> char {
        match self {
            BindTag::Int => 'i',
            BindTag::Double => 'd',
            BindTag::Text => 's',
        }
    }
}

/// Scalar type of a column-backed field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    /// Signed integer.
    Int,
    /// Double precision float.
    Float,
    /// Boolean, stored as 0/1.
    Bool,
    /// Free-form text.
    Text,
    /// Email address, stored as text.
    Email,
    /// Color value, stored as text.
    Color,
    /// Enumeration member, stored as text.
    Enum,
    /// Calendar date.
    Date,
    /// Time of day.
    Time,
    /// Date and time.
    DateTime,
}

impl ScalarType {
    /// Whether values of this type have a meaningful ordering for range
    /// comparisons (above, below, between).
    pub fn is_ordered(&self) -> bool {
        matches!(
            self,
            ScalarType::Int
                | ScalarType::Float
                | ScalarType::Date
                | ScalarType::Time
                | ScalarType::DateTime
        )
    }

    /// Whether values of this type support substring matching (contains,
    /// starts-with, ends-with). Colors and enumeration members are stored
    /// as text but carry no matchable substructure.
    pub fn is_text_like(&self) -> bool {
        matches!(self, ScalarType::Text | ScalarType::Email)
    }

    /// Bind tag for parameters of this type.
    pub fn bind_tag(&self) -> BindTag {
        match self {
            ScalarType::Int | ScalarType::Bool => BindTag::Int,
            ScalarType::Float => BindTag::Double,
            ScalarType::Text
            | ScalarType::Email
            | ScalarType::Color
            | ScalarType::Enum
            | ScalarType::Date
            | ScalarType::Time
            | ScalarType::DateTime => BindTag::Text,
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScalarType::Int => "int",
            ScalarType::Float => "float",
            ScalarType::Bool => "bool",
            ScalarType::Text => "text",
            ScalarType::Email => "email",
            ScalarType::Color => "color",
            ScalarType::Enum => "enum",
            ScalarType::Date => "date",
            ScalarType::Time => "time",
            ScalarType::DateTime => "datetime",
        };
        write!(f, "{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordered_types() {
        assert!(ScalarType::Int.is_ordered());
        assert!(ScalarType::DateTime.is_ordered());
        assert!(!ScalarType::Text.is_ordered());
        assert!(!ScalarType::Bool.is_ordered());
    }

    #[test]
    fn test_text_like_types() {
        assert!(ScalarType::Text.is_text_like());
        assert!(ScalarType::Email.is_text_like());
        assert!(!ScalarType::Date.is_text_like());
        assert!(!ScalarType::Color.is_text_like());
        assert!(!ScalarType::Enum.is_text_like());
    }

    #[test]
    fn test_bind_tags() {
        assert_eq!(ScalarType::Bool.bind_tag().as_char(), 'i');
        assert_eq!(ScalarType::Float.bind_tag().as_char(), 'd');
        assert_eq!(ScalarType::Date.bind_tag().as_char(), 's');
    }
}
