//! Core error types.

use thiserror::Error;

/// Core mapper errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Missing or invalid configuration value.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The database could not be reached.
    #[error("connection error: {0}")]
    Connection(String),

    /// An operation was requested for an unsupported field kind/type,
    /// an unknown field or entity name, or a criteria base-type mismatch.
    #[error("validation error: {0}")]
    Validation(String),

    /// SQL execution failure, wrapping the native error code and message.
    #[error("query execution error [{code}]: {message}")]
    QueryExecution {
        /// Native database error code.
        code: u32,
        /// Native database error message.
        message: String,
    },

    /// A single-row select matched more than one row.
    #[error("ambiguous result: {0}")]
    AmbiguousResult(String),

    /// Duplicate key or foreign key violation surfaced from the database.
    #[error("constraint error: {0}")]
    Constraint(String),

    /// Transaction control failure.
    #[error("transaction error: {0}")]
    Transaction(String),
}

impl Error {
    /// Build a validation error for an operation attempted on a field that
    /// does not support it.
    pub fn unsupported_field(entity: &str, field: &str, operation: &str) -> Self {
        Error::Validation(format!(
            "field '{field}' of entity '{entity}' does not support the '{operation}' operation"
        ))
    }

    /// Build a validation error for an unknown field name.
    pub fn unknown_field(entity: &str, field: &str) -> Self {
        Error::Validation(format!("entity '{entity}' has no field named '{field}'"))
    }

    /// Build a validation error for an unknown entity type.
    pub fn unknown_entity(entity: &str) -> Self {
        Error::Validation(format!("unknown entity type '{entity}'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::QueryExecution {
            code: 1062,
            message: "Duplicate entry".into(),
        };
        assert_eq!(
            err.to_string(),
            "query execution error [1062]: Duplicate entry"
        );

        let err = Error::unknown_field("User", "nickname");
        assert!(err.to_string().contains("nickname"));
        assert!(err.to_string().contains("User"));
    }
}
