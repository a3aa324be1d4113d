//! Error types for shapeorm.
//!
//! Configuration and schema errors are raised before any statement runs.
//! Driver failures during execution are carried through untouched in
//! [`DbError::Execution`] so callers can match on the original `sqlx::Error`.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Schema error: {message} (shape: {shape})")]
    Schema { message: String, shape: String },

    /// The store rejected or failed a statement. Not retried.
    #[error(transparent)]
    Execution(#[from] sqlx::Error),

    #[error("Timeout: {operation} exceeded {elapsed_ms}ms")]
    Timeout { operation: String, elapsed_ms: u64 },

    #[error("Connection '{id}' already exists. Close it before connecting again.")]
    ConnectionExists { id: String },

    #[error("Connection not found: {id}")]
    ConnectionNotFound { id: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },
}

impl DbError {
    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a schema error for the named shape.
    pub fn schema(message: impl Into<String>, shape: impl Into<String>) -> Self {
        Self::Schema {
            message: message.into(),
            shape: shape.into(),
        }
    }

    /// Create a timeout error for a limit that was exceeded.
    pub fn timeout(operation: impl Into<String>, limit: std::time::Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            elapsed_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
        }
    }

    pub fn connection_exists(id: impl Into<String>) -> Self {
        Self::ConnectionExists { id: id.into() }
    }

    pub fn connection_not_found(id: impl Into<String>) -> Self {
        Self::ConnectionNotFound { id: id.into() }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// The underlying driver error, if this is an execution failure.
    pub fn as_sqlx(&self) -> Option<&sqlx::Error> {
        match self {
            Self::Execution(e) => Some(e),
            _ => None,
        }
    }
}

/// Result type alias for database operations.
pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_error_display() {
        let err = DbError::schema("Primary key not found", "User");
        assert_eq!(
            err.to_string(),
            "Schema error: Primary key not found (shape: User)"
        );
    }

    #[test]
    fn test_configuration_error_display() {
        let err = DbError::configuration("user is required");
        assert!(err.to_string().contains("Configuration error"));
        assert!(err.to_string().contains("user is required"));
    }

    #[test]
    fn test_execution_error_is_transparent() {
        let err = DbError::from(sqlx::Error::RowNotFound);
        assert_eq!(err.to_string(), sqlx::Error::RowNotFound.to_string());
        assert!(matches!(err.as_sqlx(), Some(sqlx::Error::RowNotFound)));
    }

    #[test]
    fn test_timeout_keeps_sub_second_precision() {
        let err = DbError::timeout("query execution", std::time::Duration::from_millis(250));
        assert!(matches!(err, DbError::Timeout { elapsed_ms: 250, .. }));
        assert_eq!(err.to_string(), "Timeout: query execution exceeded 250ms");
    }

    #[test]
    fn test_as_sqlx_none_for_local_errors() {
        assert!(DbError::invalid_input("bad").as_sqlx().is_none());
        assert!(DbError::connection_not_found("main").as_sqlx().is_none());
    }
}
