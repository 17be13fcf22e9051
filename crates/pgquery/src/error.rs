//! Error types for pgquery

use thiserror::Error;

use crate::compile::NOT_FOUND_MARKER;

/// Result type alias for pgquery operations
pub type PgResult<T> = Result<T, PgError>;

/// Error types for query compilation, execution and transactions
#[derive(Debug, Error)]
pub enum PgError {
    /// Malformed raw SQL template (segment/value mismatch, unrenderable unsafe value)
    #[error("Template error: {0}")]
    Template(String),

    /// UPDATE/DELETE without WHERE and without an explicit `all()`
    #[error("Guard error: {0}")]
    Guard(String),

    /// A query expected at least one row and received none
    #[error("Not found: {0}")]
    NotFound(String),

    /// Failure reported by a driver that is not backed by tokio-postgres
    #[error("Driver error: {0}")]
    Driver(String),

    /// Query execution error from tokio-postgres
    #[error("Query error: {0}")]
    Query(#[from] tokio_postgres::Error),

    /// Unique constraint violation
    #[error("Unique constraint violation: {0}")]
    UniqueViolation(String),

    /// Foreign key constraint violation
    #[error("Foreign key violation: {0}")]
    ForeignKeyViolation(String),

    /// Check constraint violation
    #[error("Check constraint violation: {0}")]
    CheckViolation(String),

    /// The transaction body failed and the rollback that followed failed too
    #[error("{error} (rollback failed: {rollback})")]
    TransactionAbort {
        error: Box<PgError>,
        rollback: Box<PgError>,
    },

    /// Row decode/mapping error
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Pool error
    #[cfg(feature = "pool")]
    #[error("Pool error: {0}")]
    Pool(String),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl PgError {
    /// Create a template error
    pub fn template(message: impl Into<String>) -> Self {
        Self::Template(message.into())
    }

    /// Create a guard error
    pub fn guard(message: impl Into<String>) -> Self {
        Self::Guard(message.into())
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Create a generic driver error
    pub fn driver(message: impl Into<String>) -> Self {
        Self::Driver(message.into())
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Check if this is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Check if this is a guard error
    pub fn is_guard(&self) -> bool {
        matches!(self, Self::Guard(_))
    }

    /// Check if this is a template error
    pub fn is_template(&self) -> bool {
        matches!(self, Self::Template(_))
    }

    /// Check if this is a unique violation error
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Self::UniqueViolation(_))
    }

    /// Parse a tokio_postgres error into a more specific PgError
    pub fn from_db_error(err: tokio_postgres::Error) -> Self {
        if let Some(db_err) = err.as_db_error() {
            let constraint = db_err.constraint().unwrap_or("unknown");
            if let Some(mapped) = Self::from_sqlstate(db_err.code().code(), constraint, db_err.message()) {
                return mapped;
            }
        }
        Self::Query(err)
    }

    fn from_sqlstate(code: &str, constraint: &str, message: &str) -> Option<Self> {
        match code {
            "23505" => Some(Self::UniqueViolation(format!("{}: {}", constraint, message))),
            "23503" => Some(Self::ForeignKeyViolation(format!("{}: {}", constraint, message))),
            "23514" => Some(Self::CheckViolation(format!("{}: {}", constraint, message))),
            // raised by the guard of a required appended query
            "22P02" if message.contains(NOT_FOUND_MARKER) => Some(Self::NotFound(
                "a required appended query matched no rows".to_string(),
            )),
            _ => None,
        }
    }
}

#[cfg(feature = "pool")]
impl From<deadpool_postgres::PoolError> for PgError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        Self::Pool(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqlstate_mapping() {
        let guard = PgError::from_sqlstate(
            "22P02",
            "unknown",
            &format!("invalid input syntax for type integer: \"{NOT_FOUND_MARKER}\""),
        );
        assert!(guard.is_some_and(|e| e.is_not_found()));
        let bad_input = PgError::from_sqlstate("22P02", "unknown", "invalid input syntax for type integer: \"x\"");
        assert!(bad_input.is_none());
        let unique = PgError::from_sqlstate("23505", "user_email_key", "duplicate key");
        assert!(unique.is_some_and(|e| e.is_unique_violation()));
        assert!(PgError::from_sqlstate("42P01", "unknown", "missing").is_none());
    }

    #[test]
    fn abort_message_carries_both_errors() {
        let err = PgError::TransactionAbort {
            error: Box::new(PgError::driver("boom")),
            rollback: Box::new(PgError::driver("connection lost")),
        };
        assert_eq!(
            err.to_string(),
            "Driver error: boom (rollback failed: Driver error: connection lost)"
        );
    }

    #[test]
    fn predicates_match_variants() {
        assert!(PgError::not_found("x").is_not_found());
        assert!(PgError::guard("x").is_guard());
        assert!(PgError::template("x").is_template());
        assert!(!PgError::validation("x").is_not_found());
    }
}
