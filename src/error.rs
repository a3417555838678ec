//! The error type shared by every stage of query execution.
//!
//! A failing command produces exactly one [`QueryError`]; no stage returns a
//! partial result alongside it.

use crate::parser::ParserError;
use crate::storage::StorageError;

/// The error type of seldb commands.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// Malformed clause, invalid operator, HAVING without GROUP BY.
    #[error("parse error: {0}")]
    Parse(String),
    /// Unknown table or alias, unknown or ambiguous column.
    #[error("schema error: {0}")]
    Schema(String),
    /// A literal cannot be coerced to the column type, or operands of
    /// incompatible types are compared.
    #[error("type error: {0}")]
    Type(String),
    /// A join condition references a column absent from both sides.
    #[error("join error: {0}")]
    Join(String),
    /// A row violates a primary key.
    #[error("constraint error: {0}")]
    Constraint(String),
}

impl QueryError {
    pub(crate) fn unknown_column(column: impl std::fmt::Display) -> Self {
        QueryError::Schema(format!("unknown column {}", column))
    }
}

impl From<ParserError> for QueryError {
    fn from(err: ParserError) -> Self {
        QueryError::Parse(err.message)
    }
}

impl From<StorageError> for QueryError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Constraint(msg) => QueryError::Constraint(msg),
            StorageError::Type(msg) => QueryError::Type(msg),
            other => QueryError::Schema(other.to_string()),
        }
    }
}
