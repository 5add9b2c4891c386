//! Error types for SQL compilation.

use thiserror::Error;

use crate::dialect::Dialect;

/// Errors raised while compiling descriptors into SQL.
///
/// Compilation errors are deterministic: retrying the same descriptor against
/// the same grammar always fails the same way.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GrammarError {
    /// A logical column type has no mapping in the dialect.
    #[error("column type `{column_type}` is not supported by {dialect}")]
    UnsupportedColumnType {
        /// Dialect that rejected the type.
        dialect: Dialect,
        /// Logical type name.
        column_type: &'static str,
    },

    /// A schema operation cannot be expressed in the dialect.
    #[error("{operation} is not supported by {dialect}")]
    UnsupportedOperation {
        /// Dialect that rejected the operation.
        dialect: Dialect,
        /// Human readable operation name.
        operation: String,
    },

    /// Comparison operator outside the supported set.
    #[error("invalid operator: {0}")]
    InvalidOperator(String),

    /// Unknown dialect name in configuration.
    #[error("invalid dialect: {0} (expected mysql, pgsql or sqlite)")]
    InvalidDialect(String),

    /// A statement needs at least one column.
    #[error("{0} requires at least one column")]
    EmptyColumns(String),
}

/// Result type alias for compilation.
pub type Result<T> = std::result::Result<T, GrammarError>;
