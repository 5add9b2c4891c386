//! Error types for connections and query execution.

use rivet_core::{Dialect, GrammarError, SqlValue};
use thiserror::Error;

use crate::config::RuntimeMode;

/// Errors raised while talking to the database.
#[derive(Debug, Clone, Error)]
pub enum DatabaseError {
    /// The handle could not be established or re-established.
    #[error("could not connect to {dialect} database: {message}")]
    Connection {
        /// Dialect of the failed connection.
        dialect: Dialect,
        /// Driver message.
        message: String,
    },

    /// The driver rejected a statement.
    #[error("{message} (SQL: {sql})")]
    Query {
        /// Statement as sent, with `?` placeholders.
        sql: String,
        /// Bound values in placeholder order.
        bindings: Vec<SqlValue>,
        /// Driver message.
        message: String,
    },

    /// The statement could not be compiled for this dialect.
    #[error(transparent)]
    Grammar(#[from] GrammarError),

    /// Raw SQL was used while the guard is locked.
    #[error("raw SQL is locked in {mode} mode; set allow_raw_sql or call unlock_raw_sql()")]
    RawSqlLocked {
        /// Mode that locked the guard.
        mode: RuntimeMode,
    },

    /// `commit` or `rollback` was called at depth 0.
    #[error("there is no active transaction")]
    NoActiveTransaction,

    /// The API was used in a way it does not support.
    #[error("{0}")]
    Usage(String),

    /// Any other database failure.
    #[error("database error: {0}")]
    Other(String),
}

impl DatabaseError {
    /// SQL text of a failed query, if any.
    #[must_use]
    pub fn sql(&self) -> Option<&str> {
        match self {
            Self::Query { sql, .. } => Some(sql),
            _ => None,
        }
    }

    /// True for driver rejections of a statement.
    #[must_use]
    pub const fn is_query(&self) -> bool {
        matches!(self, Self::Query { .. })
    }
}

/// Result type alias for database operations.
pub type Result<T> = std::result::Result<T, DatabaseError>;
