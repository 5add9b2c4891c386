//! Error types for the ORM.

use rivet_db::DatabaseError;
use thiserror::Error;

/// ORM-specific errors.
#[derive(Debug, Error)]
pub enum OrmError {
    /// Error from the connection or query builder.
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// A `find_or_fail`-style lookup returned nothing.
    #[error("no {model} found for key {key}")]
    ModelNotFound {
        /// Model name.
        model: String,
        /// Looked-up key, rendered.
        key: String,
    },

    /// The model declares no relation with this name.
    #[error("{model} has no relation named '{relation}'")]
    UnknownRelation {
        /// Model name.
        model: String,
        /// Requested relation.
        relation: String,
    },

    /// An attribute could not be converted to its declared cast.
    #[error("cannot cast attribute '{attribute}' to {cast}: {message}")]
    Cast {
        attribute: String,
        cast: String,
        message: String,
    },

    /// `fill` was given an attribute outside the fillable list.
    #[error("attribute '{attribute}' is not mass assignable on {model}")]
    MassAssignment {
        /// Model name.
        model: String,
        /// Rejected attribute.
        attribute: String,
    },

    /// The operation needs a persisted entity.
    #[error("{0} has not been saved")]
    NotPersisted(String),

    /// `restore` was called on a model without soft deletes.
    #[error("{0} does not use soft deletes")]
    NotSoftDeletable(String),

    /// JSON encoding or decoding failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for ORM operations.
pub type Result<T> = std::result::Result<T, OrmError>;
