//! Error types for the migration system.

use std::path::PathBuf;

use rivet_db::DatabaseError;

/// Errors that can occur while discovering, applying or reverting
/// migrations.
#[derive(Debug, thiserror::Error)]
pub enum MigrateError {
    /// Repository bookkeeping failed.
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// A migration's `up` failed; its transaction was rolled back.
    #[error("Migration '{migration}' failed: {source}")]
    MigrationFailed {
        /// Identifier of the failing migration.
        migration: String,
        /// The underlying failure.
        #[source]
        source: DatabaseError,
    },

    /// A migration's `down` failed; its transaction was rolled back.
    #[error("Rollback of migration '{migration}' failed: {source}")]
    RollbackFailed {
        /// Identifier of the failing migration.
        migration: String,
        /// The underlying failure.
        #[source]
        source: DatabaseError,
    },

    /// No registered migration has this identifier.
    #[error("Migration '{0}' is not registered")]
    UnknownMigration(String),

    /// Two migrations share an identifier.
    #[error("Migration '{0}' is registered twice")]
    DuplicateMigration(String),

    /// `reset` kept finding batches after its iteration ceiling.
    #[error("Reset did not finish after {limit} iterations")]
    ResetLimitExceeded {
        /// The ceiling that was hit.
        limit: usize,
    },

    /// Reading migration files failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// An `.up.sql` file has no `.down.sql` partner.
    #[error("Missing down script for {}", .0.display())]
    MissingDownScript(PathBuf),
}

/// Result type for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;
