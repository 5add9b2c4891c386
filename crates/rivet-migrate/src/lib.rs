//! # rivet-migrate
//!
//! Batched, reversible schema migrations for the rivet persistence engine.
//!
//! # Architecture
//!
//! - **[`Migration`]** - a unit with `up` and `down`, written against the
//!   [`Schema`](rivet_db::Schema) facade or read from SQL files
//! - **[`MigrationSet`]** - units keyed by id, applied in lexicographic
//!   order (prefix ids with a timestamp)
//! - **[`MigrationRepository`]** - the `migrations` table recording which
//!   units ran and in which batch
//! - **[`Migrator`]** - `run`, `rollback`, `reset`, `fresh`, `status` and a
//!   risk-annotated dry run
//!
//! # Example
//!
//! ```rust
//! use rivet_db::{Connection, ConnectionConfig, RuntimeMode, Schema};
//! use rivet_migrate::{Migration, MigrationSet, Migrator};
//!
//! struct CreateUsers;
//!
//! impl Migration for CreateUsers {
//!     fn up(&self, schema: &mut Schema<'_>) -> rivet_db::Result<()> {
//!         schema.create("users", |table| {
//!             table.id();
//!             table.string("name");
//!         })
//!     }
//!
//!     fn down(&self, schema: &mut Schema<'_>) -> rivet_db::Result<()> {
//!         schema.drop("users")
//!     }
//! }
//!
//! let config = ConnectionConfig::sqlite_memory().with_mode(RuntimeMode::Testing);
//! let mut conn = Connection::new(config).unwrap();
//! let set = MigrationSet::new()
//!     .with("2024_01_01_000000_create_users", CreateUsers)
//!     .unwrap();
//!
//! let mut migrator = Migrator::new(&mut conn, set);
//! assert_eq!(migrator.run().unwrap().len(), 1);
//! assert_eq!(migrator.rollback(1).unwrap().len(), 1);
//! ```

pub mod error;
pub mod migration;
pub mod migrator;
pub mod repository;

pub use error::{MigrateError, Result};
pub use migration::{split_statements, Migration, MigrationSet, SqlMigration};
pub use migrator::{
    MigrationStatus, Migrator, MigratorState, PlannedMigration, DEFAULT_MAX_RESET_ITERATIONS,
};
pub use repository::{MigrationRecord, MigrationRepository, DEFAULT_TABLE};
