//! # rivet-db
//!
//! Connections, transactions and the fluent query builder for the rivet
//! persistence engine.
//!
//! # How the pieces fit
//!
//! - A [`Connection`] owns one sqlx handle (SQLite, MySQL or PostgreSQL)
//!   and a small I/O runtime, so every call is blocking.
//! - Nested [`Connection::transaction`] calls become savepoints named
//!   `trans2`, `trans3`, and so on. Rolling back an inner level keeps the
//!   outer level's work.
//! - [`QueryBuilder`] collects a
//!   [`QueryDescriptor`](rivet_core::QueryDescriptor) and compiles it with
//!   the connection's grammar. Errors surface at the terminal call.
//! - [`Schema`] compiles [`Blueprint`](rivet_core::schema::Blueprint)s
//!   into DDL.
//! - Raw SQL fragments pass through a guard that refuses them in
//!   production unless explicitly unlocked.
//!
//! ## Example
//!
//! ```rust
//! use rivet_core::row;
//! use rivet_db::{Connection, ConnectionConfig, RuntimeMode};
//!
//! let config = ConnectionConfig::sqlite_memory().with_mode(RuntimeMode::Testing);
//! let mut conn = Connection::new(config).unwrap();
//!
//! conn.schema()
//!     .create("users", |table| {
//!         table.id();
//!         table.string("name");
//!         table.integer("age");
//!     })
//!     .unwrap();
//!
//! conn.table("users")
//!     .insert(row! { "name" => "Ada", "age" => 36 })
//!     .unwrap();
//!
//! let adults = conn.table("users").where_op("age", ">=", 18).count().unwrap();
//! assert_eq!(adults, 1);
//! ```

pub mod config;
pub mod connection;
mod driver;
pub mod error;
pub mod pagination;
pub mod query;
pub mod schema;

pub use config::{ConnectionConfig, RuntimeMode, SQLITE_MEMORY};
pub use connection::{Connection, LoggedQuery};
pub use error::{DatabaseError, Result};
pub use pagination::LengthAwarePaginator;
pub use query::{Conditions, QueryBuilder};
pub use schema::Schema;
