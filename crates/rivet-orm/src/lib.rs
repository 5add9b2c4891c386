//! # rivet-orm
//!
//! Active-record models on top of `rivet-db`.
//!
//! This crate provides:
//! - The [`Model`] trait describing a table, its casts and its relations
//! - [`Entity`], one row with dirty tracking, casting and persistence
//! - [`PersistencePolicy`] for timestamps, soft deletes and lifecycle
//!   observers
//! - [`Relation`]s (one-to-one, one-to-many, many-to-one, many-to-many)
//!   resolved lazily or eagerly with one query per relation
//! - [`ModelQuery`], a query builder that returns entities
//!
//! # Architecture
//!
//! ```text
//! Model::query(conn) ──► ModelQuery ──► QueryBuilder ──► Connection
//!                            │
//!                            ├─ soft-delete scope
//!                            └─ with(["posts"]) ──► eager::load (1 query per relation)
//! ```
//!
//! A model is a type that only describes its table; rows are [`Entity`]
//! values holding the model's [`ModelMeta`]. Every operation that touches
//! the database takes the [`Connection`](rivet_db::Connection) explicitly.
//!
//! ## Example
//!
//! ```rust
//! use rivet_core::row;
//! use rivet_db::{Connection, ConnectionConfig, RuntimeMode};
//! use rivet_orm::{Model, PersistencePolicy, Relation};
//!
//! struct Author;
//! struct Book;
//!
//! impl Model for Author {
//!     const TABLE: &'static str = "authors";
//!
//!     fn relations() -> Vec<Relation> {
//!         vec![Relation::has_many::<Book>("books", "author_id")]
//!     }
//! }
//!
//! impl Model for Book {
//!     const TABLE: &'static str = "books";
//!
//!     fn policy() -> PersistencePolicy {
//!         PersistencePolicy::new().with_timestamps()
//!     }
//! }
//!
//! let mut conn =
//!     Connection::new(ConnectionConfig::sqlite_memory().with_mode(RuntimeMode::Testing)).unwrap();
//! let mut schema = conn.schema();
//! schema.create("authors", |t| {
//!     t.id();
//!     t.string("name");
//! }).unwrap();
//! schema.create("books", |t| {
//!     t.id();
//!     t.foreign_id("author_id");
//!     t.string("title");
//!     t.timestamps();
//! }).unwrap();
//!
//! let author = Author::create(&mut conn, row! { "name" => "Le Guin" }).unwrap();
//! let author_id = author.key().cloned().unwrap();
//! Book::create(&mut conn, row! { "author_id" => author_id, "title" => "The Dispossessed" }).unwrap();
//!
//! let authors = Author::query(&mut conn).with(&["books"]).get().unwrap();
//! let books = authors[0].relation("books").unwrap();
//! assert_eq!(books.as_many()[0].get("title"), "The Dispossessed");
//! ```

pub mod cast;
pub mod eager;
mod entity;
mod error;
mod model;
pub mod policy;
mod query;
pub mod relation;

pub use cast::Cast;
pub use eager::load;
pub use entity::Entity;
pub use error::{OrmError, Result};
pub use model::{Model, ModelMeta};
pub use policy::{ModelEvent, Observer, PersistencePolicy, SoftDeletes, Timestamps};
pub use query::ModelQuery;
pub use relation::{PivotTable, Related, Relation, RelationKind};
