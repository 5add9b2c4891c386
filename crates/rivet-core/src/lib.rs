//! # rivet-core
//!
//! Driver-independent building blocks of the rivet persistence engine.
//!
//! This crate provides:
//! - Bound values ([`SqlValue`]) and rows ([`Row`])
//! - Structured query descriptors compiled by dialect [`Grammar`]s
//! - The schema [`Blueprint`](schema::Blueprint) DSL
//! - An advisory [`RiskAnalyzer`](risk::RiskAnalyzer) for DDL and DML
//!
//! Nothing in here talks to a database. Compilation is pure:
//!
//! ```rust
//! use rivet_core::{Boolean, Dialect, Operator, QueryDescriptor, SqlValue, WhereKind};
//!
//! let mut query = QueryDescriptor::new("users");
//! query.add_where(
//!     Boolean::And,
//!     WhereKind::Basic {
//!         column: "email".into(),
//!         operator: Operator::Eq,
//!         value: SqlValue::Text("ada@example.com".into()),
//!     },
//! );
//!
//! let grammar = Dialect::MySql.grammar("");
//! assert_eq!(
//!     grammar.compile_select(&query),
//!     "SELECT * FROM `users` WHERE `email` = ?"
//! );
//! assert_eq!(query.bindings().len(), 1);
//! ```

pub mod collection;
pub mod dialect;
pub mod error;
pub mod grammar;
pub mod query;
pub mod risk;
pub mod schema;
pub mod value;

pub use collection::Collection;
pub use dialect::Dialect;
pub use error::{GrammarError, Result};
pub use grammar::{Assignment, Grammar, MySqlGrammar, PostgresGrammar, SqliteGrammar};
pub use query::{
    Boolean, Direction, Having, Join, JoinKind, Operator, Order, QueryDescriptor, Selection,
    Where, WhereKind,
};
pub use risk::{RiskAnalyzer, RiskAssessment, RiskLevel, RiskRule};
pub use value::{Row, SqlValue, ToSqlValue, TIMESTAMP_FORMAT};
