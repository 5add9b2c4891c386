//! Schema facade: turns blueprints into DDL and runs it.

use rivet_core::schema::{Blueprint, TableNameResolver};
use rivet_core::SqlValue;
use tracing::{debug, info};

use crate::connection::Connection;
use crate::error::Result;

/// Schema operations bound to one connection.
#[derive(Debug)]
pub struct Schema<'c> {
    conn: &'c mut Connection,
    resolver: Option<TableNameResolver>,
}

impl<'c> Schema<'c> {
    pub fn new(conn: &'c mut Connection) -> Self {
        Self {
            conn,
            resolver: None,
        }
    }

    /// Uses `resolver` for `constrained()` foreign keys in later
    /// blueprints.
    #[must_use]
    pub fn with_resolver(mut self, resolver: TableNameResolver) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// The connection DDL runs on.
    pub fn connection(&mut self) -> &mut Connection {
        self.conn
    }

    fn blueprint(&self, blueprint: Blueprint) -> Blueprint {
        let blueprint = blueprint.with_prefix(self.conn.prefix());
        match &self.resolver {
            Some(resolver) => blueprint.with_resolver(resolver.clone()),
            None => blueprint,
        }
    }

    /// DDL statements a blueprint compiles to, without running them.
    ///
    /// # Errors
    ///
    /// Returns a grammar error when the dialect cannot express the change.
    pub fn to_sql(&self, blueprint: &Blueprint) -> Result<Vec<String>> {
        Ok(self.conn.grammar().compile_blueprint(blueprint)?)
    }

    /// Compiles and runs a blueprint, one statement at a time.
    ///
    /// # Errors
    ///
    /// Returns a grammar error before anything runs, or the first failing
    /// statement's error.
    pub fn build(&mut self, blueprint: Blueprint) -> Result<()> {
        let blueprint = self.blueprint(blueprint);
        let statements = self.to_sql(&blueprint)?;
        debug!(table = %blueprint.table(), statements = statements.len(), "Building blueprint");
        for sql in &statements {
            self.conn.statement(sql, &[])?;
        }
        Ok(())
    }

    /// Creates `table` from the columns defined by `f`.
    ///
    /// # Errors
    ///
    /// Returns a grammar or driver error.
    pub fn create(&mut self, table: &str, f: impl FnOnce(&mut Blueprint)) -> Result<()> {
        let mut blueprint = self.blueprint(Blueprint::create(table));
        f(&mut blueprint);
        self.build(blueprint)?;
        info!(table = %table, "Created table");
        Ok(())
    }

    /// Alters `table` with the changes defined by `f`.
    ///
    /// # Errors
    ///
    /// Returns a grammar or driver error.
    pub fn table(&mut self, table: &str, f: impl FnOnce(&mut Blueprint)) -> Result<()> {
        let mut blueprint = self.blueprint(Blueprint::alter(table));
        f(&mut blueprint);
        self.build(blueprint)
    }

    /// # Errors
    ///
    /// Returns the driver error, including when the table is missing.
    pub fn drop(&mut self, table: &str) -> Result<()> {
        let sql = self.conn.grammar().compile_drop_table(table);
        self.conn.statement(&sql, &[])?;
        info!(table = %table, "Dropped table");
        Ok(())
    }

    /// # Errors
    ///
    /// Returns the driver error.
    pub fn drop_if_exists(&mut self, table: &str) -> Result<()> {
        let sql = self.conn.grammar().compile_drop_table_if_exists(table);
        self.conn.statement(&sql, &[])
    }

    /// # Errors
    ///
    /// Returns the driver error.
    pub fn rename(&mut self, from: &str, to: &str) -> Result<()> {
        let sql = self.conn.grammar().compile_rename_table(from, to);
        self.conn.statement(&sql, &[])
    }

    /// True when `table` exists. The prefix is applied.
    ///
    /// # Errors
    ///
    /// Returns the driver error.
    pub fn has_table(&mut self, table: &str) -> Result<bool> {
        let (sql, bindings) = self.conn.grammar().compile_table_exists(table);
        let count = self
            .conn
            .select_one(&sql, &bindings)?
            .and_then(|row| row.get("aggregate").and_then(SqlValue::as_i64))
            .unwrap_or(0);
        Ok(count > 0)
    }

    /// Column names of `table` in definition order.
    ///
    /// # Errors
    ///
    /// Returns the driver error.
    pub fn column_listing(&mut self, table: &str) -> Result<Vec<String>> {
        let (sql, bindings) = self.conn.grammar().compile_column_listing(table);
        Ok(self
            .conn
            .query(&sql, &bindings)?
            .into_iter()
            .filter_map(|mut row| match row.remove("column_name") {
                Some(SqlValue::Text(name)) => Some(name),
                _ => None,
            })
            .collect())
    }

    /// True when `table` has `column`, compared case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns the driver error.
    pub fn has_column(&mut self, table: &str, column: &str) -> Result<bool> {
        Ok(self
            .column_listing(table)?
            .iter()
            .any(|name| name.eq_ignore_ascii_case(column)))
    }

    /// Runs one DDL statement as given.
    ///
    /// # Errors
    ///
    /// Returns the driver error.
    pub fn statement(&mut self, sql: &str) -> Result<()> {
        self.conn.statement(sql, &[])
    }
}
