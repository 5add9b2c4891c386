//! A single database connection with nested-transaction emulation.

use std::fmt;
use std::time::{Duration, Instant};

use rivet_core::{Dialect, Grammar, Row, SqlValue};
use tokio::runtime::{Builder, Runtime};
use tracing::{debug, info, warn};

use crate::config::{ConnectionConfig, RuntimeMode};
use crate::driver::{self, Action, Handle, Outcome};
use crate::error::{DatabaseError, Result};
use crate::query::QueryBuilder;
use crate::schema::Schema;

/// A statement recorded by the query log.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggedQuery {
    /// Statement with `?` placeholders.
    pub sql: String,
    /// Bound values.
    pub bindings: Vec<SqlValue>,
    /// Wall time spent in the driver; zero while pretending.
    pub elapsed: Duration,
}

fn savepoint_name(level: u32) -> String {
    format!("trans{level}")
}

/// One database handle plus the nesting depth of the current transaction.
///
/// The handle is opened lazily on the first statement. Every call blocks
/// until the database answers; a `Connection` must be used from one thread
/// at a time and never from inside another async runtime.
pub struct Connection {
    config: ConnectionConfig,
    grammar: Box<dyn Grammar>,
    runtime: Runtime,
    handle: Option<Handle>,
    transactions: u32,
    logging: bool,
    query_log: Vec<LoggedQuery>,
    pretending: bool,
    raw_unlocked: bool,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("url", &self.config.url())
            .field("connected", &self.handle.is_some())
            .field("transactions", &self.transactions)
            .field("pretending", &self.pretending)
            .finish_non_exhaustive()
    }
}

impl Connection {
    /// Creates a connection without opening the handle.
    ///
    /// # Errors
    ///
    /// Returns an error if the I/O runtime cannot be started.
    pub fn new(config: ConnectionConfig) -> Result<Self> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| DatabaseError::Connection {
                dialect: config.driver,
                message: format!("failed to start runtime: {e}"),
            })?;
        let grammar = config.driver.grammar(&config.prefix);
        Ok(Self {
            config,
            grammar,
            runtime,
            handle: None,
            transactions: 0,
            logging: false,
            query_log: Vec::new(),
            pretending: false,
            raw_unlocked: false,
        })
    }

    /// Creates a connection and opens the handle immediately.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::Connection`] if the database is unreachable.
    pub fn open(config: ConnectionConfig) -> Result<Self> {
        let mut conn = Self::new(config)?;
        conn.ensure_connected()?;
        Ok(conn)
    }

    #[must_use]
    pub const fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    #[must_use]
    pub const fn dialect(&self) -> Dialect {
        self.config.driver
    }

    /// Grammar compiling for this connection's dialect and prefix.
    #[must_use]
    pub fn grammar(&self) -> &dyn Grammar {
        self.grammar.as_ref()
    }

    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.config.prefix
    }

    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.handle.is_some()
    }

    /// Current nesting depth; 0 outside any transaction.
    #[must_use]
    pub const fn transaction_level(&self) -> u32 {
        self.transactions
    }

    /// True while [`pretend`](Self::pretend) is running.
    #[must_use]
    pub const fn pretending(&self) -> bool {
        self.pretending
    }

    // ------------------------------------------------------------------
    // Handle
    // ------------------------------------------------------------------

    fn ensure_connected(&mut self) -> Result<()> {
        if self.handle.is_some() {
            return Ok(());
        }
        let handle = self
            .runtime
            .block_on(Handle::open(&self.config))
            .map_err(|e| DatabaseError::Connection {
                dialect: self.config.driver,
                message: e.to_string(),
            })?;
        info!(driver = %self.config.driver, url = %self.config.url(), "Connected");
        self.handle = Some(handle);
        Ok(())
    }

    /// Closes the handle and abandons any open transaction.
    pub fn disconnect(&mut self) {
        if let Some(handle) = self.handle.take() {
            if let Err(e) = self.runtime.block_on(handle.close()) {
                warn!(error = %e, "Error while closing connection");
            }
            debug!(driver = %self.config.driver, "Disconnected");
        }
        if self.transactions > 0 {
            warn!(level = self.transactions, "Abandoning open transaction on disconnect");
        }
        self.transactions = 0;
    }

    /// Closes and re-opens the handle.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::Connection`] if the database is unreachable.
    pub fn reconnect(&mut self) -> Result<()> {
        self.disconnect();
        self.ensure_connected()
    }

    // ------------------------------------------------------------------
    // Execution
    // ------------------------------------------------------------------

    fn perform(
        &mut self,
        sql: &str,
        bindings: &[SqlValue],
        action: Action,
    ) -> Result<std::result::Result<Outcome, sqlx::Error>> {
        self.ensure_connected()?;
        let Some(handle) = self.handle.as_mut() else {
            return Err(DatabaseError::Other(String::from("connection handle missing")));
        };
        Ok(self.runtime.block_on(handle.perform(sql, bindings, action)))
    }

    fn run(&mut self, sql: &str, bindings: &[SqlValue], action: Action) -> Result<Outcome> {
        if self.pretending {
            self.log_query(sql, bindings, Duration::ZERO);
            return Ok(Outcome::empty(action));
        }
        let prepared = self.grammar.prepare_placeholders(sql).into_owned();
        debug!(sql = %sql, bindings = bindings.len(), "Executing statement");
        let started = Instant::now();
        let mut attempt = self.perform(&prepared, bindings, action)?;
        if let Err(err) = &attempt {
            if self.transactions == 0 && driver::is_lost_connection(err) {
                warn!(error = %err, "Lost connection, reconnecting once");
                self.handle = None;
                attempt = self.perform(&prepared, bindings, action)?;
            }
        }
        let outcome = attempt.map_err(|err| DatabaseError::Query {
            sql: sql.to_string(),
            bindings: bindings.to_vec(),
            message: err.to_string(),
        })?;
        self.log_query(sql, bindings, started.elapsed());
        Ok(outcome)
    }

    /// Runs a `SELECT` and returns its rows.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::Query`] if the driver rejects the statement.
    pub fn query(&mut self, sql: &str, bindings: &[SqlValue]) -> Result<Vec<Row>> {
        Ok(self.run(sql, bindings, Action::Fetch)?.into_rows())
    }

    /// Runs a `SELECT` and returns its first row.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::Query`] if the driver rejects the statement.
    pub fn select_one(&mut self, sql: &str, bindings: &[SqlValue]) -> Result<Option<Row>> {
        Ok(self.query(sql, bindings)?.into_iter().next())
    }

    /// Runs a statement and returns the number of affected rows.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::Query`] if the driver rejects the statement.
    pub fn execute(&mut self, sql: &str, bindings: &[SqlValue]) -> Result<u64> {
        Ok(self.run(sql, bindings, Action::Execute)?.affected())
    }

    /// Runs a statement whose result is not needed.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::Query`] if the driver rejects the statement.
    pub fn statement(&mut self, sql: &str, bindings: &[SqlValue]) -> Result<()> {
        self.execute(sql, bindings).map(|_| ())
    }

    /// Runs an `INSERT` and returns the generated key, or 0 when the
    /// table has none.
    ///
    /// On PostgreSQL the statement must end in `RETURNING key`, as
    /// produced by `compile_insert_get_id`.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::Query`] if the driver rejects the statement.
    pub fn insert(&mut self, sql: &str, bindings: &[SqlValue]) -> Result<i64> {
        if self.dialect() == Dialect::Postgres {
            let rows = self.query(sql, bindings)?;
            return Ok(rows
                .first()
                .and_then(|row| row.values().next())
                .and_then(SqlValue::as_i64)
                .unwrap_or(0));
        }
        match self.run(sql, bindings, Action::Execute)? {
            Outcome::Affected { last_id, .. } => Ok(last_id.unwrap_or(0)),
            Outcome::Rows(_) => Ok(0),
        }
    }

    /// Runs SQL text without preparing it. May contain several statements.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::RawSqlLocked`] in locked production mode,
    /// or [`DatabaseError::Query`] if the driver rejects the text.
    pub fn unprepared(&mut self, sql: &str) -> Result<u64> {
        self.guard_raw("unprepared")?;
        Ok(self.run(sql, &[], Action::Raw)?.affected())
    }

    // ------------------------------------------------------------------
    // Raw SQL guard
    // ------------------------------------------------------------------

    /// Checks whether raw SQL may be used.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::RawSqlLocked`] in production unless
    /// `allow_raw_sql` is set or the guard was unlocked.
    pub fn guard_raw(&self, what: &str) -> Result<()> {
        match self.config.mode {
            RuntimeMode::Testing => Ok(()),
            RuntimeMode::Development => {
                warn!(operation = %what, "Raw SQL used; it will be refused in production");
                Ok(())
            }
            RuntimeMode::Production if self.config.allow_raw_sql || self.raw_unlocked => Ok(()),
            RuntimeMode::Production => Err(DatabaseError::RawSqlLocked {
                mode: self.config.mode,
            }),
        }
    }

    /// Permits raw SQL on this connection regardless of mode.
    pub fn unlock_raw_sql(&mut self) {
        self.raw_unlocked = true;
    }

    /// Reverts [`unlock_raw_sql`](Self::unlock_raw_sql).
    pub fn lock_raw_sql(&mut self) {
        self.raw_unlocked = false;
    }

    // ------------------------------------------------------------------
    // Transactions
    // ------------------------------------------------------------------

    /// Runs a transaction-control statement. A lost connection drops the
    /// handle and resets the depth to 0, since the server discarded every
    /// open level.
    fn control(&mut self, sql: &str) -> Result<()> {
        if self.pretending {
            return Ok(());
        }
        debug!(sql = %sql, "Transaction control");
        self.perform(sql, &[], Action::Raw)?.map(|_| ()).map_err(|err| {
            if driver::is_lost_connection(&err) {
                warn!(level = self.transactions, error = %err, "Lost connection inside transaction");
                self.handle = None;
                self.transactions = 0;
            }
            DatabaseError::Query {
                sql: sql.to_string(),
                bindings: Vec::new(),
                message: err.to_string(),
            }
        })
    }

    /// Starts a transaction, or a savepoint when one is already open.
    ///
    /// # Errors
    ///
    /// Returns an error if the statement fails; the depth is unchanged
    /// unless the connection was lost.
    pub fn begin_transaction(&mut self) -> Result<()> {
        let sql = if self.transactions == 0 {
            self.grammar.compile_begin()
        } else {
            self.grammar
                .compile_savepoint(&savepoint_name(self.transactions + 1))
        };
        self.control(&sql)?;
        self.transactions += 1;
        debug!(level = self.transactions, "Began transaction");
        Ok(())
    }

    /// Commits the innermost level: `COMMIT` at depth 1, savepoint release
    /// deeper down.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::NoActiveTransaction`] at depth 0, or the
    /// driver error; the depth is unchanged on failure unless the
    /// connection was lost.
    pub fn commit(&mut self) -> Result<()> {
        let sql = match self.transactions {
            0 => return Err(DatabaseError::NoActiveTransaction),
            1 => self.grammar.compile_commit(),
            level => self
                .grammar
                .compile_release_savepoint(&savepoint_name(level)),
        };
        self.control(&sql)?;
        self.transactions -= 1;
        debug!(level = self.transactions, "Committed transaction");
        Ok(())
    }

    /// Rolls back the innermost level: `ROLLBACK` at depth 1, rollback to
    /// savepoint deeper down.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::NoActiveTransaction`] at depth 0, or the
    /// driver error; the depth is unchanged on failure unless the
    /// connection was lost.
    pub fn rollback(&mut self) -> Result<()> {
        let sql = match self.transactions {
            0 => return Err(DatabaseError::NoActiveTransaction),
            1 => self.grammar.compile_rollback(),
            level => self
                .grammar
                .compile_rollback_to_savepoint(&savepoint_name(level)),
        };
        self.control(&sql)?;
        self.transactions -= 1;
        warn!(level = self.transactions, "Rolled back transaction");
        Ok(())
    }

    /// Runs `f` inside a transaction level. `Ok` commits the level; `Err`
    /// rolls it back and is returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns the error of `f`, or a database error from begin/commit.
    pub fn transaction<T, E, F>(&mut self, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&mut Self) -> std::result::Result<T, E>,
        E: From<DatabaseError>,
    {
        self.begin_transaction()?;
        let level = self.transactions;
        match f(self) {
            Ok(value) => {
                if let Err(err) = self.commit() {
                    if self.transactions == level {
                        if let Err(rollback) = self.rollback() {
                            warn!(error = %rollback, "Rollback after failed commit also failed");
                        }
                    }
                    return Err(err.into());
                }
                Ok(value)
            }
            Err(err) => {
                if self.transactions == level {
                    if let Err(rollback) = self.rollback() {
                        warn!(error = %rollback, "Automatic rollback failed");
                    }
                }
                Err(err)
            }
        }
    }

    // ------------------------------------------------------------------
    // Query log and pretend mode
    // ------------------------------------------------------------------

    fn log_query(&mut self, sql: &str, bindings: &[SqlValue], elapsed: Duration) {
        if self.logging {
            self.query_log.push(LoggedQuery {
                sql: sql.to_string(),
                bindings: bindings.to_vec(),
                elapsed,
            });
        }
    }

    /// Starts recording statements.
    pub fn enable_query_log(&mut self) {
        self.logging = true;
    }

    /// Stops recording statements; the log is kept.
    pub fn disable_query_log(&mut self) {
        self.logging = false;
    }

    #[must_use]
    pub const fn logging(&self) -> bool {
        self.logging
    }

    /// Statements recorded so far. Transaction control is not recorded.
    #[must_use]
    pub fn query_log(&self) -> &[LoggedQuery] {
        &self.query_log
    }

    /// Clears the log.
    pub fn flush_query_log(&mut self) {
        self.query_log.clear();
    }

    /// Runs `f` with statements recorded instead of executed and returns
    /// what was recorded. Reads return no rows while pretending.
    ///
    /// # Errors
    ///
    /// Returns the error of `f`.
    pub fn pretend<E, F>(&mut self, f: F) -> std::result::Result<Vec<LoggedQuery>, E>
    where
        F: FnOnce(&mut Self) -> std::result::Result<(), E>,
    {
        let was_logging = self.logging;
        let was_pretending = self.pretending;
        let saved = std::mem::take(&mut self.query_log);
        self.logging = true;
        self.pretending = true;
        let result = f(self);
        let recorded = std::mem::replace(&mut self.query_log, saved);
        self.logging = was_logging;
        self.pretending = was_pretending;
        result.map(|()| recorded)
    }

    // ------------------------------------------------------------------
    // Builders
    // ------------------------------------------------------------------

    /// Starts a query against `table`.
    pub fn table(&mut self, table: &str) -> QueryBuilder<'_> {
        QueryBuilder::new(self, table)
    }

    /// Schema operations on this connection.
    pub fn schema(&mut self) -> Schema<'_> {
        Schema::new(self)
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rivet_core::row;

    fn connection() -> Connection {
        Connection::new(ConnectionConfig::sqlite_memory().with_mode(RuntimeMode::Testing)).unwrap()
    }

    fn count(conn: &mut Connection) -> i64 {
        conn.query("SELECT COUNT(*) AS n FROM items", &[]).unwrap()[0]["n"]
            .as_i64()
            .unwrap()
    }

    #[test]
    fn test_connects_lazily() {
        let mut conn = connection();
        assert!(!conn.is_connected());
        let rows = conn.query("SELECT 1 AS one", &[]).unwrap();
        assert!(conn.is_connected());
        assert_eq!(rows, vec![row! { "one" => 1 }]);
    }

    #[test]
    fn test_insert_returns_generated_id() {
        let mut conn = connection();
        conn.statement("CREATE TABLE items (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT)", &[])
            .unwrap();
        let first = conn
            .insert("INSERT INTO items (name) VALUES (?)", &[SqlValue::Text("a".into())])
            .unwrap();
        let second = conn
            .insert("INSERT INTO items (name) VALUES (?)", &[SqlValue::Text("b".into())])
            .unwrap();
        assert_eq!((first, second), (1, 2));
        let affected = conn
            .execute("UPDATE items SET name = ? WHERE id > ?", &[SqlValue::Null, SqlValue::Int(0)])
            .unwrap();
        assert_eq!(affected, 2);
    }

    #[test]
    fn test_query_error_carries_sql_and_bindings() {
        let mut conn = connection();
        let err = conn
            .query("SELECT * FROM missing WHERE id = ?", &[SqlValue::Int(7)])
            .unwrap_err();
        match err {
            DatabaseError::Query { sql, bindings, message } => {
                assert_eq!(sql, "SELECT * FROM missing WHERE id = ?");
                assert_eq!(bindings, vec![SqlValue::Int(7)]);
                assert!(message.contains("missing"), "{message}");
            }
            other => panic!("expected query error, got {other:?}"),
        }
    }

    #[test]
    fn test_nested_rollback_keeps_outer_write() {
        let mut conn = connection();
        conn.statement("CREATE TABLE items (name TEXT)", &[]).unwrap();

        conn.begin_transaction().unwrap();
        conn.execute("INSERT INTO items (name) VALUES ('A')", &[]).unwrap();
        conn.begin_transaction().unwrap();
        assert_eq!(conn.transaction_level(), 2);
        conn.execute("INSERT INTO items (name) VALUES ('B')", &[]).unwrap();
        conn.rollback().unwrap();
        conn.commit().unwrap();

        assert_eq!(conn.transaction_level(), 0);
        let rows = conn.query("SELECT name FROM items", &[]).unwrap();
        assert_eq!(rows, vec![row! { "name" => "A" }]);
    }

    #[test]
    fn test_transaction_closure_rolls_back_on_error() {
        let mut conn = connection();
        conn.statement("CREATE TABLE items (name TEXT)", &[]).unwrap();

        let result: Result<()> = conn.transaction(|conn| {
            conn.execute("INSERT INTO items (name) VALUES ('A')", &[])?;
            conn.transaction(|conn| {
                conn.execute("INSERT INTO items (name) VALUES ('B')", &[])?;
                Err::<(), _>(DatabaseError::Usage(String::from("inner failure")))
            })
            .or_else(|_| Ok::<(), DatabaseError>(()))?;
            Ok(())
        });
        result.unwrap();
        assert_eq!(count(&mut conn), 1);

        let failed: Result<()> = conn.transaction(|conn| {
            conn.execute("INSERT INTO items (name) VALUES ('C')", &[])?;
            Err(DatabaseError::Other(String::from("boom")))
        });
        assert!(failed.is_err());
        assert_eq!(conn.transaction_level(), 0);
        assert_eq!(count(&mut conn), 1);
    }

    #[test]
    fn test_commit_without_transaction() {
        let mut conn = connection();
        assert!(matches!(conn.commit(), Err(DatabaseError::NoActiveTransaction)));
        assert!(matches!(conn.rollback(), Err(DatabaseError::NoActiveTransaction)));
    }

    #[test]
    fn test_failed_savepoint_rollback_keeps_depth() {
        let mut conn = connection();
        conn.begin_transaction().unwrap();
        conn.begin_transaction().unwrap();
        conn.unprepared("RELEASE SAVEPOINT trans2").unwrap();

        let err = conn.rollback().unwrap_err();
        assert!(matches!(err, DatabaseError::Query { ref sql, .. } if sql.contains("trans2")));
        assert_eq!(conn.transaction_level(), 2);
        assert!(conn.is_connected());

        conn.disconnect();
        assert_eq!(conn.transaction_level(), 0);
    }

    #[test]
    fn test_disconnect_resets_depth() {
        let mut conn = connection();
        conn.begin_transaction().unwrap();
        conn.disconnect();
        assert_eq!(conn.transaction_level(), 0);
        assert!(!conn.is_connected());
        conn.reconnect().unwrap();
        assert!(conn.is_connected());
    }

    #[test]
    fn test_query_log_skips_transaction_control() {
        let mut conn = connection();
        conn.enable_query_log();
        conn.transaction(|conn| conn.query("SELECT ? AS v", &[SqlValue::Int(3)]))
            .unwrap();
        assert_eq!(conn.query_log().len(), 1);
        assert_eq!(conn.query_log()[0].sql, "SELECT ? AS v");
        conn.flush_query_log();
        assert!(conn.query_log().is_empty());
    }

    #[test]
    fn test_pretend_records_without_executing() {
        let mut conn = connection();
        let log = conn
            .pretend(|conn| {
                conn.statement("CREATE TABLE ghosts (id INTEGER)", &[])?;
                conn.execute("INSERT INTO ghosts (id) VALUES (?)", &[SqlValue::Int(1)])
                    .map(|_| ())
            })
            .unwrap();
        assert_eq!(log.len(), 2);
        assert!(conn.query("SELECT * FROM ghosts", &[]).is_err());
        assert!(!conn.logging());
    }

    #[test]
    fn test_raw_guard_per_mode() {
        let mut prod =
            Connection::new(ConnectionConfig::sqlite_memory().with_mode(RuntimeMode::Production))
                .unwrap();
        assert!(matches!(
            prod.unprepared("CREATE TABLE t (id INTEGER)"),
            Err(DatabaseError::RawSqlLocked { mode: RuntimeMode::Production })
        ));
        prod.unlock_raw_sql();
        prod.unprepared("CREATE TABLE t (id INTEGER); INSERT INTO t VALUES (1);")
            .unwrap();

        let dev = Connection::new(ConnectionConfig::sqlite_memory()).unwrap();
        assert!(dev.guard_raw("select_raw").is_ok());
    }
}
