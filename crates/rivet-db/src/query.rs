//! Fluent query builder.
//!
//! Chain methods never fail: an invalid operator or a locked raw fragment
//! is remembered and returned by the first terminal call.

use std::collections::BTreeSet;

use rivet_core::{
    Assignment, Boolean, Collection, Direction, Join, JoinKind, Operator, QueryDescriptor, Row,
    SqlValue, ToSqlValue, Where, WhereKind,
};
use tracing::debug;

use crate::connection::Connection;
use crate::error::{DatabaseError, Result};
use crate::pagination::LengthAwarePaginator;

fn parse_operator(operator: &str) -> Result<Operator> {
    operator.parse().map_err(DatabaseError::from)
}

/// Predicates collected for a parenthesised group.
#[derive(Debug, Clone, Default)]
pub struct Conditions {
    wheres: Vec<Where>,
    error: Option<DatabaseError>,
}

impl Conditions {
    fn push(mut self, boolean: Boolean, kind: WhereKind) -> Self {
        self.wheres.push(Where { boolean, kind });
        self
    }

    fn push_basic(mut self, boolean: Boolean, column: &str, operator: &str, value: SqlValue) -> Self {
        match parse_operator(operator) {
            Ok(operator) => self.push(
                boolean,
                WhereKind::Basic {
                    column: column.to_string(),
                    operator,
                    value,
                },
            ),
            Err(err) => {
                self.error.get_or_insert(err);
                self
            }
        }
    }

    #[must_use]
    pub fn where_op(self, column: &str, operator: &str, value: impl ToSqlValue) -> Self {
        self.push_basic(Boolean::And, column, operator, value.to_sql_value())
    }

    #[must_use]
    pub fn where_eq(self, column: &str, value: impl ToSqlValue) -> Self {
        self.where_op(column, "=", value)
    }

    #[must_use]
    pub fn or_where(self, column: &str, operator: &str, value: impl ToSqlValue) -> Self {
        self.push_basic(Boolean::Or, column, operator, value.to_sql_value())
    }

    #[must_use]
    pub fn or_where_eq(self, column: &str, value: impl ToSqlValue) -> Self {
        self.or_where(column, "=", value)
    }

    #[must_use]
    pub fn where_in<V: ToSqlValue>(self, column: &str, values: impl IntoIterator<Item = V>) -> Self {
        self.push(
            Boolean::And,
            WhereKind::In {
                column: column.to_string(),
                values: values.into_iter().map(ToSqlValue::to_sql_value).collect(),
                not: false,
            },
        )
    }

    #[must_use]
    pub fn where_null(self, column: &str) -> Self {
        self.push(
            Boolean::And,
            WhereKind::Null {
                column: column.to_string(),
                not: false,
            },
        )
    }

    #[must_use]
    pub fn or_where_null(self, column: &str) -> Self {
        self.push(
            Boolean::Or,
            WhereKind::Null {
                column: column.to_string(),
                not: false,
            },
        )
    }

    #[must_use]
    pub fn where_not_null(self, column: &str) -> Self {
        self.push(
            Boolean::And,
            WhereKind::Null {
                column: column.to_string(),
                not: true,
            },
        )
    }
}

/// Accumulates a query descriptor, compiles it with the connection's
/// grammar and runs it.
///
/// Terminal methods take `&mut self` and leave the descriptor untouched, so
/// a builder can be run more than once.
#[derive(Debug)]
pub struct QueryBuilder<'c> {
    conn: &'c mut Connection,
    query: QueryDescriptor,
    error: Option<DatabaseError>,
}

impl<'c> QueryBuilder<'c> {
    /// Starts a query against `table` (`"users"` or `"users as u"`).
    pub fn new(conn: &'c mut Connection, table: &str) -> Self {
        Self {
            conn,
            query: QueryDescriptor::new(table),
            error: None,
        }
    }

    fn fail(&mut self, err: DatabaseError) {
        self.error.get_or_insert(err);
    }

    fn allow_raw(&mut self, what: &str) -> bool {
        match self.conn.guard_raw(what) {
            Ok(()) => true,
            Err(err) => {
                self.fail(err);
                false
            }
        }
    }

    /// Returns the first error recorded while chaining.
    ///
    /// # Errors
    ///
    /// Returns the recorded error.
    pub fn check(&self) -> Result<()> {
        self.error.clone().map_or(Ok(()), Err)
    }

    /// The accumulated descriptor.
    #[must_use]
    pub const fn descriptor(&self) -> &QueryDescriptor {
        &self.query
    }

    /// Mutable access to the descriptor.
    pub fn descriptor_mut(&mut self) -> &mut QueryDescriptor {
        &mut self.query
    }

    /// The connection this builder runs on.
    pub fn connection(&mut self) -> &mut Connection {
        self.conn
    }

    /// Source table as given.
    #[must_use]
    pub fn table_name(&self) -> &str {
        &self.query.table
    }

    // ------------------------------------------------------------------
    // Projection
    // ------------------------------------------------------------------

    /// Replaces the projection.
    #[must_use]
    pub fn select(mut self, columns: &[&str]) -> Self {
        self.query.columns.clear();
        for column in columns {
            self.query.add_column(*column);
        }
        self
    }

    /// Appends to the projection.
    #[must_use]
    pub fn add_select(mut self, columns: &[&str]) -> Self {
        for column in columns {
            self.query.add_column(*column);
        }
        self
    }

    /// Appends a raw projection expression.
    #[must_use]
    pub fn select_raw(mut self, expression: &str, bindings: Vec<SqlValue>) -> Self {
        if self.allow_raw("select_raw") {
            self.query.add_select_raw(expression, bindings);
        }
        self
    }

    #[must_use]
    pub fn distinct(mut self) -> Self {
        self.query.distinct = true;
        self
    }

    // ------------------------------------------------------------------
    // Joins
    // ------------------------------------------------------------------

    fn push_join(mut self, kind: JoinKind, table: &str, first: &str, operator: &str, second: &str) -> Self {
        match parse_operator(operator) {
            Ok(operator) => self.query.add_join(Join {
                kind,
                table: table.to_string(),
                first: first.to_string(),
                operator,
                second: second.to_string(),
            }),
            Err(err) => self.fail(err),
        }
        self
    }

    #[must_use]
    pub fn join(self, table: &str, first: &str, operator: &str, second: &str) -> Self {
        self.push_join(JoinKind::Inner, table, first, operator, second)
    }

    #[must_use]
    pub fn left_join(self, table: &str, first: &str, operator: &str, second: &str) -> Self {
        self.push_join(JoinKind::Left, table, first, operator, second)
    }

    #[must_use]
    pub fn right_join(self, table: &str, first: &str, operator: &str, second: &str) -> Self {
        self.push_join(JoinKind::Right, table, first, operator, second)
    }

    // ------------------------------------------------------------------
    // Predicates
    // ------------------------------------------------------------------

    fn push_basic(mut self, boolean: Boolean, column: &str, operator: &str, value: SqlValue) -> Self {
        match parse_operator(operator) {
            Ok(operator) => self.query.add_where(
                boolean,
                WhereKind::Basic {
                    column: column.to_string(),
                    operator,
                    value,
                },
            ),
            Err(err) => self.fail(err),
        }
        self
    }

    /// `column operator ?`.
    #[must_use]
    pub fn where_op(self, column: &str, operator: &str, value: impl ToSqlValue) -> Self {
        self.push_basic(Boolean::And, column, operator, value.to_sql_value())
    }

    /// `column = ?`.
    #[must_use]
    pub fn where_eq(self, column: &str, value: impl ToSqlValue) -> Self {
        self.where_op(column, "=", value)
    }

    #[must_use]
    pub fn or_where(self, column: &str, operator: &str, value: impl ToSqlValue) -> Self {
        self.push_basic(Boolean::Or, column, operator, value.to_sql_value())
    }

    #[must_use]
    pub fn or_where_eq(self, column: &str, value: impl ToSqlValue) -> Self {
        self.or_where(column, "=", value)
    }

    fn push_in<V: ToSqlValue>(
        mut self,
        boolean: Boolean,
        column: &str,
        values: impl IntoIterator<Item = V>,
        not: bool,
    ) -> Self {
        self.query.add_where(
            boolean,
            WhereKind::In {
                column: column.to_string(),
                values: values.into_iter().map(ToSqlValue::to_sql_value).collect(),
                not,
            },
        );
        self
    }

    #[must_use]
    pub fn where_in<V: ToSqlValue>(self, column: &str, values: impl IntoIterator<Item = V>) -> Self {
        self.push_in(Boolean::And, column, values, false)
    }

    #[must_use]
    pub fn or_where_in<V: ToSqlValue>(self, column: &str, values: impl IntoIterator<Item = V>) -> Self {
        self.push_in(Boolean::Or, column, values, false)
    }

    #[must_use]
    pub fn where_not_in<V: ToSqlValue>(self, column: &str, values: impl IntoIterator<Item = V>) -> Self {
        self.push_in(Boolean::And, column, values, true)
    }

    fn push_null(mut self, boolean: Boolean, column: &str, not: bool) -> Self {
        self.query.add_where(
            boolean,
            WhereKind::Null {
                column: column.to_string(),
                not,
            },
        );
        self
    }

    #[must_use]
    pub fn where_null(self, column: &str) -> Self {
        self.push_null(Boolean::And, column, false)
    }

    #[must_use]
    pub fn or_where_null(self, column: &str) -> Self {
        self.push_null(Boolean::Or, column, false)
    }

    #[must_use]
    pub fn where_not_null(self, column: &str) -> Self {
        self.push_null(Boolean::And, column, true)
    }

    fn push_between(mut self, column: &str, low: SqlValue, high: SqlValue, not: bool) -> Self {
        self.query.add_where(
            Boolean::And,
            WhereKind::Between {
                column: column.to_string(),
                low,
                high,
                not,
            },
        );
        self
    }

    #[must_use]
    pub fn where_between(self, column: &str, low: impl ToSqlValue, high: impl ToSqlValue) -> Self {
        self.push_between(column, low.to_sql_value(), high.to_sql_value(), false)
    }

    #[must_use]
    pub fn where_not_between(self, column: &str, low: impl ToSqlValue, high: impl ToSqlValue) -> Self {
        self.push_between(column, low.to_sql_value(), high.to_sql_value(), true)
    }

    /// Column-to-column comparison.
    #[must_use]
    pub fn where_column(mut self, first: &str, operator: &str, second: &str) -> Self {
        match parse_operator(operator) {
            Ok(operator) => self.query.add_where(
                Boolean::And,
                WhereKind::Column {
                    first: first.to_string(),
                    operator,
                    second: second.to_string(),
                },
            ),
            Err(err) => self.fail(err),
        }
        self
    }

    fn push_nested(mut self, boolean: Boolean, f: impl FnOnce(Conditions) -> Conditions) -> Self {
        let conditions = f(Conditions::default());
        if let Some(err) = conditions.error {
            self.fail(err);
        }
        self.query.add_where(boolean, WhereKind::Nested(conditions.wheres));
        self
    }

    /// Parenthesised group joined with `AND`. An empty group is dropped.
    #[must_use]
    pub fn where_nested(self, f: impl FnOnce(Conditions) -> Conditions) -> Self {
        self.push_nested(Boolean::And, f)
    }

    /// Parenthesised group joined with `OR`.
    #[must_use]
    pub fn or_where_nested(self, f: impl FnOnce(Conditions) -> Conditions) -> Self {
        self.push_nested(Boolean::Or, f)
    }

    /// Raw predicate with its own bindings.
    #[must_use]
    pub fn where_raw(mut self, sql: &str, bindings: Vec<SqlValue>) -> Self {
        if self.allow_raw("where_raw") {
            self.query.add_where(
                Boolean::And,
                WhereKind::Raw {
                    sql: sql.to_string(),
                    bindings,
                },
            );
        }
        self
    }

    // ------------------------------------------------------------------
    // Grouping and ordering
    // ------------------------------------------------------------------

    #[must_use]
    pub fn group_by(mut self, columns: &[&str]) -> Self {
        for column in columns {
            self.query.add_group(*column);
        }
        self
    }

    /// `HAVING column operator ?`.
    #[must_use]
    pub fn having(mut self, column: &str, operator: &str, value: impl ToSqlValue) -> Self {
        match parse_operator(operator) {
            Ok(operator) => {
                self.query
                    .add_having(Boolean::And, column, operator, value.to_sql_value());
            }
            Err(err) => self.fail(err),
        }
        self
    }

    /// Raw `HAVING` fragment.
    #[must_use]
    pub fn having_raw(mut self, sql: &str, bindings: Vec<SqlValue>) -> Self {
        if self.allow_raw("having_raw") {
            self.query.add_having_raw(Boolean::And, sql, bindings);
        }
        self
    }

    #[must_use]
    pub fn order_by(mut self, column: &str, direction: Direction) -> Self {
        self.query.add_order(column, direction);
        self
    }

    #[must_use]
    pub fn order_by_desc(self, column: &str) -> Self {
        self.order_by(column, Direction::Desc)
    }

    #[must_use]
    pub fn order_by_raw(mut self, sql: &str, bindings: Vec<SqlValue>) -> Self {
        if self.allow_raw("order_by_raw") {
            self.query.add_order_raw(sql, bindings);
        }
        self
    }

    /// Newest first by `column`.
    #[must_use]
    pub fn latest(self, column: &str) -> Self {
        self.order_by(column, Direction::Desc)
    }

    /// Oldest first by `column`.
    #[must_use]
    pub fn oldest(self, column: &str) -> Self {
        self.order_by(column, Direction::Asc)
    }

    #[must_use]
    pub fn limit(mut self, limit: u64) -> Self {
        self.query.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn offset(mut self, offset: u64) -> Self {
        self.query.offset = Some(offset);
        self
    }

    /// Limit and offset for a 1-based page.
    #[must_use]
    pub fn for_page(mut self, page: u64, per_page: u64) -> Self {
        self.query.for_page(page, per_page);
        self
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Compiled `SELECT`.
    ///
    /// # Errors
    ///
    /// Returns the first error recorded while chaining.
    pub fn to_sql(&self) -> Result<String> {
        self.check()?;
        Ok(self.conn.grammar().compile_select(&self.query))
    }

    /// Bindings of the compiled `SELECT`, in placeholder order.
    #[must_use]
    pub fn bindings(&self) -> Vec<SqlValue> {
        self.query.bindings()
    }

    fn fetch(&mut self, query: &QueryDescriptor) -> Result<Collection<Row>> {
        self.check()?;
        let sql = self.conn.grammar().compile_select(query);
        Ok(Collection::new(self.conn.query(&sql, &query.bindings())?))
    }

    /// Runs the `SELECT`.
    ///
    /// # Errors
    ///
    /// Returns a recorded chain error or the driver error.
    pub fn get(&mut self) -> Result<Collection<Row>> {
        let query = self.query.clone();
        self.fetch(&query)
    }

    /// First row; the builder's own limit is left as it was.
    ///
    /// # Errors
    ///
    /// Returns a recorded chain error or the driver error.
    pub fn first(&mut self) -> Result<Option<Row>> {
        let mut query = self.query.clone();
        query.limit = Some(1);
        Ok(self.fetch(&query)?.into_iter().next())
    }

    /// Row whose `id` equals `id`.
    ///
    /// # Errors
    ///
    /// Returns a recorded chain error or the driver error.
    pub fn find(&mut self, id: impl ToSqlValue) -> Result<Option<Row>> {
        self.find_by("id", id)
    }

    /// Row whose `key` equals `id`.
    ///
    /// # Errors
    ///
    /// Returns a recorded chain error or the driver error.
    pub fn find_by(&mut self, key: &str, id: impl ToSqlValue) -> Result<Option<Row>> {
        let mut query = self.query.clone();
        query.add_where(
            Boolean::And,
            WhereKind::Basic {
                column: key.to_string(),
                operator: Operator::Eq,
                value: id.to_sql_value(),
            },
        );
        query.limit = Some(1);
        Ok(self.fetch(&query)?.into_iter().next())
    }

    /// `column` of the first row.
    ///
    /// # Errors
    ///
    /// Returns a recorded chain error or the driver error.
    pub fn value(&mut self, column: &str) -> Result<Option<SqlValue>> {
        let mut query = self.query.clone();
        query.columns.clear();
        query.add_column(column);
        query.limit = Some(1);
        let key = column.rsplit('.').next().unwrap_or(column);
        Ok(self
            .fetch(&query)?
            .into_iter()
            .next()
            .and_then(|mut row| row.remove(key)))
    }

    /// `column` of every row.
    ///
    /// # Errors
    ///
    /// Returns a recorded chain error or the driver error.
    pub fn pluck(&mut self, column: &str) -> Result<Vec<SqlValue>> {
        let mut query = self.query.clone();
        query.columns.clear();
        query.add_column(column);
        let key = column.rsplit('.').next().unwrap_or(column);
        Ok(self.fetch(&query)?.pluck(key))
    }

    fn aggregate(&mut self, function: &str, column: &str) -> Result<SqlValue> {
        self.check()?;
        let query = self.query.without_pagination();
        let grammar = self.conn.grammar();
        let sql = grammar.compile_aggregate(&query, function, column);
        let bindings = if query.needs_aggregate_subquery() {
            query.bindings()
        } else {
            query.where_bindings().to_vec()
        };
        debug!(function = %function, column = %column, "Aggregate");
        Ok(self
            .conn
            .select_one(&sql, &bindings)?
            .and_then(|mut row| row.remove("aggregate"))
            .unwrap_or(SqlValue::Null))
    }

    /// Number of matching rows; limit and offset are ignored.
    ///
    /// # Errors
    ///
    /// Returns a recorded chain error or the driver error.
    pub fn count(&mut self) -> Result<u64> {
        let value = self.aggregate("count", "*")?;
        Ok(value.as_i64().and_then(|n| u64::try_from(n).ok()).unwrap_or(0))
    }

    /// True when at least one row matches.
    ///
    /// # Errors
    ///
    /// Returns a recorded chain error or the driver error.
    pub fn exists(&mut self) -> Result<bool> {
        self.check()?;
        let sql = self.conn.grammar().compile_exists(&self.query);
        let bindings = self.query.bindings();
        Ok(self
            .conn
            .select_one(&sql, &bindings)?
            .and_then(|row| row.get("exists").and_then(SqlValue::as_bool))
            .unwrap_or(false))
    }

    /// Largest value of `column`; `None` when no row matches.
    ///
    /// # Errors
    ///
    /// Returns a recorded chain error or the driver error.
    pub fn max(&mut self, column: &str) -> Result<Option<SqlValue>> {
        let value = self.aggregate("max", column)?;
        Ok((!value.is_null()).then_some(value))
    }

    /// Smallest value of `column`; `None` when no row matches.
    ///
    /// # Errors
    ///
    /// Returns a recorded chain error or the driver error.
    pub fn min(&mut self, column: &str) -> Result<Option<SqlValue>> {
        let value = self.aggregate("min", column)?;
        Ok((!value.is_null()).then_some(value))
    }

    /// Sum of `column`; 0 when no row matches.
    ///
    /// # Errors
    ///
    /// Returns a recorded chain error or the driver error.
    pub fn sum(&mut self, column: &str) -> Result<f64> {
        Ok(self.aggregate("sum", column)?.as_f64().unwrap_or(0.0))
    }

    /// Average of `column`; `None` when no row matches.
    ///
    /// # Errors
    ///
    /// Returns a recorded chain error or the driver error.
    pub fn avg(&mut self, column: &str) -> Result<Option<f64>> {
        Ok(self.aggregate("avg", column)?.as_f64())
    }

    /// Counts all matches, then fetches one page.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::Usage`] when the page offset does not fit a
    /// signed 64-bit `OFFSET`, a recorded chain error or the driver error.
    pub fn paginate(&mut self, per_page: u64, page: u64) -> Result<LengthAwarePaginator<Row>> {
        let per_page = per_page.max(1);
        let offset = (page.max(1) - 1)
            .checked_mul(per_page)
            .filter(|offset| i64::try_from(*offset).is_ok());
        if offset.is_none() {
            return Err(DatabaseError::Usage(format!(
                "page {page} is out of range for {per_page} rows per page"
            )));
        }
        let total = self.count()?;
        let mut query = self.query.clone();
        query.for_page(page, per_page);
        let data = self.fetch(&query)?;
        Ok(LengthAwarePaginator::new(data, total, per_page, page))
    }

    /// Feeds the results to `f` in pages of `size` rows. Stops early when
    /// `f` returns `false`; returns whether every page was processed.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::Usage`] without an `ORDER BY` clause or with
    /// a zero size, or the driver error.
    pub fn chunk<F>(&mut self, size: u64, mut f: F) -> Result<bool>
    where
        F: FnMut(Collection<Row>) -> bool,
    {
        if size == 0 {
            return Err(DatabaseError::Usage(String::from("chunk size must be positive")));
        }
        if self.query.orders.is_empty() {
            return Err(DatabaseError::Usage(String::from(
                "chunk requires an ORDER BY clause",
            )));
        }
        let mut page = 1;
        loop {
            let mut query = self.query.clone();
            query.for_page(page, size);
            let rows = self.fetch(&query)?;
            let fetched = rows.len() as u64;
            if fetched == 0 {
                return Ok(true);
            }
            if !f(rows) {
                return Ok(false);
            }
            if fetched < size {
                return Ok(true);
            }
            page += 1;
        }
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    fn insert_table(&self) -> String {
        self.query
            .table
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_string()
    }

    /// Inserts one row; an empty row inserts defaults.
    ///
    /// # Errors
    ///
    /// Returns a recorded chain error or the driver error.
    pub fn insert(&mut self, values: Row) -> Result<u64> {
        self.check()?;
        let columns: Vec<String> = values.keys().cloned().collect();
        let sql = self
            .conn
            .grammar()
            .compile_insert(&self.insert_table(), &columns, 1);
        let bindings: Vec<SqlValue> = values.into_values().collect();
        self.conn.execute(&sql, &bindings)
    }

    /// Inserts several rows in one statement. Columns are the union of all
    /// keys; a row missing a column binds `NULL`.
    ///
    /// # Errors
    ///
    /// Returns a recorded chain error or the driver error.
    pub fn insert_many(&mut self, rows: &[Row]) -> Result<u64> {
        self.check()?;
        if rows.is_empty() {
            return Ok(0);
        }
        let columns: Vec<String> = rows
            .iter()
            .flat_map(|row| row.keys().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let sql = self
            .conn
            .grammar()
            .compile_insert(&self.insert_table(), &columns, rows.len());
        let bindings: Vec<SqlValue> = rows
            .iter()
            .flat_map(|row| {
                columns
                    .iter()
                    .map(|column| row.get(column).cloned().unwrap_or(SqlValue::Null))
            })
            .collect();
        self.conn.execute(&sql, &bindings)
    }

    /// Inserts one row and returns the generated `key`.
    ///
    /// # Errors
    ///
    /// Returns a recorded chain error or the driver error.
    pub fn insert_get_id(&mut self, values: Row, key: &str) -> Result<i64> {
        self.check()?;
        let columns: Vec<String> = values.keys().cloned().collect();
        let sql = self
            .conn
            .grammar()
            .compile_insert_get_id(&self.insert_table(), &columns, key);
        let bindings: Vec<SqlValue> = values.into_values().collect();
        self.conn.insert(&sql, &bindings)
    }

    fn run_update(&mut self, assignments: &[Assignment], values: Vec<SqlValue>) -> Result<u64> {
        self.check()?;
        let grammar = self.conn.grammar();
        let sql = grammar.compile_update(&self.query, assignments);
        let bindings = grammar.prepare_bindings_for_update(&self.query, values);
        self.conn.execute(&sql, &bindings)
    }

    /// Updates matching rows; returns the affected count.
    ///
    /// # Errors
    ///
    /// Returns a recorded chain error or the driver error.
    pub fn update(&mut self, values: Row) -> Result<u64> {
        if values.is_empty() {
            self.check()?;
            return Ok(0);
        }
        let assignments: Vec<Assignment> = values.keys().cloned().map(Assignment::Value).collect();
        self.run_update(&assignments, values.into_values().collect())
    }

    /// Adds `amount` to `column` on matching rows.
    ///
    /// # Errors
    ///
    /// Returns a recorded chain error or the driver error.
    pub fn increment(&mut self, column: &str, amount: impl ToSqlValue) -> Result<u64> {
        self.run_update(
            &[Assignment::Increment(column.to_string())],
            vec![amount.to_sql_value()],
        )
    }

    /// Subtracts `amount` from `column` on matching rows.
    ///
    /// # Errors
    ///
    /// Returns a recorded chain error or the driver error.
    pub fn decrement(&mut self, column: &str, amount: impl ToSqlValue) -> Result<u64> {
        self.run_update(
            &[Assignment::Decrement(column.to_string())],
            vec![amount.to_sql_value()],
        )
    }

    /// Deletes matching rows; returns the affected count.
    ///
    /// # Errors
    ///
    /// Returns a recorded chain error or the driver error.
    pub fn delete(&mut self) -> Result<u64> {
        self.check()?;
        let sql = self.conn.grammar().compile_delete(&self.query);
        let bindings = self.query.where_bindings().to_vec();
        self.conn.execute(&sql, &bindings)
    }

    /// Removes every row of the table.
    ///
    /// # Errors
    ///
    /// Returns a recorded chain error or the driver error.
    pub fn truncate(&mut self) -> Result<()> {
        self.check()?;
        let sql = self.conn.grammar().compile_truncate(&self.insert_table());
        self.conn.statement(&sql, &[])
    }
}
