//! SQL grammars.
//!
//! A [`Grammar`] turns query descriptors and Blueprints into SQL text with
//! positional `?` placeholders. The trait carries the compilation shared by
//! every dialect as default methods; each dialect is a flat struct that only
//! overrides what differs. Grammars never perform I/O.

mod mysql;
mod postgres;
mod sqlite;

use std::borrow::Cow;
use std::fmt;

pub use mysql::MySqlGrammar;
pub use postgres::PostgresGrammar;
pub use sqlite::SqliteGrammar;

use crate::dialect::Dialect;
use crate::error::{GrammarError, Result};
use crate::query::{Having, Join, Operator, Order, QueryDescriptor, Selection, Where, WhereKind};
use crate::schema::{Blueprint, ColumnDefinition, Command, ForeignKeyDefinition, ForeignTable, IndexCommand, IndexKind};
use crate::value::SqlValue;

/// One `SET` entry of an `UPDATE`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Assignment {
    /// `column = ?`
    Value(String),
    /// `column = column + ?`
    Increment(String),
    /// `column = column - ?`
    Decrement(String),
}

/// Splits `expr AS alias`, matching the keyword case-insensitively.
fn split_alias(value: &str) -> Option<(&str, &str)> {
    let lower = value.to_ascii_lowercase();
    lower
        .find(" as ")
        .map(|index| (value[..index].trim(), value[index + 4..].trim()))
}

/// Quotes a string literal for DDL.
pub(crate) fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Dialect-specific SQL compilation.
pub trait Grammar: fmt::Debug + Send + Sync {
    /// The dialect this grammar speaks.
    fn dialect(&self) -> Dialect;

    /// Table prefix applied by [`Grammar::wrap_table`].
    fn prefix(&self) -> &str;

    /// Identifier quote character.
    fn quote_char(&self) -> char;

    // ------------------------------------------------------------------
    // Quoting
    // ------------------------------------------------------------------

    /// Quotes a single identifier segment. `*` is left bare.
    fn wrap_segment(&self, segment: &str) -> String {
        if segment == "*" {
            return String::from("*");
        }
        let quote = self.quote_char();
        let escaped = segment.replace(quote, &format!("{quote}{quote}"));
        format!("{quote}{escaped}{quote}")
    }

    /// Quotes a column reference: `column`, `table.column`, `*`,
    /// `table.*` or `expression AS alias`.
    fn wrap(&self, value: &str) -> String {
        if let Some((expression, alias)) = split_alias(value) {
            return format!("{} AS {}", self.wrap(expression), self.wrap_segment(alias));
        }
        match value.rsplit_once('.') {
            Some((table, column)) => {
                format!("{}.{}", self.wrap_table(table), self.wrap_segment(column))
            }
            None => self.wrap_segment(value),
        }
    }

    /// Quotes a table reference, applying the prefix to the table name and
    /// to an alias.
    fn wrap_table(&self, table: &str) -> String {
        if let Some((table, alias)) = split_alias(table) {
            return format!(
                "{} AS {}",
                self.wrap_table(table),
                self.wrap_segment(&format!("{}{alias}", self.prefix()))
            );
        }
        match table.rsplit_once('.') {
            Some((schema, name)) => format!(
                "{}.{}",
                self.wrap_segment(schema),
                self.wrap_segment(&format!("{}{name}", self.prefix()))
            ),
            None => self.wrap_segment(&format!("{}{table}", self.prefix())),
        }
    }

    /// Comma-separated quoted columns.
    fn columnize(&self, columns: &[String]) -> String {
        columns
            .iter()
            .map(|c| self.wrap(c))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// `count` comma-separated placeholders.
    fn parameterize(&self, count: usize) -> String {
        vec![SqlValue::placeholder(); count].join(", ")
    }

    /// SQL token for a comparison operator.
    fn operator(&self, operator: Operator) -> &'static str {
        match operator {
            Operator::ILike => "LIKE",
            other => other.as_sql(),
        }
    }

    /// Rewrites `?` placeholders into the driver's native form.
    fn prepare_placeholders<'a>(&self, sql: &'a str) -> Cow<'a, str> {
        Cow::Borrowed(sql)
    }

    // ------------------------------------------------------------------
    // SELECT
    // ------------------------------------------------------------------

    /// Compiles a `SELECT`. Clause order: columns, from, joins, wheres,
    /// groups, havings, orders, limit/offset.
    fn compile_select(&self, query: &QueryDescriptor) -> String {
        let mut sql = String::from("SELECT ");
        if query.distinct {
            sql.push_str("DISTINCT ");
        }
        sql.push_str(&self.compile_columns(&query.columns));
        sql.push_str(" FROM ");
        sql.push_str(&self.wrap_table(&query.table));
        sql.push_str(&self.compile_joins(&query.joins));
        sql.push_str(&self.compile_wheres(&query.wheres));
        sql.push_str(&self.compile_groups(&query.groups));
        sql.push_str(&self.compile_havings(&query.havings));
        sql.push_str(&self.compile_orders(&query.orders));
        sql.push_str(&self.compile_limit_offset(query.limit, query.offset));
        sql
    }

    /// Projection list; empty means `*`.
    fn compile_columns(&self, columns: &[Selection]) -> String {
        if columns.is_empty() {
            return String::from("*");
        }
        columns
            .iter()
            .map(|selection| match selection {
                Selection::Column(column) => self.wrap(column),
                Selection::Raw(expression) => expression.clone(),
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Join clauses with a leading space.
    fn compile_joins(&self, joins: &[Join]) -> String {
        joins
            .iter()
            .map(|join| {
                format!(
                    " {} {} ON {} {} {}",
                    join.kind.as_sql(),
                    self.wrap_table(&join.table),
                    self.wrap(&join.first),
                    self.operator(join.operator),
                    self.wrap(&join.second)
                )
            })
            .collect()
    }

    /// ` WHERE ...` or nothing.
    fn compile_wheres(&self, wheres: &[Where]) -> String {
        if wheres.is_empty() {
            return String::new();
        }
        format!(" WHERE {}", self.compile_predicates(wheres))
    }

    /// Predicates joined by their conjunctions.
    fn compile_predicates(&self, wheres: &[Where]) -> String {
        let mut sql = String::new();
        for (index, predicate) in wheres.iter().enumerate() {
            if index > 0 {
                sql.push(' ');
                sql.push_str(predicate.boolean.as_sql());
                sql.push(' ');
            }
            sql.push_str(&self.compile_predicate(&predicate.kind));
        }
        sql
    }

    /// A single predicate.
    fn compile_predicate(&self, kind: &WhereKind) -> String {
        match kind {
            WhereKind::Basic {
                column, operator, ..
            } => format!("{} {} ?", self.wrap(column), self.operator(*operator)),
            WhereKind::In { column, values, not } => {
                if values.is_empty() {
                    return String::from(if *not { "1 = 1" } else { "0 = 1" });
                }
                let keyword = if *not { "NOT IN" } else { "IN" };
                format!(
                    "{} {keyword} ({})",
                    self.wrap(column),
                    self.parameterize(values.len())
                )
            }
            WhereKind::Null { column, not } => {
                let keyword = if *not { "IS NOT NULL" } else { "IS NULL" };
                format!("{} {keyword}", self.wrap(column))
            }
            WhereKind::Between { column, not, .. } => {
                let keyword = if *not { "NOT BETWEEN" } else { "BETWEEN" };
                format!("{} {keyword} ? AND ?", self.wrap(column))
            }
            WhereKind::Column {
                first,
                operator,
                second,
            } => format!(
                "{} {} {}",
                self.wrap(first),
                self.operator(*operator),
                self.wrap(second)
            ),
            WhereKind::Nested(inner) => format!("({})", self.compile_predicates(inner)),
            WhereKind::Raw { sql, .. } => sql.clone(),
        }
    }

    /// ` GROUP BY ...` or nothing.
    fn compile_groups(&self, groups: &[String]) -> String {
        if groups.is_empty() {
            return String::new();
        }
        format!(" GROUP BY {}", self.columnize(groups))
    }

    /// ` HAVING ...` or nothing.
    fn compile_havings(&self, havings: &[Having]) -> String {
        if havings.is_empty() {
            return String::new();
        }
        let mut sql = String::from(" HAVING ");
        for (index, having) in havings.iter().enumerate() {
            let (boolean, fragment) = match having {
                Having::Basic {
                    boolean,
                    column,
                    operator,
                } => (
                    boolean,
                    format!("{} {} ?", self.wrap(column), self.operator(*operator)),
                ),
                Having::Raw { boolean, sql } => (boolean, sql.clone()),
            };
            if index > 0 {
                sql.push(' ');
                sql.push_str(boolean.as_sql());
                sql.push(' ');
            }
            sql.push_str(&fragment);
        }
        sql
    }

    /// ` ORDER BY ...` or nothing.
    fn compile_orders(&self, orders: &[Order]) -> String {
        if orders.is_empty() {
            return String::new();
        }
        let parts: Vec<String> = orders
            .iter()
            .map(|order| match order {
                Order::Column { column, direction } => {
                    format!("{} {}", self.wrap(column), direction.as_sql())
                }
                Order::Raw(sql) => sql.clone(),
            })
            .collect();
        format!(" ORDER BY {}", parts.join(", "))
    }

    /// ` LIMIT n OFFSET m`, each part only when set.
    fn compile_limit_offset(&self, limit: Option<u64>, offset: Option<u64>) -> String {
        let mut sql = String::new();
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        if let Some(offset) = offset {
            sql.push_str(&format!(" OFFSET {offset}"));
        }
        sql
    }

    /// `FUNCTION(column)` for aggregates.
    fn aggregate_expression(&self, function: &str, column: &str) -> String {
        format!("{}({})", function.to_ascii_uppercase(), self.wrap(column))
    }

    /// Compiles `SELECT FUNCTION(column) AS aggregate`. Grouped, distinct or
    /// having queries are wrapped in a sub-select. Callers strip ordering
    /// and pagination first.
    fn compile_aggregate(&self, query: &QueryDescriptor, function: &str, column: &str) -> String {
        let alias = self.wrap_segment("aggregate");
        if query.needs_aggregate_subquery() {
            let outer_column = column.rsplit('.').next().unwrap_or(column);
            return format!(
                "SELECT {} AS {alias} FROM ({}) AS {}",
                self.aggregate_expression(function, outer_column),
                self.compile_select(query),
                self.wrap_segment("temp_table")
            );
        }
        let mut sql = format!(
            "SELECT {} AS {alias} FROM {}",
            self.aggregate_expression(function, column),
            self.wrap_table(&query.table)
        );
        sql.push_str(&self.compile_joins(&query.joins));
        sql.push_str(&self.compile_wheres(&query.wheres));
        sql
    }

    /// `SELECT EXISTS(...) AS exists`.
    fn compile_exists(&self, query: &QueryDescriptor) -> String {
        format!(
            "SELECT EXISTS({}) AS {}",
            self.compile_select(query),
            self.wrap_segment("exists")
        )
    }

    // ------------------------------------------------------------------
    // INSERT / UPDATE / DELETE
    // ------------------------------------------------------------------

    /// `INSERT` for a row with no explicit values.
    fn compile_insert_defaults(&self, table: &str) -> String {
        format!("INSERT INTO {} DEFAULT VALUES", self.wrap_table(table))
    }

    /// Multi-row `INSERT` with `rows` value groups over `columns`.
    fn compile_insert(&self, table: &str, columns: &[String], rows: usize) -> String {
        if columns.is_empty() {
            return self.compile_insert_defaults(table);
        }
        let group = format!("({})", self.parameterize(columns.len()));
        format!(
            "INSERT INTO {} ({}) VALUES {}",
            self.wrap_table(table),
            self.columnize(columns),
            vec![group; rows.max(1)].join(", ")
        )
    }

    /// Single-row `INSERT` whose generated key is read back.
    fn compile_insert_get_id(&self, table: &str, columns: &[String], _key: &str) -> String {
        self.compile_insert(table, columns, 1)
    }

    /// `UPDATE ... SET ... WHERE ...`. Bindings: assignments, then wheres.
    fn compile_update(&self, query: &QueryDescriptor, assignments: &[Assignment]) -> String {
        let sets: Vec<String> = assignments
            .iter()
            .map(|assignment| match assignment {
                Assignment::Value(column) => format!("{} = ?", self.wrap(column)),
                Assignment::Increment(column) => {
                    let wrapped = self.wrap(column);
                    format!("{wrapped} = {wrapped} + ?")
                }
                Assignment::Decrement(column) => {
                    let wrapped = self.wrap(column);
                    format!("{wrapped} = {wrapped} - ?")
                }
            })
            .collect();
        format!(
            "UPDATE {} SET {}{}",
            self.wrap_table(&query.table),
            sets.join(", "),
            self.compile_wheres(&query.wheres)
        )
    }

    /// Bindings of an `UPDATE`: assigned values, then `WHERE` values.
    fn prepare_bindings_for_update(
        &self,
        query: &QueryDescriptor,
        values: Vec<SqlValue>,
    ) -> Vec<SqlValue> {
        let mut bindings = values;
        bindings.extend_from_slice(query.where_bindings());
        bindings
    }

    /// `DELETE FROM ... WHERE ...`.
    fn compile_delete(&self, query: &QueryDescriptor) -> String {
        format!(
            "DELETE FROM {}{}",
            self.wrap_table(&query.table),
            self.compile_wheres(&query.wheres)
        )
    }

    /// Empties a table.
    fn compile_truncate(&self, table: &str) -> String;

    // ------------------------------------------------------------------
    // Transactions
    // ------------------------------------------------------------------

    /// Starts a transaction.
    fn compile_begin(&self) -> String {
        String::from("BEGIN")
    }

    /// Commits a transaction.
    fn compile_commit(&self) -> String {
        String::from("COMMIT")
    }

    /// Rolls back a transaction.
    fn compile_rollback(&self) -> String {
        String::from("ROLLBACK")
    }

    /// Creates a savepoint.
    fn compile_savepoint(&self, name: &str) -> String {
        format!("SAVEPOINT {name}")
    }

    /// Releases a savepoint.
    fn compile_release_savepoint(&self, name: &str) -> String {
        format!("RELEASE SAVEPOINT {name}")
    }

    /// Rolls back to a savepoint.
    fn compile_rollback_to_savepoint(&self, name: &str) -> String {
        format!("ROLLBACK TO SAVEPOINT {name}")
    }

    // ------------------------------------------------------------------
    // Schema
    // ------------------------------------------------------------------

    /// Whether DDL participates in transactions.
    fn supports_schema_transactions(&self) -> bool {
        true
    }

    /// Whether `CREATE TABLE` carries its foreign keys inline.
    fn inline_foreign_keys(&self) -> bool {
        false
    }

    /// Compiles a Blueprint into its statements.
    ///
    /// Modify mode order: drop/rename commands, added columns, primary key,
    /// indexes, foreign keys, table rename.
    fn compile_blueprint(&self, blueprint: &Blueprint) -> Result<Vec<String>> {
        let mut statements = Vec::new();
        if blueprint.is_creating() {
            statements.push(self.compile_create_table(blueprint)?);
        } else {
            for command in blueprint.commands() {
                statements.extend(self.compile_command(blueprint, command)?);
            }
            for column in blueprint.columns() {
                statements.push(self.compile_add_column(blueprint, column)?);
            }
            if let Some(primary) = blueprint.primary_key() {
                statements.push(self.compile_primary(blueprint, &primary)?);
            }
        }
        statements.extend(self.compile_column_comments(blueprint));
        for index in blueprint.secondary_indexes() {
            statements.push(if index.kind == IndexKind::Unique {
                self.compile_unique(blueprint, &index)
            } else {
                self.compile_index(blueprint, &index)
            });
        }
        if !(blueprint.is_creating() && self.inline_foreign_keys()) {
            for foreign in blueprint.foreign_keys() {
                statements.push(self.compile_foreign(blueprint, &foreign)?);
            }
        }
        if let Some(to) = blueprint.renamed_to() {
            statements.push(self.compile_rename_table(blueprint.table(), to));
        }
        Ok(statements)
    }

    /// Dispatches a drop/rename command.
    fn compile_command(&self, blueprint: &Blueprint, command: &Command) -> Result<Vec<String>> {
        match command {
            Command::DropColumn(columns) => self.compile_drop_column(blueprint, columns),
            Command::RenameColumn { from, to } => {
                Ok(vec![self.compile_rename_column(blueprint, from, to)?])
            }
            Command::DropIndex(name) => Ok(vec![self.compile_drop_index(blueprint, name)]),
            Command::DropUnique(name) => Ok(vec![self.compile_drop_unique(blueprint, name)]),
            Command::DropPrimary => Ok(vec![self.compile_drop_primary(blueprint)?]),
            Command::DropForeign(name) => Ok(vec![self.compile_drop_foreign(blueprint, name)?]),
        }
    }

    /// `CREATE TABLE` with columns, composite primary key and, for dialects
    /// that need it, inline foreign keys.
    fn compile_create_table(&self, blueprint: &Blueprint) -> Result<String> {
        if blueprint.columns().is_empty() {
            return Err(GrammarError::EmptyColumns(format!(
                "CREATE TABLE {}",
                blueprint.table()
            )));
        }
        let mut definitions = blueprint
            .columns()
            .iter()
            .map(|column| self.compile_column(column))
            .collect::<Result<Vec<_>>>()?;
        if let Some(primary) = blueprint.primary_columns() {
            definitions.push(format!("PRIMARY KEY ({})", self.columnize(&primary)));
        }
        if self.inline_foreign_keys() {
            for foreign in blueprint.foreign_keys() {
                definitions.push(self.foreign_clause(&foreign));
            }
        }
        let if_not_exists = if blueprint.creates_if_not_exists() {
            "IF NOT EXISTS "
        } else {
            ""
        };
        Ok(format!(
            "CREATE TABLE {if_not_exists}{} ({})",
            self.wrap_table(blueprint.table()),
            definitions.join(", ")
        ))
    }

    /// Full column definition: name, type and modifiers.
    fn compile_column(&self, column: &ColumnDefinition) -> Result<String> {
        Ok(format!(
            "{} {}{}",
            self.wrap(&column.name),
            self.type_sql(column)?,
            self.column_modifiers(column)
        ))
    }

    /// Maps the logical type onto the dialect's type name.
    fn type_sql(&self, column: &ColumnDefinition) -> Result<String>;

    /// Nullability, default, auto-increment and other modifiers, with a
    /// leading space.
    fn column_modifiers(&self, column: &ColumnDefinition) -> String;

    /// Extra statements for column comments.
    fn compile_column_comments(&self, _blueprint: &Blueprint) -> Vec<String> {
        Vec::new()
    }

    /// `ALTER TABLE ... ADD COLUMN ...`.
    fn compile_add_column(&self, blueprint: &Blueprint, column: &ColumnDefinition) -> Result<String> {
        Ok(format!(
            "ALTER TABLE {} ADD COLUMN {}",
            self.wrap_table(blueprint.table()),
            self.compile_column(column)?
        ))
    }

    /// Drops columns in one statement.
    fn compile_drop_column(&self, blueprint: &Blueprint, columns: &[String]) -> Result<Vec<String>> {
        let drops: Vec<String> = columns
            .iter()
            .map(|c| format!("DROP COLUMN {}", self.wrap(c)))
            .collect();
        Ok(vec![format!(
            "ALTER TABLE {} {}",
            self.wrap_table(blueprint.table()),
            drops.join(", ")
        )])
    }

    /// Renames a column.
    fn compile_rename_column(&self, blueprint: &Blueprint, from: &str, to: &str) -> Result<String> {
        Ok(format!(
            "ALTER TABLE {} RENAME COLUMN {} TO {}",
            self.wrap_table(blueprint.table()),
            self.wrap(from),
            self.wrap(to)
        ))
    }

    /// Adds a primary key to an existing table.
    fn compile_primary(&self, blueprint: &Blueprint, index: &IndexCommand) -> Result<String> {
        Ok(format!(
            "ALTER TABLE {} ADD PRIMARY KEY ({})",
            self.wrap_table(blueprint.table()),
            self.columnize(&index.columns)
        ))
    }

    /// `CREATE INDEX`.
    fn compile_index(&self, blueprint: &Blueprint, index: &IndexCommand) -> String {
        format!(
            "CREATE INDEX {} ON {} ({})",
            self.wrap_segment(&index.name),
            self.wrap_table(blueprint.table()),
            self.columnize(&index.columns)
        )
    }

    /// `CREATE UNIQUE INDEX`.
    fn compile_unique(&self, blueprint: &Blueprint, index: &IndexCommand) -> String {
        format!(
            "CREATE UNIQUE INDEX {} ON {} ({})",
            self.wrap_segment(&index.name),
            self.wrap_table(blueprint.table()),
            self.columnize(&index.columns)
        )
    }

    /// `CONSTRAINT name FOREIGN KEY (...) REFERENCES table (...) ...`.
    fn foreign_clause(&self, foreign: &ForeignKeyDefinition) -> String {
        let table = match &foreign.table {
            ForeignTable::Named(table) => table.as_str(),
            ForeignTable::Inferred => "",
        };
        let mut sql = String::new();
        if let Some(name) = &foreign.name {
            sql.push_str(&format!("CONSTRAINT {} ", self.wrap_segment(name)));
        }
        sql.push_str(&format!(
            "FOREIGN KEY ({}) REFERENCES {} ({})",
            self.columnize(&foreign.columns),
            self.wrap_table(table),
            self.columnize(&foreign.references)
        ));
        if let Some(action) = foreign.on_delete {
            sql.push_str(" ON DELETE ");
            sql.push_str(action.as_sql());
        }
        if let Some(action) = foreign.on_update {
            sql.push_str(" ON UPDATE ");
            sql.push_str(action.as_sql());
        }
        sql
    }

    /// Adds a foreign key to an existing table.
    fn compile_foreign(&self, blueprint: &Blueprint, foreign: &ForeignKeyDefinition) -> Result<String> {
        Ok(format!(
            "ALTER TABLE {} ADD {}",
            self.wrap_table(blueprint.table()),
            self.foreign_clause(foreign)
        ))
    }

    /// Drops an index.
    fn compile_drop_index(&self, _blueprint: &Blueprint, name: &str) -> String {
        format!("DROP INDEX {}", self.wrap_segment(name))
    }

    /// Drops a unique index.
    fn compile_drop_unique(&self, blueprint: &Blueprint, name: &str) -> String {
        self.compile_drop_index(blueprint, name)
    }

    /// Drops the primary key.
    fn compile_drop_primary(&self, blueprint: &Blueprint) -> Result<String>;

    /// Drops a foreign key.
    fn compile_drop_foreign(&self, blueprint: &Blueprint, name: &str) -> Result<String> {
        Ok(format!(
            "ALTER TABLE {} DROP CONSTRAINT {}",
            self.wrap_table(blueprint.table()),
            self.wrap_segment(name)
        ))
    }

    /// Renames a table.
    fn compile_rename_table(&self, from: &str, to: &str) -> String {
        format!(
            "ALTER TABLE {} RENAME TO {}",
            self.wrap_table(from),
            self.wrap_table(to)
        )
    }

    /// `DROP TABLE`.
    fn compile_drop_table(&self, table: &str) -> String {
        format!("DROP TABLE {}", self.wrap_table(table))
    }

    /// `DROP TABLE IF EXISTS`.
    fn compile_drop_table_if_exists(&self, table: &str) -> String {
        format!("DROP TABLE IF EXISTS {}", self.wrap_table(table))
    }

    /// Query counting tables named `table` (prefix applied), as
    /// `aggregate`.
    fn compile_table_exists(&self, table: &str) -> (String, Vec<SqlValue>);

    /// Query listing the columns of `table` as `column_name`.
    fn compile_column_listing(&self, table: &str) -> (String, Vec<SqlValue>);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Boolean;

    fn descriptor() -> QueryDescriptor {
        let mut q = QueryDescriptor::new("users");
        q.add_where(
            Boolean::And,
            WhereKind::Basic {
                column: String::from("age"),
                operator: Operator::Gt,
                value: SqlValue::Int(18),
            },
        );
        q.add_where(
            Boolean::Or,
            WhereKind::In {
                column: String::from("role"),
                values: vec![SqlValue::Text(String::from("admin")), SqlValue::Int(2)],
                not: false,
            },
        );
        q
    }

    #[test]
    fn test_split_alias_is_case_insensitive() {
        assert_eq!(split_alias("users.name As n"), Some(("users.name", "n")));
        assert_eq!(split_alias("name"), None);
    }

    #[test]
    fn test_placeholder_count_matches_bindings_for_every_dialect() {
        let q = descriptor();
        for dialect in [Dialect::MySql, Dialect::Postgres, Dialect::Sqlite] {
            let sql = dialect.grammar("").compile_select(&q);
            assert_eq!(sql.matches('?').count(), q.bindings().len(), "{sql}");
        }
    }

    #[test]
    fn test_update_bindings_put_values_before_wheres() {
        let q = descriptor();
        let grammar = Dialect::Sqlite.grammar("");
        let sql = grammar.compile_update(&q, &[Assignment::Value(String::from("name"))]);
        let bindings =
            grammar.prepare_bindings_for_update(&q, vec![SqlValue::Text(String::from("Ada"))]);
        assert_eq!(
            sql,
            "UPDATE \"users\" SET \"name\" = ? WHERE \"age\" > ? OR \"role\" IN (?, ?)"
        );
        assert_eq!(sql.matches('?').count(), bindings.len());
        assert_eq!(bindings[0], SqlValue::Text(String::from("Ada")));
        assert_eq!(bindings[1], SqlValue::Int(18));
    }
}
