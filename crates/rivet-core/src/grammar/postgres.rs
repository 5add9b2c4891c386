//! PostgreSQL grammar.

use std::borrow::Cow;

use super::{quote_literal, Grammar};
use crate::dialect::Dialect;
use crate::error::{GrammarError, Result};
use crate::query::Operator;
use crate::schema::{Blueprint, ColumnDefinition, ColumnType};
use crate::value::SqlValue;

/// PostgreSQL grammar: double-quote quoting, `$n` placeholders on the wire,
/// transactional DDL.
#[derive(Debug, Clone, Default)]
pub struct PostgresGrammar {
    prefix: String,
}

impl PostgresGrammar {
    /// Creates a grammar using `prefix` for table names.
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Grammar for PostgresGrammar {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    fn prefix(&self) -> &str {
        &self.prefix
    }

    fn quote_char(&self) -> char {
        '"'
    }

    fn operator(&self, operator: Operator) -> &'static str {
        operator.as_sql()
    }

    /// Rewrites `?` into `$1`, `$2`, ... outside quoted text.
    fn prepare_placeholders<'a>(&self, sql: &'a str) -> Cow<'a, str> {
        if !sql.contains('?') {
            return Cow::Borrowed(sql);
        }
        let mut out = String::with_capacity(sql.len() + 8);
        let mut index = 0;
        let mut quote: Option<char> = None;
        for ch in sql.chars() {
            match (quote, ch) {
                (None, '\'' | '"') => {
                    quote = Some(ch);
                    out.push(ch);
                }
                (Some(open), _) if ch == open => {
                    quote = None;
                    out.push(ch);
                }
                (None, '?') => {
                    index += 1;
                    out.push('$');
                    out.push_str(&index.to_string());
                }
                _ => out.push(ch),
            }
        }
        Cow::Owned(out)
    }

    fn aggregate_expression(&self, function: &str, column: &str) -> String {
        let function = function.to_ascii_uppercase();
        let expression = format!("{function}({})", self.wrap(column));
        if matches!(function.as_str(), "SUM" | "AVG") {
            format!("CAST({expression} AS DOUBLE PRECISION)")
        } else {
            expression
        }
    }

    fn compile_insert_get_id(&self, table: &str, columns: &[String], key: &str) -> String {
        format!(
            "{} RETURNING {}",
            self.compile_insert(table, columns, 1),
            self.wrap(key)
        )
    }

    fn compile_truncate(&self, table: &str) -> String {
        format!(
            "TRUNCATE {} RESTART IDENTITY CASCADE",
            self.wrap_table(table)
        )
    }

    fn type_sql(&self, column: &ColumnDefinition) -> Result<String> {
        let sql = match &column.column_type {
            ColumnType::Increments => String::from("SERIAL"),
            ColumnType::BigIncrements => String::from("BIGSERIAL"),
            ColumnType::Integer => String::from("INTEGER"),
            ColumnType::BigInteger => String::from("BIGINT"),
            ColumnType::SmallInteger | ColumnType::TinyInteger => String::from("SMALLINT"),
            ColumnType::Float => String::from("REAL"),
            ColumnType::Double => String::from("DOUBLE PRECISION"),
            ColumnType::Decimal { precision, scale } => format!("DECIMAL({precision}, {scale})"),
            ColumnType::Boolean => String::from("BOOLEAN"),
            ColumnType::String(length) => format!("VARCHAR({length})"),
            ColumnType::Char(length) => format!("CHAR({length})"),
            ColumnType::Text | ColumnType::MediumText | ColumnType::LongText => {
                String::from("TEXT")
            }
            ColumnType::Enum(allowed) => {
                let allowed: Vec<String> = allowed.iter().map(|v| quote_literal(v)).collect();
                format!(
                    "VARCHAR(255) CHECK ({} IN ({}))",
                    self.wrap(&column.name),
                    allowed.join(", ")
                )
            }
            ColumnType::Json => String::from("JSON"),
            ColumnType::Jsonb => String::from("JSONB"),
            ColumnType::Date => String::from("DATE"),
            ColumnType::DateTime | ColumnType::Timestamp => {
                String::from("TIMESTAMP(0) WITHOUT TIME ZONE")
            }
            ColumnType::Time => String::from("TIME(0) WITHOUT TIME ZONE"),
            ColumnType::Binary => String::from("BYTEA"),
            ColumnType::Uuid => String::from("UUID"),
            ColumnType::IpAddress => String::from("INET"),
            ColumnType::MacAddress => String::from("MACADDR"),
            ColumnType::Geometry => String::from("GEOMETRY"),
            ColumnType::Set(_) => {
                return Err(GrammarError::UnsupportedColumnType {
                    dialect: Dialect::Postgres,
                    column_type: column.column_type.name(),
                })
            }
        };
        Ok(sql)
    }

    fn column_modifiers(&self, column: &ColumnDefinition) -> String {
        let mut sql = String::from(if column.nullable { " NULL" } else { " NOT NULL" });
        if let Some(default) = &column.default {
            sql.push_str(" DEFAULT ");
            sql.push_str(&default.to_sql());
        }
        if column.auto_increment && column.column_type.is_integer() {
            sql.push_str(" PRIMARY KEY");
        }
        sql
    }

    fn compile_column_comments(&self, blueprint: &Blueprint) -> Vec<String> {
        blueprint
            .columns()
            .iter()
            .filter_map(|column| {
                column.comment.as_ref().map(|comment| {
                    format!(
                        "COMMENT ON COLUMN {}.{} IS {}",
                        self.wrap_table(blueprint.table()),
                        self.wrap_segment(&column.name),
                        quote_literal(comment)
                    )
                })
            })
            .collect()
    }

    fn compile_drop_primary(&self, blueprint: &Blueprint) -> Result<String> {
        let constraint = format!("{}{}_pkey", self.prefix, blueprint.table());
        Ok(format!(
            "ALTER TABLE {} DROP CONSTRAINT {}",
            self.wrap_table(blueprint.table()),
            self.wrap_segment(&constraint)
        ))
    }

    fn compile_table_exists(&self, table: &str) -> (String, Vec<SqlValue>) {
        (
            String::from(
                "SELECT COUNT(*) AS \"aggregate\" FROM information_schema.tables \
                 WHERE table_schema = current_schema() AND table_name = ?",
            ),
            vec![SqlValue::Text(format!("{}{table}", self.prefix))],
        )
    }

    fn compile_column_listing(&self, table: &str) -> (String, Vec<SqlValue>) {
        (
            String::from(
                "SELECT column_name::text AS \"column_name\" FROM information_schema.columns \
                 WHERE table_schema = current_schema() AND table_name = ? ORDER BY ordinal_position",
            ),
            vec![SqlValue::Text(format!("{}{table}", self.prefix))],
        )
    }
}
