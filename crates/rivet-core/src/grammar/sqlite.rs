//! SQLite grammar.

use super::{quote_literal, Grammar};
use crate::dialect::Dialect;
use crate::error::{GrammarError, Result};
use crate::schema::{Blueprint, ColumnDefinition, ColumnType, ForeignKeyDefinition, IndexCommand};
use crate::value::SqlValue;

/// SQLite grammar: double-quote quoting, no native `TRUNCATE`, foreign keys
/// only at table creation.
#[derive(Debug, Clone, Default)]
pub struct SqliteGrammar {
    prefix: String,
}

impl SqliteGrammar {
    /// Creates a grammar using `prefix` for table names.
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    fn unsupported(operation: &str) -> GrammarError {
        GrammarError::UnsupportedOperation {
            dialect: Dialect::Sqlite,
            operation: operation.to_string(),
        }
    }
}

impl Grammar for SqliteGrammar {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn prefix(&self) -> &str {
        &self.prefix
    }

    fn quote_char(&self) -> char {
        '"'
    }

    fn compile_limit_offset(&self, limit: Option<u64>, offset: Option<u64>) -> String {
        match (limit, offset) {
            (Some(limit), Some(offset)) => format!(" LIMIT {limit} OFFSET {offset}"),
            (Some(limit), None) => format!(" LIMIT {limit}"),
            (None, Some(offset)) => format!(" LIMIT -1 OFFSET {offset}"),
            (None, None) => String::new(),
        }
    }

    fn compile_truncate(&self, table: &str) -> String {
        format!("DELETE FROM {}", self.wrap_table(table))
    }

    fn inline_foreign_keys(&self) -> bool {
        true
    }

    fn type_sql(&self, column: &ColumnDefinition) -> Result<String> {
        let sql = match &column.column_type {
            ColumnType::Increments
            | ColumnType::BigIncrements
            | ColumnType::Integer
            | ColumnType::BigInteger
            | ColumnType::SmallInteger
            | ColumnType::TinyInteger => String::from("INTEGER"),
            ColumnType::Float => String::from("FLOAT"),
            ColumnType::Double => String::from("DOUBLE"),
            ColumnType::Decimal { .. } => String::from("NUMERIC"),
            ColumnType::Boolean => String::from("TINYINT(1)"),
            ColumnType::String(_)
            | ColumnType::Char(_)
            | ColumnType::Uuid
            | ColumnType::IpAddress
            | ColumnType::MacAddress => String::from("VARCHAR"),
            ColumnType::Text
            | ColumnType::MediumText
            | ColumnType::LongText
            | ColumnType::Json
            | ColumnType::Jsonb => String::from("TEXT"),
            ColumnType::Enum(allowed) => {
                let allowed: Vec<String> = allowed.iter().map(|v| quote_literal(v)).collect();
                format!(
                    "VARCHAR CHECK ({} IN ({}))",
                    self.wrap(&column.name),
                    allowed.join(", ")
                )
            }
            ColumnType::Date => String::from("DATE"),
            ColumnType::DateTime | ColumnType::Timestamp => String::from("DATETIME"),
            ColumnType::Time => String::from("TIME"),
            ColumnType::Binary => String::from("BLOB"),
            ColumnType::Set(_) | ColumnType::Geometry => {
                return Err(GrammarError::UnsupportedColumnType {
                    dialect: Dialect::Sqlite,
                    column_type: column.column_type.name(),
                })
            }
        };
        Ok(sql)
    }

    fn column_modifiers(&self, column: &ColumnDefinition) -> String {
        let mut sql = String::new();
        if column.auto_increment && column.column_type.is_integer() {
            sql.push_str(" PRIMARY KEY AUTOINCREMENT");
        }
        sql.push_str(if column.nullable { " NULL" } else { " NOT NULL" });
        if let Some(default) = &column.default {
            sql.push_str(" DEFAULT ");
            sql.push_str(&default.to_sql());
        }
        sql
    }

    fn compile_drop_column(&self, blueprint: &Blueprint, columns: &[String]) -> Result<Vec<String>> {
        Ok(columns
            .iter()
            .map(|column| {
                format!(
                    "ALTER TABLE {} DROP COLUMN {}",
                    self.wrap_table(blueprint.table()),
                    self.wrap(column)
                )
            })
            .collect())
    }

    fn compile_primary(&self, _blueprint: &Blueprint, _index: &IndexCommand) -> Result<String> {
        Err(Self::unsupported("adding a primary key to an existing table"))
    }

    fn compile_foreign(&self, _blueprint: &Blueprint, _foreign: &ForeignKeyDefinition) -> Result<String> {
        Err(Self::unsupported("adding a foreign key to an existing table"))
    }

    fn compile_drop_primary(&self, _blueprint: &Blueprint) -> Result<String> {
        Err(Self::unsupported("dropping a primary key"))
    }

    fn compile_drop_foreign(&self, _blueprint: &Blueprint, _name: &str) -> Result<String> {
        Err(Self::unsupported("dropping a foreign key"))
    }

    fn compile_table_exists(&self, table: &str) -> (String, Vec<SqlValue>) {
        (
            String::from(
                "SELECT COUNT(*) AS \"aggregate\" FROM \"sqlite_master\" \
                 WHERE \"type\" = 'table' AND \"name\" = ?",
            ),
            vec![SqlValue::Text(format!("{}{table}", self.prefix))],
        )
    }

    fn compile_column_listing(&self, table: &str) -> (String, Vec<SqlValue>) {
        (
            String::from("SELECT \"name\" AS \"column_name\" FROM pragma_table_info(?)"),
            vec![SqlValue::Text(format!("{}{table}", self.prefix))],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{Boolean, Direction, Operator, QueryDescriptor, WhereKind};

    fn grammar() -> SqliteGrammar {
        SqliteGrammar::new("")
    }

    #[test]
    fn test_select_with_every_clause() {
        let mut q = QueryDescriptor::new("orders as o");
        q.add_column("o.customer_id");
        q.add_select_raw("COUNT(*) AS total", Vec::new());
        q.add_join(crate::query::Join {
            kind: crate::query::JoinKind::Left,
            table: String::from("customers as c"),
            first: String::from("c.id"),
            operator: Operator::Eq,
            second: String::from("o.customer_id"),
        });
        q.add_where(
            Boolean::And,
            WhereKind::Null {
                column: String::from("o.deleted_at"),
                not: false,
            },
        );
        q.add_where(
            Boolean::And,
            WhereKind::Between {
                column: String::from("o.total"),
                low: SqlValue::Int(10),
                high: SqlValue::Int(100),
                not: true,
            },
        );
        q.add_group("o.customer_id");
        q.add_having(Boolean::And, "total", Operator::Gt, SqlValue::Int(2));
        q.add_order("total", Direction::Desc);
        q.offset = Some(20);

        assert_eq!(
            grammar().compile_select(&q),
            "SELECT \"o\".\"customer_id\", COUNT(*) AS total FROM \"orders\" AS \"o\" \
             LEFT JOIN \"customers\" AS \"c\" ON \"c\".\"id\" = \"o\".\"customer_id\" \
             WHERE \"o\".\"deleted_at\" IS NULL AND \"o\".\"total\" NOT BETWEEN ? AND ? \
             GROUP BY \"o\".\"customer_id\" HAVING \"total\" > ? \
             ORDER BY \"total\" DESC LIMIT -1 OFFSET 20"
        );
        assert_eq!(
            q.bindings(),
            vec![SqlValue::Int(10), SqlValue::Int(100), SqlValue::Int(2)]
        );
    }

    #[test]
    fn test_empty_in_lists() {
        let mut q = QueryDescriptor::new("users");
        q.add_where(
            Boolean::And,
            WhereKind::In {
                column: String::from("id"),
                values: Vec::new(),
                not: false,
            },
        );
        q.add_where(
            Boolean::Or,
            WhereKind::In {
                column: String::from("id"),
                values: Vec::new(),
                not: true,
            },
        );
        assert_eq!(
            grammar().compile_select(&q),
            "SELECT * FROM \"users\" WHERE 0 = 1 OR 1 = 1"
        );
    }

    #[test]
    fn test_truncate_is_delete() {
        assert_eq!(grammar().compile_truncate("logs"), "DELETE FROM \"logs\"");
    }

    #[test]
    fn test_grouped_count_uses_subquery() {
        let mut q = QueryDescriptor::new("orders");
        q.add_column("customer_id");
        q.add_group("customer_id");
        assert_eq!(
            grammar().compile_aggregate(&q, "count", "*"),
            "SELECT COUNT(*) AS \"aggregate\" FROM \
             (SELECT \"customer_id\" FROM \"orders\" GROUP BY \"customer_id\") AS \"temp_table\""
        );
    }

    #[test]
    fn test_exists_and_delete() {
        let mut q = QueryDescriptor::new("users");
        q.add_where(
            Boolean::And,
            WhereKind::Basic {
                column: String::from("id"),
                operator: Operator::Eq,
                value: SqlValue::Int(1),
            },
        );
        let g = grammar();
        assert_eq!(
            g.compile_exists(&q),
            "SELECT EXISTS(SELECT * FROM \"users\" WHERE \"id\" = ?) AS \"exists\""
        );
        assert_eq!(g.compile_delete(&q), "DELETE FROM \"users\" WHERE \"id\" = ?");
    }

    #[test]
    fn test_multi_row_insert() {
        let columns = vec![String::from("a"), String::from("b")];
        assert_eq!(
            grammar().compile_insert("pairs", &columns, 2),
            "INSERT INTO \"pairs\" (\"a\", \"b\") VALUES (?, ?), (?, ?)"
        );
        assert_eq!(
            grammar().compile_insert("pairs", &[], 1),
            "INSERT INTO \"pairs\" DEFAULT VALUES"
        );
    }

    #[test]
    fn test_create_table_with_inline_foreign_key() {
        let mut bp = Blueprint::create("posts");
        bp.id();
        bp.foreign_id("user_id").constrained().cascade_on_delete();
        bp.string("slug").unique();
        bp.soft_deletes();

        assert_eq!(
            grammar().compile_blueprint(&bp).unwrap(),
            vec![
                String::from(
                    "CREATE TABLE \"posts\" (\
                     \"id\" INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL, \
                     \"user_id\" INTEGER NOT NULL, \
                     \"slug\" VARCHAR NOT NULL, \
                     \"deleted_at\" DATETIME NULL, \
                     CONSTRAINT \"posts_user_id_foreign\" FOREIGN KEY (\"user_id\") \
                     REFERENCES \"users\" (\"id\") ON DELETE CASCADE)"
                ),
                String::from("CREATE UNIQUE INDEX \"posts_slug_unique\" ON \"posts\" (\"slug\")"),
            ]
        );
    }

    #[test]
    fn test_composite_primary_key() {
        let mut bp = Blueprint::create("role_user");
        bp.integer("role_id");
        bp.integer("user_id");
        bp.primary(&["role_id", "user_id"]);
        assert_eq!(
            grammar().compile_blueprint(&bp).unwrap(),
            vec![String::from(
                "CREATE TABLE \"role_user\" (\"role_id\" INTEGER NOT NULL, \
                 \"user_id\" INTEGER NOT NULL, PRIMARY KEY (\"role_id\", \"user_id\"))"
            )]
        );
    }

    #[test]
    fn test_modify_drops_columns_one_at_a_time() {
        let mut bp = Blueprint::alter("users");
        bp.drop_columns(&["a", "b"]);
        bp.rename_column("c", "d");
        bp.string("e").nullable();
        assert_eq!(
            grammar().compile_blueprint(&bp).unwrap(),
            vec![
                String::from("ALTER TABLE \"users\" DROP COLUMN \"a\""),
                String::from("ALTER TABLE \"users\" DROP COLUMN \"b\""),
                String::from("ALTER TABLE \"users\" RENAME COLUMN \"c\" TO \"d\""),
                String::from("ALTER TABLE \"users\" ADD COLUMN \"e\" VARCHAR NULL"),
            ]
        );
    }

    #[test]
    fn test_foreign_key_on_existing_table_is_rejected() {
        let mut bp = Blueprint::alter("posts");
        bp.foreign_id("team_id").nullable().constrained();
        assert!(matches!(
            grammar().compile_blueprint(&bp),
            Err(GrammarError::UnsupportedOperation {
                dialect: Dialect::Sqlite,
                ..
            })
        ));
    }

    #[test]
    fn test_geometry_is_rejected() {
        let mut bp = Blueprint::create("places");
        bp.geometry("shape");
        assert!(matches!(
            grammar().compile_blueprint(&bp),
            Err(GrammarError::UnsupportedColumnType {
                column_type: "geometry",
                ..
            })
        ));
    }

    #[test]
    fn test_drop_table_and_rename() {
        let g = SqliteGrammar::new("app_");
        assert_eq!(g.compile_drop_table_if_exists("users"), "DROP TABLE IF EXISTS \"app_users\"");
        assert_eq!(
            g.compile_rename_table("users", "members"),
            "ALTER TABLE \"app_users\" RENAME TO \"app_members\""
        );
        let (sql, bindings) = g.compile_table_exists("users");
        assert!(sql.contains("sqlite_master"));
        assert_eq!(bindings, vec![SqlValue::Text(String::from("app_users"))]);
    }
}
