//! MySQL grammar.

use super::{quote_literal, Grammar};
use crate::dialect::Dialect;
use crate::error::Result;
use crate::schema::{Blueprint, ColumnDefinition, ColumnPosition, ColumnType};
use crate::value::SqlValue;

/// Largest unsigned 64-bit value; MySQL needs a limit before `OFFSET`.
const MAX_LIMIT: u64 = u64::MAX;

/// MySQL grammar: backtick quoting, `START TRANSACTION`, DDL that commits
/// implicitly.
#[derive(Debug, Clone, Default)]
pub struct MySqlGrammar {
    prefix: String,
}

impl MySqlGrammar {
    /// Creates a grammar using `prefix` for table names.
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Grammar for MySqlGrammar {
    fn dialect(&self) -> Dialect {
        Dialect::MySql
    }

    fn prefix(&self) -> &str {
        &self.prefix
    }

    fn quote_char(&self) -> char {
        '`'
    }

    fn compile_limit_offset(&self, limit: Option<u64>, offset: Option<u64>) -> String {
        match (limit, offset) {
            (Some(limit), Some(offset)) => format!(" LIMIT {limit} OFFSET {offset}"),
            (Some(limit), None) => format!(" LIMIT {limit}"),
            (None, Some(offset)) => format!(" LIMIT {MAX_LIMIT} OFFSET {offset}"),
            (None, None) => String::new(),
        }
    }

    fn compile_insert_defaults(&self, table: &str) -> String {
        format!("INSERT INTO {} () VALUES ()", self.wrap_table(table))
    }

    fn compile_truncate(&self, table: &str) -> String {
        format!("TRUNCATE TABLE {}", self.wrap_table(table))
    }

    fn compile_begin(&self) -> String {
        String::from("START TRANSACTION")
    }

    fn supports_schema_transactions(&self) -> bool {
        false
    }

    fn type_sql(&self, column: &ColumnDefinition) -> Result<String> {
        let sql = match &column.column_type {
            ColumnType::Increments | ColumnType::Integer => String::from("INT"),
            ColumnType::BigIncrements | ColumnType::BigInteger => String::from("BIGINT"),
            ColumnType::SmallInteger => String::from("SMALLINT"),
            ColumnType::TinyInteger => String::from("TINYINT"),
            ColumnType::Float => String::from("FLOAT"),
            ColumnType::Double => String::from("DOUBLE"),
            ColumnType::Decimal { precision, scale } => format!("DECIMAL({precision}, {scale})"),
            ColumnType::Boolean => String::from("TINYINT(1)"),
            ColumnType::String(length) => format!("VARCHAR({length})"),
            ColumnType::Char(length) => format!("CHAR({length})"),
            ColumnType::Text => String::from("TEXT"),
            ColumnType::MediumText => String::from("MEDIUMTEXT"),
            ColumnType::LongText => String::from("LONGTEXT"),
            ColumnType::Enum(allowed) => format!("ENUM({})", literal_list(allowed)),
            ColumnType::Set(allowed) => format!("SET({})", literal_list(allowed)),
            ColumnType::Json | ColumnType::Jsonb => String::from("JSON"),
            ColumnType::Date => String::from("DATE"),
            ColumnType::DateTime => String::from("DATETIME"),
            ColumnType::Time => String::from("TIME"),
            ColumnType::Timestamp => String::from("TIMESTAMP"),
            ColumnType::Binary => String::from("BLOB"),
            ColumnType::Uuid => String::from("CHAR(36)"),
            ColumnType::IpAddress => String::from("VARCHAR(45)"),
            ColumnType::MacAddress => String::from("VARCHAR(17)"),
            ColumnType::Geometry => String::from("GEOMETRY"),
        };
        Ok(sql)
    }

    fn column_modifiers(&self, column: &ColumnDefinition) -> String {
        let mut sql = String::new();
        if column.unsigned && column.column_type.is_numeric() {
            sql.push_str(" UNSIGNED");
        }
        sql.push_str(if column.nullable { " NULL" } else { " NOT NULL" });
        if let Some(default) = &column.default {
            sql.push_str(" DEFAULT ");
            sql.push_str(&default.to_sql());
        }
        if column.auto_increment && column.column_type.is_integer() {
            sql.push_str(" AUTO_INCREMENT PRIMARY KEY");
        }
        if let Some(comment) = &column.comment {
            sql.push_str(" COMMENT ");
            sql.push_str(&quote_literal(comment));
        }
        match &column.position {
            Some(ColumnPosition::First) => sql.push_str(" FIRST"),
            Some(ColumnPosition::After(other)) => {
                sql.push_str(" AFTER ");
                sql.push_str(&self.wrap(other));
            }
            None => {}
        }
        sql
    }

    fn compile_drop_index(&self, blueprint: &Blueprint, name: &str) -> String {
        format!(
            "DROP INDEX {} ON {}",
            self.wrap_segment(name),
            self.wrap_table(blueprint.table())
        )
    }

    fn compile_drop_primary(&self, blueprint: &Blueprint) -> Result<String> {
        Ok(format!(
            "ALTER TABLE {} DROP PRIMARY KEY",
            self.wrap_table(blueprint.table())
        ))
    }

    fn compile_drop_foreign(&self, blueprint: &Blueprint, name: &str) -> Result<String> {
        Ok(format!(
            "ALTER TABLE {} DROP FOREIGN KEY {}",
            self.wrap_table(blueprint.table()),
            self.wrap_segment(name)
        ))
    }

    fn compile_rename_table(&self, from: &str, to: &str) -> String {
        format!(
            "RENAME TABLE {} TO {}",
            self.wrap_table(from),
            self.wrap_table(to)
        )
    }

    fn compile_table_exists(&self, table: &str) -> (String, Vec<SqlValue>) {
        (
            String::from(
                "SELECT COUNT(*) AS `aggregate` FROM information_schema.tables \
                 WHERE table_schema = DATABASE() AND table_name = ?",
            ),
            vec![SqlValue::Text(format!("{}{table}", self.prefix))],
        )
    }

    fn compile_column_listing(&self, table: &str) -> (String, Vec<SqlValue>) {
        (
            String::from(
                "SELECT column_name AS `column_name` FROM information_schema.columns \
                 WHERE table_schema = DATABASE() AND table_name = ? ORDER BY ordinal_position",
            ),
            vec![SqlValue::Text(format!("{}{table}", self.prefix))],
        )
    }
}

fn literal_list(values: &[String]) -> String {
    values
        .iter()
        .map(|v| quote_literal(v))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GrammarError;
    use crate::query::{Boolean, Operator, QueryDescriptor, WhereKind};

    fn grammar() -> MySqlGrammar {
        MySqlGrammar::new("")
    }

    #[test]
    fn test_wrap_variants() {
        let g = grammar();
        assert_eq!(g.wrap("users.name"), "`users`.`name`");
        assert_eq!(g.wrap("*"), "*");
        assert_eq!(g.wrap("users.*"), "`users`.*");
        assert_eq!(g.wrap("name as n"), "`name` AS `n`");
        assert_eq!(g.wrap("we`ird"), "`we``ird`");
    }

    #[test]
    fn test_select_with_limit_and_offset() {
        let mut q = QueryDescriptor::new("users");
        q.add_where(
            Boolean::And,
            WhereKind::Basic {
                column: String::from("name"),
                operator: Operator::ILike,
                value: SqlValue::Text(String::from("a%")),
            },
        );
        q.for_page(2, 15);
        assert_eq!(
            grammar().compile_select(&q),
            "SELECT * FROM `users` WHERE `name` LIKE ? LIMIT 15 OFFSET 15"
        );
    }

    #[test]
    fn test_offset_without_limit() {
        let mut q = QueryDescriptor::new("users");
        q.offset = Some(5);
        assert_eq!(
            grammar().compile_select(&q),
            "SELECT * FROM `users` LIMIT 18446744073709551615 OFFSET 5"
        );
    }

    #[test]
    fn test_prefix_applies_to_tables_and_qualified_columns() {
        let g = MySqlGrammar::new("app_");
        let mut q = QueryDescriptor::new("users");
        q.add_column("users.id");
        assert_eq!(g.compile_select(&q), "SELECT `app_users`.`id` FROM `app_users`");
    }

    #[test]
    fn test_truncate_and_empty_insert() {
        let g = grammar();
        assert_eq!(g.compile_truncate("logs"), "TRUNCATE TABLE `logs`");
        assert_eq!(g.compile_insert("logs", &[], 1), "INSERT INTO `logs` () VALUES ()");
    }

    #[test]
    fn test_begin_transaction() {
        assert_eq!(grammar().compile_begin(), "START TRANSACTION");
        assert_eq!(
            grammar().compile_rollback_to_savepoint("trans2"),
            "ROLLBACK TO SAVEPOINT trans2"
        );
    }

    #[test]
    fn test_create_table() {
        let mut bp = Blueprint::create("users");
        bp.id();
        bp.string("email").unique();
        bp.enumeration("role", &["admin", "member"]).default_value("member");
        bp.decimal("balance", 8, 2).unsigned().comment("in cents");
        bp.boolean("active").default_value(true);
        bp.timestamps();

        let statements = grammar().compile_blueprint(&bp).unwrap();
        assert_eq!(
            statements,
            vec![
                String::from(
                    "CREATE TABLE `users` (\
                     `id` BIGINT UNSIGNED NOT NULL AUTO_INCREMENT PRIMARY KEY, \
                     `email` VARCHAR(255) NOT NULL, \
                     `role` ENUM('admin', 'member') NOT NULL DEFAULT 'member', \
                     `balance` DECIMAL(8, 2) UNSIGNED NOT NULL COMMENT 'in cents', \
                     `active` TINYINT(1) NOT NULL DEFAULT TRUE, \
                     `created_at` TIMESTAMP NULL, \
                     `updated_at` TIMESTAMP NULL)"
                ),
                String::from("CREATE UNIQUE INDEX `users_email_unique` ON `users` (`email`)"),
            ]
        );
    }

    #[test]
    fn test_foreign_keys_are_separate_statements() {
        let mut bp = Blueprint::create("posts");
        bp.id();
        bp.foreign_id("user_id").constrained().cascade_on_delete();
        let statements = grammar().compile_blueprint(&bp).unwrap();
        assert_eq!(
            statements[1],
            "ALTER TABLE `posts` ADD CONSTRAINT `posts_user_id_foreign` \
             FOREIGN KEY (`user_id`) REFERENCES `users` (`id`) ON DELETE CASCADE"
        );
    }

    #[test]
    fn test_modify_table() {
        let mut bp = Blueprint::alter("users");
        bp.drop_index("users_city_index");
        bp.drop_foreign("users_team_id_foreign");
        bp.drop_columns(&["city", "zip"]);
        bp.string("nickname").nullable().after("email");
        bp.rename("members");

        assert_eq!(
            grammar().compile_blueprint(&bp).unwrap(),
            vec![
                String::from("DROP INDEX `users_city_index` ON `users`"),
                String::from("ALTER TABLE `users` DROP FOREIGN KEY `users_team_id_foreign`"),
                String::from("ALTER TABLE `users` DROP COLUMN `city`, DROP COLUMN `zip`"),
                String::from(
                    "ALTER TABLE `users` ADD COLUMN `nickname` VARCHAR(255) NULL AFTER `email`"
                ),
                String::from("RENAME TABLE `users` TO `members`"),
            ]
        );
    }

    #[test]
    fn test_modify_table_with_primary_column() {
        let mut bp = Blueprint::alter("users");
        bp.string("code").primary();

        assert_eq!(
            grammar().compile_blueprint(&bp).unwrap(),
            vec![
                String::from("ALTER TABLE `users` ADD COLUMN `code` VARCHAR(255) NOT NULL"),
                String::from("ALTER TABLE `users` ADD PRIMARY KEY (`code`)"),
            ]
        );
    }

    #[test]
    fn test_set_column_is_supported() {
        let mut bp = Blueprint::create("flags");
        bp.set("bits", &["a", "b"]);
        let sql = grammar().compile_blueprint(&bp).unwrap();
        assert_eq!(sql[0], "CREATE TABLE `flags` (`bits` SET('a', 'b') NOT NULL)");
    }

    #[test]
    fn test_ddl_is_not_transactional() {
        assert!(!grammar().supports_schema_transactions());
    }

    #[test]
    fn test_empty_create_is_rejected() {
        let bp = Blueprint::create("nothing");
        assert!(matches!(
            grammar().compile_blueprint(&bp),
            Err(GrammarError::EmptyColumns(_))
        ));
    }
}
