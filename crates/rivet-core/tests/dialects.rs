//! The same descriptors compiled by every dialect.

use rivet_core::schema::Blueprint;
use rivet_core::{
    Boolean, Dialect, Direction, Grammar, Operator, QueryDescriptor, SqlValue, WhereKind,
};

const DIALECTS: [Dialect; 3] = [Dialect::MySql, Dialect::Postgres, Dialect::Sqlite];

fn active_users() -> QueryDescriptor {
    let mut q = QueryDescriptor::new("users");
    q.add_column("id");
    q.add_column("email");
    q.add_where(
        Boolean::And,
        WhereKind::Basic {
            column: String::from("status"),
            operator: Operator::Eq,
            value: SqlValue::Text(String::from("active")),
        },
    );
    q.add_where(
        Boolean::Or,
        WhereKind::In {
            column: String::from("role"),
            values: vec![SqlValue::Int(1), SqlValue::Int(2)],
            not: false,
        },
    );
    q.add_order("id", Direction::Asc);
    q.limit = Some(10);
    q
}

fn users_table() -> Blueprint {
    let mut bp = Blueprint::create("users");
    bp.id();
    bp.string("email").unique();
    bp.boolean("active").default_value(true);
    bp.timestamps();
    bp
}

// ===================================================================
// SELECT
// ===================================================================

#[test]
fn select_quotes_per_dialect() {
    let q = active_users();
    let expected = [
        "SELECT `id`, `email` FROM `users` WHERE `status` = ? OR `role` IN (?, ?) ORDER BY `id` ASC LIMIT 10",
        "SELECT \"id\", \"email\" FROM \"users\" WHERE \"status\" = ? OR \"role\" IN (?, ?) ORDER BY \"id\" ASC LIMIT 10",
        "SELECT \"id\", \"email\" FROM \"users\" WHERE \"status\" = ? OR \"role\" IN (?, ?) ORDER BY \"id\" ASC LIMIT 10",
    ];
    for (dialect, expected) in DIALECTS.iter().zip(expected) {
        assert_eq!(dialect.grammar("").compile_select(&q), expected, "{dialect}");
    }
}

#[test]
fn placeholders_match_bindings_in_order() {
    let q = active_users();
    assert_eq!(
        q.bindings(),
        vec![
            SqlValue::Text(String::from("active")),
            SqlValue::Int(1),
            SqlValue::Int(2),
        ]
    );
    for dialect in DIALECTS {
        let sql = dialect.grammar("").compile_select(&q);
        assert_eq!(sql.matches('?').count(), q.bindings().len(), "{dialect}");
    }
}

#[test]
fn postgres_numbers_placeholders_on_the_wire() {
    let grammar = Dialect::Postgres.grammar("");
    let sql = grammar.compile_select(&active_users());
    assert_eq!(
        grammar.prepare_placeholders(&sql),
        "SELECT \"id\", \"email\" FROM \"users\" WHERE \"status\" = $1 OR \"role\" IN ($2, $3) ORDER BY \"id\" ASC LIMIT 10"
    );
}

#[test]
fn prefix_applies_to_every_dialect() {
    let q = QueryDescriptor::new("users");
    assert_eq!(
        Dialect::MySql.grammar("app_").compile_select(&q),
        "SELECT * FROM `app_users`"
    );
    assert_eq!(
        Dialect::Sqlite.grammar("app_").compile_select(&q),
        "SELECT * FROM \"app_users\""
    );
}

// ===================================================================
// Schema
// ===================================================================

#[test]
fn create_table_mysql() {
    let statements = Dialect::MySql.grammar("").compile_blueprint(&users_table()).unwrap();
    assert_eq!(
        statements,
        vec![
            String::from(
                "CREATE TABLE `users` (`id` BIGINT UNSIGNED NOT NULL AUTO_INCREMENT PRIMARY KEY, \
                 `email` VARCHAR(255) NOT NULL, \
                 `active` TINYINT(1) NOT NULL DEFAULT TRUE, \
                 `created_at` TIMESTAMP NULL, \
                 `updated_at` TIMESTAMP NULL)"
            ),
            String::from("CREATE UNIQUE INDEX `users_email_unique` ON `users` (`email`)"),
        ]
    );
}

#[test]
fn create_table_postgres() {
    let statements = Dialect::Postgres.grammar("").compile_blueprint(&users_table()).unwrap();
    assert_eq!(
        statements,
        vec![
            String::from(
                "CREATE TABLE \"users\" (\"id\" BIGSERIAL NOT NULL PRIMARY KEY, \
                 \"email\" VARCHAR(255) NOT NULL, \
                 \"active\" BOOLEAN NOT NULL DEFAULT TRUE, \
                 \"created_at\" TIMESTAMP(0) WITHOUT TIME ZONE NULL, \
                 \"updated_at\" TIMESTAMP(0) WITHOUT TIME ZONE NULL)"
            ),
            String::from("CREATE UNIQUE INDEX \"users_email_unique\" ON \"users\" (\"email\")"),
        ]
    );
}

#[test]
fn create_table_sqlite() {
    let statements = Dialect::Sqlite.grammar("").compile_blueprint(&users_table()).unwrap();
    assert_eq!(
        statements,
        vec![
            String::from(
                "CREATE TABLE \"users\" (\"id\" INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL, \
                 \"email\" VARCHAR NOT NULL, \
                 \"active\" TINYINT(1) NOT NULL DEFAULT TRUE, \
                 \"created_at\" DATETIME NULL, \
                 \"updated_at\" DATETIME NULL)"
            ),
            String::from("CREATE UNIQUE INDEX \"users_email_unique\" ON \"users\" (\"email\")"),
        ]
    );
}

#[test]
fn transaction_control_per_dialect() {
    let mysql = Dialect::MySql.grammar("");
    let sqlite = Dialect::Sqlite.grammar("");
    assert_eq!(mysql.compile_begin(), "START TRANSACTION");
    assert_eq!(sqlite.compile_begin(), "BEGIN");
    assert_eq!(sqlite.compile_savepoint("trans2"), "SAVEPOINT trans2");
    assert_eq!(
        sqlite.compile_rollback_to_savepoint("trans2"),
        "ROLLBACK TO SAVEPOINT trans2"
    );
    assert!(!mysql.supports_schema_transactions());
    assert!(Dialect::Postgres.grammar("").supports_schema_transactions());
}
