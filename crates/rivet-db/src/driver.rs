//! sqlx handles for the three supported databases.
//!
//! Each handle is a single connection; statements run in call order.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rivet_core::{Dialect, Row, SqlValue, ToSqlValue};
use rust_decimal::Decimal;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection, MySqlRow, MySqlSslMode};
use sqlx::postgres::{PgConnectOptions, PgConnection, PgRow, PgSslMode};
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqliteRow};
use sqlx::{Column, ConnectOptions, Connection as _, Row as _};
use tracing::warn;
use uuid::Uuid;

use crate::config::ConnectionConfig;

/// What a statement is expected to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Action {
    /// Rows.
    Fetch,
    /// Affected-row count and generated key.
    Execute,
    /// Unprepared text, possibly several statements.
    Raw,
}

/// Result of one statement.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Outcome {
    Rows(Vec<Row>),
    Affected { rows: u64, last_id: Option<i64> },
}

impl Outcome {
    pub(crate) const fn empty(action: Action) -> Self {
        match action {
            Action::Fetch => Self::Rows(Vec::new()),
            Action::Execute | Action::Raw => Self::Affected {
                rows: 0,
                last_id: None,
            },
        }
    }

    pub(crate) fn into_rows(self) -> Vec<Row> {
        match self {
            Self::Rows(rows) => rows,
            Self::Affected { .. } => Vec::new(),
        }
    }

    pub(crate) const fn affected(&self) -> u64 {
        match self {
            Self::Rows(rows) => rows.len() as u64,
            Self::Affected { rows, .. } => *rows,
        }
    }
}

/// True when the error means the server is gone rather than the statement
/// being wrong.
pub(crate) fn is_lost_connection(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Io(_) | sqlx::Error::WorkerCrashed)
}

macro_rules! bind_values {
    ($query:expr, $bindings:expr) => {{
        let mut query = $query;
        for value in $bindings {
            query = match value {
                SqlValue::Null => query.bind(Option::<i64>::None),
                SqlValue::Bool(b) => query.bind(*b),
                SqlValue::Int(n) => query.bind(*n),
                SqlValue::Float(f) => query.bind(*f),
                SqlValue::Text(s) => query.bind(s.as_str()),
                SqlValue::Blob(b) => query.bind(b.as_slice()),
                SqlValue::Timestamp(ts) => query.bind(*ts),
            };
        }
        query
    }};
}

/// Tries each type in turn; the first compatible decode wins.
macro_rules! decode_first {
    ($row:expr, $index:expr, [$($ty:ty),+ $(,)?]) => {{
        $(
            if let Ok(value) = $row.try_get::<Option<$ty>, _>($index) {
                return Ok(value.to_sql_value());
            }
        )+
    }};
}

/// Like `decode_first!`, for types kept as their text form so no precision
/// is lost.
macro_rules! decode_as_text {
    ($row:expr, $index:expr, [$($ty:ty),+ $(,)?]) => {{
        $(
            if let Ok(value) = $row.try_get::<Option<$ty>, _>($index) {
                return Ok(text_value(value));
            }
        )+
    }};
}

fn text_value<T: ToString>(value: Option<T>) -> SqlValue {
    value.map_or(SqlValue::Null, |v| SqlValue::Text(v.to_string()))
}

fn undecodable(column: &str, type_name: &str) -> sqlx::Error {
    sqlx::Error::Decode(format!("column `{column}` has unsupported type {type_name}").into())
}

fn decode_sqlite(row: &SqliteRow, index: usize) -> Result<SqlValue, sqlx::Error> {
    decode_first!(row, index, [i64, f64, String, Vec<u8>]);
    let column = &row.columns()[index];
    Err(undecodable(column.name(), &format!("{:?}", column.type_info())))
}

fn decode_mysql(row: &MySqlRow, index: usize) -> Result<SqlValue, sqlx::Error> {
    decode_first!(
        row,
        index,
        [
            i64,
            u64,
            f64,
            f32,
            bool,
            String,
            NaiveDateTime,
            DateTime<Utc>,
            NaiveDate,
            NaiveTime,
            serde_json::Value,
            Vec<u8>,
        ]
    );
    decode_as_text!(row, index, [Decimal]);
    let column = &row.columns()[index];
    Err(undecodable(column.name(), &format!("{:?}", column.type_info())))
}

fn decode_postgres(row: &PgRow, index: usize) -> Result<SqlValue, sqlx::Error> {
    decode_first!(
        row,
        index,
        [
            i64,
            i32,
            i16,
            f64,
            f32,
            bool,
            String,
            NaiveDateTime,
            DateTime<Utc>,
            NaiveDate,
            NaiveTime,
            serde_json::Value,
            Vec<u8>,
        ]
    );
    decode_as_text!(row, index, [Decimal, Uuid]);
    let column = &row.columns()[index];
    Err(undecodable(column.name(), &format!("{:?}", column.type_info())))
}

macro_rules! to_rows {
    ($rows:expr, $decode:ident) => {{
        let mut out = Vec::with_capacity($rows.len());
        for row in &$rows {
            let mut mapped = Row::new();
            for (index, column) in row.columns().iter().enumerate() {
                mapped.insert(column.name().to_string(), $decode(row, index)?);
            }
            out.push(mapped);
        }
        out
    }};
}

/// An open connection to one of the supported databases.
#[derive(Debug)]
pub(crate) enum Handle {
    Sqlite(SqliteConnection),
    MySql(MySqlConnection),
    Postgres(PgConnection),
}

impl Handle {
    /// Opens a connection described by `config`.
    pub(crate) async fn open(config: &ConnectionConfig) -> Result<Self, sqlx::Error> {
        match config.driver {
            Dialect::Sqlite => {
                let options = if config.is_sqlite_memory() {
                    SqliteConnectOptions::from_str("sqlite::memory:")?
                } else {
                    SqliteConnectOptions::new()
                        .filename(&config.database)
                        .create_if_missing(true)
                };
                let mut conn = options.foreign_keys(true).connect().await?;
                for (key, value) in &config.options {
                    sqlx::raw_sql(&format!("PRAGMA {key} = {value}"))
                        .execute(&mut conn)
                        .await?;
                }
                Ok(Self::Sqlite(conn))
            }
            Dialect::MySql => {
                let mut options = MySqlConnectOptions::new()
                    .host(&config.host)
                    .port(config.port_or_default())
                    .username(&config.username)
                    .database(&config.database);
                if let Some(password) = &config.password {
                    options = options.password(password);
                }
                for (key, value) in &config.options {
                    options = match key.as_str() {
                        "charset" => options.charset(value),
                        "collation" => options.collation(value),
                        "ssl_mode" | "sslmode" => options.ssl_mode(MySqlSslMode::from_str(value)?),
                        "socket" => options.socket(value),
                        other => {
                            warn!(option = %other, "Ignoring unknown MySQL option");
                            options
                        }
                    };
                }
                Ok(Self::MySql(options.connect().await?))
            }
            Dialect::Postgres => {
                let mut options = PgConnectOptions::new()
                    .host(&config.host)
                    .port(config.port_or_default())
                    .username(&config.username)
                    .database(&config.database);
                if let Some(password) = &config.password {
                    options = options.password(password);
                }
                for (key, value) in &config.options {
                    options = match key.as_str() {
                        "sslmode" | "ssl_mode" => options.ssl_mode(PgSslMode::from_str(value)?),
                        "application_name" => options.application_name(value),
                        other => options.options([(other, value.as_str())]),
                    };
                }
                Ok(Self::Postgres(options.connect().await?))
            }
        }
    }

    /// Runs one statement.
    pub(crate) async fn perform(
        &mut self,
        sql: &str,
        bindings: &[SqlValue],
        action: Action,
    ) -> Result<Outcome, sqlx::Error> {
        match self {
            Self::Sqlite(conn) => match action {
                Action::Fetch => {
                    let rows = bind_values!(sqlx::query(sql), bindings)
                        .fetch_all(&mut *conn)
                        .await?;
                    Ok(Outcome::Rows(to_rows!(rows, decode_sqlite)))
                }
                Action::Execute => {
                    let done = bind_values!(sqlx::query(sql), bindings)
                        .execute(&mut *conn)
                        .await?;
                    Ok(Outcome::Affected {
                        rows: done.rows_affected(),
                        last_id: Some(done.last_insert_rowid()),
                    })
                }
                Action::Raw => {
                    let done = sqlx::raw_sql(sql).execute(&mut *conn).await?;
                    Ok(Outcome::Affected {
                        rows: done.rows_affected(),
                        last_id: Some(done.last_insert_rowid()),
                    })
                }
            },
            Self::MySql(conn) => match action {
                Action::Fetch => {
                    let rows = bind_values!(sqlx::query(sql), bindings)
                        .fetch_all(&mut *conn)
                        .await?;
                    Ok(Outcome::Rows(to_rows!(rows, decode_mysql)))
                }
                Action::Execute => {
                    let done = bind_values!(sqlx::query(sql), bindings)
                        .execute(&mut *conn)
                        .await?;
                    Ok(Outcome::Affected {
                        rows: done.rows_affected(),
                        last_id: i64::try_from(done.last_insert_id()).ok(),
                    })
                }
                Action::Raw => {
                    let done = sqlx::raw_sql(sql).execute(&mut *conn).await?;
                    Ok(Outcome::Affected {
                        rows: done.rows_affected(),
                        last_id: i64::try_from(done.last_insert_id()).ok(),
                    })
                }
            },
            Self::Postgres(conn) => match action {
                Action::Fetch => {
                    let rows = bind_values!(sqlx::query(sql), bindings)
                        .fetch_all(&mut *conn)
                        .await?;
                    Ok(Outcome::Rows(to_rows!(rows, decode_postgres)))
                }
                Action::Execute => {
                    let done = bind_values!(sqlx::query(sql), bindings)
                        .execute(&mut *conn)
                        .await?;
                    Ok(Outcome::Affected {
                        rows: done.rows_affected(),
                        last_id: None,
                    })
                }
                Action::Raw => {
                    let done = sqlx::raw_sql(sql).execute(&mut *conn).await?;
                    Ok(Outcome::Affected {
                        rows: done.rows_affected(),
                        last_id: None,
                    })
                }
            },
        }
    }

    /// Closes the connection.
    pub(crate) async fn close(self) -> Result<(), sqlx::Error> {
        match self {
            Self::Sqlite(conn) => conn.close().await,
            Self::MySql(conn) => conn.close().await,
            Self::Postgres(conn) => conn.close().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decimal_keeps_precision_as_text() {
        let amount = Decimal::from_str("12345678901234567890.12345678").unwrap();
        assert_eq!(
            text_value(Some(amount)),
            SqlValue::Text(String::from("12345678901234567890.12345678"))
        );
        assert_eq!(text_value(None::<Decimal>), SqlValue::Null);
    }

    #[test]
    fn test_uuid_as_text() {
        let id = Uuid::from_str("67e55044-10b1-426f-9247-bb680e5fe0c8").unwrap();
        assert_eq!(
            text_value(Some(id)),
            SqlValue::Text(String::from("67e55044-10b1-426f-9247-bb680e5fe0c8"))
        );
    }
}
