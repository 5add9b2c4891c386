//! Migration history tracking.
//!
//! The repository table records which migrations ran and in which batch:
//! `id` (auto-increment), `migration` (unique), `batch`, `executed_at`
//! (defaults to the current time).

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use rivet_core::{Direction, Row, SqlValue, TIMESTAMP_FORMAT};
use rivet_db::{Connection, QueryBuilder, Result};
use serde::Serialize;

/// Default repository table name.
pub const DEFAULT_TABLE: &str = "migrations";

/// A row of the repository table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationRecord {
    pub id: i64,
    pub migration: String,
    pub batch: i64,
    pub executed_at: Option<NaiveDateTime>,
}

impl MigrationRecord {
    fn from_row(row: &Row) -> Self {
        let executed_at = match row.get("executed_at") {
            Some(SqlValue::Timestamp(ts)) => Some(*ts),
            Some(SqlValue::Text(text)) => NaiveDateTime::parse_from_str(text, TIMESTAMP_FORMAT).ok(),
            _ => None,
        };
        Self {
            id: row.get("id").and_then(SqlValue::as_i64).unwrap_or_default(),
            migration: row
                .get("migration")
                .and_then(SqlValue::as_str)
                .unwrap_or_default()
                .to_string(),
            batch: row.get("batch").and_then(SqlValue::as_i64).unwrap_or_default(),
            executed_at,
        }
    }
}

/// Reads and writes the repository table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationRepository {
    table: String,
}

impl Default for MigrationRepository {
    fn default() -> Self {
        Self::new(DEFAULT_TABLE)
    }
}

impl MigrationRepository {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
        }
    }

    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    fn query<'c>(&self, conn: &'c mut Connection) -> QueryBuilder<'c> {
        conn.table(&self.table)
    }

    /// True when the repository table exists.
    ///
    /// # Errors
    ///
    /// Returns the driver error.
    pub fn exists(&self, conn: &mut Connection) -> Result<bool> {
        conn.schema().has_table(&self.table)
    }

    /// Creates the repository table.
    ///
    /// # Errors
    ///
    /// Returns the driver error.
    pub fn create_repository(&self, conn: &mut Connection) -> Result<()> {
        conn.schema().create(&self.table, |table| {
            table.increments("id");
            table.string("migration").unique();
            table.integer("batch");
            table.timestamp("executed_at").use_current();
        })
    }

    /// Drops the repository table if present.
    ///
    /// # Errors
    ///
    /// Returns the driver error.
    pub fn delete_repository(&self, conn: &mut Connection) -> Result<()> {
        conn.schema().drop_if_exists(&self.table)
    }

    /// Every record, oldest batch first.
    ///
    /// # Errors
    ///
    /// Returns the driver error.
    pub fn records(&self, conn: &mut Connection) -> Result<Vec<MigrationRecord>> {
        Ok(self
            .query(conn)
            .order_by("batch", Direction::Asc)
            .order_by("migration", Direction::Asc)
            .get()?
            .iter()
            .map(MigrationRecord::from_row)
            .collect())
    }

    /// Identifiers of every migration that ran, in application order.
    ///
    /// # Errors
    ///
    /// Returns the driver error.
    pub fn get_ran(&self, conn: &mut Connection) -> Result<Vec<String>> {
        Ok(self
            .records(conn)?
            .into_iter()
            .map(|record| record.migration)
            .collect())
    }

    /// The `steps` most recent records, newest first.
    ///
    /// # Errors
    ///
    /// Returns the driver error.
    pub fn get_migrations(&self, conn: &mut Connection, steps: u64) -> Result<Vec<MigrationRecord>> {
        Ok(self
            .query(conn)
            .where_op("batch", ">=", 1)
            .order_by_desc("batch")
            .order_by_desc("migration")
            .limit(steps)
            .get()?
            .iter()
            .map(MigrationRecord::from_row)
            .collect())
    }

    /// Records of one batch in reverse application order.
    ///
    /// # Errors
    ///
    /// Returns the driver error.
    pub fn get_batch(&self, conn: &mut Connection, batch: i64) -> Result<Vec<MigrationRecord>> {
        Ok(self
            .query(conn)
            .where_eq("batch", batch)
            .order_by_desc("migration")
            .get()?
            .iter()
            .map(MigrationRecord::from_row)
            .collect())
    }

    /// Records of the last batch in reverse application order.
    ///
    /// # Errors
    ///
    /// Returns the driver error.
    pub fn get_last(&self, conn: &mut Connection) -> Result<Vec<MigrationRecord>> {
        let batch = self.last_batch_number(conn)?;
        if batch == 0 {
            return Ok(Vec::new());
        }
        self.get_batch(conn, batch)
    }

    /// Migration id to batch number.
    ///
    /// # Errors
    ///
    /// Returns the driver error.
    pub fn get_migration_batches(&self, conn: &mut Connection) -> Result<BTreeMap<String, i64>> {
        Ok(self
            .records(conn)?
            .into_iter()
            .map(|record| (record.migration, record.batch))
            .collect())
    }

    /// Distinct batch numbers, newest first.
    ///
    /// # Errors
    ///
    /// Returns the driver error.
    pub fn batch_numbers(&self, conn: &mut Connection) -> Result<Vec<i64>> {
        let mut batches: Vec<i64> = self
            .query(conn)
            .distinct()
            .pluck("batch")?
            .iter()
            .filter_map(SqlValue::as_i64)
            .collect();
        batches.sort_unstable_by(|a, b| b.cmp(a));
        Ok(batches)
    }

    /// Records that `migration` ran in `batch`.
    ///
    /// # Errors
    ///
    /// Returns the driver error, including a unique violation when the id
    /// is already recorded.
    pub fn log(&self, conn: &mut Connection, migration: &str, batch: i64) -> Result<()> {
        let mut row = Row::new();
        row.insert(String::from("migration"), SqlValue::Text(migration.to_string()));
        row.insert(String::from("batch"), SqlValue::Int(batch));
        self.query(conn).insert(row).map(|_| ())
    }

    /// Removes the record of `migration`.
    ///
    /// # Errors
    ///
    /// Returns the driver error.
    pub fn delete(&self, conn: &mut Connection, migration: &str) -> Result<()> {
        self.query(conn)
            .where_eq("migration", migration)
            .delete()
            .map(|_| ())
    }

    /// Highest batch number, 0 when nothing ran.
    ///
    /// # Errors
    ///
    /// Returns the driver error.
    pub fn last_batch_number(&self, conn: &mut Connection) -> Result<i64> {
        Ok(self
            .query(conn)
            .max("batch")?
            .and_then(|value| value.as_i64())
            .unwrap_or(0))
    }

    /// Batch number for the next run.
    ///
    /// # Errors
    ///
    /// Returns the driver error.
    pub fn next_batch_number(&self, conn: &mut Connection) -> Result<i64> {
        Ok(self.last_batch_number(conn)? + 1)
    }
}
