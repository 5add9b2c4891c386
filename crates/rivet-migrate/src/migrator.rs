//! Applies and reverts batches of migrations.

use std::collections::BTreeSet;
use std::fmt;

use rivet_core::{RiskAnalyzer, RiskAssessment, RiskLevel};
use rivet_db::{Connection, DatabaseError};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{MigrateError, Result};
use crate::migration::{Migration, MigrationSet};
use crate::repository::MigrationRepository;

/// Default ceiling on `reset` iterations.
pub const DEFAULT_MAX_RESET_ITERATIONS: usize = 1000;

/// Where the migrator is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigratorState {
    /// The repository table has not been seen.
    Uninitialized,
    /// The repository exists and nothing is running.
    Ready,
    /// A migration is being applied or reverted.
    Applying {
        /// The running migration.
        migration: String,
    },
}

impl fmt::Display for MigratorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninitialized => f.write_str("uninitialized"),
            Self::Ready => f.write_str("ready"),
            Self::Applying { migration } => write!(f, "applying {migration}"),
        }
    }
}

/// One line of [`Migrator::status`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationStatus {
    pub migration: String,
    /// Batch it ran in, if it ran.
    pub batch: Option<i64>,
    /// False for a recorded id with no registered unit.
    pub available: bool,
}

impl MigrationStatus {
    #[must_use]
    pub const fn ran(&self) -> bool {
        self.batch.is_some()
    }
}

/// Dry-run result for one pending migration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedMigration {
    pub migration: String,
    /// Each compiled statement with its risk.
    pub statements: Vec<RiskAssessment>,
}

impl PlannedMigration {
    /// Highest risk among the statements.
    #[must_use]
    pub fn risk(&self) -> Option<RiskLevel> {
        self.statements.iter().map(|s| s.level).max()
    }
}

#[derive(Clone, Copy)]
enum Step {
    Up,
    Down,
}

/// Runs a [`MigrationSet`] against one connection, recording progress in a
/// [`MigrationRepository`].
///
/// Each migration runs in its own transaction when the dialect supports
/// transactional DDL. A failure rolls back that migration only; earlier
/// migrations of the same run stay applied.
pub struct Migrator<'c> {
    conn: &'c mut Connection,
    migrations: MigrationSet,
    repository: MigrationRepository,
    state: MigratorState,
    max_reset_iterations: usize,
    analyzer: RiskAnalyzer,
}

impl fmt::Debug for Migrator<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Migrator")
            .field("migrations", &self.migrations)
            .field("repository", &self.repository)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl<'c> Migrator<'c> {
    pub fn new(conn: &'c mut Connection, migrations: MigrationSet) -> Self {
        Self {
            conn,
            migrations,
            repository: MigrationRepository::default(),
            state: MigratorState::Uninitialized,
            max_reset_iterations: DEFAULT_MAX_RESET_ITERATIONS,
            analyzer: RiskAnalyzer::default(),
        }
    }

    /// Uses `repository` instead of the default `migrations` table.
    #[must_use]
    pub fn with_repository(mut self, repository: MigrationRepository) -> Self {
        self.repository = repository;
        self
    }

    /// Changes the `reset` iteration ceiling.
    #[must_use]
    pub fn with_max_reset_iterations(mut self, limit: usize) -> Self {
        self.max_reset_iterations = limit;
        self
    }

    /// Uses `analyzer` for [`pretend_run`](Self::pretend_run).
    #[must_use]
    pub fn with_analyzer(mut self, analyzer: RiskAnalyzer) -> Self {
        self.analyzer = analyzer;
        self
    }

    #[must_use]
    pub const fn state(&self) -> &MigratorState {
        &self.state
    }

    #[must_use]
    pub const fn repository(&self) -> &MigrationRepository {
        &self.repository
    }

    #[must_use]
    pub const fn migrations(&self) -> &MigrationSet {
        &self.migrations
    }

    pub fn connection(&mut self) -> &mut Connection {
        self.conn
    }

    /// Creates the repository table if needed.
    ///
    /// # Errors
    ///
    /// Returns the driver error.
    pub fn install(&mut self) -> Result<()> {
        if !self.repository.exists(self.conn)? {
            self.repository.create_repository(self.conn)?;
            info!(table = %self.repository.table(), "Created migration repository");
        }
        self.state = MigratorState::Ready;
        Ok(())
    }

    /// Syncs the state with the database without creating anything.
    fn has_repository(&mut self) -> Result<bool> {
        let exists = self.repository.exists(self.conn)?;
        self.state = if exists {
            MigratorState::Ready
        } else {
            MigratorState::Uninitialized
        };
        Ok(exists)
    }

    /// Registered migrations that have not run, in application order.
    ///
    /// # Errors
    ///
    /// Returns the driver error.
    pub fn pending(&mut self) -> Result<Vec<String>> {
        let ran: BTreeSet<String> = if self.has_repository()? {
            self.repository.get_ran(self.conn)?.into_iter().collect()
        } else {
            BTreeSet::new()
        };
        Ok(self
            .migrations
            .ids()
            .filter(|id| !ran.contains(*id))
            .map(String::from)
            .collect())
    }

    /// Every registered or recorded migration with its batch.
    ///
    /// # Errors
    ///
    /// Returns the driver error.
    pub fn status(&mut self) -> Result<Vec<MigrationStatus>> {
        let batches = if self.has_repository()? {
            self.repository.get_migration_batches(self.conn)?
        } else {
            Default::default()
        };
        let ids: BTreeSet<&str> = self
            .migrations
            .ids()
            .chain(batches.keys().map(String::as_str))
            .collect();
        Ok(ids
            .into_iter()
            .map(|id| MigrationStatus {
                migration: id.to_string(),
                batch: batches.get(id).copied(),
                available: self.migrations.contains(id),
            })
            .collect())
    }

    /// Applies every pending migration as one new batch. Returns the ids
    /// applied.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::MigrationFailed`] for the first failing
    /// migration; migrations before it stay applied.
    pub fn run(&mut self) -> Result<Vec<String>> {
        self.install()?;
        let pending = self.pending()?;
        if pending.is_empty() {
            info!("Nothing to migrate");
            return Ok(pending);
        }
        let batch = self.repository.next_batch_number(self.conn)?;
        info!(batch, count = pending.len(), "Running migrations");
        for id in &pending {
            self.apply(id, batch, Step::Up)?;
            info!(migration = %id, batch, "Migrated");
        }
        Ok(pending)
    }

    /// Reverts the last `steps` batches (at least one). Returns the ids
    /// reverted, newest first.
    ///
    /// A recorded migration with no registered unit is skipped with a
    /// warning and stays recorded.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::RollbackFailed`] for the first failing
    /// migration.
    pub fn rollback(&mut self, steps: usize) -> Result<Vec<String>> {
        if !self.has_repository()? {
            info!("Nothing to rollback");
            return Ok(Vec::new());
        }
        let batches = self.repository.batch_numbers(self.conn)?;
        let mut reverted = Vec::new();
        for batch in batches.into_iter().take(steps.max(1)) {
            reverted.extend(self.rollback_batch(batch)?);
        }
        if reverted.is_empty() {
            info!("Nothing to rollback");
        }
        Ok(reverted)
    }

    fn rollback_batch(&mut self, batch: i64) -> Result<Vec<String>> {
        let records = self.repository.get_batch(self.conn, batch)?;
        let mut reverted = Vec::with_capacity(records.len());
        for record in records {
            if !self.migrations.contains(&record.migration) {
                warn!(migration = %record.migration, batch, "Migration not found, skipping");
                continue;
            }
            self.apply(&record.migration, batch, Step::Down)?;
            info!(migration = %record.migration, batch, "Rolled back");
            reverted.push(record.migration);
        }
        Ok(reverted)
    }

    /// Reverts every batch, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::ResetLimitExceeded`] if batches remain after
    /// the iteration ceiling, which happens when a recorded migration has
    /// no registered unit.
    pub fn reset(&mut self) -> Result<Vec<String>> {
        if !self.has_repository()? {
            info!("Nothing to reset");
            return Ok(Vec::new());
        }
        let mut reverted = Vec::new();
        let mut iterations = 0;
        loop {
            let batch = self.repository.last_batch_number(self.conn)?;
            if batch == 0 {
                break;
            }
            if iterations >= self.max_reset_iterations {
                return Err(MigrateError::ResetLimitExceeded {
                    limit: self.max_reset_iterations,
                });
            }
            iterations += 1;
            debug!(batch, iteration = iterations, "Resetting batch");
            reverted.extend(self.rollback_batch(batch)?);
        }
        Ok(reverted)
    }

    /// Resets, drops the repository table and runs everything again.
    ///
    /// # Errors
    ///
    /// Returns the first reset or run error.
    pub fn fresh(&mut self) -> Result<Vec<String>> {
        if self.has_repository()? {
            self.reset()?;
            self.repository.delete_repository(self.conn)?;
            self.state = MigratorState::Uninitialized;
            info!(table = %self.repository.table(), "Dropped migration repository");
        }
        self.run()
    }

    /// Compiles each pending migration without executing it and classifies
    /// every statement. Nothing is recorded.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::MigrationFailed`] if a migration cannot be
    /// compiled.
    pub fn pretend_run(&mut self) -> Result<Vec<PlannedMigration>> {
        let pending = self.pending()?;
        let mut planned = Vec::with_capacity(pending.len());
        for id in pending {
            let Some(migration) = self.migrations.get(&id) else {
                continue;
            };
            let logged = self
                .conn
                .pretend(|conn| migration.up(&mut conn.schema()))
                .map_err(|source| MigrateError::MigrationFailed {
                    migration: id.clone(),
                    source,
                })?;
            let statements: Vec<String> = logged.into_iter().map(|q| q.sql).collect();
            planned.push(PlannedMigration {
                statements: self.analyzer.analyze_all(&statements),
                migration: id,
            });
        }
        Ok(planned)
    }

    fn apply(&mut self, id: &str, batch: i64, step: Step) -> Result<()> {
        let Some(migration) = self.migrations.get(id) else {
            return Err(MigrateError::UnknownMigration(id.to_string()));
        };
        let repository = &self.repository;
        let transactional =
            migration.within_transaction() && self.conn.grammar().supports_schema_transactions();
        self.state = MigratorState::Applying {
            migration: id.to_string(),
        };
        debug!(migration = %id, transactional, "Applying");

        let unit = |conn: &mut Connection| -> std::result::Result<(), DatabaseError> {
            match step {
                Step::Up => {
                    migration.up(&mut conn.schema())?;
                    repository.log(conn, id, batch)
                }
                Step::Down => {
                    migration.down(&mut conn.schema())?;
                    repository.delete(conn, id)
                }
            }
        };
        let result = if transactional {
            self.conn.transaction(unit)
        } else {
            unit(self.conn)
        };
        self.state = MigratorState::Ready;

        result.map_err(|source| match step {
            Step::Up => MigrateError::MigrationFailed {
                migration: id.to_string(),
                source,
            },
            Step::Down => MigrateError::RollbackFailed {
                migration: id.to_string(),
                source,
            },
        })
    }
}
