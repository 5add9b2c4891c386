//! Migration units and their discovery.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

use rivet_db::Schema;
use tracing::{debug, warn};

use crate::error::{MigrateError, Result};

const UP_SUFFIX: &str = ".up.sql";
const DOWN_SUFFIX: &str = ".down.sql";

/// One reversible schema change.
///
/// ```rust
/// use rivet_db::Schema;
/// use rivet_migrate::Migration;
///
/// struct CreateUsers;
///
/// impl Migration for CreateUsers {
///     fn up(&self, schema: &mut Schema<'_>) -> rivet_db::Result<()> {
///         schema.create("users", |table| {
///             table.id();
///             table.string("email").unique();
///             table.timestamps();
///         })
///     }
///
///     fn down(&self, schema: &mut Schema<'_>) -> rivet_db::Result<()> {
///         schema.drop_if_exists("users")
///     }
/// }
/// ```
pub trait Migration: Send + Sync {
    /// Applies the change.
    ///
    /// # Errors
    ///
    /// Returns the first failing statement's error.
    fn up(&self, schema: &mut Schema<'_>) -> rivet_db::Result<()>;

    /// Reverts the change.
    ///
    /// # Errors
    ///
    /// Returns the first failing statement's error.
    fn down(&self, schema: &mut Schema<'_>) -> rivet_db::Result<()>;

    /// Whether `up`/`down` run inside a transaction. Ignored on dialects
    /// whose DDL commits implicitly.
    fn within_transaction(&self) -> bool {
        true
    }
}

/// A migration read from a pair of SQL files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlMigration {
    up: Vec<String>,
    down: Vec<String>,
}

impl SqlMigration {
    /// Builds a migration from SQL scripts, each split into statements.
    #[must_use]
    pub fn new(up: &str, down: &str) -> Self {
        Self {
            up: split_statements(up),
            down: split_statements(down),
        }
    }

    #[must_use]
    pub fn up_statements(&self) -> &[String] {
        &self.up
    }

    #[must_use]
    pub fn down_statements(&self) -> &[String] {
        &self.down
    }
}

impl Migration for SqlMigration {
    fn up(&self, schema: &mut Schema<'_>) -> rivet_db::Result<()> {
        for sql in &self.up {
            schema.statement(sql)?;
        }
        Ok(())
    }

    fn down(&self, schema: &mut Schema<'_>) -> rivet_db::Result<()> {
        for sql in &self.down {
            schema.statement(sql)?;
        }
        Ok(())
    }
}

/// Splits a script on `;` outside quoted text and comments. Comments are
/// dropped; empty statements are skipped.
#[must_use]
pub fn split_statements(script: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut chars = script.chars().peekable();
    let mut quote: Option<char> = None;

    while let Some(c) = chars.next() {
        if let Some(q) = quote {
            current.push(c);
            if c == q {
                if chars.peek() == Some(&q) {
                    current.push(q);
                    chars.next();
                } else {
                    quote = None;
                }
            }
            continue;
        }
        match c {
            '\'' | '"' | '`' => {
                quote = Some(c);
                current.push(c);
            }
            '-' if chars.peek() == Some(&'-') => {
                for skipped in chars.by_ref() {
                    if skipped == '\n' {
                        current.push('\n');
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut previous = '\0';
                for skipped in chars.by_ref() {
                    if previous == '*' && skipped == '/' {
                        break;
                    }
                    previous = skipped;
                }
                current.push(' ');
            }
            ';' => {
                push_statement(&mut statements, &current);
                current.clear();
            }
            _ => current.push(c),
        }
    }
    push_statement(&mut statements, &current);
    statements
}

fn push_statement(statements: &mut Vec<String>, text: &str) {
    let trimmed = text.trim();
    if !trimmed.is_empty() {
        statements.push(trimmed.to_string());
    }
}

/// Migrations keyed by identifier, iterated in lexicographic order.
#[derive(Default)]
pub struct MigrationSet {
    migrations: BTreeMap<String, Box<dyn Migration>>,
}

impl fmt::Debug for MigrationSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.migrations.keys()).finish()
    }
}

impl MigrationSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `migration` under `id`.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::DuplicateMigration`] if `id` is taken.
    pub fn add(&mut self, id: impl Into<String>, migration: impl Migration + 'static) -> Result<&mut Self> {
        let id = id.into();
        if self.migrations.contains_key(&id) {
            return Err(MigrateError::DuplicateMigration(id));
        }
        self.migrations.insert(id, Box::new(migration));
        Ok(self)
    }

    /// Builder form of [`add`](Self::add).
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::DuplicateMigration`] if `id` is taken.
    pub fn with(mut self, id: impl Into<String>, migration: impl Migration + 'static) -> Result<Self> {
        self.add(id, migration)?;
        Ok(self)
    }

    /// Discovers `<id>.up.sql` / `<id>.down.sql` pairs in `dir`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error, [`MigrateError::MissingDownScript`] for an up
    /// script without its partner, or a duplicate id error.
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let mut ups = BTreeMap::new();
        let mut downs = BTreeMap::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if let Some(id) = name.strip_suffix(UP_SUFFIX) {
                ups.insert(id.to_string(), path.clone());
            } else if let Some(id) = name.strip_suffix(DOWN_SUFFIX) {
                downs.insert(id.to_string(), path.clone());
            }
        }

        let mut set = Self::new();
        for (id, up_path) in ups {
            let Some(down_path) = downs.remove(&id) else {
                return Err(MigrateError::MissingDownScript(up_path));
            };
            let migration = SqlMigration::new(
                &fs::read_to_string(&up_path)?,
                &fs::read_to_string(&down_path)?,
            );
            debug!(migration = %id, statements = migration.up.len(), "Discovered migration");
            set.add(id, migration)?;
        }
        for id in downs.keys() {
            warn!(migration = %id, "Ignoring down script without an up script");
        }
        Ok(set)
    }

    /// Adds every migration of `other`.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::DuplicateMigration`] on the first shared id.
    pub fn merge(&mut self, other: Self) -> Result<()> {
        for (id, migration) in other.migrations {
            if self.migrations.contains_key(&id) {
                return Err(MigrateError::DuplicateMigration(id));
            }
            self.migrations.insert(id, migration);
        }
        Ok(())
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&dyn Migration> {
        self.migrations.get(id).map(Box::as_ref)
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.migrations.contains_key(id)
    }

    /// Identifiers in application order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.migrations.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.migrations.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_respects_quotes_and_comments() {
        let script = "
            -- users; the first table
            CREATE TABLE users (id INTEGER, note TEXT DEFAULT 'a;b');
            /* seed; data */
            INSERT INTO users (note) VALUES ('it''s; fine');
            ;
        ";
        assert_eq!(
            split_statements(script),
            vec![
                "CREATE TABLE users (id INTEGER, note TEXT DEFAULT 'a;b')",
                "INSERT INTO users (note) VALUES ('it''s; fine')",
            ]
        );
    }

    #[test]
    fn test_split_without_trailing_semicolon() {
        assert_eq!(
            split_statements("DROP TABLE \"a;b\""),
            vec!["DROP TABLE \"a;b\""]
        );
        assert!(split_statements("  -- nothing here\n").is_empty());
    }

    #[test]
    fn test_duplicate_ids_are_rejected() {
        let mut set = MigrationSet::new();
        set.add("0001_users", SqlMigration::new("SELECT 1", "SELECT 1"))
            .unwrap();
        let err = set
            .add("0001_users", SqlMigration::new("SELECT 2", "SELECT 2"))
            .unwrap_err();
        assert!(matches!(err, MigrateError::DuplicateMigration(id) if id == "0001_users"));
    }

    #[test]
    fn test_ids_are_sorted() {
        let set = MigrationSet::new()
            .with("2024_02_01_posts", SqlMigration::new("", ""))
            .unwrap()
            .with("2024_01_01_users", SqlMigration::new("", ""))
            .unwrap();
        assert_eq!(
            set.ids().collect::<Vec<_>>(),
            vec!["2024_01_01_users", "2024_02_01_posts"]
        );
    }

    #[test]
    fn test_from_dir_pairs_scripts() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("0002_posts.up.sql"), "CREATE TABLE posts (id INTEGER);").unwrap();
        fs::write(dir.path().join("0002_posts.down.sql"), "DROP TABLE posts;").unwrap();
        fs::write(dir.path().join("0001_users.up.sql"), "CREATE TABLE users (id INTEGER);").unwrap();
        fs::write(dir.path().join("0001_users.down.sql"), "DROP TABLE users;").unwrap();
        fs::write(dir.path().join("README.md"), "not a migration").unwrap();

        let set = MigrationSet::from_dir(dir.path()).unwrap();
        assert_eq!(set.ids().collect::<Vec<_>>(), vec!["0001_users", "0002_posts"]);
    }

    #[test]
    fn test_from_dir_requires_down_script() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("0001_users.up.sql"), "CREATE TABLE users (id INTEGER);").unwrap();
        let err = MigrationSet::from_dir(dir.path()).unwrap_err();
        assert!(matches!(err, MigrateError::MissingDownScript(path) if path.ends_with("0001_users.up.sql")));
    }
}
