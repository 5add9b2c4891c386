//! Dialect tags.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::GrammarError;
use crate::grammar::{Grammar, MySqlGrammar, PostgresGrammar, SqliteGrammar};

/// The SQL variant a connection speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Dialect {
    /// MySQL and MariaDB.
    #[serde(rename = "mysql", alias = "mariadb")]
    MySql,
    /// PostgreSQL.
    #[serde(rename = "pgsql", alias = "postgres", alias = "postgresql")]
    Postgres,
    /// SQLite.
    #[default]
    #[serde(rename = "sqlite", alias = "sqlite3")]
    Sqlite,
}

impl Dialect {
    /// Configuration name of the dialect.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::MySql => "mysql",
            Self::Postgres => "pgsql",
            Self::Sqlite => "sqlite",
        }
    }

    /// Builds the grammar for this dialect with the given table prefix.
    #[must_use]
    pub fn grammar(self, prefix: &str) -> Box<dyn Grammar> {
        match self {
            Self::MySql => Box::new(MySqlGrammar::new(prefix)),
            Self::Postgres => Box::new(PostgresGrammar::new(prefix)),
            Self::Sqlite => Box::new(SqliteGrammar::new(prefix)),
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dialect {
    type Err = GrammarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mysql" | "mariadb" => Ok(Self::MySql),
            "pgsql" | "postgres" | "postgresql" => Ok(Self::Postgres),
            "sqlite" | "sqlite3" => Ok(Self::Sqlite),
            other => Err(GrammarError::InvalidDialect(other.to_string())),
        }
    }
}
