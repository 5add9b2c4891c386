//! Advisory risk classification for compiled SQL.
//!
//! Rules are regex patterns checked in order; the first match wins. The
//! analyzer reads statement text only and never blocks execution.

use std::fmt;
use std::sync::LazyLock;

use regex::{Regex, RegexBuilder};
use serde::Serialize;

/// Risk level of a statement, ordered from least to most dangerous.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    /// Additive, easily reversible.
    Low,
    /// May fail on existing data or lock tables.
    Medium,
    /// Loses or reshapes data in place.
    High,
    /// Destroys data wholesale.
    Critical,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        })
    }
}

/// A pattern rule.
#[derive(Debug, Clone)]
pub struct RiskRule {
    level: RiskLevel,
    reason: String,
    pattern: Regex,
    unless: Option<Regex>,
}

impl RiskRule {
    /// Creates a case-insensitive rule.
    ///
    /// # Errors
    ///
    /// Returns an error if `pattern` is not a valid regex.
    pub fn new(level: RiskLevel, reason: impl Into<String>, pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            level,
            reason: reason.into(),
            pattern: compile(pattern)?,
            unless: None,
        })
    }

    /// Skips the rule when `pattern` also matches.
    ///
    /// # Errors
    ///
    /// Returns an error if `pattern` is not a valid regex.
    pub fn unless(mut self, pattern: &str) -> Result<Self, regex::Error> {
        self.unless = Some(compile(pattern)?);
        Ok(self)
    }

    fn matches(&self, sql: &str) -> bool {
        self.pattern.is_match(sql) && !self.unless.as_ref().is_some_and(|u| u.is_match(sql))
    }
}

fn compile(pattern: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .dot_matches_new_line(true)
        .build()
}

/// Classification of one statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RiskAssessment {
    /// Assigned level.
    pub level: RiskLevel,
    /// Why the level was assigned.
    pub reason: String,
    /// The statement.
    pub statement: String,
}

const BUILTIN_RULES: &[(RiskLevel, &str, &str, Option<&str>)] = &[
    (RiskLevel::Critical, "drops a table, schema or database", r"^\s*DROP\s+(TABLE|DATABASE|SCHEMA)\b", None),
    (RiskLevel::Critical, "truncates a table", r"^\s*TRUNCATE\b", None),
    (RiskLevel::Critical, "deletes every row", r"^\s*DELETE\s+FROM\b", Some(r"\bWHERE\b")),
    (RiskLevel::High, "drops a column", r"^\s*ALTER\s+TABLE\b.*\bDROP\s+COLUMN\b", None),
    (RiskLevel::High, "renames a table or column", r"^\s*(RENAME\s+TABLE\b|ALTER\s+TABLE\b.*\bRENAME\b)", None),
    (RiskLevel::High, "changes a column type", r"^\s*ALTER\s+TABLE\b.*\b(MODIFY|CHANGE)\b", None),
    (RiskLevel::High, "changes a column type", r"^\s*ALTER\s+TABLE\b.*\bALTER\s+(COLUMN\s+)?\S+\s+(SET\s+DATA\s+)?TYPE\b", None),
    (RiskLevel::High, "updates every row", r"^\s*UPDATE\b", Some(r"\bWHERE\b")),
    (RiskLevel::Medium, "drops an index", r"^\s*DROP\s+INDEX\b", None),
    (RiskLevel::Medium, "drops a constraint", r"\bDROP\s+(CONSTRAINT|FOREIGN\s+KEY|PRIMARY\s+KEY|INDEX)\b", None),
    (RiskLevel::Medium, "adds a foreign key", r"\bADD\s+(CONSTRAINT\s+\S+\s+)?FOREIGN\s+KEY\b", None),
    (RiskLevel::Medium, "adds a primary key", r"\bADD\s+(CONSTRAINT\s+\S+\s+)?PRIMARY\s+KEY\b", None),
    (RiskLevel::Medium, "adds a NOT NULL constraint", r"\bSET\s+NOT\s+NULL\b", None),
    (RiskLevel::Medium, "builds a unique index over existing rows", r"^\s*CREATE\s+UNIQUE\s+INDEX\b", None),
    (RiskLevel::Medium, "adds a NOT NULL column without default", r"^\s*ALTER\s+TABLE\b.*\bADD\s+(COLUMN\s+)?.*\bNOT\s+NULL\b", Some(r"\bDEFAULT\b")),
    (RiskLevel::Medium, "modifies rows", r"^\s*(UPDATE|DELETE)\b", None),
    (RiskLevel::Low, "creates a table", r"^\s*CREATE\s+TABLE\b", None),
    (RiskLevel::Low, "creates an index", r"^\s*CREATE\s+INDEX\b", None),
    (RiskLevel::Low, "adds a column", r"^\s*ALTER\s+TABLE\b.*\bADD\s+(COLUMN\s+)?", None),
    (RiskLevel::Low, "changes a comment", r"^\s*COMMENT\s+ON\b", None),
    (RiskLevel::Low, "inserts rows", r"^\s*INSERT\b", None),
    (RiskLevel::Low, "reads data", r"^\s*(SELECT|WITH)\b", None),
];

static DEFAULT_RULES: LazyLock<Vec<RiskRule>> = LazyLock::new(|| {
    BUILTIN_RULES
        .iter()
        .map(|(level, reason, pattern, unless)| {
            let rule = RiskRule::new(*level, *reason, pattern).expect("valid risk pattern");
            match unless {
                Some(unless) => rule.unless(unless).expect("valid risk pattern"),
                None => rule,
            }
        })
        .collect()
});

/// Classifies statements by pattern.
#[derive(Debug, Clone)]
pub struct RiskAnalyzer {
    rules: Vec<RiskRule>,
    fallback: RiskLevel,
}

impl Default for RiskAnalyzer {
    fn default() -> Self {
        Self {
            rules: DEFAULT_RULES.clone(),
            fallback: RiskLevel::Medium,
        }
    }
}

impl RiskAnalyzer {
    /// Analyzer with the built-in rule set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Analyzer with only the given rules.
    #[must_use]
    pub const fn with_rules(rules: Vec<RiskRule>) -> Self {
        Self {
            rules,
            fallback: RiskLevel::Medium,
        }
    }

    /// Adds a rule checked before the existing ones.
    #[must_use]
    pub fn prepend_rule(mut self, rule: RiskRule) -> Self {
        self.rules.insert(0, rule);
        self
    }

    /// Classifies one statement.
    #[must_use]
    pub fn analyze(&self, sql: &str) -> RiskAssessment {
        let (level, reason) = self
            .rules
            .iter()
            .find(|rule| rule.matches(sql))
            .map_or((self.fallback, "unrecognized statement"), |rule| {
                (rule.level, rule.reason.as_str())
            });
        RiskAssessment {
            level,
            reason: reason.to_string(),
            statement: sql.to_string(),
        }
    }

    /// Classifies several statements.
    #[must_use]
    pub fn analyze_all<S: AsRef<str>>(&self, statements: &[S]) -> Vec<RiskAssessment> {
        statements.iter().map(|s| self.analyze(s.as_ref())).collect()
    }

    /// Highest level among `statements`, `None` when empty.
    #[must_use]
    pub fn highest<S: AsRef<str>>(&self, statements: &[S]) -> Option<RiskLevel> {
        statements
            .iter()
            .map(|s| self.analyze(s.as_ref()).level)
            .max()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn level(sql: &str) -> RiskLevel {
        RiskAnalyzer::new().analyze(sql).level
    }

    #[test]
    fn test_create_table_is_low() {
        assert_eq!(level("CREATE TABLE \"users\" (\"id\" INTEGER)"), RiskLevel::Low);
        assert_eq!(level("create index \"i\" on \"t\" (\"c\")"), RiskLevel::Low);
    }

    #[test]
    fn test_drop_table_is_critical() {
        assert_eq!(level("DROP TABLE \"users\""), RiskLevel::Critical);
        assert_eq!(level("DROP TABLE IF EXISTS `users`"), RiskLevel::Critical);
        assert_eq!(level("TRUNCATE TABLE `logs`"), RiskLevel::Critical);
        assert_eq!(level("DELETE FROM \"logs\""), RiskLevel::Critical);
    }

    #[test]
    fn test_drop_column_is_high() {
        assert_eq!(level("ALTER TABLE `users` DROP COLUMN `age`"), RiskLevel::High);
        assert_eq!(level("ALTER TABLE \"a\" RENAME TO \"b\""), RiskLevel::High);
        assert_eq!(level("RENAME TABLE `a` TO `b`"), RiskLevel::High);
        assert_eq!(
            level("ALTER TABLE \"t\" ALTER COLUMN \"c\" TYPE BIGINT"),
            RiskLevel::High
        );
        assert_eq!(level("UPDATE \"users\" SET \"a\" = ?"), RiskLevel::High);
    }

    #[test]
    fn test_medium_rules() {
        assert_eq!(level("DROP INDEX `i` ON `t`"), RiskLevel::Medium);
        assert_eq!(
            level("ALTER TABLE \"p\" ADD CONSTRAINT \"f\" FOREIGN KEY (\"u\") REFERENCES \"users\" (\"id\")"),
            RiskLevel::Medium
        );
        assert_eq!(level("CREATE UNIQUE INDEX \"u\" ON \"t\" (\"c\")"), RiskLevel::Medium);
        assert_eq!(
            level("ALTER TABLE \"t\" ADD COLUMN \"c\" VARCHAR NOT NULL"),
            RiskLevel::Medium
        );
        assert_eq!(level("DELETE FROM \"t\" WHERE \"id\" = ?"), RiskLevel::Medium);
    }

    #[test]
    fn test_add_column_with_default_is_low() {
        assert_eq!(
            level("ALTER TABLE \"t\" ADD COLUMN \"c\" VARCHAR NOT NULL DEFAULT 'x'"),
            RiskLevel::Low
        );
        assert_eq!(level("ALTER TABLE \"t\" ADD COLUMN \"c\" VARCHAR NULL"), RiskLevel::Low);
    }

    #[test]
    fn test_column_names_do_not_trigger_keywords() {
        assert_eq!(
            level("ALTER TABLE \"t\" ADD COLUMN \"rename_count\" INTEGER NULL"),
            RiskLevel::Low
        );
    }

    #[test]
    fn test_unknown_statement_is_medium() {
        let assessment = RiskAnalyzer::new().analyze("VACUUM");
        assert_eq!(assessment.level, RiskLevel::Medium);
        assert_eq!(assessment.reason, "unrecognized statement");
    }

    #[test]
    fn test_highest_and_custom_rules() {
        let analyzer = RiskAnalyzer::new().prepend_rule(
            RiskRule::new(RiskLevel::Critical, "touches billing", r"\bbilling\b").unwrap(),
        );
        let statements = ["CREATE TABLE \"billing\" (\"id\" INTEGER)", "CREATE INDEX \"i\" ON \"t\" (\"c\")"];
        assert_eq!(analyzer.highest(&statements), Some(RiskLevel::Critical));
        assert_eq!(analyzer.highest::<&str>(&[]), None);
        assert_eq!(RiskLevel::Low.to_string(), "LOW");
        assert!(RiskLevel::Critical > RiskLevel::High);
    }
}
