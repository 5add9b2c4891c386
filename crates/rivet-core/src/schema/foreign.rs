//! Foreign key descriptors and referenced-table resolution.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Referential action for `ON DELETE` / `ON UPDATE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForeignAction {
    /// No action.
    NoAction,
    /// Restrict deletion/update.
    Restrict,
    /// Cascade the operation.
    Cascade,
    /// Set to NULL.
    SetNull,
    /// Set to default value.
    SetDefault,
}

impl ForeignAction {
    /// Returns the SQL representation of the action.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::NoAction => "NO ACTION",
            Self::Restrict => "RESTRICT",
            Self::Cascade => "CASCADE",
            Self::SetNull => "SET NULL",
            Self::SetDefault => "SET DEFAULT",
        }
    }
}

/// The table a foreign key points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForeignTable {
    /// Derived from the first column by the Blueprint's resolver.
    Inferred,
    /// Named explicitly.
    Named(String),
}

/// A foreign key constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyDefinition {
    /// Constraint name; generated when absent.
    pub name: Option<String>,
    /// Local columns.
    pub columns: Vec<String>,
    /// Referenced table.
    pub table: ForeignTable,
    /// Referenced columns.
    pub references: Vec<String>,
    /// `ON DELETE` action.
    pub on_delete: Option<ForeignAction>,
    /// `ON UPDATE` action.
    pub on_update: Option<ForeignAction>,
}

impl ForeignKeyDefinition {
    /// Creates a key on `columns` referencing `id` of an inferred table.
    #[must_use]
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: None,
            columns: columns.into_iter().map(Into::into).collect(),
            table: ForeignTable::Inferred,
            references: vec![String::from("id")],
            on_delete: None,
            on_update: None,
        }
    }

    /// Sets the referenced table (builder form).
    #[must_use]
    pub fn with_table(mut self, table: ForeignTable) -> Self {
        self.table = table;
        self
    }

    /// Sets the referenced table.
    pub fn on(&mut self, table: impl Into<String>) -> &mut Self {
        self.table = ForeignTable::Named(table.into());
        self
    }

    /// Sets the referenced columns.
    pub fn references<I, S>(&mut self, columns: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.references = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Overrides the generated constraint name.
    pub fn name(&mut self, name: impl Into<String>) -> &mut Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the `ON DELETE` action.
    pub fn on_delete(&mut self, action: ForeignAction) -> &mut Self {
        self.on_delete = Some(action);
        self
    }

    /// Sets the `ON UPDATE` action.
    pub fn on_update(&mut self, action: ForeignAction) -> &mut Self {
        self.on_update = Some(action);
        self
    }

    /// `ON DELETE CASCADE`.
    pub fn cascade_on_delete(&mut self) -> &mut Self {
        self.on_delete(ForeignAction::Cascade)
    }

    /// `ON DELETE SET NULL`.
    pub fn null_on_delete(&mut self) -> &mut Self {
        self.on_delete(ForeignAction::SetNull)
    }
}

/// Maps a foreign key column such as `author_id` to the table it references.
///
/// The default rule strips a trailing `_id` and appends an English plural
/// suffix. Irregular plurals need an override or an explicit
/// `constrained_on`.
#[derive(Clone)]
pub struct TableNameResolver {
    rule: Arc<dyn Fn(&str) -> String + Send + Sync>,
    overrides: BTreeMap<String, String>,
}

impl TableNameResolver {
    /// Resolver with a custom rule.
    pub fn new(rule: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        Self {
            rule: Arc::new(rule),
            overrides: BTreeMap::new(),
        }
    }

    /// Pins `column` to `table`, bypassing the rule.
    #[must_use]
    pub fn with_override(mut self, column: impl Into<String>, table: impl Into<String>) -> Self {
        self.overrides.insert(column.into(), table.into());
        self
    }

    /// Resolves the referenced table for `column`.
    #[must_use]
    pub fn resolve(&self, column: &str) -> String {
        self.overrides
            .get(column)
            .cloned()
            .unwrap_or_else(|| (self.rule)(column))
    }
}

impl Default for TableNameResolver {
    fn default() -> Self {
        Self::new(pluralize_key)
    }
}

impl fmt::Debug for TableNameResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableNameResolver")
            .field("overrides", &self.overrides)
            .finish_non_exhaustive()
    }
}

fn pluralize_key(column: &str) -> String {
    let stem = column.strip_suffix("_id").unwrap_or(column);
    if stem.ends_with('s')
        || stem.ends_with('x')
        || stem.ends_with("ch")
        || stem.ends_with("sh")
    {
        return format!("{stem}es");
    }
    if let Some(head) = stem.strip_suffix('y') {
        if !head.ends_with(['a', 'e', 'i', 'o', 'u']) {
            return format!("{head}ies");
        }
    }
    format!("{stem}s")
}
