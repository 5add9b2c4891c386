//! The Blueprint DDL DSL.
//!
//! A Blueprint collects columns, indexes, foreign keys and drop/rename
//! commands for one table. Grammars compile it into statements; nothing here
//! performs I/O.

use super::column::{ColumnDefinition, ColumnType, DEFAULT_STRING_LENGTH};
use super::foreign::{ForeignKeyDefinition, ForeignTable, TableNameResolver};

/// Whether the Blueprint creates a table or alters an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlueprintMode {
    /// `CREATE TABLE`
    Create,
    /// `ALTER TABLE`
    Modify,
}

/// Kind of index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    /// Primary key.
    Primary,
    /// Unique index.
    Unique,
    /// Plain index.
    Index,
}

impl IndexKind {
    /// Suffix used in generated constraint names.
    #[must_use]
    pub const fn suffix(self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Unique => "unique",
            Self::Index => "index",
        }
    }
}

/// An index declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexCommand {
    /// Kind of index.
    pub kind: IndexKind,
    /// Index name.
    pub name: String,
    /// Indexed columns.
    pub columns: Vec<String>,
}

/// Drop and rename commands, compiled in declaration order before new
/// columns are added.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Drop columns.
    DropColumn(Vec<String>),
    /// Rename a column.
    RenameColumn {
        /// Current name.
        from: String,
        /// New name.
        to: String,
    },
    /// Drop an index by name.
    DropIndex(String),
    /// Drop a unique index by name.
    DropUnique(String),
    /// Drop the primary key.
    DropPrimary,
    /// Drop a foreign key by name.
    DropForeign(String),
}

/// Table definition for create or modify mode.
#[derive(Debug, Clone)]
pub struct Blueprint {
    table: String,
    mode: BlueprintMode,
    prefix: String,
    if_not_exists: bool,
    columns: Vec<ColumnDefinition>,
    indexes: Vec<IndexCommand>,
    foreign_keys: Vec<ForeignKeyDefinition>,
    commands: Vec<Command>,
    rename_to: Option<String>,
    resolver: TableNameResolver,
}

impl Blueprint {
    /// Blueprint that creates `table`.
    #[must_use]
    pub fn create(table: impl Into<String>) -> Self {
        Self::new(table, BlueprintMode::Create)
    }

    /// Blueprint that alters `table`.
    #[must_use]
    pub fn alter(table: impl Into<String>) -> Self {
        Self::new(table, BlueprintMode::Modify)
    }

    fn new(table: impl Into<String>, mode: BlueprintMode) -> Self {
        Self {
            table: table.into(),
            mode,
            prefix: String::new(),
            if_not_exists: false,
            columns: Vec::new(),
            indexes: Vec::new(),
            foreign_keys: Vec::new(),
            commands: Vec::new(),
            rename_to: None,
            resolver: TableNameResolver::default(),
        }
    }

    /// Sets the table prefix used in generated constraint names.
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Replaces the resolver used by `constrained()`.
    #[must_use]
    pub fn with_resolver(mut self, resolver: TableNameResolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// Emits `CREATE TABLE IF NOT EXISTS`.
    pub fn if_not_exists(&mut self) -> &mut Self {
        self.if_not_exists = true;
        self
    }

    /// Table name without prefix.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Create or modify.
    #[must_use]
    pub const fn mode(&self) -> BlueprintMode {
        self.mode
    }

    /// True in create mode.
    #[must_use]
    pub fn is_creating(&self) -> bool {
        self.mode == BlueprintMode::Create
    }

    /// Whether `IF NOT EXISTS` was requested.
    #[must_use]
    pub const fn creates_if_not_exists(&self) -> bool {
        self.if_not_exists
    }

    /// Declared columns.
    #[must_use]
    pub fn columns(&self) -> &[ColumnDefinition] {
        &self.columns
    }

    /// Drop/rename commands.
    #[must_use]
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Target of a table rename, if any.
    #[must_use]
    pub fn renamed_to(&self) -> Option<&str> {
        self.rename_to.as_deref()
    }

    /// Deterministic constraint name: `{prefix}{table}_{columns}_{suffix}`.
    #[must_use]
    pub fn index_name(&self, suffix: &str, columns: &[String]) -> String {
        let name = format!(
            "{}{}_{}_{}",
            self.prefix,
            self.table,
            columns.join("_"),
            suffix
        );
        name.to_lowercase().replace(['-', '.'], "_")
    }

    /// Columns of the primary key when it is not carried by an
    /// auto-increment column.
    #[must_use]
    pub fn primary_columns(&self) -> Option<Vec<String>> {
        if let Some(index) = self.indexes.iter().find(|i| i.kind == IndexKind::Primary) {
            return Some(index.columns.clone());
        }
        let flagged: Vec<String> = self
            .columns
            .iter()
            .filter(|c| c.primary && !c.auto_increment)
            .map(|c| c.name.clone())
            .collect();
        (!flagged.is_empty()).then_some(flagged)
    }

    /// Primary key command: the explicit one, or one built from columns
    /// flagged `primary()`.
    #[must_use]
    pub fn primary_key(&self) -> Option<IndexCommand> {
        self.primary_columns().map(|columns| IndexCommand {
            kind: IndexKind::Primary,
            name: self.index_name(IndexKind::Primary.suffix(), &columns),
            columns,
        })
    }

    /// Unique and plain indexes, explicit ones first, then those implied by
    /// column modifiers.
    #[must_use]
    pub fn secondary_indexes(&self) -> Vec<IndexCommand> {
        let mut indexes: Vec<IndexCommand> = self
            .indexes
            .iter()
            .filter(|i| i.kind != IndexKind::Primary)
            .cloned()
            .collect();
        for column in &self.columns {
            for (flag, kind) in [(column.unique, IndexKind::Unique), (column.index, IndexKind::Index)] {
                if flag {
                    let columns = vec![column.name.clone()];
                    indexes.push(IndexCommand {
                        kind,
                        name: self.index_name(kind.suffix(), &columns),
                        columns,
                    });
                }
            }
        }
        indexes
    }

    /// Foreign keys with generated names and resolved tables. Column-level
    /// `constrained()` keys come after explicit ones.
    #[must_use]
    pub fn foreign_keys(&self) -> Vec<ForeignKeyDefinition> {
        self.foreign_keys
            .iter()
            .chain(self.columns.iter().filter_map(|c| c.foreign.as_ref()))
            .map(|fk| {
                let mut fk = fk.clone();
                if fk.table == ForeignTable::Inferred {
                    let first = fk.columns.first().cloned().unwrap_or_default();
                    fk.table = ForeignTable::Named(self.resolver.resolve(&first));
                }
                if fk.name.is_none() {
                    fk.name = Some(self.index_name("foreign", &fk.columns));
                }
                fk
            })
            .collect()
    }

    /// Adds a column of any type.
    pub fn add_column(&mut self, name: impl Into<String>, column_type: ColumnType) -> &mut ColumnDefinition {
        let index = self.columns.len();
        self.columns.push(ColumnDefinition::new(name, column_type));
        &mut self.columns[index]
    }

    /// `id` big auto-increment primary key.
    pub fn id(&mut self) -> &mut ColumnDefinition {
        self.big_increments("id")
    }

    /// Auto-incrementing 32-bit primary key.
    pub fn increments(&mut self, name: &str) -> &mut ColumnDefinition {
        self.add_column(name, ColumnType::Increments)
    }

    /// Auto-incrementing 64-bit primary key.
    pub fn big_increments(&mut self, name: &str) -> &mut ColumnDefinition {
        self.add_column(name, ColumnType::BigIncrements)
    }

    /// `VARCHAR(255)`-like column.
    pub fn string(&mut self, name: &str) -> &mut ColumnDefinition {
        self.add_column(name, ColumnType::String(DEFAULT_STRING_LENGTH))
    }

    /// String column with an explicit length.
    pub fn string_with_length(&mut self, name: &str, length: u32) -> &mut ColumnDefinition {
        self.add_column(name, ColumnType::String(length))
    }

    /// Fixed length string.
    pub fn char(&mut self, name: &str, length: u32) -> &mut ColumnDefinition {
        self.add_column(name, ColumnType::Char(length))
    }

    /// Text column.
    pub fn text(&mut self, name: &str) -> &mut ColumnDefinition {
        self.add_column(name, ColumnType::Text)
    }

    /// Medium text column.
    pub fn medium_text(&mut self, name: &str) -> &mut ColumnDefinition {
        self.add_column(name, ColumnType::MediumText)
    }

    /// Long text column.
    pub fn long_text(&mut self, name: &str) -> &mut ColumnDefinition {
        self.add_column(name, ColumnType::LongText)
    }

    /// 32-bit integer.
    pub fn integer(&mut self, name: &str) -> &mut ColumnDefinition {
        self.add_column(name, ColumnType::Integer)
    }

    /// 64-bit integer.
    pub fn big_integer(&mut self, name: &str) -> &mut ColumnDefinition {
        self.add_column(name, ColumnType::BigInteger)
    }

    /// 16-bit integer.
    pub fn small_integer(&mut self, name: &str) -> &mut ColumnDefinition {
        self.add_column(name, ColumnType::SmallInteger)
    }

    /// 8-bit integer.
    pub fn tiny_integer(&mut self, name: &str) -> &mut ColumnDefinition {
        self.add_column(name, ColumnType::TinyInteger)
    }

    /// Unsigned 32-bit integer.
    pub fn unsigned_integer(&mut self, name: &str) -> &mut ColumnDefinition {
        self.integer(name).unsigned()
    }

    /// Unsigned 64-bit integer.
    pub fn unsigned_big_integer(&mut self, name: &str) -> &mut ColumnDefinition {
        self.big_integer(name).unsigned()
    }

    /// Single precision float.
    pub fn float(&mut self, name: &str) -> &mut ColumnDefinition {
        self.add_column(name, ColumnType::Float)
    }

    /// Double precision float.
    pub fn double(&mut self, name: &str) -> &mut ColumnDefinition {
        self.add_column(name, ColumnType::Double)
    }

    /// Fixed precision decimal.
    pub fn decimal(&mut self, name: &str, precision: u8, scale: u8) -> &mut ColumnDefinition {
        self.add_column(name, ColumnType::Decimal { precision, scale })
    }

    /// Boolean.
    pub fn boolean(&mut self, name: &str) -> &mut ColumnDefinition {
        self.add_column(name, ColumnType::Boolean)
    }

    /// Enumeration of allowed strings.
    pub fn enumeration(&mut self, name: &str, allowed: &[&str]) -> &mut ColumnDefinition {
        let allowed = allowed.iter().map(ToString::to_string).collect();
        self.add_column(name, ColumnType::Enum(allowed))
    }

    /// Set of allowed strings (MySQL).
    pub fn set(&mut self, name: &str, allowed: &[&str]) -> &mut ColumnDefinition {
        let allowed = allowed.iter().map(ToString::to_string).collect();
        self.add_column(name, ColumnType::Set(allowed))
    }

    /// JSON document.
    pub fn json(&mut self, name: &str) -> &mut ColumnDefinition {
        self.add_column(name, ColumnType::Json)
    }

    /// Binary JSON document.
    pub fn jsonb(&mut self, name: &str) -> &mut ColumnDefinition {
        self.add_column(name, ColumnType::Jsonb)
    }

    /// Date.
    pub fn date(&mut self, name: &str) -> &mut ColumnDefinition {
        self.add_column(name, ColumnType::Date)
    }

    /// Date and time.
    pub fn date_time(&mut self, name: &str) -> &mut ColumnDefinition {
        self.add_column(name, ColumnType::DateTime)
    }

    /// Time of day.
    pub fn time(&mut self, name: &str) -> &mut ColumnDefinition {
        self.add_column(name, ColumnType::Time)
    }

    /// Timestamp.
    pub fn timestamp(&mut self, name: &str) -> &mut ColumnDefinition {
        self.add_column(name, ColumnType::Timestamp)
    }

    /// Nullable `created_at` and `updated_at` timestamps.
    pub fn timestamps(&mut self) {
        self.timestamp("created_at").nullable();
        self.timestamp("updated_at").nullable();
    }

    /// Nullable `deleted_at` timestamp.
    pub fn soft_deletes(&mut self) -> &mut ColumnDefinition {
        self.timestamp("deleted_at").nullable()
    }

    /// Binary data.
    pub fn binary(&mut self, name: &str) -> &mut ColumnDefinition {
        self.add_column(name, ColumnType::Binary)
    }

    /// UUID.
    pub fn uuid(&mut self, name: &str) -> &mut ColumnDefinition {
        self.add_column(name, ColumnType::Uuid)
    }

    /// IP address.
    pub fn ip_address(&mut self, name: &str) -> &mut ColumnDefinition {
        self.add_column(name, ColumnType::IpAddress)
    }

    /// MAC address.
    pub fn mac_address(&mut self, name: &str) -> &mut ColumnDefinition {
        self.add_column(name, ColumnType::MacAddress)
    }

    /// Spatial geometry.
    pub fn geometry(&mut self, name: &str) -> &mut ColumnDefinition {
        self.add_column(name, ColumnType::Geometry)
    }

    /// Unsigned big integer meant to carry a foreign key; chain
    /// `constrained()` or `constrained_on(table)`.
    pub fn foreign_id(&mut self, name: &str) -> &mut ColumnDefinition {
        self.unsigned_big_integer(name)
    }

    fn push_index(&mut self, kind: IndexKind, columns: &[&str], name: Option<&str>) -> &mut Self {
        let columns: Vec<String> = columns.iter().map(ToString::to_string).collect();
        let name = name.map_or_else(|| self.index_name(kind.suffix(), &columns), ToString::to_string);
        self.indexes.push(IndexCommand {
            kind,
            name,
            columns,
        });
        self
    }

    /// Primary key over `columns`.
    pub fn primary(&mut self, columns: &[&str]) -> &mut Self {
        self.push_index(IndexKind::Primary, columns, None)
    }

    /// Unique index over `columns`.
    pub fn unique(&mut self, columns: &[&str]) -> &mut Self {
        self.push_index(IndexKind::Unique, columns, None)
    }

    /// Unique index with an explicit name.
    pub fn unique_named(&mut self, name: &str, columns: &[&str]) -> &mut Self {
        self.push_index(IndexKind::Unique, columns, Some(name))
    }

    /// Plain index over `columns`.
    pub fn index(&mut self, columns: &[&str]) -> &mut Self {
        self.push_index(IndexKind::Index, columns, None)
    }

    /// Plain index with an explicit name.
    pub fn index_named(&mut self, name: &str, columns: &[&str]) -> &mut Self {
        self.push_index(IndexKind::Index, columns, Some(name))
    }

    /// Foreign key over `columns`; chain `references`/`on`.
    pub fn foreign(&mut self, columns: &[&str]) -> &mut ForeignKeyDefinition {
        let index = self.foreign_keys.len();
        self.foreign_keys
            .push(ForeignKeyDefinition::new(columns.iter().copied()));
        &mut self.foreign_keys[index]
    }

    /// Drops one column.
    pub fn drop_column(&mut self, column: &str) -> &mut Self {
        self.drop_columns(&[column])
    }

    /// Drops several columns.
    pub fn drop_columns(&mut self, columns: &[&str]) -> &mut Self {
        self.commands.push(Command::DropColumn(
            columns.iter().map(ToString::to_string).collect(),
        ));
        self
    }

    /// Renames a column.
    pub fn rename_column(&mut self, from: &str, to: &str) -> &mut Self {
        self.commands.push(Command::RenameColumn {
            from: from.to_string(),
            to: to.to_string(),
        });
        self
    }

    /// Drops an index by name.
    pub fn drop_index(&mut self, name: &str) -> &mut Self {
        self.commands.push(Command::DropIndex(name.to_string()));
        self
    }

    /// Drops the index generated for `columns`.
    pub fn drop_index_on(&mut self, columns: &[&str]) -> &mut Self {
        let name = self.generated_name(IndexKind::Index.suffix(), columns);
        self.drop_index(&name)
    }

    /// Drops a unique index by name.
    pub fn drop_unique(&mut self, name: &str) -> &mut Self {
        self.commands.push(Command::DropUnique(name.to_string()));
        self
    }

    /// Drops the unique index generated for `columns`.
    pub fn drop_unique_on(&mut self, columns: &[&str]) -> &mut Self {
        let name = self.generated_name(IndexKind::Unique.suffix(), columns);
        self.drop_unique(&name)
    }

    /// Drops the primary key.
    pub fn drop_primary(&mut self) -> &mut Self {
        self.commands.push(Command::DropPrimary);
        self
    }

    /// Drops a foreign key by name.
    pub fn drop_foreign(&mut self, name: &str) -> &mut Self {
        self.commands.push(Command::DropForeign(name.to_string()));
        self
    }

    /// Drops the foreign key generated for `columns`.
    pub fn drop_foreign_on(&mut self, columns: &[&str]) -> &mut Self {
        let name = self.generated_name("foreign", columns);
        self.drop_foreign(&name)
    }

    /// Drops `created_at` and `updated_at`.
    pub fn drop_timestamps(&mut self) -> &mut Self {
        self.drop_columns(&["created_at", "updated_at"])
    }

    /// Drops `deleted_at`.
    pub fn drop_soft_deletes(&mut self) -> &mut Self {
        self.drop_column("deleted_at")
    }

    /// Renames the table after all other changes.
    pub fn rename(&mut self, to: &str) -> &mut Self {
        self.rename_to = Some(to.to_string());
        self
    }

    fn generated_name(&self, suffix: &str, columns: &[&str]) -> String {
        let columns: Vec<String> = columns.iter().map(ToString::to_string).collect();
        self.index_name(suffix, &columns)
    }
}
