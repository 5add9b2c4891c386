//! Column descriptors.

use super::foreign::{ForeignAction, ForeignKeyDefinition, ForeignTable};

/// Default length of `string` columns.
pub const DEFAULT_STRING_LENGTH: u32 = 255;

/// Logical column types. Each grammar maps these onto its own type names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnType {
    /// Auto-incrementing 32-bit key.
    Increments,
    /// Auto-incrementing 64-bit key.
    BigIncrements,
    /// 32-bit integer.
    Integer,
    /// 64-bit integer.
    BigInteger,
    /// 16-bit integer.
    SmallInteger,
    /// 8-bit integer.
    TinyInteger,
    /// Single precision float.
    Float,
    /// Double precision float.
    Double,
    /// Fixed precision decimal.
    Decimal {
        /// Total digits.
        precision: u8,
        /// Digits after the decimal point.
        scale: u8,
    },
    /// Boolean.
    Boolean,
    /// Variable length string.
    String(u32),
    /// Fixed length string.
    Char(u32),
    /// Text.
    Text,
    /// Medium text.
    MediumText,
    /// Long text.
    LongText,
    /// One of a fixed set of strings.
    Enum(Vec<String>),
    /// Any subset of a fixed set of strings.
    Set(Vec<String>),
    /// JSON document.
    Json,
    /// Binary JSON document.
    Jsonb,
    /// Date.
    Date,
    /// Date and time.
    DateTime,
    /// Time of day.
    Time,
    /// Timestamp.
    Timestamp,
    /// Binary data.
    Binary,
    /// UUID.
    Uuid,
    /// IPv4 or IPv6 address.
    IpAddress,
    /// MAC address.
    MacAddress,
    /// Spatial geometry.
    Geometry,
}

impl ColumnType {
    /// Logical type name, used in error messages.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Increments => "increments",
            Self::BigIncrements => "bigIncrements",
            Self::Integer => "integer",
            Self::BigInteger => "bigInteger",
            Self::SmallInteger => "smallInteger",
            Self::TinyInteger => "tinyInteger",
            Self::Float => "float",
            Self::Double => "double",
            Self::Decimal { .. } => "decimal",
            Self::Boolean => "boolean",
            Self::String(_) => "string",
            Self::Char(_) => "char",
            Self::Text => "text",
            Self::MediumText => "mediumText",
            Self::LongText => "longText",
            Self::Enum(_) => "enum",
            Self::Set(_) => "set",
            Self::Json => "json",
            Self::Jsonb => "jsonb",
            Self::Date => "date",
            Self::DateTime => "dateTime",
            Self::Time => "time",
            Self::Timestamp => "timestamp",
            Self::Binary => "binary",
            Self::Uuid => "uuid",
            Self::IpAddress => "ipAddress",
            Self::MacAddress => "macAddress",
            Self::Geometry => "geometry",
        }
    }

    /// True for integer types.
    #[must_use]
    pub const fn is_integer(&self) -> bool {
        matches!(
            self,
            Self::Increments
                | Self::BigIncrements
                | Self::Integer
                | Self::BigInteger
                | Self::SmallInteger
                | Self::TinyInteger
        )
    }

    /// True for numeric types that accept `UNSIGNED` on MySQL.
    #[must_use]
    pub const fn is_numeric(&self) -> bool {
        self.is_integer() || matches!(self, Self::Float | Self::Double | Self::Decimal { .. })
    }
}

/// Default value for a column.
#[derive(Debug, Clone, PartialEq)]
pub enum DefaultValue {
    /// NULL default.
    Null,
    /// Boolean default.
    Boolean(bool),
    /// Integer default.
    Integer(i64),
    /// Float default.
    Float(f64),
    /// String default.
    String(String),
    /// Raw SQL expression.
    Expression(String),
    /// `CURRENT_TIMESTAMP`.
    CurrentTimestamp,
}

impl DefaultValue {
    /// Returns the SQL representation of the default value.
    #[must_use]
    pub fn to_sql(&self) -> String {
        match self {
            Self::Null => String::from("NULL"),
            Self::Boolean(b) => {
                if *b {
                    String::from("TRUE")
                } else {
                    String::from("FALSE")
                }
            }
            Self::Integer(i) => i.to_string(),
            Self::Float(f) => f.to_string(),
            Self::String(s) => format!("'{}'", s.replace('\'', "''")),
            Self::Expression(expr) => expr.clone(),
            Self::CurrentTimestamp => String::from("CURRENT_TIMESTAMP"),
        }
    }
}

impl From<bool> for DefaultValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<i64> for DefaultValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for DefaultValue {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<f64> for DefaultValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for DefaultValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for DefaultValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

/// Placement hint for `ADD COLUMN` (MySQL only).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnPosition {
    /// `FIRST`
    First,
    /// `AFTER column`
    After(String),
}

/// A column in a Blueprint.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDefinition {
    /// Column name.
    pub name: String,
    /// Logical type.
    pub column_type: ColumnType,
    /// Whether NULL is allowed.
    pub nullable: bool,
    /// Default value.
    pub default: Option<DefaultValue>,
    /// MySQL `UNSIGNED`.
    pub unsigned: bool,
    /// Auto-incrementing primary key.
    pub auto_increment: bool,
    /// Column comment.
    pub comment: Option<String>,
    /// Placement hint.
    pub position: Option<ColumnPosition>,
    /// Part of the table's primary key.
    pub primary: bool,
    /// Gets its own unique index.
    pub unique: bool,
    /// Gets its own plain index.
    pub index: bool,
    /// Foreign key declared through `constrained`.
    pub foreign: Option<ForeignKeyDefinition>,
}

impl ColumnDefinition {
    /// Creates a NOT NULL column without default.
    #[must_use]
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        let auto_increment = matches!(
            column_type,
            ColumnType::Increments | ColumnType::BigIncrements
        );
        Self {
            name: name.into(),
            column_type,
            nullable: false,
            default: None,
            unsigned: auto_increment,
            auto_increment,
            comment: None,
            position: None,
            primary: false,
            unique: false,
            index: false,
            foreign: None,
        }
    }

    /// Allows NULL.
    pub fn nullable(&mut self) -> &mut Self {
        self.nullable = true;
        self
    }

    /// Sets the default value.
    pub fn default_value(&mut self, value: impl Into<DefaultValue>) -> &mut Self {
        self.default = Some(value.into());
        self
    }

    /// Defaults to `CURRENT_TIMESTAMP`.
    pub fn use_current(&mut self) -> &mut Self {
        self.default = Some(DefaultValue::CurrentTimestamp);
        self
    }

    /// Marks a numeric column unsigned.
    pub fn unsigned(&mut self) -> &mut Self {
        self.unsigned = true;
        self
    }

    /// Makes the column an auto-incrementing primary key.
    pub fn auto_increment(&mut self) -> &mut Self {
        self.auto_increment = true;
        self
    }

    /// Attaches a comment.
    pub fn comment(&mut self, comment: impl Into<String>) -> &mut Self {
        self.comment = Some(comment.into());
        self
    }

    /// Places the column after another one.
    pub fn after(&mut self, column: impl Into<String>) -> &mut Self {
        self.position = Some(ColumnPosition::After(column.into()));
        self
    }

    /// Places the column first.
    pub fn first(&mut self) -> &mut Self {
        self.position = Some(ColumnPosition::First);
        self
    }

    /// Adds the column to the primary key.
    pub fn primary(&mut self) -> &mut Self {
        self.primary = true;
        self
    }

    /// Adds a unique index on this column.
    pub fn unique(&mut self) -> &mut Self {
        self.unique = true;
        self
    }

    /// Adds a plain index on this column.
    pub fn index(&mut self) -> &mut Self {
        self.index = true;
        self
    }

    /// References `id` on the table inferred from the column name.
    ///
    /// The table is resolved when the Blueprint compiles, through its
    /// [`TableNameResolver`](super::TableNameResolver).
    pub fn constrained(&mut self) -> &mut Self {
        self.foreign = Some(
            ForeignKeyDefinition::new([self.name.clone()]).with_table(ForeignTable::Inferred),
        );
        self
    }

    /// References `id` on an explicitly named table.
    pub fn constrained_on(&mut self, table: impl Into<String>) -> &mut Self {
        let mut foreign = ForeignKeyDefinition::new([self.name.clone()]);
        foreign.on(table);
        self.foreign = Some(foreign);
        self
    }

    /// Changes the referenced column of a `constrained` key.
    pub fn references(&mut self, column: impl Into<String>) -> &mut Self {
        if let Some(foreign) = self.foreign.as_mut() {
            foreign.references([column.into()]);
        }
        self
    }

    /// `ON DELETE CASCADE` on a `constrained` key.
    pub fn cascade_on_delete(&mut self) -> &mut Self {
        self.on_delete(ForeignAction::Cascade)
    }

    /// `ON DELETE SET NULL` on a `constrained` key.
    pub fn null_on_delete(&mut self) -> &mut Self {
        self.on_delete(ForeignAction::SetNull)
    }

    /// `ON DELETE RESTRICT` on a `constrained` key.
    pub fn restrict_on_delete(&mut self) -> &mut Self {
        self.on_delete(ForeignAction::Restrict)
    }

    /// `ON UPDATE CASCADE` on a `constrained` key.
    pub fn cascade_on_update(&mut self) -> &mut Self {
        if let Some(foreign) = self.foreign.as_mut() {
            foreign.on_update(ForeignAction::Cascade);
        }
        self
    }

    fn on_delete(&mut self, action: ForeignAction) -> &mut Self {
        if let Some(foreign) = self.foreign.as_mut() {
            foreign.on_delete(action);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_increments_are_unsigned_auto_increment() {
        let column = ColumnDefinition::new("id", ColumnType::BigIncrements);
        assert!(column.auto_increment);
        assert!(column.unsigned);
        assert!(!column.nullable);
    }

    #[test]
    fn test_default_value_sql() {
        assert_eq!(DefaultValue::from("it's").to_sql(), "'it''s'");
        assert_eq!(DefaultValue::from(true).to_sql(), "TRUE");
        assert_eq!(DefaultValue::CurrentTimestamp.to_sql(), "CURRENT_TIMESTAMP");
    }

    #[test]
    fn test_constrained_modifiers_apply_to_pending_key() {
        let mut column = ColumnDefinition::new("user_id", ColumnType::BigInteger);
        column.constrained().cascade_on_delete();
        let foreign = column.foreign.as_ref().unwrap();
        assert_eq!(foreign.table, ForeignTable::Inferred);
        assert_eq!(foreign.on_delete, Some(ForeignAction::Cascade));
        assert_eq!(foreign.references, vec![String::from("id")]);
    }

    #[test]
    fn test_cascade_without_constraint_is_ignored() {
        let mut column = ColumnDefinition::new("user_id", ColumnType::BigInteger);
        column.cascade_on_delete();
        assert!(column.foreign.is_none());
    }
}
