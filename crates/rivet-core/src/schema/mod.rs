//! Schema descriptors: Blueprints, columns and foreign keys.

mod blueprint;
mod column;
mod foreign;

pub use blueprint::{Blueprint, BlueprintMode, Command, IndexCommand, IndexKind};
pub use column::{ColumnDefinition, ColumnPosition, ColumnType, DefaultValue, DEFAULT_STRING_LENGTH};
pub use foreign::{ForeignAction, ForeignKeyDefinition, ForeignTable, TableNameResolver};
