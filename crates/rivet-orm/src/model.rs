//! The `Model` trait and the metadata entities carry at runtime.

use std::collections::BTreeMap;
use std::sync::Arc;

use rivet_core::{Collection, Row, ToSqlValue};
use rivet_db::Connection;

use crate::cast::Cast;
use crate::entity::Entity;
use crate::error::Result;
use crate::policy::PersistencePolicy;
use crate::query::ModelQuery;
use crate::relation::Relation;

/// Static description of a model type, shared by all its entities.
#[derive(Debug, Clone)]
pub struct ModelMeta {
    pub name: &'static str,
    pub table: &'static str,
    pub primary_key: &'static str,
    /// Whether the database generates the primary key.
    pub incrementing: bool,
    pub casts: BTreeMap<&'static str, Cast>,
    /// Attributes left out of `to_array` and `to_json`.
    pub hidden: Vec<&'static str>,
    /// Attributes `fill` accepts; empty accepts everything.
    pub fillable: Vec<&'static str>,
    pub policy: PersistencePolicy,
    pub relations: Vec<Relation>,
}

impl ModelMeta {
    #[must_use]
    pub fn relation(&self, name: &str) -> Option<&Relation> {
        self.relations.iter().find(|r| r.name == name)
    }

    #[must_use]
    pub fn cast(&self, attribute: &str) -> Option<Cast> {
        self.casts.get(attribute).copied()
    }

    #[must_use]
    pub fn is_hidden(&self, attribute: &str) -> bool {
        self.hidden.iter().any(|h| *h == attribute)
    }

    #[must_use]
    pub fn is_fillable(&self, attribute: &str) -> bool {
        self.fillable.is_empty() || self.fillable.iter().any(|f| *f == attribute)
    }

    /// `table.column`.
    #[must_use]
    pub fn qualify(&self, column: &str) -> String {
        format!("{}.{column}", self.table)
    }
}

/// An active-record model.
///
/// Implementors are usually unit structs that only describe the table;
/// rows live in [`Entity`] values.
///
/// ```rust
/// use rivet_orm::{Cast, Model, PersistencePolicy};
///
/// struct User;
///
/// impl Model for User {
///     const TABLE: &'static str = "users";
///
///     fn casts() -> Vec<(&'static str, Cast)> {
///         vec![("is_admin", Cast::Bool), ("settings", Cast::Json)]
///     }
///
///     fn hidden() -> Vec<&'static str> {
///         vec!["password"]
///     }
///
///     fn policy() -> PersistencePolicy {
///         PersistencePolicy::new().with_timestamps()
///     }
/// }
///
/// let mut user = User::new_entity();
/// user.set("name", "Ada").set("password", "secret");
/// assert!(!user.exists());
/// assert!(!user.to_array().contains_key("password"));
/// ```
pub trait Model: Sized + Send + Sync + 'static {
    const TABLE: &'static str;
    const PRIMARY_KEY: &'static str = "id";
    const INCREMENTING: bool = true;

    /// Name used in errors and logs; the type name by default.
    fn name() -> &'static str {
        let full = std::any::type_name::<Self>();
        full.rsplit("::").next().unwrap_or(full)
    }

    fn casts() -> Vec<(&'static str, Cast)> {
        Vec::new()
    }

    fn hidden() -> Vec<&'static str> {
        Vec::new()
    }

    fn fillable() -> Vec<&'static str> {
        Vec::new()
    }

    fn policy() -> PersistencePolicy {
        PersistencePolicy::default()
    }

    fn relations() -> Vec<Relation> {
        Vec::new()
    }

    fn meta() -> Arc<ModelMeta> {
        Arc::new(ModelMeta {
            name: Self::name(),
            table: Self::TABLE,
            primary_key: Self::PRIMARY_KEY,
            incrementing: Self::INCREMENTING,
            casts: Self::casts().into_iter().collect(),
            hidden: Self::hidden(),
            fillable: Self::fillable(),
            policy: Self::policy(),
            relations: Self::relations(),
        })
    }

    /// A query over this model's table, soft-deleted rows excluded.
    fn query(conn: &mut Connection) -> ModelQuery<'_> {
        ModelQuery::new(conn, Self::meta())
    }

    /// An unsaved entity.
    fn new_entity() -> Entity {
        Entity::new(Self::meta())
    }

    /// An entity for a row that already exists.
    fn hydrate(row: Row) -> Entity {
        Entity::from_row(Self::meta(), row)
    }

    /// # Errors
    ///
    /// Returns the driver error.
    fn find(conn: &mut Connection, id: impl ToSqlValue) -> Result<Option<Entity>> {
        Self::query(conn).find(id)
    }

    /// # Errors
    ///
    /// Returns [`OrmError::ModelNotFound`](crate::OrmError::ModelNotFound)
    /// when no row has this key.
    fn find_or_fail(conn: &mut Connection, id: impl ToSqlValue) -> Result<Entity> {
        Self::query(conn).find_or_fail(id)
    }

    /// Fills a new entity and saves it. The entity is returned unsaved if
    /// an observer cancelled the insert.
    ///
    /// # Errors
    ///
    /// Returns a mass-assignment or driver error.
    fn create(conn: &mut Connection, attributes: Row) -> Result<Entity> {
        let mut entity = Self::new_entity();
        entity.fill(attributes)?;
        entity.save(conn)?;
        Ok(entity)
    }

    /// # Errors
    ///
    /// Returns the driver error.
    fn all(conn: &mut Connection) -> Result<Collection<Entity>> {
        Self::query(conn).get()
    }
}
