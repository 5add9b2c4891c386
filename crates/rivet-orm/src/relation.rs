//! Relationship declarations between models.
//!
//! Keys are always named explicitly; nothing is inferred from table or
//! column names.

use std::sync::Arc;

use rivet_core::Collection;
use serde_json::Value;

use crate::entity::Entity;
use crate::model::{Model, ModelMeta};

/// Cardinality of a relationship, seen from the declaring model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    /// The related table holds a key pointing back here; at most one row.
    HasOne,
    /// The related table holds a key pointing back here.
    HasMany,
    /// This table holds a key pointing at the related row.
    BelongsTo,
    /// Rows are linked through an intermediate table.
    BelongsToMany,
}

/// Intermediate table of a many-to-many relationship.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PivotTable {
    pub table: String,
    /// Pivot column holding the declaring model's key.
    pub foreign_pivot_key: String,
    /// Pivot column holding the related model's key.
    pub related_pivot_key: String,
    /// Extra pivot columns loaded alongside each related row.
    pub columns: Vec<String>,
}

/// A named relationship to another model.
///
/// ```rust
/// use rivet_orm::{Model, Relation};
///
/// struct User;
/// struct Post;
/// struct Role;
///
/// impl Model for User {
///     const TABLE: &'static str = "users";
///
///     fn relations() -> Vec<Relation> {
///         vec![
///             Relation::has_many::<Post>("posts", "user_id"),
///             Relation::belongs_to_many::<Role>("roles", "role_user", "user_id", "role_id")
///                 .with_pivot(&["granted_at"]),
///         ]
///     }
/// }
///
/// impl Model for Post {
///     const TABLE: &'static str = "posts";
///
///     fn relations() -> Vec<Relation> {
///         vec![Relation::belongs_to::<User>("author", "user_id")]
///     }
/// }
///
/// impl Model for Role {
///     const TABLE: &'static str = "roles";
/// }
///
/// assert!(User::meta().relation("roles").is_some());
/// ```
#[derive(Debug, Clone)]
pub struct Relation {
    pub name: String,
    pub kind: RelationKind,
    related: fn() -> Arc<ModelMeta>,
    /// Column holding the reference: on the related table for `HasOne` and
    /// `HasMany`, on this table for `BelongsTo`. Unused for
    /// `BelongsToMany`.
    pub foreign_key: String,
    local_key: Option<String>,
    owner_key: Option<String>,
    pivot: Option<PivotTable>,
}

impl Relation {
    fn new<M: Model>(name: &str, kind: RelationKind, foreign_key: &str) -> Self {
        Self {
            name: name.to_string(),
            kind,
            related: M::meta,
            foreign_key: foreign_key.to_string(),
            local_key: None,
            owner_key: None,
            pivot: None,
        }
    }

    /// One `M` whose `foreign_key` equals this model's key.
    #[must_use]
    pub fn has_one<M: Model>(name: &str, foreign_key: &str) -> Self {
        Self::new::<M>(name, RelationKind::HasOne, foreign_key)
    }

    /// Every `M` whose `foreign_key` equals this model's key.
    #[must_use]
    pub fn has_many<M: Model>(name: &str, foreign_key: &str) -> Self {
        Self::new::<M>(name, RelationKind::HasMany, foreign_key)
    }

    /// The `M` whose key equals this model's `foreign_key`.
    #[must_use]
    pub fn belongs_to<M: Model>(name: &str, foreign_key: &str) -> Self {
        Self::new::<M>(name, RelationKind::BelongsTo, foreign_key)
    }

    /// Every `M` linked through `pivot_table`.
    #[must_use]
    pub fn belongs_to_many<M: Model>(
        name: &str,
        pivot_table: &str,
        foreign_pivot_key: &str,
        related_pivot_key: &str,
    ) -> Self {
        let mut relation = Self::new::<M>(name, RelationKind::BelongsToMany, "");
        relation.pivot = Some(PivotTable {
            table: pivot_table.to_string(),
            foreign_pivot_key: foreign_pivot_key.to_string(),
            related_pivot_key: related_pivot_key.to_string(),
            columns: Vec::new(),
        });
        relation
    }

    /// Matches on `key` of this model instead of its primary key.
    #[must_use]
    pub fn local_key(mut self, key: &str) -> Self {
        self.local_key = Some(key.to_string());
        self
    }

    /// Matches on `key` of the related model instead of its primary key.
    #[must_use]
    pub fn owner_key(mut self, key: &str) -> Self {
        self.owner_key = Some(key.to_string());
        self
    }

    /// Loads extra pivot columns; they are read back with
    /// [`Entity::pivot`].
    #[must_use]
    pub fn with_pivot(mut self, columns: &[&str]) -> Self {
        if let Some(pivot) = &mut self.pivot {
            pivot
                .columns
                .extend(columns.iter().map(ToString::to_string));
        }
        self
    }

    /// Metadata of the related model.
    #[must_use]
    pub fn related(&self) -> Arc<ModelMeta> {
        (self.related)()
    }

    #[must_use]
    pub const fn pivot(&self) -> Option<&PivotTable> {
        self.pivot.as_ref()
    }

    /// Column of the declaring model whose values select related rows.
    #[must_use]
    pub fn parent_key<'a>(&'a self, parent: &'a ModelMeta) -> &'a str {
        match self.kind {
            RelationKind::BelongsTo => &self.foreign_key,
            _ => self.local_key.as_deref().unwrap_or(parent.primary_key),
        }
    }

    /// Column of the related model matched against
    /// [`parent_key`](Self::parent_key). For `BelongsToMany` this is the
    /// related column the pivot points at.
    #[must_use]
    pub fn related_key<'a>(&'a self, related: &'a ModelMeta) -> &'a str {
        match self.kind {
            RelationKind::HasOne | RelationKind::HasMany => &self.foreign_key,
            RelationKind::BelongsTo | RelationKind::BelongsToMany => {
                self.owner_key.as_deref().unwrap_or(related.primary_key)
            }
        }
    }

    /// True when the relation resolves to a single entity.
    #[must_use]
    pub const fn is_singular(&self) -> bool {
        matches!(self.kind, RelationKind::HasOne | RelationKind::BelongsTo)
    }
}

/// A resolved relationship cached on an entity.
#[derive(Debug, Clone)]
pub enum Related {
    One(Option<Box<Entity>>),
    Many(Collection<Entity>),
}

impl Related {
    #[must_use]
    pub fn as_one(&self) -> Option<&Entity> {
        match self {
            Self::One(entity) => entity.as_deref(),
            Self::Many(entities) => entities.first(),
        }
    }

    /// Related entities as a slice; a singular relation gives zero or one.
    #[must_use]
    pub fn as_many(&self) -> &[Entity] {
        match self {
            Self::One(Some(entity)) => std::slice::from_ref(entity.as_ref()),
            Self::One(None) => &[],
            Self::Many(entities) => entities.as_slice(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.as_many().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.as_many().is_empty()
    }

    pub(crate) fn as_many_mut(&mut self) -> &mut [Entity] {
        match self {
            Self::One(Some(entity)) => std::slice::from_mut(entity.as_mut()),
            Self::One(None) => &mut [],
            Self::Many(entities) => entities.as_mut_slice(),
        }
    }

    pub(crate) fn to_json(&self) -> Value {
        match self {
            Self::One(Some(entity)) => Value::Object(entity.to_array()),
            Self::One(None) => Value::Null,
            Self::Many(entities) => Value::Array(
                entities
                    .iter()
                    .map(|entity| Value::Object(entity.to_array()))
                    .collect(),
            ),
        }
    }
}
