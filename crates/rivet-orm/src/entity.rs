//! Entities: one row of a model with dirty tracking and persistence.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use rivet_core::{Row, SqlValue, ToSqlValue};
use rivet_db::Connection;
use serde::de::DeserializeOwned;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use tracing::debug;

use crate::eager;
use crate::error::{OrmError, Result};
use crate::model::ModelMeta;
use crate::policy::{now, ModelEvent};
use crate::relation::Related;

/// One row of a model.
///
/// Attributes hold the values as stored; [`get`](Self::get) applies the
/// model's declared cast on every read. The values seen at the last load
/// or save are kept as the original snapshot for dirty checks.
#[derive(Clone)]
pub struct Entity {
    meta: Arc<ModelMeta>,
    attributes: Row,
    original: Row,
    exists: bool,
    relations: BTreeMap<String, Related>,
    pivot: Option<Row>,
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(self.meta.name)
            .field("attributes", &self.attributes)
            .field("exists", &self.exists)
            .field("relations", &self.relations.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl Entity {
    /// An entity that has not been saved.
    #[must_use]
    pub fn new(meta: Arc<ModelMeta>) -> Self {
        Self {
            meta,
            attributes: Row::new(),
            original: Row::new(),
            exists: false,
            relations: BTreeMap::new(),
            pivot: None,
        }
    }

    /// An entity for a row read from the database.
    #[must_use]
    pub fn from_row(meta: Arc<ModelMeta>, row: Row) -> Self {
        Self {
            meta,
            original: row.clone(),
            attributes: row,
            exists: true,
            relations: BTreeMap::new(),
            pivot: None,
        }
    }

    #[must_use]
    pub fn meta(&self) -> &ModelMeta {
        &self.meta
    }

    pub(crate) fn meta_arc(&self) -> Arc<ModelMeta> {
        Arc::clone(&self.meta)
    }

    #[must_use]
    pub const fn exists(&self) -> bool {
        self.exists
    }

    /// Primary key, if set.
    #[must_use]
    pub fn key(&self) -> Option<&SqlValue> {
        self.attributes
            .get(self.meta.primary_key)
            .filter(|value| !value.is_null())
    }

    /// Key of the stored row, which differs from [`key`](Self::key) while
    /// the primary key itself is being changed.
    fn key_for_query(&self) -> Option<SqlValue> {
        self.original
            .get(self.meta.primary_key)
            .filter(|value| !value.is_null())
            .or_else(|| self.key())
            .cloned()
    }

    fn not_persisted(&self) -> OrmError {
        OrmError::NotPersisted(self.meta.name.to_string())
    }

    // -------------------------------------------------------------------------
    // Attributes
    // -------------------------------------------------------------------------

    /// Attribute with its cast applied. Missing attributes read as `null`;
    /// a value the cast rejects is returned uncast.
    #[must_use]
    pub fn get(&self, key: &str) -> Value {
        self.attributes
            .get(key)
            .map_or(Value::Null, |value| self.cast_lenient(key, value))
    }

    /// Attribute with its cast applied.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::Cast`] when the stored value does not fit the
    /// declared cast.
    pub fn try_get(&self, key: &str) -> Result<Value> {
        let Some(value) = self.attributes.get(key) else {
            return Ok(Value::Null);
        };
        match self.meta.cast(key) {
            Some(cast) => cast.apply(value).map_err(|message| OrmError::Cast {
                attribute: key.to_string(),
                cast: cast.to_string(),
                message,
            }),
            None => Ok(value.to_json()),
        }
    }

    /// Attribute deserialized into `T` after its cast.
    ///
    /// # Errors
    ///
    /// Returns a cast error or a deserialization error.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        Ok(serde_json::from_value(self.try_get(key)?)?)
    }

    /// Stored value, without any cast.
    #[must_use]
    pub fn get_raw(&self, key: &str) -> Option<&SqlValue> {
        self.attributes.get(key)
    }

    fn cast_lenient(&self, key: &str, value: &SqlValue) -> Value {
        match self.meta.cast(key) {
            Some(cast) => cast.apply(value).unwrap_or_else(|message| {
                debug!(model = self.meta.name, attribute = key, %cast, %message, "Cast failed");
                value.to_json()
            }),
            None => value.to_json(),
        }
    }

    pub fn set(&mut self, key: &str, value: impl ToSqlValue) -> &mut Self {
        self.attributes.insert(key.to_string(), value.to_sql_value());
        self
    }

    /// Stores `value` as JSON text, for attributes cast with
    /// [`Cast::Json`](crate::Cast::Json).
    ///
    /// # Errors
    ///
    /// Returns the serialization error.
    pub fn set_json(&mut self, key: &str, value: &impl Serialize) -> Result<&mut Self> {
        let text = serde_json::to_string(value)?;
        Ok(self.set(key, text))
    }

    /// Sets every attribute of `attributes`.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::MassAssignment`] and sets nothing when one of the
    /// attributes is not fillable.
    pub fn fill(&mut self, attributes: Row) -> Result<&mut Self> {
        if let Some(attribute) = attributes.keys().find(|key| !self.meta.is_fillable(key)) {
            return Err(OrmError::MassAssignment {
                model: self.meta.name.to_string(),
                attribute: attribute.clone(),
            });
        }
        self.attributes.extend(attributes);
        Ok(self)
    }

    #[must_use]
    pub const fn attributes(&self) -> &Row {
        &self.attributes
    }

    /// Value of `key` at the last load or save.
    #[must_use]
    pub fn original(&self, key: &str) -> Option<&SqlValue> {
        self.original.get(key)
    }

    fn original_is_equivalent(&self, key: &str) -> bool {
        let Some(current) = self.attributes.get(key) else {
            return true;
        };
        let Some(original) = self.original.get(key) else {
            return false;
        };
        if current.loosely_equals(original) {
            return true;
        }
        self.meta.cast(key).is_some_and(|cast| {
            matches!((cast.apply(current), cast.apply(original)), (Ok(a), Ok(b)) if a == b)
        })
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.attributes
            .keys()
            .any(|key| !self.original_is_equivalent(key))
    }

    #[must_use]
    pub fn is_attribute_dirty(&self, key: &str) -> bool {
        !self.original_is_equivalent(key)
    }

    /// Attributes changed since the last load or save.
    #[must_use]
    pub fn get_dirty(&self) -> Row {
        self.attributes
            .iter()
            .filter(|(key, _)| !self.original_is_equivalent(key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    fn sync_original(&mut self) {
        self.original = self.attributes.clone();
    }

    // -------------------------------------------------------------------------
    // Persistence
    // -------------------------------------------------------------------------

    /// Inserts a new entity or updates the dirty attributes of an existing
    /// one. A clean existing entity issues no statement.
    ///
    /// Returns `false` when an observer cancelled the save.
    ///
    /// # Errors
    ///
    /// Returns the driver error.
    pub fn save(&mut self, conn: &mut Connection) -> Result<bool> {
        let meta = self.meta_arc();
        if !meta.policy.fire(ModelEvent::Saving, self) {
            debug!(model = meta.name, "Save cancelled");
            return Ok(false);
        }
        let saved = if self.exists {
            !self.is_dirty() || self.perform_update(conn, &meta)?
        } else {
            self.perform_insert(conn, &meta)?
        };
        if saved {
            meta.policy.fire(ModelEvent::Saved, self);
            self.sync_original();
        }
        Ok(saved)
    }

    fn touch_timestamps(&mut self, meta: &ModelMeta) {
        let Some(timestamps) = &meta.policy.timestamps else {
            return;
        };
        let now = now();
        if !self.is_attribute_dirty(&timestamps.updated_at) {
            self.set(&timestamps.updated_at, now);
        }
        if !self.exists && !self.is_attribute_dirty(&timestamps.created_at) {
            self.set(&timestamps.created_at, now);
        }
    }

    fn perform_insert(&mut self, conn: &mut Connection, meta: &ModelMeta) -> Result<bool> {
        if !meta.policy.fire(ModelEvent::Creating, self) {
            debug!(model = meta.name, "Insert cancelled");
            return Ok(false);
        }
        self.touch_timestamps(meta);

        let mut query = conn.table(meta.table);
        if meta.incrementing && self.key().is_none() {
            let mut values = self.attributes.clone();
            values.remove(meta.primary_key);
            let id = query.insert_get_id(values, meta.primary_key)?;
            self.set(meta.primary_key, id);
        } else {
            query.insert(self.attributes.clone())?;
        }
        self.exists = true;
        debug!(model = meta.name, key = ?self.key(), "Inserted");

        meta.policy.fire(ModelEvent::Created, self);
        Ok(true)
    }

    fn perform_update(&mut self, conn: &mut Connection, meta: &ModelMeta) -> Result<bool> {
        if !meta.policy.fire(ModelEvent::Updating, self) {
            debug!(model = meta.name, "Update cancelled");
            return Ok(false);
        }
        self.touch_timestamps(meta);

        let dirty = self.get_dirty();
        if !dirty.is_empty() {
            let key = self.key_for_query().ok_or_else(|| self.not_persisted())?;
            conn.table(meta.table)
                .where_eq(meta.primary_key, key)
                .update(dirty)?;
            debug!(model = meta.name, key = ?self.key(), "Updated");
            meta.policy.fire(ModelEvent::Updated, self);
        }
        Ok(true)
    }

    /// Fills `attributes` and saves.
    ///
    /// # Errors
    ///
    /// Returns a mass-assignment or driver error.
    pub fn update(&mut self, conn: &mut Connection, attributes: Row) -> Result<bool> {
        self.fill(attributes)?;
        self.save(conn)
    }

    /// Deletes the row, or marks it deleted when the model uses soft
    /// deletes. Returns `false` when an observer cancelled the delete.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::NotPersisted`] for an unsaved entity, or the
    /// driver error.
    pub fn delete(&mut self, conn: &mut Connection) -> Result<bool> {
        self.perform_delete(conn, false)
    }

    /// Deletes the row even when the model uses soft deletes.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::NotPersisted`] for an unsaved entity, or the
    /// driver error.
    pub fn force_delete(&mut self, conn: &mut Connection) -> Result<bool> {
        self.perform_delete(conn, true)
    }

    fn perform_delete(&mut self, conn: &mut Connection, force: bool) -> Result<bool> {
        let meta = self.meta_arc();
        let key = match self.key_for_query() {
            Some(key) if self.exists => key,
            _ => return Err(self.not_persisted()),
        };
        if !meta.policy.fire(ModelEvent::Deleting, self) {
            debug!(model = meta.name, "Delete cancelled");
            return Ok(false);
        }

        match meta.policy.soft_delete_column().filter(|_| !force) {
            Some(column) => {
                let now = SqlValue::Timestamp(now());
                let mut values = Row::new();
                values.insert(column.to_string(), now.clone());
                if let Some(timestamps) = &meta.policy.timestamps {
                    values.insert(timestamps.updated_at.clone(), now);
                }
                conn.table(meta.table)
                    .where_eq(meta.primary_key, key)
                    .update(values.clone())?;
                for (column, value) in values {
                    self.original.insert(column.clone(), value.clone());
                    self.attributes.insert(column, value);
                }
                debug!(model = meta.name, key = ?self.key(), "Soft deleted");
            }
            None => {
                conn.table(meta.table)
                    .where_eq(meta.primary_key, key)
                    .delete()?;
                self.exists = false;
                debug!(model = meta.name, key = ?self.key(), "Deleted");
            }
        }

        meta.policy.fire(ModelEvent::Deleted, self);
        Ok(true)
    }

    /// Clears the soft-delete marker and saves.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::NotSoftDeletable`] when the model does not use
    /// soft deletes, or the driver error.
    pub fn restore(&mut self, conn: &mut Connection) -> Result<bool> {
        let meta = self.meta_arc();
        let Some(column) = meta.policy.soft_delete_column() else {
            return Err(OrmError::NotSoftDeletable(meta.name.to_string()));
        };
        if !meta.policy.fire(ModelEvent::Restoring, self) {
            debug!(model = meta.name, "Restore cancelled");
            return Ok(false);
        }
        self.set(column, SqlValue::Null);
        let saved = self.save(conn)?;
        if saved {
            meta.policy.fire(ModelEvent::Restored, self);
        }
        Ok(saved)
    }

    /// True when the soft-delete marker is set.
    #[must_use]
    pub fn trashed(&self) -> bool {
        self.meta
            .policy
            .soft_delete_column()
            .and_then(|column| self.attributes.get(column))
            .is_some_and(|value| !value.is_null())
    }

    /// Reloads the attributes from the database and drops cached
    /// relations.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::ModelNotFound`] when the row is gone.
    pub fn refresh(&mut self, conn: &mut Connection) -> Result<()> {
        let key = self.key_for_query().ok_or_else(|| self.not_persisted())?;
        let row = conn
            .table(self.meta.table)
            .where_eq(self.meta.primary_key, key.clone())
            .first()?
            .ok_or_else(|| OrmError::ModelNotFound {
                model: self.meta.name.to_string(),
                key: key.key_string().unwrap_or_default(),
            })?;
        self.original = row.clone();
        self.attributes = row;
        self.exists = true;
        self.relations.clear();
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Relations
    // -------------------------------------------------------------------------

    /// Resolves a relation, querying on first access and serving the cached
    /// result afterwards. A dotted path such as `posts.comments` loads the
    /// nested level too and returns the first segment.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::UnknownRelation`] or the driver error.
    pub fn related(&mut self, conn: &mut Connection, name: &str) -> Result<&Related> {
        let head = name.split('.').next().unwrap_or(name);
        if !self.relations.contains_key(head) {
            eager::load(conn, std::slice::from_mut(self), &[name])?;
        }
        self.relations
            .get(head)
            .ok_or_else(|| OrmError::UnknownRelation {
                model: self.meta.name.to_string(),
                relation: head.to_string(),
            })
    }

    /// Cached relation, without querying.
    #[must_use]
    pub fn relation(&self, name: &str) -> Option<&Related> {
        self.relations.get(name)
    }

    pub(crate) fn relation_mut(&mut self, name: &str) -> Option<&mut Related> {
        self.relations.get_mut(name)
    }

    pub fn set_relation(&mut self, name: &str, related: Related) -> &mut Self {
        self.relations.insert(name.to_string(), related);
        self
    }

    #[must_use]
    pub fn relation_loaded(&self, name: &str) -> bool {
        self.relations.contains_key(name)
    }

    /// Pivot columns of an entity loaded through a many-to-many relation.
    #[must_use]
    pub const fn pivot(&self) -> Option<&Row> {
        self.pivot.as_ref()
    }

    pub(crate) fn set_pivot(&mut self, pivot: Row) {
        self.pivot = Some(pivot);
    }

    // -------------------------------------------------------------------------
    // Serialization
    // -------------------------------------------------------------------------

    /// Visible attributes with casts applied, followed by loaded relations
    /// and the pivot.
    #[must_use]
    pub fn to_array(&self) -> Map<String, Value> {
        let mut map = Map::new();
        for (key, value) in &self.attributes {
            if !self.meta.is_hidden(key) {
                map.insert(key.clone(), self.cast_lenient(key, value));
            }
        }
        for (name, related) in &self.relations {
            if !self.meta.is_hidden(name) {
                map.insert(name.clone(), related.to_json());
            }
        }
        if let Some(pivot) = &self.pivot {
            let pivot = pivot
                .iter()
                .map(|(key, value)| (key.clone(), value.to_json()))
                .collect();
            map.insert(String::from("pivot"), Value::Object(pivot));
        }
        map
    }

    /// [`to_array`](Self::to_array) as a JSON string.
    ///
    /// # Errors
    ///
    /// Returns the serialization error.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.to_array())?)
    }
}

impl Serialize for Entity {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_array().serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cast::Cast;
    use crate::model::Model;
    use crate::policy::PersistencePolicy;
    use rivet_core::row;
    use serde_json::json;

    struct Account;

    impl Model for Account {
        const TABLE: &'static str = "accounts";

        fn casts() -> Vec<(&'static str, Cast)> {
            vec![
                ("active", Cast::Bool),
                ("balance", Cast::Float),
                ("settings", Cast::Json),
                ("opened_on", Cast::Date),
            ]
        }

        fn hidden() -> Vec<&'static str> {
            vec!["pin"]
        }

        fn fillable() -> Vec<&'static str> {
            vec!["owner", "balance", "settings"]
        }

        fn policy() -> PersistencePolicy {
            PersistencePolicy::new().with_soft_deletes()
        }
    }

    #[test]
    fn test_casts_apply_on_read_only() {
        let entity = Account::hydrate(row! {
            "id" => 1,
            "active" => 1,
            "balance" => "12.50",
            "settings" => r#"{"alerts":true}"#,
            "opened_on" => "2023-09-01 10:00:00",
        });
        assert_eq!(entity.get("active"), json!(true));
        assert_eq!(entity.get("balance"), json!(12.5));
        assert_eq!(entity.get("settings"), json!({"alerts": true}));
        assert_eq!(entity.get("opened_on"), json!("2023-09-01"));
        assert_eq!(entity.get_raw("active"), Some(&SqlValue::Int(1)));
        assert_eq!(entity.get("missing"), Value::Null);
        assert!(entity.get_as::<bool>("active").unwrap());
    }

    #[test]
    fn test_lenient_and_strict_reads() {
        let entity = Account::hydrate(row! { "id" => 1, "balance" => "lots" });
        assert_eq!(entity.get("balance"), json!("lots"));
        assert!(matches!(
            entity.try_get("balance"),
            Err(OrmError::Cast { attribute, cast, .. }) if attribute == "balance" && cast == "float"
        ));
    }

    #[test]
    fn test_dirty_tracking() {
        let mut entity = Account::hydrate(row! { "id" => 1, "owner" => "ada", "active" => 1 });
        assert!(!entity.is_dirty());

        entity.set("active", true);
        assert!(!entity.is_dirty(), "same value under the bool cast");

        entity.set("owner", "grace");
        assert!(entity.is_attribute_dirty("owner"));
        assert_eq!(entity.get_dirty(), row! { "owner" => "grace" });
        assert_eq!(entity.original("owner"), Some(&SqlValue::Text("ada".into())));

        entity.set("owner", "ada");
        assert!(!entity.is_dirty());
    }

    #[test]
    fn test_fill_respects_fillable() {
        let mut entity = Account::new_entity();
        entity.fill(row! { "owner" => "ada", "balance" => 3 }).unwrap();
        let err = entity
            .fill(row! { "owner" => "eve", "is_admin" => true })
            .unwrap_err();
        assert!(matches!(err, OrmError::MassAssignment { attribute, .. } if attribute == "is_admin"));
        assert_eq!(entity.get("owner"), json!("ada"));
    }

    #[test]
    fn test_to_array_hides_and_round_trips() {
        let row = row! {
            "id" => 7,
            "owner" => "ada",
            "pin" => "1234",
            "active" => 0,
            "deleted_at" => SqlValue::Null,
        };
        let entity = Account::hydrate(row);
        assert_eq!(
            Value::Object(entity.to_array()),
            json!({"id": 7, "owner": "ada", "active": false, "deleted_at": null})
        );
        assert_eq!(
            entity.to_json().unwrap(),
            r#"{"active":false,"deleted_at":null,"id":7,"owner":"ada"}"#
        );
        assert!(!entity.trashed());
    }

    #[test]
    fn test_set_json_and_relations_in_output() {
        let mut entity = Account::new_entity();
        entity.set_json("settings", &json!({"theme": "dark"})).unwrap();
        assert_eq!(
            entity.get_raw("settings"),
            Some(&SqlValue::Text(r#"{"theme":"dark"}"#.into()))
        );

        let child = Account::hydrate(row! { "id" => 2 });
        entity.set_relation("parent", Related::One(Some(Box::new(child))));
        assert!(entity.relation_loaded("parent"));
        assert_eq!(entity.to_array()["parent"], json!({"id": 2}));
    }
}
