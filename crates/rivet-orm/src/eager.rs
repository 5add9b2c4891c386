//! Eager loading.
//!
//! Each requested relation costs one query for the whole batch of parents:
//! the keys present in the batch are collected, the related rows are read
//! with a single `IN` predicate, and the results are matched back onto each
//! parent by key. Nested paths (`posts.comments`) repeat this once per level.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use rivet_core::{Collection, Row, SqlValue};
use rivet_db::Connection;
use tracing::debug;

use crate::entity::Entity;
use crate::error::{OrmError, Result};
use crate::model::ModelMeta;
use crate::query::ModelQuery;
use crate::relation::{Related, Relation, RelationKind};

/// Prefix of pivot columns in many-to-many result rows.
const PIVOT_PREFIX: &str = "pivot_";

/// Loads `relations` onto every entity of `entities`, which must all belong
/// to the same model. Dotted paths load nested relations.
///
/// # Errors
///
/// Returns [`OrmError::UnknownRelation`] or the driver error.
pub fn load(conn: &mut Connection, entities: &mut [Entity], relations: &[&str]) -> Result<()> {
    let Some(first) = entities.first() else {
        return Ok(());
    };
    let meta = first.meta_arc();
    for (name, nested) in group_paths(relations) {
        let relation = meta
            .relation(&name)
            .ok_or_else(|| OrmError::UnknownRelation {
                model: meta.name.to_string(),
                relation: name.clone(),
            })?;
        load_relation(conn, entities, &meta, relation, &nested)?;
    }
    Ok(())
}

/// `["posts", "posts.comments", "roles"]` becomes
/// `{"posts": ["comments"], "roles": []}`.
fn group_paths(relations: &[&str]) -> BTreeMap<String, Vec<String>> {
    let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for path in relations.iter().map(|p| p.trim()).filter(|p| !p.is_empty()) {
        match path.split_once('.') {
            Some((head, rest)) => grouped
                .entry(head.to_string())
                .or_default()
                .push(rest.to_string()),
            None => {
                grouped.entry(path.to_string()).or_default();
            }
        }
    }
    grouped
}

fn load_relation(
    conn: &mut Connection,
    parents: &mut [Entity],
    parent_meta: &ModelMeta,
    relation: &Relation,
    nested: &[String],
) -> Result<()> {
    let related_meta = relation.related();
    let parent_key = relation.parent_key(parent_meta);

    let mut seen = BTreeSet::new();
    let keys: Vec<SqlValue> = parents
        .iter()
        .filter_map(|parent| parent.get_raw(parent_key))
        .filter(|key| key.key_string().is_some_and(|k| seen.insert(k)))
        .cloned()
        .collect();

    let mut children = if keys.is_empty() {
        Vec::new()
    } else {
        debug!(
            model = parent_meta.name,
            relation = %relation.name,
            keys = keys.len(),
            "Eager loading"
        );
        fetch(conn, relation, &related_meta, keys)?
    };
    if !nested.is_empty() && !children.is_empty() {
        let nested: Vec<&str> = nested.iter().map(String::as_str).collect();
        load(conn, &mut children, &nested)?;
    }

    let mut buckets: BTreeMap<String, Vec<Entity>> = BTreeMap::new();
    for child in children {
        let key = match relation.pivot() {
            Some(pivot) => child
                .pivot()
                .and_then(|p| p.get(&pivot.foreign_pivot_key))
                .and_then(SqlValue::key_string),
            None => child
                .get_raw(relation.related_key(&related_meta))
                .and_then(SqlValue::key_string),
        };
        if let Some(key) = key {
            buckets.entry(key).or_default().push(child);
        }
    }

    for parent in parents.iter_mut() {
        let matched = parent
            .get_raw(parent_key)
            .and_then(SqlValue::key_string)
            .and_then(|key| buckets.get(&key))
            .cloned()
            .unwrap_or_default();
        let related = if relation.is_singular() {
            Related::One(matched.into_iter().next().map(Box::new))
        } else {
            Related::Many(Collection::new(matched))
        };
        parent.set_relation(&relation.name, related);
    }
    Ok(())
}

fn fetch(
    conn: &mut Connection,
    relation: &Relation,
    related_meta: &Arc<ModelMeta>,
    keys: Vec<SqlValue>,
) -> Result<Vec<Entity>> {
    let related_key = related_meta.qualify(relation.related_key(related_meta));
    let query = ModelQuery::new(conn, Arc::clone(related_meta));

    let Some(pivot) = relation.pivot().filter(|_| relation.kind == RelationKind::BelongsToMany) else {
        return Ok(query.where_in(&related_key, keys).get()?.into_vec());
    };

    let pivot_columns = [&pivot.foreign_pivot_key, &pivot.related_pivot_key]
        .into_iter()
        .chain(&pivot.columns);
    let mut columns = vec![format!("{}.*", related_meta.table)];
    columns.extend(
        pivot_columns.map(|column| format!("{}.{column} AS {PIVOT_PREFIX}{column}", pivot.table)),
    );
    let columns: Vec<&str> = columns.iter().map(String::as_str).collect();

    let mut query = query
        .select(&columns)
        .join(
            &pivot.table,
            &related_key,
            "=",
            &format!("{}.{}", pivot.table, pivot.related_pivot_key),
        )
        .where_in(&format!("{}.{}", pivot.table, pivot.foreign_pivot_key), keys);

    Ok(query
        .fetch_rows()?
        .into_iter()
        .map(|row| {
            let (pivot, attributes) = split_pivot(row);
            let mut entity = Entity::from_row(Arc::clone(related_meta), attributes);
            entity.set_pivot(pivot);
            entity
        })
        .collect())
}

/// Separates `pivot_*` columns from the related row.
fn split_pivot(row: Row) -> (Row, Row) {
    let mut pivot = Row::new();
    let mut attributes = Row::new();
    for (column, value) in row {
        match column.strip_prefix(PIVOT_PREFIX) {
            Some(name) => {
                pivot.insert(name.to_string(), value);
            }
            None => {
                attributes.insert(column, value);
            }
        }
    }
    (pivot, attributes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rivet_core::row;

    #[test]
    fn test_group_paths() {
        let grouped = group_paths(&["posts", "posts.comments", "roles", " ", "posts.tags.owner"]);
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped["posts"], vec!["comments", "tags.owner"]);
        assert!(grouped["roles"].is_empty());
    }

    #[test]
    fn test_split_pivot() {
        let (pivot, attributes) = split_pivot(row! {
            "id" => 3,
            "name" => "editor",
            "pivot_user_id" => 1,
            "pivot_role_id" => 3,
        });
        assert_eq!(pivot, row! { "user_id" => 1, "role_id" => 3 });
        assert_eq!(attributes, row! { "id" => 3, "name" => "editor" });
    }
}
