//! Queries that return entities.

use std::fmt;
use std::sync::Arc;

use rivet_core::{Boolean, Collection, Direction, Row, ToSqlValue, WhereKind};
use rivet_db::{Conditions, Connection, LengthAwarePaginator, QueryBuilder};

use crate::eager;
use crate::entity::Entity;
use crate::error::{OrmError, Result};
use crate::model::ModelMeta;

/// Which soft-deleted rows a query sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Trashed {
    #[default]
    Without,
    With,
    Only,
}

macro_rules! delegate {
    ($($(#[$attr:meta])* fn $name:ident($($arg:ident: $ty:ty),*);)+) => {
        $(
            $(#[$attr])*
            #[must_use]
            pub fn $name(mut self, $($arg: $ty),*) -> Self {
                self.builder = self.builder.$name($($arg),*);
                self
            }
        )+
    };
}

/// A [`QueryBuilder`] over a model's table that hydrates entities, applies
/// the soft-delete scope and eager-loads relations.
///
/// ```rust
/// use rivet_db::{Connection, ConnectionConfig, RuntimeMode};
/// use rivet_orm::Model;
///
/// struct Task;
///
/// impl Model for Task {
///     const TABLE: &'static str = "tasks";
/// }
///
/// let mut conn =
///     Connection::new(ConnectionConfig::sqlite_memory().with_mode(RuntimeMode::Testing)).unwrap();
/// conn.schema()
///     .create("tasks", |table| {
///         table.id();
///         table.string("title");
///         table.boolean("done");
///     })
///     .unwrap();
/// conn.table("tasks")
///     .insert(rivet_core::row! { "title" => "write docs", "done" => false })
///     .unwrap();
///
/// let open = Task::query(&mut conn).where_eq("done", false).get().unwrap();
/// assert_eq!(open.len(), 1);
/// assert_eq!(open[0].get("title"), "write docs");
/// ```
pub struct ModelQuery<'c> {
    builder: QueryBuilder<'c>,
    meta: Arc<ModelMeta>,
    eager: Vec<String>,
    trashed: Trashed,
    scoped: bool,
}

impl fmt::Debug for ModelQuery<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelQuery")
            .field("model", &self.meta.name)
            .field("eager", &self.eager)
            .field("trashed", &self.trashed)
            .finish_non_exhaustive()
    }
}

impl<'c> ModelQuery<'c> {
    pub fn new(conn: &'c mut Connection, meta: Arc<ModelMeta>) -> Self {
        Self {
            builder: conn.table(meta.table),
            meta,
            eager: Vec::new(),
            trashed: Trashed::default(),
            scoped: false,
        }
    }

    #[must_use]
    pub fn meta(&self) -> &ModelMeta {
        &self.meta
    }

    /// Applies `f` to the underlying builder, for clauses not mirrored here.
    #[must_use]
    pub fn tap(mut self, f: impl FnOnce(QueryBuilder<'c>) -> QueryBuilder<'c>) -> Self {
        self.builder = f(self.builder);
        self
    }

    delegate! {
        fn select(columns: &[&str]);
        fn distinct();
        fn join(table: &str, first: &str, operator: &str, second: &str);
        fn left_join(table: &str, first: &str, operator: &str, second: &str);
        fn where_op(column: &str, operator: &str, value: impl ToSqlValue);
        fn where_eq(column: &str, value: impl ToSqlValue);
        fn or_where(column: &str, operator: &str, value: impl ToSqlValue);
        fn or_where_eq(column: &str, value: impl ToSqlValue);
        fn where_in(column: &str, values: impl IntoIterator<Item = impl ToSqlValue>);
        fn where_not_in(column: &str, values: impl IntoIterator<Item = impl ToSqlValue>);
        fn where_null(column: &str);
        fn where_not_null(column: &str);
        fn where_between(column: &str, low: impl ToSqlValue, high: impl ToSqlValue);
        fn where_column(first: &str, operator: &str, second: &str);
        fn where_nested(f: impl FnOnce(Conditions) -> Conditions);
        fn or_where_nested(f: impl FnOnce(Conditions) -> Conditions);
        fn order_by(column: &str, direction: Direction);
        fn order_by_desc(column: &str);
        fn latest(column: &str);
        fn oldest(column: &str);
        fn limit(limit: u64);
        fn offset(offset: u64);
    }

    /// Eager-loads `relations` after the main query. Dotted paths load
    /// nested relations.
    #[must_use]
    pub fn with(mut self, relations: &[&str]) -> Self {
        self.eager.extend(relations.iter().map(ToString::to_string));
        self
    }

    /// Includes soft-deleted rows.
    #[must_use]
    pub fn with_trashed(mut self) -> Self {
        self.trashed = Trashed::With;
        self
    }

    /// Returns only soft-deleted rows.
    #[must_use]
    pub fn only_trashed(mut self) -> Self {
        self.trashed = Trashed::Only;
        self
    }

    fn apply_scope(&mut self) {
        if self.scoped {
            return;
        }
        self.scoped = true;
        let Some(column) = self.meta.policy.soft_delete_column() else {
            return;
        };
        let not = match self.trashed {
            Trashed::With => return,
            Trashed::Without => false,
            Trashed::Only => true,
        };
        let column = self.meta.qualify(column);
        let descriptor = self.builder.descriptor_mut();
        descriptor.wrap_wheres();
        descriptor.add_where(Boolean::And, WhereKind::Null { column, not });
    }

    fn load_eager(&mut self, entities: &mut [Entity]) -> Result<()> {
        if self.eager.is_empty() {
            return Ok(());
        }
        let relations: Vec<&str> = self.eager.iter().map(String::as_str).collect();
        eager::load(self.builder.connection(), entities, &relations)
    }

    fn hydrate(&mut self, rows: impl IntoIterator<Item = Row>) -> Result<Vec<Entity>> {
        let mut entities: Vec<Entity> = rows
            .into_iter()
            .map(|row| Entity::from_row(Arc::clone(&self.meta), row))
            .collect();
        self.load_eager(&mut entities)?;
        Ok(entities)
    }

    /// Rows as returned by the driver, with the soft-delete scope applied.
    pub(crate) fn fetch_rows(&mut self) -> Result<Collection<Row>> {
        self.apply_scope();
        Ok(self.builder.get()?)
    }

    /// Compiled `SELECT`, including the soft-delete scope.
    ///
    /// # Errors
    ///
    /// Returns a recorded chain error.
    pub fn to_sql(&mut self) -> Result<String> {
        self.apply_scope();
        Ok(self.builder.to_sql()?)
    }

    /// # Errors
    ///
    /// Returns the driver error or an eager-loading error.
    pub fn get(&mut self) -> Result<Collection<Entity>> {
        let rows = self.fetch_rows()?;
        Ok(Collection::new(self.hydrate(rows)?))
    }

    /// # Errors
    ///
    /// Returns the driver error or an eager-loading error.
    pub fn first(&mut self) -> Result<Option<Entity>> {
        self.apply_scope();
        let row = self.builder.first()?;
        Ok(self.hydrate(row)?.pop())
    }

    /// Entity whose primary key equals `id`.
    ///
    /// # Errors
    ///
    /// Returns the driver error or an eager-loading error.
    pub fn find(&mut self, id: impl ToSqlValue) -> Result<Option<Entity>> {
        self.apply_scope();
        let key = self.meta.qualify(self.meta.primary_key);
        let row = self.builder.find_by(&key, id)?;
        Ok(self.hydrate(row)?.pop())
    }

    /// # Errors
    ///
    /// Returns [`OrmError::ModelNotFound`] when no row matches.
    pub fn find_or_fail(&mut self, id: impl ToSqlValue) -> Result<Entity> {
        let id = id.to_sql_value();
        self.find(id.clone())?.ok_or_else(|| OrmError::ModelNotFound {
            model: self.meta.name.to_string(),
            key: id.key_string().unwrap_or_default(),
        })
    }

    /// # Errors
    ///
    /// Returns the driver error or an eager-loading error.
    pub fn paginate(&mut self, per_page: u64, page: u64) -> Result<LengthAwarePaginator<Entity>> {
        self.apply_scope();
        let meta = Arc::clone(&self.meta);
        let mut page = self
            .builder
            .paginate(per_page, page)?
            .map(|row| Entity::from_row(Arc::clone(&meta), row));
        self.load_eager(page.data.as_mut_slice())?;
        Ok(page)
    }

    /// # Errors
    ///
    /// Returns the driver error.
    pub fn count(&mut self) -> Result<u64> {
        self.apply_scope();
        Ok(self.builder.count()?)
    }

    /// # Errors
    ///
    /// Returns the driver error.
    pub fn exists(&mut self) -> Result<bool> {
        self.apply_scope();
        Ok(self.builder.exists()?)
    }
}
