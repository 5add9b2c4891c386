//! Opt-in persistence behavior: timestamps, soft deletes and lifecycle
//! observers.

use std::fmt;
use std::sync::Arc;

use chrono::{NaiveDateTime, SubsecRound, Utc};

use crate::entity::Entity;

/// A point in an entity's lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelEvent {
    Saving,
    Saved,
    Creating,
    Created,
    Updating,
    Updated,
    Deleting,
    Deleted,
    Restoring,
    Restored,
}

impl ModelEvent {
    /// True for events fired before a write; an observer returning `false`
    /// for one of them cancels the write.
    #[must_use]
    pub const fn is_cancellable(self) -> bool {
        matches!(
            self,
            Self::Saving | Self::Creating | Self::Updating | Self::Deleting | Self::Restoring
        )
    }
}

impl fmt::Display for ModelEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Saving => "saving",
            Self::Saved => "saved",
            Self::Creating => "creating",
            Self::Created => "created",
            Self::Updating => "updating",
            Self::Updated => "updated",
            Self::Deleting => "deleting",
            Self::Deleted => "deleted",
            Self::Restoring => "restoring",
            Self::Restored => "restored",
        };
        f.write_str(name)
    }
}

/// Receives lifecycle events.
///
/// Closures `Fn(ModelEvent, &mut Entity) -> bool` implement this trait.
pub trait Observer: Send + Sync {
    /// Handles `event`. Returning `false` from a cancellable event stops
    /// the operation; the return value of other events is ignored.
    fn handle(&self, event: ModelEvent, entity: &mut Entity) -> bool;
}

impl<F> Observer for F
where
    F: Fn(ModelEvent, &mut Entity) -> bool + Send + Sync,
{
    fn handle(&self, event: ModelEvent, entity: &mut Entity) -> bool {
        self(event, entity)
    }
}

/// Column names maintained on insert and update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timestamps {
    pub created_at: String,
    pub updated_at: String,
}

impl Default for Timestamps {
    fn default() -> Self {
        Self {
            created_at: String::from("created_at"),
            updated_at: String::from("updated_at"),
        }
    }
}

/// Column that marks a row as deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoftDeletes {
    pub column: String,
}

impl Default for SoftDeletes {
    fn default() -> Self {
        Self {
            column: String::from("deleted_at"),
        }
    }
}

/// Behaviors a model opts into. The default policy has none of them.
///
/// ```rust
/// use rivet_orm::{ModelEvent, PersistencePolicy};
///
/// let policy = PersistencePolicy::new()
///     .with_timestamps()
///     .with_soft_deletes()
///     .observe(|event: ModelEvent, entity: &mut rivet_orm::Entity| {
///         event != ModelEvent::Deleting || !entity.get("locked").as_bool().unwrap_or(false)
///     });
/// assert!(policy.timestamps.is_some());
/// ```
#[derive(Clone, Default)]
pub struct PersistencePolicy {
    pub timestamps: Option<Timestamps>,
    pub soft_deletes: Option<SoftDeletes>,
    observers: Vec<Arc<dyn Observer>>,
}

impl fmt::Debug for PersistencePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistencePolicy")
            .field("timestamps", &self.timestamps)
            .field("soft_deletes", &self.soft_deletes)
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl PersistencePolicy {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Maintains `created_at` and `updated_at`.
    #[must_use]
    pub fn with_timestamps(mut self) -> Self {
        self.timestamps = Some(Timestamps::default());
        self
    }

    /// Maintains custom timestamp columns.
    #[must_use]
    pub fn with_timestamp_columns(mut self, created_at: &str, updated_at: &str) -> Self {
        self.timestamps = Some(Timestamps {
            created_at: created_at.to_string(),
            updated_at: updated_at.to_string(),
        });
        self
    }

    /// Marks rows in `deleted_at` instead of deleting them.
    #[must_use]
    pub fn with_soft_deletes(mut self) -> Self {
        self.soft_deletes = Some(SoftDeletes::default());
        self
    }

    /// Marks rows in `column` instead of deleting them.
    #[must_use]
    pub fn with_soft_delete_column(mut self, column: &str) -> Self {
        self.soft_deletes = Some(SoftDeletes {
            column: column.to_string(),
        });
        self
    }

    /// Registers an observer. Observers run in registration order.
    #[must_use]
    pub fn observe(mut self, observer: impl Observer + 'static) -> Self {
        self.observers.push(Arc::new(observer));
        self
    }

    #[must_use]
    pub fn soft_delete_column(&self) -> Option<&str> {
        self.soft_deletes.as_ref().map(|s| s.column.as_str())
    }

    /// Runs the observers for `event`; false when one of them cancelled a
    /// cancellable event.
    pub(crate) fn fire(&self, event: ModelEvent, entity: &mut Entity) -> bool {
        for observer in &self.observers {
            if !observer.handle(event, entity) && event.is_cancellable() {
                return false;
            }
        }
        true
    }
}

/// Current time, truncated to whole seconds so it survives a round trip
/// through text columns.
pub(crate) fn now() -> NaiveDateTime {
    Utc::now().naive_utc().trunc_subsecs(0)
}
