use serde::{Deserialize, Serialize};
use std::fmt;

use crate::shared::DomainError;
use crate::value::{FromValue, Record, Value};

mod tracked;
pub use tracked::Tracked;

/// How a related entity set joins to its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    /// Children whose `foreign_key` column holds the parent's key
    HasMany { foreign_key: &'static str },
    /// A single row whose `target_key` equals the parent's `local_column`
    BelongsTo {
        local_column: &'static str,
        target_key: &'static str,
    },
}

/// A named relation that can be eager-loaded with `include`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relation {
    pub name: &'static str,
    pub table: &'static str,
    pub kind: RelationKind,
}

impl Relation {
    pub const fn has_many(
        name: &'static str,
        table: &'static str,
        foreign_key: &'static str,
    ) -> Self {
        Self {
            name,
            table,
            kind: RelationKind::HasMany { foreign_key },
        }
    }

    pub const fn belongs_to(
        name: &'static str,
        table: &'static str,
        local_column: &'static str,
        target_key: &'static str,
    ) -> Self {
        Self {
            name,
            table,
            kind: RelationKind::BelongsTo {
                local_column,
                target_key,
            },
        }
    }
}

/// Static table mapping declared by every entity type.
///
/// `columns` lists the non-key columns in the order produced by
/// [`Entity::values`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntitySchema {
    pub table: &'static str,
    pub key: &'static str,
    pub key_generated: bool,
    pub columns: &'static [&'static str],
    pub relations: &'static [Relation],
}

impl EntitySchema {
    /// Schema with a store-generated integer key and no relations
    pub const fn new(
        table: &'static str,
        key: &'static str,
        columns: &'static [&'static str],
    ) -> Self {
        Self {
            table,
            key,
            key_generated: true,
            columns,
            relations: &[],
        }
    }

    /// The caller supplies the key (string keys, natural keys)
    pub const fn with_assigned_key(self) -> Self {
        Self {
            key_generated: false,
            ..self
        }
    }

    pub const fn with_relations(self, relations: &'static [Relation]) -> Self {
        Self { relations, ..self }
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.key == column || self.columns.contains(&column)
    }

    pub fn relation(&self, name: &str) -> Option<&'static Relation> {
        self.relations.iter().find(|r| r.name == name)
    }

    /// Key column followed by the value columns
    pub fn select_columns(&self) -> impl Iterator<Item = &'static str> {
        std::iter::once(self.key).chain(self.columns.iter().copied())
    }
}

/// A record type the repository layer can persist.
///
/// Implementations are plain structs; nothing is derived by reflection.
pub trait Entity: Clone + Send + Sync + 'static {
    type Key: Clone + Into<Value> + FromValue + Send + Sync + fmt::Debug;

    const SCHEMA: EntitySchema;

    /// `None` until the store assigns a generated key
    fn key(&self) -> Option<Self::Key>;

    fn set_key(&mut self, key: Self::Key);

    /// Values for `SCHEMA.columns`, same order
    fn values(&self) -> Vec<Value>;

    fn from_record(record: &Record) -> Result<Self, DomainError>;

    /// Receive eager-loaded rows for `relation`.
    fn load_related(&mut self, relation: &str, records: Vec<Record>) -> Result<(), DomainError> {
        let _ = records;
        Err(DomainError::InvalidArgument(format!(
            "entity '{}' cannot load relation '{}'",
            Self::SCHEMA.table,
            relation
        )))
    }
}

/// Change-tracker state of one entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityState {
    Detached,
    Unchanged,
    Added,
    Modified,
    Deleted,
}

impl EntityState {
    /// Whether commit has work to do for this entry
    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            EntityState::Added | EntityState::Modified | EntityState::Deleted
        )
    }
}

impl fmt::Display for EntityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityState::Detached => "detached",
            EntityState::Unchanged => "unchanged",
            EntityState::Added => "added",
            EntityState::Modified => "modified",
            EntityState::Deleted => "deleted",
        };
        write!(f, "{}", name)
    }
}
