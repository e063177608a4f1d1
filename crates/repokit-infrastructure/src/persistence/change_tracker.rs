use std::any::{Any, TypeId};
use std::sync::Arc;

use repokit_domain::{
    DomainError, Entity, EntitySchema, EntityState, FromValue, Record, Tracked, Value,
};

/// Type-erased view of a tracked entity, enough to persist or reload it
/// without knowing `T`.
pub(crate) trait EntrySlot: Send + Sync {
    fn entity_type(&self) -> TypeId;
    fn schema(&self) -> EntitySchema;
    fn key_value(&self) -> Option<Value>;
    fn values(&self) -> Vec<Value>;
    /// Fails if `key` cannot be represented as the entity's key type
    fn check_key(&self, key: &Value) -> Result<(), DomainError>;
    fn assign_key(&self, key: Value) -> Result<(), DomainError>;
    /// Decode `record` now; the returned closure installs it into the cell
    fn prepare_reload(&self, record: &Record) -> Result<Box<dyn FnOnce() + Send>, DomainError>;
    fn handle_id(&self) -> usize;
    fn as_any(&self) -> &dyn Any;
}

impl<T: Entity> EntrySlot for Tracked<T> {
    fn entity_type(&self) -> TypeId {
        TypeId::of::<T>()
    }

    fn schema(&self) -> EntitySchema {
        T::SCHEMA
    }

    fn key_value(&self) -> Option<Value> {
        self.key().map(Into::into)
    }

    fn values(&self) -> Vec<Value> {
        self.with(|e| e.values())
    }

    fn check_key(&self, key: &Value) -> Result<(), DomainError> {
        T::Key::from_value(key.clone()).map(|_| ())
    }

    fn assign_key(&self, key: Value) -> Result<(), DomainError> {
        Tracked::assign_key(self, T::Key::from_value(key)?);
        Ok(())
    }

    fn prepare_reload(&self, record: &Record) -> Result<Box<dyn FnOnce() + Send>, DomainError> {
        let entity = T::from_record(record)?;
        let cell = self.clone();
        Ok(Box::new(move || cell.replace(entity)))
    }

    fn handle_id(&self) -> usize {
        Tracked::handle_id(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

struct TrackedEntry {
    slot: Arc<dyn EntrySlot>,
    state: EntityState,
    /// Column values as last loaded from or written to the store
    original: Vec<Value>,
}

/// One staged write, captured when a commit starts.
pub(crate) struct PendingChange {
    pub slot: Arc<dyn EntrySlot>,
    pub state: EntityState,
    pub key: Option<Value>,
    pub values: Vec<Value>,
}

/// Identity map and state machine for every entity a unit of work has seen.
///
/// Entries keep the order they were first tracked in; commits replay them
/// in that order.
#[derive(Default)]
pub(crate) struct ChangeTracker {
    entries: Vec<TrackedEntry>,
}

impl ChangeTracker {
    fn position_by_key(&self, entity_type: TypeId, key: &Value) -> Option<usize> {
        self.entries.iter().position(|e| {
            e.slot.entity_type() == entity_type && e.slot.key_value().as_ref() == Some(key)
        })
    }

    fn position_by_handle(&self, handle_id: usize) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.slot.handle_id() == handle_id)
    }

    fn required_key<T: Entity>(entity: &T, action: &str) -> Result<Value, DomainError> {
        entity.key().map(Into::into).ok_or_else(|| {
            DomainError::InvalidArgument(format!(
                "cannot {} '{}' without a key",
                action,
                T::SCHEMA.table
            ))
        })
    }

    fn downcast<T: Entity>(slot: &Arc<dyn EntrySlot>) -> Result<Tracked<T>, DomainError> {
        slot.as_any()
            .downcast_ref::<Tracked<T>>()
            .cloned()
            .ok_or_else(|| {
                DomainError::InvalidOperation(format!(
                    "tracked entry for '{}' has a different entity type",
                    T::SCHEMA.table
                ))
            })
    }

    pub fn track_added<T: Entity>(&mut self, entity: T) -> Result<Tracked<T>, DomainError> {
        match entity.key().map(Into::into) {
            None if !T::SCHEMA.key_generated => {
                return Err(DomainError::InvalidArgument(format!(
                    "'{}' has an assigned key; set it before adding",
                    T::SCHEMA.table
                )));
            }
            Some(key) if self.position_by_key(TypeId::of::<T>(), &key).is_some() => {
                return Err(DomainError::InvalidOperation(format!(
                    "another '{}' with key {} is already tracked",
                    T::SCHEMA.table,
                    key
                )));
            }
            _ => {}
        }

        let tracked = Tracked::new(entity);
        self.entries.push(TrackedEntry {
            slot: Arc::new(tracked.clone()),
            state: EntityState::Added,
            original: Vec::new(),
        });
        Ok(tracked)
    }

    /// Attach as modified, or overwrite the already-tracked instance.
    pub fn track_modified<T: Entity>(&mut self, entity: T) -> Result<Tracked<T>, DomainError> {
        let key = Self::required_key(&entity, "update")?;

        if let Some(pos) = self.position_by_key(TypeId::of::<T>(), &key) {
            let entry = &mut self.entries[pos];
            let tracked = Self::downcast::<T>(&entry.slot)?;
            tracked.replace(entity);
            // An insert stays an insert; it just carries the new values
            if entry.state != EntityState::Added {
                entry.state = EntityState::Modified;
            }
            return Ok(tracked);
        }

        let tracked = Tracked::new(entity);
        let original = tracked.with(|e| e.values());
        self.entries.push(TrackedEntry {
            slot: Arc::new(tracked.clone()),
            state: EntityState::Modified,
            original,
        });
        Ok(tracked)
    }

    pub fn track_deleted<T: Entity>(&mut self, entity: T) -> Result<(), DomainError> {
        let key = Self::required_key(&entity, "delete")?;

        if let Some(pos) = self.position_by_key(TypeId::of::<T>(), &key) {
            if self.entries[pos].state == EntityState::Added {
                // Never reached the store
                self.entries.remove(pos);
            } else {
                self.entries[pos].state = EntityState::Deleted;
            }
            return Ok(());
        }

        let tracked = Tracked::new(entity);
        let original = tracked.with(|e| e.values());
        self.entries.push(TrackedEntry {
            slot: Arc::new(tracked),
            state: EntityState::Deleted,
            original,
        });
        Ok(())
    }

    /// Current value of a tracked, not-deleted entity with this key
    pub fn tracked_value<T: Entity>(&self, key: &Value) -> Option<T> {
        let entry = &self.entries[self.position_by_key(TypeId::of::<T>(), key)?];
        if entry.state == EntityState::Deleted {
            return None;
        }
        entry
            .slot
            .as_any()
            .downcast_ref::<Tracked<T>>()
            .map(Tracked::get)
    }

    /// Promote unchanged entries whose values were edited in place.
    pub fn detect_changes(&mut self) -> usize {
        let mut detected = 0;
        for entry in self
            .entries
            .iter_mut()
            .filter(|e| e.state == EntityState::Unchanged)
        {
            if entry.slot.values() != entry.original {
                entry.state = EntityState::Modified;
                detected += 1;
            }
        }
        detected
    }

    pub fn has_changes(&mut self) -> bool {
        self.detect_changes();
        self.entries.iter().any(|e| e.state.is_pending())
    }

    pub fn pending(&mut self) -> Vec<PendingChange> {
        self.detect_changes();
        self.entries
            .iter()
            .filter(|e| e.state.is_pending())
            .map(|e| PendingChange {
                slot: Arc::clone(&e.slot),
                state: e.state,
                key: e.slot.key_value(),
                values: e.slot.values(),
            })
            .collect()
    }

    /// Settle entries after their writes committed.
    pub fn accept(&mut self, applied: &[PendingChange]) {
        for change in applied {
            let Some(pos) = self.position_by_handle(change.slot.handle_id()) else {
                continue;
            };

            if change.state == EntityState::Deleted {
                self.entries.remove(pos);
            } else {
                let entry = &mut self.entries[pos];
                entry.state = EntityState::Unchanged;
                entry.original = change.values.clone();
            }
        }
    }

    /// Every entry a rollback reloads from the store
    pub fn reload_candidates(&self) -> Vec<Arc<dyn EntrySlot>> {
        self.entries
            .iter()
            .filter(|e| e.state != EntityState::Added)
            .map(|e| Arc::clone(&e.slot))
            .collect()
    }

    /// Drop pending inserts, returning how many were dropped
    pub fn discard_added(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| e.state != EntityState::Added);
        before - self.entries.len()
    }

    pub fn mark_unchanged(&mut self, handle_id: usize) {
        if let Some(pos) = self.position_by_handle(handle_id) {
            let entry = &mut self.entries[pos];
            entry.state = EntityState::Unchanged;
            entry.original = entry.slot.values();
        }
    }

    pub fn detach(&mut self, handle_id: usize) {
        if let Some(pos) = self.position_by_handle(handle_id) {
            self.entries.remove(pos);
        }
    }

    pub fn state_of(&mut self, handle_id: usize) -> EntityState {
        self.detect_changes();
        self.position_by_handle(handle_id)
            .map(|pos| self.entries[pos].state)
            .unwrap_or(EntityState::Detached)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
