use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::Entity;

/// Handle to an entity registered with a change tracker.
///
/// Clones share one cell: a generated key written back on commit, or a
/// reload on rollback, is visible through every clone. Edits made with
/// [`Tracked::modify`] are picked up as modifications at the next commit.
pub struct Tracked<T> {
    cell: Arc<RwLock<T>>,
}

impl<T: Entity> Tracked<T> {
    pub fn new(entity: T) -> Self {
        Self {
            cell: Arc::new(RwLock::new(entity)),
        }
    }

    /// Snapshot of the current value
    pub fn get(&self) -> T {
        self.read().clone()
    }

    pub fn key(&self) -> Option<T::Key> {
        self.read().key()
    }

    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.read())
    }

    /// Edit the tracked value in place
    pub fn modify<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut self.write())
    }

    pub fn replace(&self, entity: T) {
        *self.write() = entity;
    }

    pub fn assign_key(&self, key: T::Key) {
        self.write().set_key(key);
    }

    /// Whether both handles point at the same tracked cell
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.cell, &other.cell)
    }

    /// Stable identity of the underlying cell
    pub fn handle_id(&self) -> usize {
        Arc::as_ptr(&self.cell) as *const () as usize
    }

    fn read(&self) -> RwLockReadGuard<'_, T> {
        self.cell.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, T> {
        self.cell.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> Clone for Tracked<T> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<T: Entity + fmt::Debug> fmt::Debug for Tracked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Tracked").field(&*self.read()).finish()
    }
}
