use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use repokit_domain::{DomainError, Entity, UnitOfWork, UnitOfWorkState};
use sqlx::SqlitePool;

use super::context::StorageContext;
use super::repository::SqliteRepository;

/// SQLite unit of work
///
/// Hands out one repository per entity type, all sharing a single
/// [`StorageContext`]; `commit` flushes everything they staged in one
/// transaction.
pub struct SqliteUnitOfWork {
    context: Arc<StorageContext>,
    repositories: Mutex<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
}

impl SqliteUnitOfWork {
    pub fn new(context: StorageContext) -> Self {
        Self {
            context: Arc::new(context),
            repositories: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self::new(StorageContext::new(pool))
    }

    pub fn context(&self) -> &Arc<StorageContext> {
        &self.context
    }

    /// Number of distinct repositories created so far
    pub fn repository_count(&self) -> usize {
        self.repositories
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[async_trait]
impl UnitOfWork for SqliteUnitOfWork {
    type Repo<T: Entity> = SqliteRepository<T>;

    fn repository<T: Entity>(&self) -> Arc<SqliteRepository<T>> {
        let mut repositories = self
            .repositories
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let repository = repositories
            .entry(TypeId::of::<T>())
            .or_insert_with(|| {
                let repository: Arc<dyn Any + Send + Sync> =
                    Arc::new(SqliteRepository::<T>::new(Arc::clone(&self.context)));
                repository
            })
            .clone();

        repository
            .downcast::<SqliteRepository<T>>()
            .expect("registry is keyed by TypeId")
    }

    async fn commit(&self) -> Result<u64, DomainError> {
        self.context.save_changes().await
    }

    async fn rollback(&self) -> Result<(), DomainError> {
        self.context.discard_changes().await
    }

    fn state(&self) -> UnitOfWorkState {
        if self.context.has_changes() {
            UnitOfWorkState::Dirty
        } else {
            UnitOfWorkState::Clean
        }
    }
}
